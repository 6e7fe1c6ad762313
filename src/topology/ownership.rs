//! Ownership metadata for mesh points.
//!
//! The [`PointOwnership`] map records the owning rank of each local point and
//! whether the point is a ghost on the current rank. Dof maps number owned
//! entities first and take ghost indices from their owners.

use crate::mesh_error::MeshBlocksError;
use crate::topology::point::PointId;
use std::collections::BTreeSet;

/// Owner rank and ghost flag for one point.
#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OwnershipEntry {
    pub owner: usize,
    pub is_ghost: bool,
}

/// Dense ownership table indexed by `PointId - 1`.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct PointOwnership {
    entries: Vec<Option<OwnershipEntry>>,
}

impl PointOwnership {
    /// Create an empty ownership map sized for `max_id` points.
    pub fn with_capacity(max_id: usize) -> Self {
        Self {
            entries: vec![None; max_id],
        }
    }

    /// Returns true if no entries exist in the map.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|entry| entry.is_none())
    }

    /// Insert or update an ownership entry using `my_rank` to determine ghostness.
    pub fn set_from_owner(
        &mut self,
        point: PointId,
        owner: usize,
        my_rank: usize,
    ) -> Result<(), MeshBlocksError> {
        let idx = slot(point)?;
        if idx >= self.entries.len() {
            self.entries.resize(idx + 1, None);
        }
        self.entries[idx] = Some(OwnershipEntry {
            owner,
            is_ghost: owner != my_rank,
        });
        Ok(())
    }

    /// Retrieve the ownership entry for a point.
    pub fn entry(&self, point: PointId) -> Option<OwnershipEntry> {
        let idx = point.get().checked_sub(1)? as usize;
        self.entries.get(idx).copied().flatten()
    }

    /// Retrieve the owning rank for a point.
    pub fn owner(&self, point: PointId) -> Option<usize> {
        self.entry(point).map(|entry| entry.owner)
    }

    /// Retrieve the owning rank or return an error if missing.
    pub fn owner_or_err(&self, point: PointId) -> Result<usize, MeshBlocksError> {
        self.owner(point)
            .ok_or(MeshBlocksError::MissingOwnership(point))
    }

    /// Returns true if the point is owned by `rank`.
    pub fn is_owned_by(&self, point: PointId, rank: usize) -> bool {
        self.owner(point).is_some_and(|owner| owner == rank)
    }

    /// Ranks other than `my_rank` owning at least one tracked point.
    pub fn neighbor_ranks(&self, my_rank: usize) -> BTreeSet<usize> {
        self.entries
            .iter()
            .flatten()
            .map(|entry| entry.owner)
            .filter(|&owner| owner != my_rank)
            .collect()
    }
}

fn slot(point: PointId) -> Result<usize, MeshBlocksError> {
    point
        .get()
        .checked_sub(1)
        .map(|idx| idx as usize)
        .ok_or(MeshBlocksError::InvalidPointId)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ghost_flag_follows_owner() {
        let mut own = PointOwnership::with_capacity(2);
        let p = PointId::new(1).unwrap();
        let q = PointId::new(5).unwrap();
        own.set_from_owner(p, 0, 1).unwrap();
        own.set_from_owner(q, 1, 1).unwrap();
        assert_eq!(own.entry(p).map(|e| e.is_ghost), Some(true));
        assert_eq!(own.entry(q).map(|e| e.is_ghost), Some(false));
        assert!(own.is_owned_by(q, 1));
        assert_eq!(own.neighbor_ranks(1).into_iter().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn missing_owner_is_an_error() {
        let own = PointOwnership::default();
        let p = PointId::new(3).unwrap();
        assert_eq!(
            own.owner_or_err(p),
            Err(MeshBlocksError::MissingOwnership(p))
        );
        assert!(own.is_empty());
    }
}
