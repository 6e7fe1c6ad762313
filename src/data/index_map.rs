//! Local-to-global index maps for distributed dof numberings.
//!
//! An [`IndexMap`] describes one rank's view of a global numbering: the rank
//! owns the contiguous global range `[offset, offset + size_owned)` and
//! additionally references *ghost* indices owned by other ranks. Local
//! indices number owned entries first (`0..size_owned`) followed by ghosts
//! in the order given.
//!
//! Offsets follow the usual convention: owned counts are numbered
//! contiguously per rank, ascending by rank, so a rank's offset is the
//! exclusive prefix sum of the owned counts of lower ranks.

use crate::algs::communicator::{Communicator, exclusive_prefix_sum};
use crate::mesh_error::MeshBlocksError;
use std::collections::HashMap;
use std::ops::Range;

/// One rank's owned range plus ghost indices of a global numbering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexMap {
    offset: u64,
    size_owned: usize,
    size_global: u64,
    ghosts: Vec<u64>,
    ghost_owners: Vec<usize>,
    ghost_lookup: HashMap<u64, usize>,
}

impl IndexMap {
    /// Assemble an index map from already-known offsets.
    pub fn new(
        offset: u64,
        size_owned: usize,
        size_global: u64,
        ghosts: Vec<u64>,
        ghost_owners: Vec<usize>,
    ) -> Result<Self, MeshBlocksError> {
        if ghosts.len() != ghost_owners.len() {
            return Err(MeshBlocksError::LengthMismatch {
                what: "ghost owners",
                expected: ghosts.len(),
                found: ghost_owners.len(),
            });
        }
        let ghost_lookup = ghosts
            .iter()
            .enumerate()
            .map(|(i, &g)| (g, size_owned + i))
            .collect();
        Ok(Self {
            offset,
            size_owned,
            size_global,
            ghosts,
            ghost_owners,
            ghost_lookup,
        })
    }

    /// Owned offset and global size from `size_owned` on every rank.
    ///
    /// Collective over `comm`.
    pub fn owned_offset(
        comm: &dyn Communicator,
        size_owned: usize,
    ) -> Result<(u64, u64), MeshBlocksError> {
        exclusive_prefix_sum(comm, size_owned as u64)
    }

    /// First global index owned by this rank.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Owned global range `[offset, offset + size_owned)`.
    pub fn local_range(&self) -> Range<u64> {
        self.offset..self.offset + self.size_owned as u64
    }

    /// Number of owned indices.
    pub fn size_owned(&self) -> usize {
        self.size_owned
    }

    /// Number of ghost indices.
    pub fn num_ghosts(&self) -> usize {
        self.ghosts.len()
    }

    /// Owned plus ghost indices.
    pub fn size_local(&self) -> usize {
        self.size_owned + self.ghosts.len()
    }

    /// Size of the global numbering across all ranks.
    pub fn size_global(&self) -> u64 {
        self.size_global
    }

    /// Global indices of the ghosts, in local order.
    pub fn ghosts(&self) -> &[u64] {
        &self.ghosts
    }

    /// Owning rank of each ghost, in local order.
    pub fn ghost_owners(&self) -> &[usize] {
        &self.ghost_owners
    }

    /// Global index of local index `local`.
    pub fn local_to_global(&self, local: usize) -> Result<u64, MeshBlocksError> {
        if local < self.size_owned {
            return Ok(self.offset + local as u64);
        }
        self.ghosts
            .get(local - self.size_owned)
            .copied()
            .ok_or(MeshBlocksError::DofOutOfBounds {
                index: local,
                len: self.size_local(),
            })
    }

    /// Local index of global index `global`, if this rank sees it.
    pub fn global_to_local(&self, global: u64) -> Option<usize> {
        if self.local_range().contains(&global) {
            return Some((global - self.offset) as usize);
        }
        self.ghost_lookup.get(&global).copied()
    }

    /// Whether local index `local` is owned by this rank.
    pub fn is_owned(&self, local: usize) -> bool {
        local < self.size_owned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::run_on_threads;

    #[test]
    fn owned_then_ghost_lookup() {
        let map = IndexMap::new(10, 3, 20, vec![2, 17], vec![0, 2]).unwrap();
        assert_eq!(map.local_range(), 10..13);
        assert_eq!(map.size_local(), 5);
        assert_eq!(map.local_to_global(1).unwrap(), 11);
        assert_eq!(map.local_to_global(4).unwrap(), 17);
        assert_eq!(map.global_to_local(12), Some(2));
        assert_eq!(map.global_to_local(2), Some(3));
        assert_eq!(map.global_to_local(5), None);
        assert!(map.is_owned(2));
        assert!(!map.is_owned(3));
        assert!(matches!(
            map.local_to_global(5),
            Err(MeshBlocksError::DofOutOfBounds { index: 5, len: 5 })
        ));
    }

    #[test]
    fn ghost_owner_lengths_must_agree() {
        assert!(matches!(
            IndexMap::new(0, 1, 1, vec![4], vec![]),
            Err(MeshBlocksError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn owned_offsets_follow_rank_order() {
        let offsets = run_on_threads(3, |comm| {
            IndexMap::owned_offset(comm.as_ref(), 2 + comm.rank()).unwrap()
        });
        assert_eq!(offsets, vec![(0, 9), (2, 9), (5, 9)]);
    }
}
