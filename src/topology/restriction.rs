//! Entity-level restrictions of a block to a subdomain.
//!
//! A [`MeshRestriction`] is a list of [`EntityMarkers`], each marking the
//! active entities of one topological dimension. It is attached to one block
//! of a block function space and decides which of that block's dofs survive
//! into the block numbering: a dof is active iff the entity it lives on is
//! active.
//!
//! Activity of an entity `e` of dimension `d` only looks at the marker sets
//! whose dimension is `d`:
//! - no such set: `e` is active (sets for other dimensions do not constrain it);
//! - otherwise [`RestrictionPolicy::All`] requires `e` in every such set and
//!   [`RestrictionPolicy::Any`] in at least one.
//!
//! Restrictions are plain data (`serde`), so they can be stored alongside a
//! mesh and reloaded.

use crate::mesh_error::MeshBlocksError;
use crate::topology::mesh::Mesh;
use crate::topology::point::PointId;
use std::collections::BTreeSet;

/// How several marker sets of the same dimension combine.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum RestrictionPolicy {
    /// Logical AND across marker sets.
    #[default]
    All,
    /// Logical OR across marker sets.
    Any,
}

/// Active entities of one topological dimension.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EntityMarkers {
    dim: usize,
    active: BTreeSet<PointId>,
}

impl EntityMarkers {
    /// Mark `points` (all of dimension `dim`) as active.
    pub fn new(dim: usize, points: impl IntoIterator<Item = PointId>) -> Self {
        Self {
            dim,
            active: points.into_iter().collect(),
        }
    }

    /// Entity dimension these markers apply to.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Whether `p` is marked active.
    pub fn is_active(&self, p: PointId) -> bool {
        self.active.contains(&p)
    }

    /// Number of active entities.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True when nothing is marked.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Active entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = PointId> + '_ {
        self.active.iter().copied()
    }
}

/// Per-block restriction: marker sets over entity dimensions plus a policy.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeshRestriction {
    markers: Vec<EntityMarkers>,
    #[serde(default)]
    policy: RestrictionPolicy,
}

impl MeshRestriction {
    /// Restriction from explicit marker sets, combined with [`RestrictionPolicy::All`].
    pub fn new(markers: Vec<EntityMarkers>) -> Self {
        Self {
            markers,
            policy: RestrictionPolicy::All,
        }
    }

    /// Same markers, different combination policy.
    pub fn with_policy(mut self, policy: RestrictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Restrict to `cells` and every entity in their closure.
    ///
    /// One marker set is produced per dimension `0..=tdim`, so dofs on any
    /// entity touching a selected cell stay active.
    pub fn from_cells(
        mesh: &Mesh,
        cells: impl IntoIterator<Item = PointId>,
    ) -> Result<Self, MeshBlocksError> {
        let tdim = mesh.tdim();
        let mut per_dim = vec![BTreeSet::new(); tdim + 1];
        for cell in cells {
            let found = mesh.dimension_of(cell)?;
            if found != tdim {
                return Err(MeshBlocksError::EntityDimensionMismatch {
                    point: cell,
                    expected: tdim,
                    found,
                });
            }
            for &q in mesh.closure(cell)? {
                per_dim[mesh.dimension_of(q)?].insert(q);
            }
        }
        let markers = per_dim
            .into_iter()
            .enumerate()
            .map(|(dim, active)| EntityMarkers { dim, active })
            .collect();
        Ok(Self::new(markers))
    }

    /// Marker sets in the order supplied.
    pub fn markers(&self) -> &[EntityMarkers] {
        &self.markers
    }

    /// Combination policy for marker sets of equal dimension.
    pub fn policy(&self) -> RestrictionPolicy {
        self.policy
    }

    /// Whether any marker set applies to dimension `dim`.
    pub fn constrains_dim(&self, dim: usize) -> bool {
        self.markers.iter().any(|m| m.dim == dim)
    }

    /// Whether entity `p` of dimension `dim` is active.
    pub fn is_active(&self, p: PointId, dim: usize) -> bool {
        let mut relevant = self.markers.iter().filter(|m| m.dim == dim).peekable();
        if relevant.peek().is_none() {
            return true;
        }
        match self.policy {
            RestrictionPolicy::All => relevant.all(|m| m.is_active(p)),
            RestrictionPolicy::Any => relevant.any(|m| m.is_active(p)),
        }
    }

    /// Check every marker set against `mesh`.
    ///
    /// # Errors
    /// [`MeshBlocksError::InvalidEntityDimension`] for a set with `dim > tdim`,
    /// [`MeshBlocksError::UnknownPoint`] / [`MeshBlocksError::EntityDimensionMismatch`]
    /// for marked points that are not entities of that dimension.
    pub fn validate(&self, mesh: &Mesh) -> Result<(), MeshBlocksError> {
        let tdim = mesh.tdim();
        for markers in &self.markers {
            if markers.dim > tdim {
                return Err(MeshBlocksError::InvalidEntityDimension {
                    dim: markers.dim,
                    tdim,
                });
            }
            for p in markers.iter() {
                let found = mesh.dimension_of(p)?;
                if found != markers.dim {
                    return Err(MeshBlocksError::EntityDimensionMismatch {
                        point: p,
                        expected: markers.dim,
                        found,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(raw: u64) -> PointId {
        PointId::new(raw).unwrap()
    }

    #[test]
    fn unconstrained_dimension_is_active() {
        let r = MeshRestriction::new(vec![EntityMarkers::new(1, [pid(10)])]);
        assert!(r.is_active(pid(3), 0));
        assert!(r.is_active(pid(10), 1));
        assert!(!r.is_active(pid(11), 1));
        assert!(r.constrains_dim(1));
        assert!(!r.constrains_dim(0));
    }

    #[test]
    fn policies_combine_sets_of_equal_dimension() {
        let markers = vec![
            EntityMarkers::new(0, [pid(1), pid(2)]),
            EntityMarkers::new(0, [pid(2), pid(3)]),
        ];
        let all = MeshRestriction::new(markers.clone());
        assert!(!all.is_active(pid(1), 0));
        assert!(all.is_active(pid(2), 0));
        assert!(!all.is_active(pid(3), 0));

        let any = MeshRestriction::new(markers).with_policy(RestrictionPolicy::Any);
        assert!(any.is_active(pid(1), 0));
        assert!(any.is_active(pid(2), 0));
        assert!(any.is_active(pid(3), 0));
        assert!(!any.is_active(pid(4), 0));
    }

    #[test]
    fn empty_marker_set_deactivates_its_dimension() {
        let r = MeshRestriction::new(vec![EntityMarkers::new(0, std::iter::empty())]);
        assert!(!r.is_active(pid(1), 0));
        assert!(r.is_active(pid(1), 1));
    }
}
