//! Unified numbering of several (possibly restricted) scalar dof maps.
//!
//! A [`BlockDofMap`] keeps the *active* dofs of every block and numbers them
//! in one local numbering:
//!
//! ```text
//! [ owned active of block 0 | owned active of block 1 | ... | ghosts of block 0 | ghosts of block 1 | ... ]
//! ```
//!
//! Within each segment the original (unrestricted) local order is preserved.
//! Owned indices are offset by the prefix sum of owned active counts over
//! lower ranks, so each rank owns a contiguous global range.
//!
//! # Activity across ranks
//! A dof is locally active when its entity is active in the block's
//! [`MeshRestriction`] (or the block has none). Shared dofs are reconciled in
//! two collective rounds:
//! 1. every rank publishes the ghost dofs it sees as active; an owner keeps a
//!    dof if it is locally active *or* any rank reported it;
//! 2. owners publish the block index of every reported dof, which the ghost
//!    ranks adopt.
//!
//! A ghost dof is kept only on ranks where it is locally active. Every rank
//! must call [`BlockDofMap::build`] with the same number of blocks.

use crate::data::index_map::IndexMap;
use crate::debug_invariants::DebugInvariants;
use crate::discretization::dofmap::DofMap;
use crate::mesh_error::MeshBlocksError;
use crate::topology::mesh::Mesh;
use crate::topology::point::PointId;
use crate::topology::restriction::MeshRestriction;
use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::sync::Arc;

/// Active-dof numbering across blocks, with the correspondence to every
/// block's original numbering.
#[derive(Debug)]
pub struct BlockDofMap {
    dofmaps: Vec<Arc<DofMap>>,
    index_map: IndexMap,
    sub_index_maps: Vec<IndexMap>,
    /// Block local index -> (block, original local index).
    block_to_original: Vec<(usize, usize)>,
    /// Per block: original local index -> block local index.
    original_to_block: Vec<Vec<Option<usize>>>,
    owned_ranges: Vec<Range<usize>>,
    ghost_ranges: Vec<Range<usize>>,
}

impl BlockDofMap {
    /// Combine `dofmaps` (all on `mesh`) with one optional restriction per block.
    ///
    /// Collective over the mesh communicator.
    ///
    /// # Errors
    /// - [`MeshBlocksError::EmptyBlockList`] without blocks;
    /// - [`MeshBlocksError::LengthMismatch`] if `restrictions` has another length;
    /// - [`MeshBlocksError::MeshMismatch`] if a dof map lives on another mesh;
    /// - restriction validation errors (see [`MeshRestriction::validate`]);
    /// - [`MeshBlocksError::InconsistentRestriction`] if an owner did not
    ///   number a ghost dof this rank considers active.
    pub fn build(
        mesh: &Mesh,
        dofmaps: &[Arc<DofMap>],
        restrictions: &[Option<MeshRestriction>],
    ) -> Result<Self, MeshBlocksError> {
        let nb = dofmaps.len();
        if nb == 0 {
            return Err(MeshBlocksError::EmptyBlockList);
        }
        if restrictions.len() != nb {
            return Err(MeshBlocksError::LengthMismatch {
                what: "restrictions",
                expected: nb,
                found: restrictions.len(),
            });
        }
        for (block, dofmap) in dofmaps.iter().enumerate() {
            if dofmap.mesh_id() != mesh.id() {
                return Err(MeshBlocksError::MeshMismatch {
                    block,
                    expected: mesh.id().get(),
                    found: dofmap.mesh_id().get(),
                });
            }
        }
        for (block, restriction) in restrictions.iter().enumerate() {
            if let Some(r) = restriction {
                r.validate(mesh)?;
                report_ignored_markers(block, r, &dofmaps[block]);
            }
        }

        let comm = mesh.comm().as_ref();
        let rank = comm.rank();
        let mut active: Vec<Vec<bool>> = dofmaps
            .iter()
            .zip(restrictions)
            .map(|(dofmap, r)| local_activity(dofmap, r.as_ref()))
            .collect();

        // Round 1: publish locally active ghosts as (block, original global).
        let mut requests = Vec::new();
        for (b, dofmap) in dofmaps.iter().enumerate() {
            let im = dofmap.index_map();
            for (j, &g) in im.ghosts().iter().enumerate() {
                if active[b][im.size_owned() + j] {
                    requests.extend([b as u64, g]);
                }
            }
        }
        let all_requests = comm.all_gather_varcount_u64(&requests)?;
        let mut wanted: BTreeSet<(usize, u64)> = BTreeSet::new();
        for (from, request) in all_requests.iter().enumerate() {
            if from == rank {
                continue;
            }
            for pair in request.chunks_exact(2) {
                let b = pair[0] as usize;
                let Some(dofmap) = dofmaps.get(b) else {
                    return Err(MeshBlocksError::CommError(format!(
                        "rank {from} requested a dof of block {b}, only {nb} blocks exist"
                    )));
                };
                let im = dofmap.index_map();
                if im.local_range().contains(&pair[1]) {
                    active[b][(pair[1] - im.offset()) as usize] = true;
                    wanted.insert((b, pair[1]));
                }
            }
        }

        // Owned active dofs, grouped by block.
        let mut original_to_block: Vec<Vec<Option<usize>>> = dofmaps
            .iter()
            .map(|dofmap| vec![None; dofmap.num_local_dofs()])
            .collect();
        let mut block_to_original = Vec::new();
        let mut owned_ranges = Vec::with_capacity(nb);
        for (b, dofmap) in dofmaps.iter().enumerate() {
            let start = block_to_original.len();
            for d in 0..dofmap.index_map().size_owned() {
                if active[b][d] {
                    original_to_block[b][d] = Some(block_to_original.len());
                    block_to_original.push((b, d));
                }
            }
            owned_ranges.push(start..block_to_original.len());
        }
        let size_owned = block_to_original.len();

        let owned_counts: Vec<u64> = owned_ranges.iter().map(|r| r.len() as u64).collect();
        let all_counts = comm.all_gather_varcount_u64(&owned_counts)?;
        let mut sub_offsets = vec![0u64; nb];
        let mut sub_totals = vec![0u64; nb];
        for (from, counts) in all_counts.iter().enumerate() {
            if counts.len() != nb {
                return Err(MeshBlocksError::CommError(format!(
                    "rank {from} built {} blocks, this rank {nb}",
                    counts.len()
                )));
            }
            for (b, &count) in counts.iter().enumerate() {
                if from < rank {
                    sub_offsets[b] += count;
                }
                sub_totals[b] += count;
            }
        }
        let offset: u64 = all_counts[..rank].iter().flatten().sum();
        let size_global: u64 = sub_totals.iter().sum();

        // Round 2: owners answer with (block, original global, block global, sub global).
        let mut replies = Vec::with_capacity(wanted.len() * 4);
        for (b, g) in wanted {
            let d = (g - dofmaps[b].index_map().offset()) as usize;
            if let Some(k) = original_to_block[b][d] {
                let sub = sub_offsets[b] + (k - owned_ranges[b].start) as u64;
                replies.extend([b as u64, g, offset + k as u64, sub]);
            }
        }
        let all_replies = comm.all_gather_varcount_u64(&replies)?;
        let mut resolved: HashMap<(usize, u64), (u64, u64)> = HashMap::new();
        for reply in &all_replies {
            for quad in reply.chunks_exact(4) {
                resolved.insert((quad[0] as usize, quad[1]), (quad[2], quad[3]));
            }
        }

        // Ghost active dofs, grouped by block.
        let mut ghosts = Vec::new();
        let mut ghost_owners = Vec::new();
        let mut sub_ghosts = vec![Vec::new(); nb];
        let mut sub_ghost_owners = vec![Vec::new(); nb];
        let mut ghost_ranges = Vec::with_capacity(nb);
        for (b, dofmap) in dofmaps.iter().enumerate() {
            let im = dofmap.index_map();
            let start = block_to_original.len();
            for (j, (&g, &owner)) in im.ghosts().iter().zip(im.ghost_owners()).enumerate() {
                let d = im.size_owned() + j;
                if !active[b][d] {
                    continue;
                }
                let &(block_global, sub_global) = resolved
                    .get(&(b, g))
                    .ok_or(MeshBlocksError::InconsistentRestriction { block: b, global: g })?;
                original_to_block[b][d] = Some(block_to_original.len());
                block_to_original.push((b, d));
                ghosts.push(block_global);
                ghost_owners.push(owner);
                sub_ghosts[b].push(sub_global);
                sub_ghost_owners[b].push(owner);
            }
            ghost_ranges.push(start..block_to_original.len());
        }

        let index_map = IndexMap::new(offset, size_owned, size_global, ghosts, ghost_owners)?;
        let sub_index_maps = sub_ghosts
            .into_iter()
            .zip(sub_ghost_owners)
            .enumerate()
            .map(|(b, (g, o))| {
                IndexMap::new(sub_offsets[b], owned_ranges[b].len(), sub_totals[b], g, o)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for b in 0..nb {
            log::debug!(
                "rank {rank}: block {b}: {} of {} local dofs active ({} owned, {} ghosts), {} global",
                owned_ranges[b].len() + ghost_ranges[b].len(),
                dofmaps[b].num_local_dofs(),
                owned_ranges[b].len(),
                ghost_ranges[b].len(),
                sub_totals[b]
            );
        }
        log::debug!(
            "rank {rank}: block dof map offset {offset}, {size_global} global dofs, neighbors {:?}",
            mesh.ownership().neighbor_ranks(rank)
        );

        let map = Self {
            dofmaps: dofmaps.to_vec(),
            index_map,
            sub_index_maps,
            block_to_original,
            original_to_block,
            owned_ranges,
            ghost_ranges,
        };
        map.debug_assert_invariants();
        Ok(map)
    }

    /// Number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.dofmaps.len()
    }

    /// Original (unrestricted) dof maps, one per block.
    pub fn dofmaps(&self) -> &[Arc<DofMap>] {
        &self.dofmaps
    }

    /// Numbering of all active dofs of all blocks.
    pub fn index_map(&self) -> &IndexMap {
        &self.index_map
    }

    /// Numbering of the active dofs of block `b` alone.
    pub fn sub_index_map(&self, b: usize) -> Result<&IndexMap, MeshBlocksError> {
        self.check_block(b)?;
        Ok(&self.sub_index_maps[b])
    }

    /// Active local dofs (owned + ghost).
    pub fn num_local_dofs(&self) -> usize {
        self.block_to_original.len()
    }

    /// Active dofs across all ranks.
    pub fn global_dimension(&self) -> u64 {
        self.index_map.size_global()
    }

    /// Block local index of original local dof `original` of block `b`, if active.
    pub fn original_to_block(&self, b: usize, original: usize) -> Option<usize> {
        self.original_to_block.get(b)?.get(original).copied().flatten()
    }

    /// `(block, original local index)` of block local index `k`.
    pub fn block_to_original(&self, k: usize) -> Option<(usize, usize)> {
        self.block_to_original.get(k).copied()
    }

    /// Whether original local dof `original` of block `b` is active here.
    pub fn is_active(&self, b: usize, original: usize) -> bool {
        self.original_to_block(b, original).is_some()
    }

    /// Local index within [`Self::sub_index_map`] of original dof `original` of block `b`.
    pub fn original_to_sub_block(&self, b: usize, original: usize) -> Option<usize> {
        let k = self.original_to_block(b, original)?;
        let owned = &self.owned_ranges[b];
        if owned.contains(&k) {
            Some(k - owned.start)
        } else {
            Some(owned.len() + k - self.ghost_ranges[b].start)
        }
    }

    /// Original local dof of sub-block local index `sub` of block `b`.
    pub fn sub_block_to_original(&self, b: usize, sub: usize) -> Option<usize> {
        let owned = self.owned_ranges.get(b)?;
        let k = if sub < owned.len() {
            owned.start + sub
        } else {
            let ghosts = &self.ghost_ranges[b];
            let k = ghosts.start + (sub - owned.len());
            if k >= ghosts.end {
                return None;
            }
            k
        };
        self.block_to_original.get(k).map(|&(_, d)| d)
    }

    /// Global index of block local index `k`.
    pub fn block_global_index(&self, k: usize) -> Result<u64, MeshBlocksError> {
        self.index_map.local_to_global(k)
    }

    /// Local block indices of the owned active dofs of block `b`.
    pub fn block_owned_range(&self, b: usize) -> Result<Range<usize>, MeshBlocksError> {
        self.check_block(b)?;
        Ok(self.owned_ranges[b].clone())
    }

    /// Local block indices of the ghost active dofs of block `b`.
    pub fn block_ghosts(&self, b: usize) -> Result<Range<usize>, MeshBlocksError> {
        self.check_block(b)?;
        Ok(self.ghost_ranges[b].clone())
    }

    /// Block local indices of the active dofs of `cell` in block `b`, in the
    /// original cell dof order. Inactive dofs are skipped.
    pub fn cell_dofs(&self, b: usize, cell: PointId) -> Result<Vec<usize>, MeshBlocksError> {
        self.check_block(b)?;
        Ok(self.dofmaps[b]
            .cell_dofs(cell)?
            .iter()
            .filter_map(|&d| self.original_to_block[b][d])
            .collect())
    }

    /// Translate original local rows of block `b` into block local rows,
    /// dropping inactive ones.
    pub fn original_rows_to_block_rows(
        &self,
        b: usize,
        rows: &[usize],
    ) -> Result<Vec<usize>, MeshBlocksError> {
        self.check_block(b)?;
        let table = &self.original_to_block[b];
        let mut out = Vec::with_capacity(rows.len());
        for &row in rows {
            let slot = table.get(row).ok_or(MeshBlocksError::DofOutOfBounds {
                index: row,
                len: table.len(),
            })?;
            out.extend(*slot);
        }
        Ok(out)
    }

    fn check_block(&self, b: usize) -> Result<(), MeshBlocksError> {
        if b < self.num_blocks() {
            Ok(())
        } else {
            Err(MeshBlocksError::ComponentOutOfBounds {
                index: b,
                len: self.num_blocks(),
            })
        }
    }
}

impl DebugInvariants for BlockDofMap {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "BlockDofMap");
    }

    fn validate_invariants(&self) -> Result<(), MeshBlocksError> {
        let broken = |msg: String| Err(MeshBlocksError::BrokenCorrespondence(msg));
        for (k, &(b, d)) in self.block_to_original.iter().enumerate() {
            if self.original_to_block(b, d) != Some(k) {
                return broken(format!("block index {k} -> ({b}, {d}) does not map back"));
            }
        }
        let mapped: usize = self
            .original_to_block
            .iter()
            .map(|t| t.iter().flatten().count())
            .sum();
        if mapped != self.block_to_original.len() {
            return broken(format!(
                "{mapped} original dofs map to {} block indices",
                self.block_to_original.len()
            ));
        }

        let mut next = 0;
        for range in self.owned_ranges.iter().chain(&self.ghost_ranges) {
            if range.start != next {
                return broken(format!("block range {range:?} does not start at {next}"));
            }
            next = range.end;
        }
        if next != self.block_to_original.len()
            || self.owned_ranges.last().map_or(0, |r| r.end) != self.index_map.size_owned()
        {
            return broken("block ranges do not cover the local numbering".to_string());
        }
        for (b, range) in self.owned_ranges.iter().chain(&self.ghost_ranges).enumerate() {
            let b = b % self.num_blocks();
            let in_block = self.block_to_original[range.clone()]
                .iter()
                .all(|&(owner, _)| owner == b);
            let increasing = self.block_to_original[range.clone()]
                .windows(2)
                .all(|w| w[0].1 < w[1].1);
            if !in_block || !increasing {
                return broken(format!("range {range:?} of block {b} is not monotonic"));
            }
        }
        Ok(())
    }
}

fn local_activity(dofmap: &DofMap, restriction: Option<&MeshRestriction>) -> Vec<bool> {
    let mut active = vec![true; dofmap.num_local_dofs()];
    if let Some(r) = restriction {
        for entity in dofmap.entities() {
            if !r.is_active(entity.point, entity.dim) {
                active[entity.dofs.clone()].fill(false);
            }
        }
    }
    active
}

/// Log marker sets that cannot affect `dofmap` because no dofs live on their dimension.
fn report_ignored_markers(block: usize, restriction: &MeshRestriction, dofmap: &DofMap) {
    let carried: BTreeSet<usize> = dofmap.entities().iter().map(|e| e.dim).collect();
    let mut effective = false;
    for markers in restriction.markers() {
        if carried.contains(&markers.dim()) {
            effective = true;
        } else {
            log::debug!(
                "block {block}: markers on dimension {} ignored, no dofs live there",
                markers.dim()
            );
        }
    }
    if !effective && !restriction.markers().is_empty() {
        log::warn!("block {block}: restriction constrains no dimension carrying dofs");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::meshgen::{MeshGenOptions, interval_mesh};
    use crate::discretization::element::FiniteElement;
    use crate::topology::cell_type::CellType;
    use crate::topology::restriction::EntityMarkers;

    fn setup(n: usize) -> (Mesh, Arc<DofMap>, Arc<DofMap>) {
        let mesh =
            interval_mesh(n, [0.0, 1.0], &MeshGenOptions::default(), Arc::new(NoComm)).unwrap();
        let p1 = FiniteElement::lagrange(CellType::Segment, 1).unwrap();
        let dg0 = FiniteElement::discontinuous_lagrange(CellType::Segment, 0).unwrap();
        let a = Arc::new(DofMap::build(&mesh, &p1).unwrap());
        let b = Arc::new(DofMap::build(&mesh, &dg0).unwrap());
        (mesh, a, b)
    }

    #[test]
    fn unrestricted_blocks_are_concatenated() {
        let (mesh, a, b) = setup(5);
        let map = BlockDofMap::build(&mesh, &[a, b], &[None, None]).unwrap();
        assert_eq!(map.global_dimension(), 11);
        assert_eq!(map.block_owned_range(0).unwrap(), 0..6);
        assert_eq!(map.block_owned_range(1).unwrap(), 6..11);
        assert_eq!(map.block_to_original(7), Some((1, 1)));
        assert_eq!(map.original_to_block(1, 1), Some(7));
        assert_eq!(map.original_to_sub_block(1, 1), Some(1));
        assert_eq!(map.sub_block_to_original(1, 1), Some(1));
        assert_eq!(map.sub_index_map(1).unwrap().size_global(), 5);
        map.validate_invariants().unwrap();
    }

    #[test]
    fn restricted_block_keeps_marked_entities() {
        let (mesh, a, b) = setup(5);
        let kept: Vec<PointId> = mesh.cells()[1..3].to_vec();
        let restriction = MeshRestriction::new(vec![EntityMarkers::new(1, kept.clone())]);
        let map = BlockDofMap::build(&mesh, &[a, b.clone()], &[None, Some(restriction)]).unwrap();
        assert_eq!(map.global_dimension(), 6 + 2);
        assert_eq!(map.block_owned_range(1).unwrap(), 6..8);
        for cell in &kept {
            let d = b.entity_dofs(*cell).start;
            assert!(map.is_active(1, d));
            assert_eq!(map.cell_dofs(1, *cell).unwrap().len(), 1);
        }
        assert!(map.cell_dofs(1, mesh.cells()[0]).unwrap().is_empty());
        assert_eq!(
            map.original_rows_to_block_rows(1, &[0, 1, 2, 3]).unwrap(),
            vec![6, 7]
        );
        assert!(matches!(
            map.original_rows_to_block_rows(1, &[9]),
            Err(MeshBlocksError::DofOutOfBounds { index: 9, len: 5 })
        ));
    }

    #[test]
    fn markers_on_unused_dimension_change_nothing() {
        let (mesh, a, _) = setup(3);
        let vertex_only = MeshRestriction::new(vec![EntityMarkers::new(1, std::iter::empty())]);
        let map = BlockDofMap::build(&mesh, &[a], &[Some(vertex_only)]).unwrap();
        assert_eq!(map.global_dimension(), 4);
    }

    #[test]
    fn rejects_bad_arguments() {
        let (mesh, a, _) = setup(3);
        assert_eq!(
            BlockDofMap::build(&mesh, &[], &[]).unwrap_err(),
            MeshBlocksError::EmptyBlockList
        );
        assert!(matches!(
            BlockDofMap::build(&mesh, &[a.clone()], &[None, None]),
            Err(MeshBlocksError::LengthMismatch { what: "restrictions", .. })
        ));
        let (_, foreign, _) = setup(3);
        assert!(matches!(
            BlockDofMap::build(&mesh, &[a.clone(), foreign], &[None, None]),
            Err(MeshBlocksError::MeshMismatch { block: 1, .. })
        ));
        let too_high = MeshRestriction::new(vec![EntityMarkers::new(2, std::iter::empty())]);
        assert!(matches!(
            BlockDofMap::build(&mesh, &[a], &[Some(too_high)]),
            Err(MeshBlocksError::InvalidEntityDimension { dim: 2, tdim: 1 })
        ));
    }
}
