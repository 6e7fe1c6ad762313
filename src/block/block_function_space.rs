//! Composite function spaces made of several scalar blocks on one mesh.
//!
//! A [`BlockFunctionSpace`] owns the shared mesh, one element and dof map per
//! block, an optional [`MeshRestriction`] per block and the derived
//! [`BlockDofMap`]. Sub-spaces form a tree: every space extracted from a root
//! shares the root's id and records its path from the root as `component`.
//! Equality and containment only compare those two values.
//!
//! Spaces are not `Clone`; share them through `Arc`. Construction and
//! sub-space extraction build a [`BlockDofMap`] and are therefore collective.

use crate::block::block_dofmap::BlockDofMap;
use crate::block::space_cache::SubSpaceCache;
use crate::discretization::dofmap::DofMap;
use crate::discretization::element::FiniteElement;
use crate::discretization::function_space::{FunctionSpace, check_parts};
use crate::mesh_error::MeshBlocksError;
use crate::topology::mesh::Mesh;
use crate::topology::restriction::MeshRestriction;
use itertools::Itertools;
use std::fmt;
use std::ops::Index;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ROOT_SPACE_ID: AtomicU64 = AtomicU64::new(1);

/// Several scalar spaces on one mesh sharing one dof numbering.
#[derive(Debug)]
pub struct BlockFunctionSpace {
    mesh: Arc<Mesh>,
    elements: Vec<Arc<FiniteElement>>,
    dofmaps: Vec<Arc<DofMap>>,
    restrictions: Vec<Option<MeshRestriction>>,
    function_spaces: Vec<Arc<FunctionSpace>>,
    block_dofmap: Arc<BlockDofMap>,
    component: Vec<usize>,
    root_space_id: u64,
    cache: SubSpaceCache,
}

impl BlockFunctionSpace {
    /// Unrestricted block space from scalar spaces sharing one mesh.
    pub fn new(spaces: Vec<Arc<FunctionSpace>>) -> Result<Self, MeshBlocksError> {
        let restrictions = vec![None; spaces.len()];
        Self::with_restrictions(spaces, restrictions)
    }

    /// Block space from scalar spaces, with one optional restriction per block.
    pub fn with_restrictions(
        spaces: Vec<Arc<FunctionSpace>>,
        restrictions: Vec<Option<MeshRestriction>>,
    ) -> Result<Self, MeshBlocksError> {
        let Some(first) = spaces.first() else {
            return Err(MeshBlocksError::EmptyBlockList);
        };
        let mesh = Arc::clone(first.mesh());
        for (block, space) in spaces.iter().enumerate() {
            if space.mesh().id() != mesh.id() {
                return Err(MeshBlocksError::MeshMismatch {
                    block,
                    expected: mesh.id().get(),
                    found: space.mesh().id().get(),
                });
            }
        }
        let elements = spaces.iter().map(|s| Arc::clone(s.element())).collect();
        let dofmaps = spaces.iter().map(|s| Arc::clone(s.dofmap())).collect();
        Self::assemble(
            mesh,
            elements,
            dofmaps,
            spaces,
            restrictions,
            Vec::new(),
            fresh_root_space_id(),
        )
    }

    /// Unrestricted block space from a mesh and matching elements and dof maps.
    pub fn from_parts(
        mesh: Arc<Mesh>,
        elements: Vec<Arc<FiniteElement>>,
        dofmaps: Vec<Arc<DofMap>>,
    ) -> Result<Self, MeshBlocksError> {
        let restrictions = vec![None; dofmaps.len()];
        Self::from_parts_with_restrictions(mesh, elements, dofmaps, restrictions)
    }

    /// Block space from a mesh, elements, dof maps and one optional
    /// restriction per block.
    ///
    /// # Errors
    /// [`MeshBlocksError::LengthMismatch`] if the lists differ in length,
    /// [`MeshBlocksError::MeshMismatch`] / [`MeshBlocksError::ElementMismatch`]
    /// if a dof map does not belong to `mesh` and its element.
    pub fn from_parts_with_restrictions(
        mesh: Arc<Mesh>,
        elements: Vec<Arc<FiniteElement>>,
        dofmaps: Vec<Arc<DofMap>>,
        restrictions: Vec<Option<MeshRestriction>>,
    ) -> Result<Self, MeshBlocksError> {
        if elements.is_empty() {
            return Err(MeshBlocksError::EmptyBlockList);
        }
        if dofmaps.len() != elements.len() {
            return Err(MeshBlocksError::LengthMismatch {
                what: "dofmaps",
                expected: elements.len(),
                found: dofmaps.len(),
            });
        }
        let mut function_spaces = Vec::with_capacity(elements.len());
        for (block, (element, dofmap)) in elements.iter().zip(&dofmaps).enumerate() {
            check_parts(block, &mesh, element, dofmap)?;
            function_spaces.push(Arc::new(FunctionSpace::from_parts(
                Arc::clone(&mesh),
                Arc::clone(element),
                Arc::clone(dofmap),
            )?));
        }
        Self::assemble(
            mesh,
            elements,
            dofmaps,
            function_spaces,
            restrictions,
            Vec::new(),
            fresh_root_space_id(),
        )
    }

    fn assemble(
        mesh: Arc<Mesh>,
        elements: Vec<Arc<FiniteElement>>,
        dofmaps: Vec<Arc<DofMap>>,
        function_spaces: Vec<Arc<FunctionSpace>>,
        restrictions: Vec<Option<MeshRestriction>>,
        component: Vec<usize>,
        root_space_id: u64,
    ) -> Result<Self, MeshBlocksError> {
        let block_dofmap = Arc::new(BlockDofMap::build(&mesh, &dofmaps, &restrictions)?);
        Ok(Self {
            mesh,
            elements,
            dofmaps,
            restrictions,
            function_spaces,
            block_dofmap,
            component,
            root_space_id,
            cache: SubSpaceCache::default(),
        })
    }

    /// Global number of active dofs over all blocks.
    pub fn dim(&self) -> u64 {
        self.block_dofmap.global_dimension()
    }

    /// Number of blocks.
    pub fn num_blocks(&self) -> usize {
        self.function_spaces.len()
    }

    /// Scalar space of block `i`, ignoring its restriction.
    pub fn sub(&self, i: usize) -> Result<Arc<FunctionSpace>, MeshBlocksError> {
        self.function_spaces
            .get(i)
            .cloned()
            .ok_or(MeshBlocksError::ComponentOutOfBounds {
                index: i,
                len: self.num_blocks(),
            })
    }

    /// Sub-space at `component`, relative to this space.
    ///
    /// Each index selects one block of the space reached so far, so `[1, 0]`
    /// is block 0 of the single-block space holding block 1. The result has
    /// this space's root id and path `self.component() ++ component`. With
    /// `with_restrictions == false` the restrictions are dropped and the
    /// result spans every dof of the selected block.
    ///
    /// Results are cached per path and flag. Collective on a cache miss.
    pub fn extract_block_sub_space(
        &self,
        component: &[usize],
        with_restrictions: bool,
    ) -> Result<Arc<BlockFunctionSpace>, MeshBlocksError> {
        let Some((&first, rest)) = component.split_first() else {
            return Err(MeshBlocksError::EmptyComponent);
        };
        self.cache
            .get_or_try_init(with_restrictions, component, || {
                if rest.is_empty() {
                    self.build_sub_space(first, with_restrictions).map(Arc::new)
                } else {
                    self.extract_block_sub_space(&[first], with_restrictions)?
                        .extract_block_sub_space(rest, with_restrictions)
                }
            })
    }

    fn build_sub_space(
        &self,
        i: usize,
        with_restrictions: bool,
    ) -> Result<BlockFunctionSpace, MeshBlocksError> {
        let space = self.sub(i)?;
        let restriction = if with_restrictions {
            self.restrictions[i].clone()
        } else {
            None
        };
        let mut component = self.component.clone();
        component.push(i);
        Self::assemble(
            Arc::clone(&self.mesh),
            vec![Arc::clone(&self.elements[i])],
            vec![Arc::clone(&self.dofmaps[i])],
            vec![space],
            vec![restriction],
            component,
            self.root_space_id,
        )
    }

    /// Whether `other` is this space or lies below it in the same tree.
    pub fn contains(&self, other: &BlockFunctionSpace) -> bool {
        self.root_space_id == other.root_space_id && other.component.starts_with(&self.component)
    }

    /// Path from the root space; empty for a root.
    pub fn component(&self) -> &[usize] {
        &self.component
    }

    /// Identity shared by a root space and everything extracted from it.
    pub fn root_space_id(&self) -> u64 {
        self.root_space_id
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn elements(&self) -> &[Arc<FiniteElement>] {
        &self.elements
    }

    pub fn dofmaps(&self) -> &[Arc<DofMap>] {
        &self.dofmaps
    }

    pub fn restrictions(&self) -> &[Option<MeshRestriction>] {
        &self.restrictions
    }

    /// Unrestricted scalar views, one per block.
    pub fn function_spaces(&self) -> &[Arc<FunctionSpace>] {
        &self.function_spaces
    }

    pub fn block_dofmap(&self) -> &Arc<BlockDofMap> {
        &self.block_dofmap
    }

    /// Number of sub-spaces built so far through this space.
    pub fn cached_sub_spaces(&self, with_restrictions: bool) -> usize {
        self.cache.len(with_restrictions)
    }

    /// Coordinates of every local active dof, flattened with stride `gdim`,
    /// in block local order.
    pub fn tabulate_dof_coordinates(&self) -> Result<Vec<f64>, MeshBlocksError> {
        let gdim = self.mesh.gdim();
        let per_block = self
            .function_spaces
            .iter()
            .map(|space| space.tabulate_dof_coordinates())
            .collect::<Result<Vec<_>, _>>()?;
        let map = &self.block_dofmap;
        let mut out = Vec::with_capacity(map.num_local_dofs() * gdim);
        for k in 0..map.num_local_dofs() {
            let (b, d) = map
                .block_to_original(k)
                .ok_or_else(|| MeshBlocksError::BrokenCorrespondence(format!("block dof {k}")))?;
            out.extend_from_slice(&per_block[b][d * gdim..(d + 1) * gdim]);
        }
        Ok(out)
    }

    /// Human-readable summary; `verbose` adds one line per block.
    pub fn describe(&self, verbose: bool) -> String {
        let mut text = format!(
            "BlockFunctionSpace({} blocks, dim {}, component [{}])",
            self.num_blocks(),
            self.dim(),
            self.component.iter().join(", ")
        );
        if verbose {
            for (b, space) in self.function_spaces.iter().enumerate() {
                let active = self
                    .block_dofmap
                    .sub_index_map(b)
                    .map_or(0, |m| m.size_global());
                let restricted = if self.restrictions[b].is_some() {
                    "restricted"
                } else {
                    "unrestricted"
                };
                text.push_str(&format!(
                    "\n  block {b}: {}, {active} of {} dofs, {restricted}",
                    space.element(),
                    space.dim()
                ));
            }
        }
        text
    }
}

impl PartialEq for BlockFunctionSpace {
    fn eq(&self, other: &Self) -> bool {
        self.root_space_id == other.root_space_id && self.component == other.component
    }
}

impl Eq for BlockFunctionSpace {}

impl Index<usize> for BlockFunctionSpace {
    type Output = FunctionSpace;

    /// Scalar space of block `i`; panics when out of range, see [`BlockFunctionSpace::sub`].
    fn index(&self, i: usize) -> &FunctionSpace {
        &self.function_spaces[i]
    }
}

impl fmt::Display for BlockFunctionSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(false))
    }
}

fn fresh_root_space_id() -> u64 {
    NEXT_ROOT_SPACE_ID.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::meshgen::{MeshGenOptions, interval_mesh};
    use crate::topology::cell_type::CellType;
    use static_assertions::{assert_impl_all, assert_not_impl_any};

    assert_impl_all!(BlockFunctionSpace: Send, Sync);
    assert_not_impl_any!(BlockFunctionSpace: Clone);

    fn two_blocks() -> BlockFunctionSpace {
        let mesh = Arc::new(
            interval_mesh(4, [0.0, 1.0], &MeshGenOptions::default(), Arc::new(NoComm)).unwrap(),
        );
        let p1 = FiniteElement::lagrange(CellType::Segment, 1).unwrap();
        let dg0 = FiniteElement::discontinuous_lagrange(CellType::Segment, 0).unwrap();
        let spaces = [p1, dg0]
            .into_iter()
            .map(|e| Arc::new(FunctionSpace::new(Arc::clone(&mesh), Arc::new(e)).unwrap()))
            .collect();
        BlockFunctionSpace::new(spaces).unwrap()
    }

    #[test]
    fn describe_lists_blocks() {
        let w = two_blocks();
        assert_eq!(w.to_string(), "BlockFunctionSpace(2 blocks, dim 9, component [])");
        let verbose = w.describe(true);
        assert!(verbose.contains("block 0: Lagrange(interval, 1), 5 of 5 dofs, unrestricted"));
        assert!(verbose.contains("block 1: DiscontinuousLagrange(interval, 0), 4 of 4 dofs"));
        let v1 = w.extract_block_sub_space(&[1], true).unwrap();
        assert_eq!(v1.to_string(), "BlockFunctionSpace(1 blocks, dim 4, component [1])");
    }

    #[test]
    fn nested_extraction_is_cached_per_path() {
        let w = two_blocks();
        let a = w.extract_block_sub_space(&[1, 0], true).unwrap();
        let b = w.extract_block_sub_space(&[1, 0], true).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.component(), &[1, 0]);
        assert_eq!(w.cached_sub_spaces(true), 2);
        assert_eq!(w.cached_sub_spaces(false), 0);
    }

    #[test]
    fn extraction_errors() {
        let w = two_blocks();
        assert!(matches!(
            w.extract_block_sub_space(&[], true),
            Err(MeshBlocksError::EmptyComponent)
        ));
        assert!(matches!(
            w.extract_block_sub_space(&[2], true),
            Err(MeshBlocksError::ComponentOutOfBounds { index: 2, len: 2 })
        ));
        assert!(matches!(
            w.extract_block_sub_space(&[0, 1], false),
            Err(MeshBlocksError::ComponentOutOfBounds { index: 1, len: 1 })
        ));
        assert_eq!(w.cached_sub_spaces(true), 0);
    }

    #[test]
    #[should_panic]
    fn index_out_of_range_panics() {
        let w = two_blocks();
        let _ = &w[2];
    }
}
