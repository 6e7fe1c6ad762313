#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-blocks
//!
//! Block function spaces for multi-physics finite element codes. Several
//! scalar spaces defined on one shared mesh, each optionally restricted to a
//! subdomain, are combined into one [`BlockFunctionSpace`] with a single
//! dof numbering that is consistent across ranks.
//!
//! ## Layers
//! - [`topology`]: points, cones and closures, ownership, restrictions.
//! - [`discretization`]: element layouts, scalar dof maps, function spaces.
//! - [`block`]: [`BlockDofMap`] and [`BlockFunctionSpace`].
//! - [`algs`]: communicators (serial, threads, MPI) and mesh generators.
//!
//! ## Parallel use
//! Dof map construction and sub-space extraction are collective: every rank
//! of the mesh communicator must make the same calls in the same order.
//! Enable `mpi-support` for an MPI-backed [`Communicator`]; tests run ranks
//! on threads through [`algs::communicator::run_on_threads`].
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use mesh_blocks::prelude::*;
//!
//! let mesh = Arc::new(interval_mesh(9, [0.0, 1.0], &MeshGenOptions::default(), Arc::new(NoComm))?);
//! let p1 = Arc::new(FiniteElement::lagrange(CellType::Segment, 1)?);
//! let u = Arc::new(FunctionSpace::new(Arc::clone(&mesh), Arc::clone(&p1))?);
//! let lagrange = MeshRestriction::from_cells(&mesh, mesh.cells()[..3].iter().copied())?;
//! let w = BlockFunctionSpace::with_restrictions(vec![u.clone(), u], vec![None, Some(lagrange)])?;
//! assert_eq!(w.dim(), 10 + 4);
//! assert_eq!(w.extract_block_sub_space(&[1], true)?.dim(), 4);
//! assert_eq!(w.extract_block_sub_space(&[1], false)?.dim(), 10);
//! # Ok::<(), mesh_blocks::mesh_error::MeshBlocksError>(())
//! ```

pub mod algs;
pub mod block;
pub mod data;
pub mod debug_invariants;
pub mod discretization;
pub mod mesh_error;
pub mod topology;

pub use block::{BlockDofMap, BlockFunctionSpace};
pub use debug_invariants::DebugInvariants;
pub use mesh_error::MeshBlocksError;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::meshgen::{MeshGenOptions, interval_mesh, rectangle_mesh};
    pub use crate::block::{BlockDofMap, BlockFunctionSpace};
    pub use crate::data::index_map::IndexMap;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::discretization::{DofMap, FiniteElement, FunctionSpace};
    pub use crate::mesh_error::MeshBlocksError;
    pub use crate::topology::cell_type::CellType;
    pub use crate::topology::mesh::{Mesh, MeshBuilder};
    pub use crate::topology::point::PointId;
    pub use crate::topology::restriction::{EntityMarkers, MeshRestriction, RestrictionPolicy};
}
