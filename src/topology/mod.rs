//! Mesh topology: points, cell types, ownership, meshes and restrictions.
//!
//! Entities are [`PointId`](point::PointId)s connected through cones, as in
//! a sieve. A [`Mesh`](mesh::Mesh) is immutable once built and shared
//! through `Arc` by every dof map and function space on it.

pub mod cell_type;
pub mod mesh;
pub mod ownership;
pub mod point;
pub mod restriction;

pub use mesh::{Mesh, MeshBuilder, MeshId};
pub use restriction::{EntityMarkers, MeshRestriction, RestrictionPolicy};
