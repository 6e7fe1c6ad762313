//! Communication and mesh generation.

pub mod communicator;
pub mod meshgen;

pub use meshgen::{MeshGenOptions, interval_mesh, rectangle_mesh};
