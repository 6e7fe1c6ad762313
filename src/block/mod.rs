//! Block function spaces and their unified dof numbering.

pub mod block_dofmap;
pub mod block_function_space;
mod space_cache;

pub use block_dofmap::BlockDofMap;
pub use block_function_space::BlockFunctionSpace;
