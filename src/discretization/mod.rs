//! Scalar discretizations: element layouts, dof maps and function spaces.

pub mod dofmap;
pub mod element;
pub mod function_space;

pub use dofmap::{DofMap, EntityDofs};
pub use element::{ElementFamily, FiniteElement};
pub use function_space::FunctionSpace;
