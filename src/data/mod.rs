//! Distributed index bookkeeping.

pub mod index_map;

pub use index_map::IndexMap;
