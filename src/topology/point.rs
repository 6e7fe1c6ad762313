//! `PointId`: a strong, zero-cost handle for mesh entities
//!
//! Every mesh entity (cell, face, edge, vertex) is represented by a unique,
//! opaque identifier. `PointId` wraps a nonzero `u64` so that 0 stays
//! reserved as an invalid or sentinel value. Ids are global: the same entity
//! carries the same `PointId` on every rank that sees it, which is what lets
//! ranks agree on ghost dof indices.

use crate::mesh_error::MeshBlocksError;
use std::{fmt, num::NonZeroU64};

/// Handle for one mesh entity.
///
/// # Memory layout
/// This type is `repr(transparent)`, meaning it has the same ABI and
/// alignment as its single field (`NonZeroU64`) and can be sent over the
/// wire exactly like a `u64`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct PointId(NonZeroU64);

impl PointId {
    /// Creates a new `PointId` from a raw `u64` value.
    ///
    /// # Errors
    /// Returns [`MeshBlocksError::InvalidPointId`] if `raw == 0`.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use mesh_blocks::topology::point::PointId;
    /// let p = PointId::new(1).unwrap();
    /// assert_eq!(p.get(), 1);
    /// ```
    #[inline]
    pub fn new(raw: u64) -> Result<Self, MeshBlocksError> {
        NonZeroU64::new(raw)
            .map(PointId)
            .ok_or(MeshBlocksError::InvalidPointId)
    }

    /// Returns the inner `u64` value of this `PointId`.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

/// Displays as `PointId(raw_value)`.
impl fmt::Debug for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PointId").field(&self.get()).finish()
    }
}

/// Prints the numeric ID without any wrapper text.
impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_rejected() {
        assert_eq!(PointId::new(0), Err(MeshBlocksError::InvalidPointId));
    }

    #[test]
    fn new_and_get() {
        let p = PointId::new(42).unwrap();
        assert_eq!(p.get(), 42);
    }

    #[test]
    fn debug_and_display() {
        let p = PointId::new(7).unwrap();
        assert_eq!(format!("{:?}", p), "PointId(7)");
        assert_eq!(format!("{}", p), "7");
    }

    #[test]
    fn ordering_follows_raw_value() {
        let a = PointId::new(1).unwrap();
        let b = PointId::new(2).unwrap();
        assert!(a < b);
        let mut v = vec![b, a];
        v.sort_unstable();
        assert_eq!(v, vec![a, b]);
    }

    #[test]
    fn json_is_a_plain_integer() {
        let p = PointId::new(123).unwrap();
        let s = serde_json::to_string(&p).unwrap();
        assert_eq!(s, "123");
        let back: PointId = serde_json::from_str(&s).unwrap();
        assert_eq!(back, p);
    }
}
