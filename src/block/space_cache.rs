//! Memo tables for extracted sub-spaces.
//!
//! Each slot is created under the map's shard lock, but the space itself is
//! built after the lock is released, inside the slot's `OnceCell`. Concurrent
//! requests for one path therefore wait on the cell and share one instance,
//! while requests for other paths (including nested extraction from inside a
//! build) proceed.

use crate::block::block_function_space::BlockFunctionSpace;
use crate::mesh_error::MeshBlocksError;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::Arc;

type Slot = Arc<OnceCell<Arc<BlockFunctionSpace>>>;

/// Sub-spaces keyed by component path, one table per restriction flag.
#[derive(Debug, Default)]
pub(crate) struct SubSpaceCache {
    restricted: DashMap<Vec<usize>, Slot>,
    unrestricted: DashMap<Vec<usize>, Slot>,
}

impl SubSpaceCache {
    fn table(&self, with_restrictions: bool) -> &DashMap<Vec<usize>, Slot> {
        if with_restrictions {
            &self.restricted
        } else {
            &self.unrestricted
        }
    }

    /// Cached space for `path`, building it with `build` on first request.
    ///
    /// A failed build leaves the slot empty, so the next request retries.
    pub(crate) fn get_or_try_init<F>(
        &self,
        with_restrictions: bool,
        path: &[usize],
        build: F,
    ) -> Result<Arc<BlockFunctionSpace>, MeshBlocksError>
    where
        F: FnOnce() -> Result<Arc<BlockFunctionSpace>, MeshBlocksError>,
    {
        let slot: Slot = self
            .table(with_restrictions)
            .entry(path.to_vec())
            .or_default()
            .clone();
        if let Some(space) = slot.get() {
            log::trace!("sub-space cache hit for {path:?} (restricted: {with_restrictions})");
            return Ok(Arc::clone(space));
        }
        log::trace!("sub-space cache miss for {path:?} (restricted: {with_restrictions})");
        slot.get_or_try_init(build).cloned()
    }

    /// Number of filled entries in one table.
    pub(crate) fn len(&self, with_restrictions: bool) -> usize {
        self.table(with_restrictions)
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }
}
