//! Thin façade over collective communication between ranks.
//!
//! Dof numbering only needs two collectives: an all-gather of one count per
//! rank (for the prefix-sum offset of owned dofs) and a variable-count
//! all-gather (to publish the global indices of owned entities so that ghosts
//! can be resolved). Both are **collective**: every rank must make the same
//! sequence of calls, otherwise the backends deadlock or mismatch.
//!
//! Backends:
//! - [`NoComm`]: a single serial rank.
//! - [`ThreadComm`]: ranks living on threads of one process, used by tests to
//!   exercise multi-rank numbering without an MPI launcher.
//! - `MpiComm` (feature `mpi-support`): a real MPI communicator.

use crate::mesh_error::MeshBlocksError;
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::{Arc, Barrier};

/// Collective communication interface (minimal by design).
pub trait Communicator: Send + Sync + Debug {
    /// Rank of the calling process in `0..size()`.
    fn rank(&self) -> usize;

    /// Number of participating ranks.
    fn size(&self) -> usize;

    /// Gather a variable-length buffer from every rank, indexed by rank.
    fn all_gather_varcount_u64(&self, local: &[u64]) -> Result<Vec<Vec<u64>>, MeshBlocksError>;

    /// Gather one value from every rank, indexed by rank.
    fn all_gather_u64(&self, local: u64) -> Result<Vec<u64>, MeshBlocksError> {
        let gathered = self.all_gather_varcount_u64(std::slice::from_ref(&local))?;
        gathered
            .into_iter()
            .enumerate()
            .map(|(rank, values)| match values.as_slice() {
                [value] => Ok(*value),
                _ => Err(MeshBlocksError::CommError(format!(
                    "rank {rank} contributed {} values to a scalar all-gather",
                    values.len()
                ))),
            })
            .collect()
    }

    /// Block until every rank reaches the barrier.
    fn barrier(&self);
}

/// Exclusive prefix sum of `local` over ranks.
///
/// Returns `(offset, total)` where `offset` is the sum over lower ranks and
/// `total` the sum over all ranks.
pub fn exclusive_prefix_sum(
    comm: &dyn Communicator,
    local: u64,
) -> Result<(u64, u64), MeshBlocksError> {
    let counts = comm.all_gather_u64(local)?;
    let offset = counts.iter().take(comm.rank()).sum();
    let total = counts.iter().sum();
    Ok((offset, total))
}

/// Compile-time no-op comm for pure serial runs.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather_varcount_u64(&self, local: &[u64]) -> Result<Vec<Vec<u64>>, MeshBlocksError> {
        Ok(vec![local.to_vec()])
    }

    fn barrier(&self) {}
}

// --- ThreadComm: intra-process / multi-thread ---

#[derive(Debug)]
struct ThreadGroup {
    slots: Mutex<Vec<Option<Vec<u64>>>>,
    barrier: Barrier,
}

/// One rank of an in-process group of ranks, each driven by its own thread.
#[derive(Clone, Debug)]
pub struct ThreadComm {
    rank: usize,
    size: usize,
    group: Arc<ThreadGroup>,
}

impl ThreadComm {
    /// Create `size` connected ranks. Hand one to each thread.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let size = size.max(1);
        let group = Arc::new(ThreadGroup {
            slots: Mutex::new(vec![None; size]),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                size,
                group: Arc::clone(&group),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather_varcount_u64(&self, local: &[u64]) -> Result<Vec<Vec<u64>>, MeshBlocksError> {
        self.group.slots.lock()[self.rank] = Some(local.to_vec());
        self.group.barrier.wait();
        let gathered = self
            .group
            .slots
            .lock()
            .iter()
            .enumerate()
            .map(|(rank, slot)| {
                slot.clone().ok_or_else(|| {
                    MeshBlocksError::CommError(format!("rank {rank} did not contribute"))
                })
            })
            .collect::<Result<Vec<_>, _>>();
        // Nobody may overwrite a slot before every rank has read all of them.
        self.group.barrier.wait();
        gathered
    }

    fn barrier(&self) {
        self.group.barrier.wait();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::datatype::PartitionMut;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;
    use mpi::Count;

    /// Communicator over an MPI process group.
    ///
    /// The caller keeps the `mpi::environment::Universe` alive for as long as
    /// any `MpiComm` exists.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    // SAFETY: mesh-blocks only issues collectives from the thread driving the
    // rank; the handle is never used concurrently.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }
    }

    impl std::fmt::Debug for MpiComm {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MpiComm")
                .field("rank", &self.rank)
                .field("size", &self.size)
                .finish()
        }
    }

    impl Communicator for MpiComm {
        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn all_gather_varcount_u64(
            &self,
            local: &[u64],
        ) -> Result<Vec<Vec<u64>>, MeshBlocksError> {
            let local_count = Count::try_from(local.len()).map_err(|_| {
                MeshBlocksError::CommError(format!("{} values exceed MPI count", local.len()))
            })?;
            let mut counts = vec![0 as Count; self.size];
            self.world.all_gather_into(&local_count, &mut counts[..]);

            let mut displs = Vec::with_capacity(self.size);
            let mut total: Count = 0;
            for &c in &counts {
                displs.push(total);
                total += c;
            }
            let mut buf = vec![0u64; total as usize];
            {
                let mut partition = PartitionMut::new(&mut buf[..], &counts[..], &displs[..]);
                self.world.all_gather_varcount_into(local, &mut partition);
            }
            Ok(counts
                .iter()
                .zip(&displs)
                .map(|(&c, &d)| buf[d as usize..(d + c) as usize].to_vec())
                .collect())
        }

        fn barrier(&self) {
            self.world.barrier();
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

/// Run `f` once per rank of a fresh [`ThreadComm`] group, each on its own
/// thread, and collect the per-rank results in rank order.
pub fn run_on_threads<T, F>(size: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(Arc<dyn Communicator>) -> T + Sync,
{
    let comms = ThreadComm::group(size);
    std::thread::scope(|scope| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let f = &f;
                scope.spawn(move || f(Arc::new(comm) as Arc<dyn Communicator>))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(value) => value,
                Err(payload) => std::panic::resume_unwind(payload),
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_gather_is_identity() {
        let comm = NoComm;
        assert_eq!(comm.all_gather_u64(9).unwrap(), vec![9]);
        assert_eq!(exclusive_prefix_sum(&comm, 4).unwrap(), (0, 4));
    }

    #[test]
    fn thread_ranks_agree_on_prefix_sums() {
        let results = run_on_threads(3, |comm| {
            let local = (comm.rank() as u64 + 1) * 10;
            exclusive_prefix_sum(comm.as_ref(), local).unwrap()
        });
        assert_eq!(results, vec![(0, 60), (10, 60), (30, 60)]);
    }

    #[test]
    fn varcount_gather_keeps_rank_order() {
        let results = run_on_threads(2, |comm| {
            let local: Vec<u64> = (0..=comm.rank() as u64).collect();
            // Two rounds in a row must not interfere.
            let first = comm.all_gather_varcount_u64(&local).unwrap();
            let second = comm.all_gather_varcount_u64(&[7]).unwrap();
            (first, second)
        });
        for (first, second) in results {
            assert_eq!(first, vec![vec![0], vec![0, 1]]);
            assert_eq!(second, vec![vec![7], vec![7]]);
        }
    }
}
