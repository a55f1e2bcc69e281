//! Sized worker pool for clustering and query batches.

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::debug;

use crate::config::ExecutionConfig;
use crate::error::{IndexError, IndexResult};

/// Owns the rayon pool that every parallel phase runs on.
///
/// Parallel code in this crate uses whatever pool it is called from, so
/// wrapping a call in [`Executor::install`] is what bounds its parallelism.
#[derive(Debug)]
pub struct Executor {
    pool: ThreadPool,
}

impl Executor {
    /// Creates a pool with `threads` workers; `0` means one per CPU.
    pub fn new(threads: usize) -> IndexResult<Self> {
        let threads = if threads == 0 { num_cpus::get() } else { threads };
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ivf-worker-{i}"))
            .build()
            .map_err(|e| IndexError::ThreadPool {
                threads,
                reason: e.to_string(),
            })?;
        debug!(threads, "worker pool started");
        Ok(Self { pool })
    }

    pub fn from_config(config: &ExecutionConfig) -> IndexResult<Self> {
        Self::new(config.parallel_threads)
    }

    /// Runs `op` inside the pool and returns its result.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        let executor = Executor::new(3).unwrap();
        assert_eq!(executor.threads(), 3);
        assert_eq!(executor.install(rayon::current_num_threads), 3);
    }

    #[test]
    fn test_zero_means_all_cpus() {
        let executor = Executor::new(0).unwrap();
        assert_eq!(executor.threads(), num_cpus::get());
    }

    #[test]
    fn test_from_config() {
        let config = ExecutionConfig {
            parallel_threads: 2,
        };
        assert_eq!(Executor::from_config(&config).unwrap().threads(), 2);
    }
}
