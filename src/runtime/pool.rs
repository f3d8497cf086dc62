//! Process-wide bounded worker pools.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

/// Two bounded pools shared by every exchange in the process.
///
/// - light: I/O callback delivery, `4 × cores` concurrent tasks
/// - heavy: compute-bound work on blocking threads, `cores` at a time
#[derive(Debug, Clone)]
pub struct ResourcePool {
    light: Arc<Semaphore>,
    heavy: Arc<Semaphore>,
    light_workers: usize,
    heavy_workers: usize,
}

impl ResourcePool {
    /// Both sizes are clamped to at least one worker.
    pub fn new(heavy_workers: usize, light_workers: usize) -> Self {
        let heavy_workers = heavy_workers.max(1);
        let light_workers = light_workers.max(1);
        Self {
            light: Arc::new(Semaphore::new(light_workers)),
            heavy: Arc::new(Semaphore::new(heavy_workers)),
            light_workers,
            heavy_workers,
        }
    }

    /// Pool sized from the number of logical CPUs.
    pub fn from_cores() -> Self {
        let cores = num_cpus::get().max(1);
        debug!(cores, "Sizing resource pools");
        Self::new(cores, cores * 4)
    }

    #[must_use]
    pub const fn light_workers(&self) -> usize {
        self.light_workers
    }

    #[must_use]
    pub const fn heavy_workers(&self) -> usize {
        self.heavy_workers
    }

    /// Run a short callback on the light pool without waiting for it.
    ///
    /// The task queues for a permit when the pool is saturated, so the
    /// caller never blocks.
    pub fn submit_light<F>(&self, task: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let permits = Arc::clone(&self.light);
        tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            task();
        })
    }

    /// Run compute-bound work on a blocking thread, at most `heavy_workers`
    /// at a time, and wait for its result.
    pub async fn run_heavy<F, R>(&self, work: F) -> Result<R, JoinError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let _permit = Arc::clone(&self.heavy).acquire_owned().await.ok();
        tokio::task::spawn_blocking(work).await
    }
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::from_cores()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::oneshot;

    use super::*;

    #[test]
    fn test_pool_sizes_are_clamped() {
        let pool = ResourcePool::new(0, 0);
        assert_eq!(pool.heavy_workers(), 1);
        assert_eq!(pool.light_workers(), 1);
    }

    #[test]
    fn test_pool_from_cores_light_is_four_times_heavy() {
        let pool = ResourcePool::from_cores();
        assert_eq!(pool.light_workers(), pool.heavy_workers() * 4);
    }

    #[tokio::test]
    async fn test_submit_light_runs_callback() {
        let pool = ResourcePool::new(1, 2);
        let (tx, rx) = oneshot::channel();
        pool.submit_light(move || {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_run_heavy_returns_result() {
        let pool = ResourcePool::new(2, 2);
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let value = pool
            .run_heavy(move || {
                c.fetch_add(1, Ordering::SeqCst);
                (1..=10).sum::<u32>()
            })
            .await
            .unwrap();
        assert_eq!(value, 55);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
