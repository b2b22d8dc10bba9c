//! Bounded pool of spawned worker tasks.
//!
//! Each worker holds one semaphore permit for its whole lifetime, so the
//! dispatch loop stops pulling new connections or datagrams off the socket
//! once `capacity` workers are in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Semaphore size used when the configured limit is `0`.
fn unbounded() -> u32 {
    Semaphore::MAX_PERMITS.min(u32::MAX as usize) as u32
}

/// Worker pool for one server.
pub struct WorkerPool {
    limit: Arc<Semaphore>,
    capacity: u32,
}

impl WorkerPool {
    /// `max_workers == 0` means no practical limit.
    pub fn new(max_workers: usize) -> Self {
        let capacity = if max_workers == 0 {
            unbounded()
        } else {
            max_workers.min(unbounded() as usize) as u32
        };

        Self {
            limit: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Workers currently running.
    pub fn in_flight(&self) -> usize {
        self.capacity() - self.limit.available_permits()
    }

    /// Wait for a free worker slot.
    pub async fn reserve(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.limit).acquire_owned().await.ok()
    }

    /// Run `task` on its own tokio task; the slot frees when it finishes.
    pub fn spawn<F>(&self, permit: OwnedSemaphorePermit, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            task.await;
            drop(permit);
        });
    }

    /// Wait up to `grace` for every worker to finish.
    ///
    /// Returns `false` if some workers were still running when the grace
    /// period ran out.
    pub async fn drain(&self, grace: Duration) -> bool {
        matches!(
            tokio::time::timeout(grace, self.limit.acquire_many(self.capacity)).await,
            Ok(Ok(_))
        )
    }
}
