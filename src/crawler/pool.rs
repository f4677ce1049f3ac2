//! Resizable worker pool
//!
//! A semaphore bounds how many worker loops make progress at once; each
//! loop holds a permit only while it processes one URL, so active searches
//! beyond the pool size still progress by time-slicing. Resize and shutdown
//! requests are serialized through a single control channel so the two can
//! never race against each other.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Control messages consumed by the pool task.
#[derive(Debug)]
pub enum PoolCommand {
    /// Change the permit count; clamped to the configured bounds.
    Resize(usize),
    /// Stop admitting work and end the control task.
    Shutdown,
}

/// Bounded, dynamically-resizable execution pool.
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: AtomicUsize,
    min_size: usize,
    max_size: usize,
    control_tx: mpsc::Sender<PoolCommand>,
    /// Slots currently held by workers. Counted explicitly rather than
    /// derived from `available_permits`, because a pending shrink parks
    /// permits on the control task that no worker owns.
    active: Arc<AtomicUsize>,
}

/// A held pool slot. Dropping it releases the permit and the busy count
/// together, including when the owning task is cancelled.
pub struct WorkerSlot {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

impl WorkerPool {
    /// Create a pool with `min_size` permits available and spawn its
    /// control task.
    pub fn new(min_size: usize, max_size: usize) -> Arc<Self> {
        debug_assert!(min_size >= 1 && max_size >= min_size);
        let (control_tx, control_rx) = mpsc::channel(16);

        let pool = Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(min_size)),
            size: AtomicUsize::new(min_size),
            min_size,
            max_size,
            control_tx,
            active: Arc::new(AtomicUsize::new(0)),
        });

        pool.clone().spawn_control_task(control_rx);
        pool
    }

    /// Wait for a slot. Returns `None` once the pool is shut down.
    pub async fn acquire(&self) -> Option<WorkerSlot> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        self.active.fetch_add(1, Ordering::Relaxed);
        Some(WorkerSlot {
            _permit: permit,
            active: Arc::clone(&self.active),
        })
    }

    /// Current permit count.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Slots currently held by workers.
    pub fn busy(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    pub fn min_size(&self) -> usize {
        self.min_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Request a resize. Never blocks; a full control queue just drops the
    /// request, which the next monitor sample will repeat anyway.
    pub fn request_resize(&self, new_size: usize) {
        if self.control_tx.try_send(PoolCommand::Resize(new_size)).is_err() {
            warn!("pool control channel full, dropping resize request");
        }
    }

    /// Request shutdown. Idempotent; later commands are ignored.
    pub async fn shutdown(&self) {
        let _ = self.control_tx.send(PoolCommand::Shutdown).await;
    }

    fn spawn_control_task(self: Arc<Self>, mut control_rx: mpsc::Receiver<PoolCommand>) {
        tokio::spawn(async move {
            while let Some(command) = control_rx.recv().await {
                match command {
                    PoolCommand::Resize(requested) => {
                        self.apply_resize(requested).await;
                    }
                    PoolCommand::Shutdown => {
                        info!("worker pool shutting down");
                        self.semaphore.close();
                        break;
                    }
                }
            }
        });
    }

    async fn apply_resize(&self, requested: usize) {
        let target = requested.clamp(self.min_size, self.max_size);
        let current = self.size.load(Ordering::Relaxed);

        if target > current {
            let grow = target - current;
            self.semaphore.add_permits(grow);
            self.size.store(target, Ordering::Relaxed);
            info!(from = current, to = target, "grew worker pool");
        } else if target < current {
            let shrink = (current - target) as u32;
            // Permits are retired by acquiring and forgetting them. Waits
            // until enough workers release theirs; resize requests are
            // serialized on this task so nothing else can interleave.
            match self.semaphore.acquire_many(shrink).await {
                Ok(permits) => {
                    permits.forget();
                    self.size.store(target, Ordering::Relaxed);
                    info!(from = current, to = target, "shrank worker pool");
                }
                Err(_) => debug!("pool closed during shrink"),
            }
        }
    }
}
