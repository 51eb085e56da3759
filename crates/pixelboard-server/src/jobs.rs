//! Bounded background execution for the write path.
//!
//! The placement response returns as soon as the cache patch lands; the
//! durable double-write and the pub/sub publish run behind this queue. The
//! queue is bounded and drained under a fixed permit count, so a store
//! outage cannot accumulate unbounded tasks: once the queue fills,
//! enqueueing fails and the placement endpoint degrades to 503 instead of
//! eating memory.

use std::sync::Arc;

use pixelboard_broadcast::bridge;
use pixelboard_db::{CachePool, StorePool, TileStore};
use pixelboard_types::{Draw, GroupKey, PlacementWrite, TileGroup};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::ApiError;

/// Pending jobs the queue will hold before rejecting placements.
pub const QUEUE_CAPACITY: usize = 256;

/// Jobs running concurrently at most.
pub const MAX_WORKERS: usize = 64;

/// One unit of background work. Each job carries the trace id of the
/// request that spawned it so failures are attributable in the logs.
#[derive(Debug)]
pub enum Job {
    /// Double-write a placement into the store.
    Persist {
        write: PlacementWrite,
        trace: String,
    },
    /// Publish a draw on the pub/sub channel.
    Publish { draw: Draw, trace: String },
    /// Warm the cache with a group blob rebuilt from the store.
    WarmGroup {
        key: GroupKey,
        group: TileGroup,
        trace: String,
    },
}

/// Producer side of the background queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Enqueue a job without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Overloaded`] when the queue is full, or
    /// [`ApiError::Invariant`] if the dispatcher has stopped.
    pub fn enqueue(&self, job: Job) -> Result<(), ApiError> {
        self.tx.try_send(job).map_err(|err| match err {
            TrySendError::Full(_) => {
                warn!("background job queue is full");
                ApiError::Overloaded
            }
            TrySendError::Closed(_) => {
                ApiError::Invariant(String::from("background job dispatcher stopped"))
            }
        })
    }
}

/// Spawn the dispatcher draining the queue under [`MAX_WORKERS`] permits.
#[must_use]
pub fn spawn_dispatcher(store: StorePool, cache: CachePool) -> (JobQueue, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let task = tokio::spawn(run_dispatcher(rx, store, cache));
    (JobQueue { tx }, task)
}

async fn run_dispatcher(mut rx: mpsc::Receiver<Job>, store: StorePool, cache: CachePool) {
    let permits = Arc::new(Semaphore::new(MAX_WORKERS));

    while let Some(job) = rx.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let store = store.clone();
        let cache = cache.clone();

        tokio::spawn(async move {
            run_job(job, &store, &cache).await;
            drop(permit);
        });
    }

    debug!("background job dispatcher stopped");
}

/// Execute one job. Failures are logged with the originating trace id and
/// never propagate anywhere; responses have long since been sent.
async fn run_job(job: Job, store: &StorePool, cache: &CachePool) {
    match job {
        Job::Persist { write, trace } => {
            let tiles = TileStore::new(store.pool(), cache.grid());
            if let Err(err) = tiles.batch_write(std::slice::from_ref(&write)).await {
                error!(trace, error = %err, "background placement persist failed");
            } else {
                debug!(trace, x = write.x, y = write.y, "persisted placement");
            }
        }
        Job::Publish { draw, trace } => {
            if let Err(err) = bridge::publish_draw(cache.client(), draw).await {
                error!(trace, error = %err, "background draw publish failed");
            }
        }
        Job::WarmGroup { key, group, trace } => {
            if let Err(err) = cache.set_group(key, &group).await {
                error!(trace, error = %err, "background cache warm failed");
            } else {
                debug!(trace, key = %key, "warmed group cache");
            }
        }
    }
}
