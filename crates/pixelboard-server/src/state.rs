//! Shared application state.

use std::time::Duration;

use pixelboard_broadcast::HubHandle;
use pixelboard_db::{CachePool, StorePool, TileStore};
use pixelboard_types::Grid;

use crate::jobs::JobQueue;

/// Shared state for the axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via the `State`
/// extractor. Generic over the CAPTCHA verifier so tests can swap in a
/// stub without touching the handlers.
pub struct AppState<V> {
    /// Group blob cache and cooldown locks.
    pub cache: CachePool,
    /// Durable pixel and history store.
    pub store: StorePool,
    /// Fan-out hub for live draw events.
    pub hub: HubHandle,
    /// Bounded queue for background persistence and publishing.
    pub jobs: JobQueue,
    /// Placement admission check.
    pub captcha: V,
    /// Minimum interval between two accepted placements per identity.
    pub cooldown: Duration,
}

impl<V> AppState<V> {
    /// The canvas geometry this process serves.
    #[must_use]
    pub const fn grid(&self) -> Grid {
        self.cache.grid()
    }

    /// A store query handle borrowing the shared pool.
    #[must_use]
    pub const fn tile_store(&self) -> TileStore<'_> {
        TileStore::new(self.store.pool(), self.cache.grid())
    }
}
