//! Data layer for the pixelboard canvas (Redis + PostgreSQL).
//!
//! Redis is the read-optimized hot tier: every group blob lives there as a
//! single string value, patched in place by byte-range writes so a
//! placement is visible to readers the moment its three bytes land. It also
//! hosts the per-identity cooldown locks and the draw-event pub/sub
//! channel. PostgreSQL is the durable tier: one row per pixel for point
//! reads, plus an append-only, day-partitioned placement history.
//!
//! # Modules
//!
//! - [`cache`] -- group blob cache and expiring-lock operations
//! - [`postgres`] -- store connection pool and configuration
//! - [`tile_store`] -- pixel, group, history, and batch-write queries
//! - [`error`] -- shared error types

pub mod cache;
pub mod error;
pub mod postgres;
pub mod tile_store;

// Re-export primary types for convenience.
pub use cache::{CachePool, LOCK_ACQUIRED};
pub use error::{CacheError, StoreError};
pub use postgres::{StoreConfig, StorePool};
pub use tile_store::{PixelRow, TileStore};
