//! Error types for the data layer.
//!
//! Cache and store failures are kept in separate enums because the HTTP
//! layer maps them differently: a corrupt cached blob is a server fault
//! that must never be silently repaired, while a missing store row is an
//! ordinary not-found.

/// Errors from the Redis cache tier.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A Redis operation failed.
    #[error("cache error: {0}")]
    Redis(#[from] fred::error::Error),

    /// A cached group value had a length other than L or zero.
    #[error("invalid cached group length {len}, expected {expected}")]
    InvalidGroupLength { len: usize, expected: usize },

    /// A configuration error (bad URL, etc.).
    #[error("cache configuration error: {0}")]
    Config(String),
}

/// Errors from the PostgreSQL store tier.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A PostgreSQL operation failed.
    #[error("store error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A migration failed.
    #[error("store migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The requested pixel has never been placed.
    #[error("tile not found")]
    TileNotFound,

    /// A configuration error (bad URL, etc.).
    #[error("store configuration error: {0}")]
    Config(String),
}
