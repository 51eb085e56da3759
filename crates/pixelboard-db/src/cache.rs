//! Redis group-blob cache and expiring-lock operations.
//!
//! Group blobs are plain string values of exactly L bytes keyed by the
//! group corner (`"<gx>,<gy>"`), with no TTL. Writes patch three bytes in
//! place with SETRANGE after an atomic zero-initialize, so concurrent
//! placements to the same group interleave at three-byte granularity
//! without ever observing a partially-allocated blob.
//!
//! The two multi-step operations that must not race -- zero-initialize and
//! the cooldown lock -- run as server-side Lua scripts.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fred::interfaces::LuaInterface;
use fred::prelude::*;
use pixelboard_types::{Draw, Grid, GroupKey, TileGroup};

use crate::error::CacheError;

/// Script reply meaning the expiring lock was acquired.
pub const LOCK_ACQUIRED: i64 = -1;

const ZERO_INIT_SCRIPT: &str = include_str!("scripts/zero_init.lua");
const EXPIRE_LOCK_SCRIPT: &str = include_str!("scripts/expire_lock.lua");

/// Connection handle to the Redis cache tier.
///
/// Wraps a [`fred::prelude::Client`] together with the canvas [`Grid`],
/// which fixes the blob length every operation validates against.
#[derive(Clone)]
pub struct CachePool {
    client: Client,
    grid: Grid,
}

impl CachePool {
    /// Connect to Redis at the given URL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] if the URL cannot be parsed.
    /// Returns [`CacheError::Redis`] if the connection fails.
    pub async fn connect(url: &str, grid: Grid) -> Result<Self, CacheError> {
        let config = Config::from_url(url)
            .map_err(|e| CacheError::Config(format!("invalid Redis URL: {e}")))?;

        let client = Builder::from_config(config).build()?;
        client.init().await?;

        tracing::info!(group_dim = grid.dim(), "connected to Redis");
        Ok(Self { client, grid })
    }

    /// The canvas geometry this cache was opened with.
    #[must_use]
    pub const fn grid(&self) -> Grid {
        self.grid
    }

    /// Unconditionally store a group blob.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the write fails.
    pub async fn set_group(&self, key: GroupKey, group: &TileGroup) -> Result<(), CacheError> {
        let _: () = self
            .client
            .set(key.to_string(), group.as_bytes().to_vec(), None, None, false)
            .await?;

        tracing::debug!(key = %key, len = group.len(), "stored group blob in cache");
        Ok(())
    }

    /// Read a group blob.
    ///
    /// A missing key and an empty string both mean absent (`None`). Any
    /// other value whose length differs from L is corruption and surfaces
    /// as [`CacheError::InvalidGroupLength`]; it is never truncated or
    /// repaired here.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the read fails.
    pub async fn get_group(&self, key: GroupKey) -> Result<Option<TileGroup>, CacheError> {
        let value: Option<Vec<u8>> = self.client.get(key.to_string()).await?;

        match value {
            None => Ok(None),
            Some(bytes) if bytes.is_empty() => Ok(None),
            Some(bytes) if bytes.len() != self.grid.group_len() => {
                tracing::warn!(key = %key, len = bytes.len(), "cached group blob has invalid length");
                Err(CacheError::InvalidGroupLength {
                    len: bytes.len(),
                    expected: self.grid.group_len(),
                })
            }
            Some(bytes) => Ok(Some(TileGroup::from_bytes(bytes))),
        }
    }

    /// Atomically replace the value at `key` with L zero bytes if it is
    /// absent or has the wrong length; no-op otherwise.
    ///
    /// Runs server-side so it cannot race a concurrent SETRANGE patch.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the script fails.
    pub async fn init_group(&self, key: GroupKey) -> Result<(), CacheError> {
        let initialized: i64 = self
            .client
            .eval(
                ZERO_INIT_SCRIPT,
                vec![key.to_string()],
                vec![self.grid.group_len() as i64],
            )
            .await?;

        tracing::debug!(key = %key, initialized, "ensured group blob exists in cache");
        Ok(())
    }

    /// Write three bytes into an existing group blob.
    ///
    /// Callers must run [`init_group`](Self::init_group) for the same key
    /// first; patching an absent key would create a short string.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the write fails.
    pub async fn patch_group(
        &self,
        key: GroupKey,
        offset: usize,
        channels: [u8; 3],
    ) -> Result<(), CacheError> {
        let _: u64 = self
            .client
            .setrange(key.to_string(), offset as u32, channels.to_vec())
            .await?;

        tracing::debug!(key = %key, offset, "patched group blob in cache");
        Ok(())
    }

    /// Apply one draw to its owning group: init-if-absent, then patch.
    ///
    /// This is the synchronous step of a placement; once it returns, group
    /// reads see the new pixel.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if either operation fails.
    pub async fn write_draw(&self, draw: Draw) -> Result<(), CacheError> {
        let key = self.grid.key_for(draw.x, draw.y);
        self.init_group(key).await?;
        self.patch_group(key, self.grid.byte_offset(draw.x, draw.y), draw.rgb.channels())
            .await
    }

    /// Apply a batch of draws, split per owning group.
    ///
    /// Each group is initialized once, then patched per draw. A draw is
    /// only ever patched under its own group's key.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] on the first failing operation.
    pub async fn write_draws(&self, draws: &[Draw]) -> Result<(), CacheError> {
        let mut per_group: HashMap<GroupKey, Vec<Draw>> = HashMap::new();
        for draw in draws {
            per_group
                .entry(self.grid.key_for(draw.x, draw.y))
                .or_default()
                .push(*draw);
        }

        for (key, group_draws) in per_group {
            self.init_group(key).await?;
            for draw in group_draws {
                self.patch_group(key, self.grid.byte_offset(draw.x, draw.y), draw.rgb.channels())
                    .await?;
            }
        }
        Ok(())
    }

    /// Try to acquire the expiring lock at `key`.
    ///
    /// Returns [`LOCK_ACQUIRED`] (-1) when `acquiring` was stored, or the
    /// unix-seconds timestamp already held. A stored time older than
    /// `expires_before` counts as expired and is overwritten; comparing
    /// against the caller's own clock keeps skew between the cache server's
    /// TTL and the application clock from producing spurious unlocks. The
    /// value expires after `period`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the script fails or replies with a
    /// non-integer.
    pub async fn acquire_expiring_lock(
        &self,
        key: &str,
        acquiring: DateTime<Utc>,
        expires_before: DateTime<Utc>,
        period: Duration,
    ) -> Result<i64, CacheError> {
        let stored: i64 = self
            .client
            .eval(
                EXPIRE_LOCK_SCRIPT,
                vec![key.to_owned()],
                vec![
                    acquiring.timestamp(),
                    expires_before.timestamp(),
                    period.as_secs() as i64,
                ],
            )
            .await?;

        tracing::debug!(key, stored, "ran expiring lock acquisition");
        Ok(stored)
    }

    /// Flush all keys.
    ///
    /// **WARNING:** deletes all data. Only use for testing.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Redis`] if the flush fails.
    pub async fn flush_all(&self) -> Result<(), CacheError> {
        let _: () = self.client.flushall(false).await?;
        Ok(())
    }

    /// Return a reference to the underlying [`Client`], e.g. for PUBLISH.
    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }
}
