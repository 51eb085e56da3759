//! Store queries: pixel reads, group scans, history, and the batched
//! double-write.
//!
//! Every placement lands in two tables as one transaction: an upsert into
//! `tiles` (current pixel state, keyed by group + coordinates) and an
//! append into `placements` (history, keyed by day + time + coordinates).
//! Reads never touch the cache tier from here; coherence is the caller's
//! concern.

use chrono::{DateTime, Utc};
use pixelboard_types::{day_since_epoch, Draw, Grid, GroupKey, PlacementWrite, Rgba, Tile};
use sqlx::PgPool;

use crate::error::StoreError;

/// Operations on the `tiles` and `placements` tables.
pub struct TileStore<'a> {
    pool: &'a PgPool,
    grid: Grid,
}

/// One pixel of a group partition scan.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PixelRow {
    pub x: i32,
    pub y: i32,
    pub r: i16,
    pub g: i16,
    pub b: i16,
}

impl PixelRow {
    /// The three persisted color channels, clamped back to bytes.
    #[must_use]
    pub const fn rgb(&self) -> Rgba {
        Rgba {
            r: self.r as u8,
            g: self.g as u8,
            b: self.b as u8,
            a: 0,
        }
    }
}

/// A row read back from either table, with its timestamp.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TileRow {
    x: i32,
    y: i32,
    r: i16,
    g: i16,
    b: i16,
    placed_at: DateTime<Utc>,
}

impl From<TileRow> for Tile {
    fn from(row: TileRow) -> Self {
        Self::new(
            Draw {
                x: row.x,
                y: row.y,
                rgb: Rgba {
                    r: row.r as u8,
                    g: row.g as u8,
                    b: row.b as u8,
                    a: 0,
                },
            },
            row.placed_at,
        )
    }
}

impl<'a> TileStore<'a> {
    /// Create a store bound to a connection pool and canvas geometry.
    #[must_use]
    pub const fn new(pool: &'a PgPool, grid: Grid) -> Self {
        Self { pool, grid }
    }

    /// Read the current state of one pixel.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TileNotFound`] if the pixel was never placed.
    /// Returns [`StoreError::Postgres`] if the query fails.
    pub async fn get_one_pixel(&self, x: i32, y: i32) -> Result<Tile, StoreError> {
        let key = self.grid.key_for(x, y);
        let row = sqlx::query_as::<_, TileRow>(
            r"SELECT x, y, r, g, b, last_time AS placed_at
              FROM tiles
              WHERE group_x = $1 AND group_y = $2 AND x = $3 AND y = $4",
        )
        .bind(key.x)
        .bind(key.y)
        .bind(x)
        .bind(y)
        .fetch_optional(self.pool)
        .await?;

        row.map(Tile::from).ok_or(StoreError::TileNotFound)
    }

    /// Scan every placed pixel of one group partition.
    ///
    /// The caller folds the rows into a group blob; an empty vector means
    /// the group has never been painted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    pub async fn group_rows(&self, key: GroupKey) -> Result<Vec<PixelRow>, StoreError> {
        let rows = sqlx::query_as::<_, PixelRow>(
            r"SELECT x, y, r, g, b
              FROM tiles
              WHERE group_x = $1 AND group_y = $2",
        )
        .bind(key.x)
        .bind(key.y)
        .fetch_all(self.pool)
        .await?;

        tracing::debug!(key = %key, count = rows.len(), "scanned group partition");
        Ok(rows)
    }

    /// Read the placement history for the day of `after`, up to and
    /// including `after`, in ascending placement order.
    ///
    /// Single-day only: callers wanting a longer window issue one query per
    /// day partition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if the query fails.
    pub async fn history(&self, after: DateTime<Utc>) -> Result<Vec<Tile>, StoreError> {
        let day = day_since_epoch(after);
        let rows = sqlx::query_as::<_, TileRow>(
            r"SELECT x, y, r, g, b, placement_time AS placed_at
              FROM placements
              WHERE day = $1 AND placement_time <= $2
              ORDER BY placement_time ASC",
        )
        .bind(day)
        .bind(after)
        .fetch_all(self.pool)
        .await?;

        tracing::debug!(day, count = rows.len(), "selected placement history");
        Ok(rows.into_iter().map(Tile::from).collect())
    }

    /// Write a batch of placements to both tables as one transaction.
    ///
    /// Each element produces a last-write-wins upsert into `tiles` and an
    /// append into `placements`; either the whole batch commits or none of
    /// it does. Multi-row inserts use UNNEST so a batch is a fixed two
    /// statements regardless of size.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Postgres`] if any statement or the commit
    /// fails.
    pub async fn batch_write(&self, writes: &[PlacementWrite]) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let len = writes.len();
        let mut group_xs = Vec::with_capacity(len);
        let mut group_ys = Vec::with_capacity(len);
        let mut xs = Vec::with_capacity(len);
        let mut ys = Vec::with_capacity(len);
        let mut rs = Vec::with_capacity(len);
        let mut gs = Vec::with_capacity(len);
        let mut bs = Vec::with_capacity(len);
        let mut ips = Vec::with_capacity(len);
        let mut times = Vec::with_capacity(len);
        let mut days = Vec::with_capacity(len);

        for write in writes {
            let key = self.grid.key_for(write.x, write.y);
            group_xs.push(key.x);
            group_ys.push(key.y);
            xs.push(write.x);
            ys.push(write.y);
            rs.push(i16::from(write.rgb.r));
            gs.push(i16::from(write.rgb.g));
            bs.push(i16::from(write.rgb.b));
            ips.push(write.ip.to_string());
            times.push(write.placed_at);
            days.push(day_since_epoch(write.placed_at));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"INSERT INTO tiles (group_x, group_y, x, y, r, g, b, last_ip, last_time)
              SELECT * FROM UNNEST($1::INT[], $2::INT[], $3::INT[], $4::INT[], $5::SMALLINT[], $6::SMALLINT[], $7::SMALLINT[], $8::TEXT[], $9::TIMESTAMPTZ[])
              ON CONFLICT (group_x, group_y, x, y) DO UPDATE
              SET r = EXCLUDED.r,
                  g = EXCLUDED.g,
                  b = EXCLUDED.b,
                  last_ip = EXCLUDED.last_ip,
                  last_time = EXCLUDED.last_time",
        )
        .bind(&group_xs)
        .bind(&group_ys)
        .bind(&xs)
        .bind(&ys)
        .bind(&rs)
        .bind(&gs)
        .bind(&bs)
        .bind(&ips)
        .bind(&times)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"INSERT INTO placements (day, placement_time, x, y, r, g, b, ip)
              SELECT * FROM UNNEST($1::BIGINT[], $2::TIMESTAMPTZ[], $3::INT[], $4::INT[], $5::SMALLINT[], $6::SMALLINT[], $7::SMALLINT[], $8::TEXT[])
              ON CONFLICT DO NOTHING",
        )
        .bind(&days)
        .bind(&times)
        .bind(&xs)
        .bind(&ys)
        .bind(&rs)
        .bind(&gs)
        .bind(&bs)
        .bind(&ips)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(count = len, "wrote placement batch");
        Ok(())
    }
}
