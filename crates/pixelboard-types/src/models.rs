//! Domain models and their JSON shapes.
//!
//! The JSON field names here are part of the public HTTP contract: colors
//! serialize with single uppercase letters (`{"R":..,"G":..,"B":..,"A":..}`)
//! and a tile wraps its draw under `"d"` next to a `"date"` string.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds in one UTC day.
const SECONDS_PER_DAY: i64 = 86_400;

/// Render format for tile timestamps, e.g. `2025-01-01 00:00:00 +0000 UTC`.
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z %Z";

/// An RGBA color. Alpha is carried on the wire but never persisted; store
/// reads leave it zero while live draw events materialize it as 255.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    #[serde(rename = "R")]
    pub r: u8,
    #[serde(rename = "G")]
    pub g: u8,
    #[serde(rename = "B")]
    pub b: u8,
    #[serde(rename = "A")]
    pub a: u8,
}

impl Rgba {
    /// A fully opaque color.
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// The three persisted channels, in blob order.
    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// One pixel write: the unit carried over the pub/sub channel and applied
/// to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub x: i32,
    pub y: i32,
    pub rgb: Rgba,
}

/// A pixel read back from the store, with the time it was last placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub d: Draw,
    pub date: String,
}

impl Tile {
    /// Build a tile from a draw and its placement time.
    #[must_use]
    pub fn new(d: Draw, placed_at: DateTime<Utc>) -> Self {
        Self {
            d,
            date: placed_at.format(DATE_FORMAT).to_string(),
        }
    }
}

/// The durable unit of a placement: what gets written to the store.
#[derive(Debug, Clone)]
pub struct PlacementWrite {
    pub x: i32,
    pub y: i32,
    pub rgb: Rgba,
    pub ip: IpAddr,
    pub placed_at: DateTime<Utc>,
}

/// Integer days since the Unix epoch (UTC) for a placement time.
///
/// This is the history partition key; floored so pre-epoch times partition
/// consistently too.
#[must_use]
pub fn day_since_epoch(t: DateTime<Utc>) -> i64 {
    t.timestamp().div_euclid(SECONDS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn rgba_json_shape() {
        let rgb = Rgba::opaque(80, 120, 130);
        let json = serde_json::to_string(&rgb).unwrap();
        assert_eq!(json, r#"{"R":80,"G":120,"B":130,"A":255}"#);
    }

    #[test]
    fn tile_json_shape_and_date_format() {
        let placed_at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let tile = Tile::new(
            Draw {
                x: 0,
                y: 0,
                rgb: Rgba {
                    r: 80,
                    g: 120,
                    b: 130,
                    a: 0,
                },
            },
            placed_at,
        );
        let json = serde_json::to_string(&tile).unwrap();
        assert_eq!(
            json,
            r#"{"d":{"x":0,"y":0,"rgb":{"R":80,"G":120,"B":130,"A":0}},"date":"2025-01-01 00:00:00 +0000 UTC"}"#
        );
    }

    #[test]
    fn day_since_epoch_boundaries() {
        let epoch = Utc.timestamp_opt(0, 0).unwrap();
        assert_eq!(day_since_epoch(epoch), 0);

        let last_second = Utc.timestamp_opt(86_399, 0).unwrap();
        assert_eq!(day_since_epoch(last_second), 0);

        let next_day = Utc.timestamp_opt(86_400, 0).unwrap();
        assert_eq!(day_since_epoch(next_day), 1);

        // Pre-epoch floors instead of truncating toward zero.
        let before = Utc.timestamp_opt(-1, 0).unwrap();
        assert_eq!(day_since_epoch(before), -1);
    }
}
