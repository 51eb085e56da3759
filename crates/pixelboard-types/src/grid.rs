//! Group addressing for the canvas.
//!
//! Every pixel `(x, y)` belongs to exactly one group whose key is the
//! top-left corner of the G x G square containing it. Group derivation uses
//! mathematical floor division, so negative coordinates land in the group
//! whose corner is less than or equal to the coordinate: with G = 100,
//! `(-3, -3)` belongs to group `(-100, -100)`, never `(0, 0)`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Group dimension used in production deployments.
pub const PRODUCTION_GROUP_DIM: i32 = 100;

/// The canvas partition geometry: a square group dimension G.
///
/// All addressing math goes through this type so the dimension is chosen
/// once per process (tests run with a small G to keep fixtures readable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    dim: i32,
}

impl Grid {
    /// Create a grid with the given group dimension.
    ///
    /// # Panics
    ///
    /// Panics if `dim` is not positive.
    #[must_use]
    pub fn new(dim: i32) -> Self {
        assert!(dim > 0, "group dimension must be positive, got {dim}");
        Self { dim }
    }

    /// The group dimension G.
    #[must_use]
    pub const fn dim(self) -> i32 {
        self.dim
    }

    /// The byte length L of a serialized group: G * G * 3.
    #[must_use]
    pub const fn group_len(self) -> usize {
        (self.dim * self.dim * 3) as usize
    }

    /// The key of the group owning `(x, y)`.
    ///
    /// Uses floored division: the corner is always <= the coordinate, on
    /// both sides of the origin.
    #[must_use]
    pub const fn key_for(self, x: i32, y: i32) -> GroupKey {
        GroupKey {
            x: x.div_euclid(self.dim) * self.dim,
            y: y.div_euclid(self.dim) * self.dim,
        }
    }

    /// The byte offset of pixel `(x, y)` inside its owning group blob.
    ///
    /// The three bytes at `offset .. offset + 3` are the pixel's R, G, B.
    #[must_use]
    pub const fn byte_offset(self, x: i32, y: i32) -> usize {
        let key = self.key_for(x, y);
        (((y - key.y) * self.dim + (x - key.x)) * 3) as usize
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::new(PRODUCTION_GROUP_DIM)
    }
}

/// The top-left corner of a group, the canonical group identity.
///
/// The `Display` form `"<x>,<y>"` is the cache key for the group blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub x: i32,
    pub y: i32,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}
