//! Core domain types for the pixelboard canvas.
//!
//! The canvas is an unbounded 2D grid of pixels partitioned into fixed-size
//! square groups. Each group is addressed by the coordinates of its top-left
//! corner and serialized as one contiguous RGB byte buffer, which is the unit
//! of caching and of wire transfer for bulk reads.
//!
//! # Modules
//!
//! - [`grid`] -- group addressing and intra-group byte offsets
//! - [`group`] -- the fixed-length group blob codec
//! - [`models`] -- draws, tiles, placements, and their JSON shapes

pub mod grid;
pub mod group;
pub mod models;

// Re-export primary types for convenience.
pub use grid::{Grid, GroupKey, PRODUCTION_GROUP_DIM};
pub use group::TileGroup;
pub use models::{day_since_epoch, Draw, PlacementWrite, Rgba, Tile};
