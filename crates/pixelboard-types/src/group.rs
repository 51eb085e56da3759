//! The group blob codec.
//!
//! A serialized group is a fixed-length byte buffer of L = G * G * 3 bytes
//! holding the R, G, B triplet of every pixel in the group, all-zero meaning
//! unpainted. An absent group is represented by an empty buffer; the first
//! write allocates the full zeroed blob.

use crate::grid::Grid;
use crate::models::Rgba;

/// A group's pixel data: either empty (absent) or exactly L bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileGroup(Vec<u8>);

impl TileGroup {
    /// An empty (absent) group.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Wrap raw bytes, e.g. a value read back from the cache.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Write the pixel at canvas coordinates `(x, y)` into the blob.
    ///
    /// Allocates the zeroed L-byte buffer on the first write. Writes exactly
    /// three bytes; every other offset is left untouched. Alpha is not
    /// stored.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` does not belong to the group this buffer was
    /// built for (offset out of range).
    pub fn set_at(&mut self, grid: Grid, x: i32, y: i32, rgb: Rgba) {
        if self.0.is_empty() {
            self.0 = vec![0; grid.group_len()];
        }
        let offset = grid.byte_offset(x, y);
        self.0[offset] = rgb.r;
        self.0[offset + 1] = rgb.g;
        self.0[offset + 2] = rgb.b;
    }

    /// The raw bytes, ready for wire transmission.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_at_allocates_lazily() {
        let grid = Grid::new(5);
        let mut group = TileGroup::new();
        assert!(group.is_empty());

        group.set_at(grid, 0, 0, Rgba::opaque(1, 2, 3));
        assert_eq!(group.len(), grid.group_len());
        assert_eq!(&group.as_bytes()[..3], &[1, 2, 3]);
    }

    #[test]
    fn set_at_touches_only_three_bytes() {
        let grid = Grid::new(5);
        let mut group = TileGroup::new();
        group.set_at(grid, 2, 2, Rgba::opaque(9, 8, 7));

        let bytes = group.as_bytes();
        let offset = grid.byte_offset(2, 2);
        assert_eq!(&bytes[offset..offset + 3], &[9, 8, 7]);
        for (i, b) in bytes.iter().enumerate() {
            if !(offset..offset + 3).contains(&i) {
                assert_eq!(*b, 0, "byte {i} was written unexpectedly");
            }
        }
    }

    #[test]
    fn set_at_overwrites_in_place() {
        let grid = Grid::new(5);
        let mut group = TileGroup::new();
        group.set_at(grid, 4, 4, Rgba::opaque(10, 20, 30));
        group.set_at(grid, 4, 4, Rgba::opaque(40, 50, 60));

        let offset = grid.byte_offset(4, 4);
        assert_eq!(&group.as_bytes()[offset..offset + 3], &[40, 50, 60]);
        assert_eq!(group.len(), grid.group_len());
    }
}
