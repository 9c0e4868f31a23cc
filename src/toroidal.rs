//! Coordinate wrapping on the toroidal map and chunk addressing.

use std::fmt;

/// Wraps `v` into `[0, limit)`.
///
/// Returns the wrapped coordinate and the offset to add back to recover the
/// unwrapped position, so `wrapped + offset == v`. A coordinate one period out
/// of range yields `-limit` or `limit`; an in-range coordinate yields zero.
pub fn wrap_coord(v: i32, limit: i32) -> (i32, i32) {
    debug_assert!(limit > 0);
    let wrapped = v.rem_euclid(limit);
    (wrapped, v - wrapped)
}

/// Packed chunk column (high byte) and row (low byte).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChunkId(u16);

impl ChunkId {
    pub fn new(column: u32, row: u32) -> Self {
        debug_assert!(column < 256 && row < 256);
        Self(((column as u16) << 8) | row as u16)
    }

    pub fn column(self) -> u32 {
        (self.0 >> 8) as u32
    }

    pub fn row(self) -> u32 {
        (self.0 & 0xff) as u32
    }

    pub fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.column(), self.row())
    }
}

/// Where a requested map position lands: the chunk holding it and the
/// unwrapped tile position of that chunk's top-left corner.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ChunkLocation {
    pub id: ChunkId,
    pub anchor: ChunkAnchor,
}

/// Unwrapped tile coordinates of a chunk's top-left tile.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkAnchor {
    pub x: i32,
    pub y: i32,
}

pub fn locate_chunk(x: i32, y: i32, map_width: u32, map_height: u32, chunk_dim: u32) -> ChunkLocation {
    let dim = chunk_dim as i32;
    let (wx, offset_x) = wrap_coord(x, map_width as i32);
    let (wy, offset_y) = wrap_coord(y, map_height as i32);
    let column = wx / dim;
    let row = wy / dim;
    ChunkLocation {
        id: ChunkId::new(column as u32, row as u32),
        anchor: ChunkAnchor {
            x: offset_x + column * dim,
            y: offset_y + row * dim,
        },
    }
}
