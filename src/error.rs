use std::fmt;

use crate::map::TileId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    ChunkNotSquare { chunk_width: u32, chunk_height: u32 },
    ZeroDimension,
    NotChunkAligned { width: u32, height: u32, chunk_dim: u32 },
    TooManyChunks { columns: u32, rows: u32 },
    DataLength { expected: usize, found: usize },
    UnknownTile { tile: TileId, render_entries: usize },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChunkNotSquare { chunk_width, chunk_height } => write!(
                f,
                "map chunks must be square (got {chunk_width}x{chunk_height})"
            ),
            Self::ZeroDimension => write!(f, "map and chunk dimensions must be non-zero"),
            Self::NotChunkAligned { width, height, chunk_dim } => write!(
                f,
                "map size {width}x{height} is not a multiple of chunk dimension {chunk_dim}"
            ),
            Self::TooManyChunks { columns, rows } => write!(
                f,
                "map needs {columns}x{rows} chunks, at most 256x256 are addressable"
            ),
            Self::DataLength { expected, found } => {
                write!(f, "map data holds {found} tiles, expected {expected}")
            }
            Self::UnknownTile { tile, render_entries } => write!(
                f,
                "tile id {tile} has no render descriptor ({render_entries} entries)"
            ),
        }
    }
}

impl std::error::Error for MapError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    TargetTooSmall { required: usize, available: usize },
    TilesOutOfRange { required: usize, available: usize },
    MissingRenderData(TileId),
    MissingUv(u16),
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetTooSmall { required, available } => write!(
                f,
                "chunk write target holds {available} vertices, {required} required"
            ),
            Self::TilesOutOfRange { required, available } => write!(
                f,
                "chunk tile block needs {required} map entries, {available} available"
            ),
            Self::MissingRenderData(tile) => write!(f, "no render descriptor for tile {tile}"),
            Self::MissingUv(vid) => write!(f, "uv table has no entry {vid}"),
        }
    }
}

impl std::error::Error for GeometryError {}

/// A chunk slot buffer could not be acquired for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkWriteError {
    NotAllocated(usize),
    CapacityExceeded { slot: usize, required: usize, capacity: usize },
}

impl fmt::Display for ChunkWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAllocated(slot) => write!(f, "chunk slot {slot} has no buffer"),
            Self::CapacityExceeded { slot, required, capacity } => write!(
                f,
                "chunk slot {slot} holds {capacity} vertices, {required} required"
            ),
        }
    }
}

impl std::error::Error for ChunkWriteError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawListError {
    AlreadyOpen(&'static str),
    NotOpen(&'static str),
    WriterMismatch { expected: &'static str, found: &'static str },
    Full { list: &'static str, capacity: usize },
}

impl fmt::Display for DrawListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyOpen(list) => write!(f, "draw list {list} is already being written"),
            Self::NotOpen(list) => write!(f, "draw list {list} was ended without begin"),
            Self::WriterMismatch { expected, found } => write!(
                f,
                "writer for draw list {found} passed to end of draw list {expected}"
            ),
            Self::Full { list, capacity } => {
                write!(f, "draw list {list} is full ({capacity} vertices)")
            }
        }
    }
}

impl std::error::Error for DrawListError {}

/// Initialization failure; a renderer is never produced after one.
#[derive(Debug)]
pub enum RendererError {
    Setup { stage: &'static str, message: String },
}

impl fmt::Display for RendererError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup { stage, message } => write!(f, "{stage} setup failed: {message}"),
        }
    }
}

impl std::error::Error for RendererError {}
