//! Map-side data the renderer reads: the toroidal tile grid, per-tile render
//! descriptors and the shadow occluder groups.

use crate::error::MapError;

pub type TileId = u16;

/// Marks a `TileRenderData::scroll` that has no scroll source.
pub const VID_UNSET: u16 = 0xffff;

/// Chunks are addressed by an 8-bit column and an 8-bit row.
pub const MAX_CHUNKS_PER_AXIS: u32 = 256;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TileRenderData {
    /// Index into the uv table.
    pub vid: u16,
    /// Uv table index whose V coordinate the texture scrolls from, or `VID_UNSET`.
    pub scroll: u16,
}

impl TileRenderData {
    pub const fn fixed(vid: u16) -> Self {
        Self { vid, scroll: VID_UNSET }
    }

    pub const fn scrolling(vid: u16, scroll: u16) -> Self {
        Self { vid, scroll }
    }

    pub fn scroll_source(&self) -> Option<u16> {
        (self.scroll != VID_UNSET).then_some(self.scroll)
    }
}

/// A wrap-around grid of tiles split into square chunks.
#[derive(Clone, Debug)]
pub struct TileMap {
    width: u32,
    height: u32,
    chunk_dim: u32,
    tiles: Vec<TileId>,
    render: Vec<TileRenderData>,
}

impl TileMap {
    pub fn new(
        width: u32,
        height: u32,
        chunk_width: u32,
        chunk_height: u32,
        tiles: Vec<TileId>,
        render: Vec<TileRenderData>,
    ) -> Result<Self, MapError> {
        if chunk_width != chunk_height {
            return Err(MapError::ChunkNotSquare { chunk_width, chunk_height });
        }
        let chunk_dim = chunk_width;
        if width == 0 || height == 0 || chunk_dim == 0 {
            return Err(MapError::ZeroDimension);
        }
        if width % chunk_dim != 0 || height % chunk_dim != 0 {
            return Err(MapError::NotChunkAligned { width, height, chunk_dim });
        }
        let (columns, rows) = (width / chunk_dim, height / chunk_dim);
        if columns > MAX_CHUNKS_PER_AXIS || rows > MAX_CHUNKS_PER_AXIS {
            return Err(MapError::TooManyChunks { columns, rows });
        }
        let expected = width as usize * height as usize;
        if tiles.len() != expected {
            return Err(MapError::DataLength { expected, found: tiles.len() });
        }
        if let Some(&tile) = tiles.iter().find(|&&t| t as usize >= render.len()) {
            return Err(MapError::UnknownTile { tile, render_entries: render.len() });
        }

        Ok(Self { width, height, chunk_dim, tiles, render })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn chunk_dim(&self) -> u32 {
        self.chunk_dim
    }

    pub fn tiles(&self) -> &[TileId] {
        &self.tiles
    }

    pub fn render_data(&self) -> &[TileRenderData] {
        &self.render
    }

    /// Tile at a wrapped position.
    pub fn tile(&self, x: i32, y: i32) -> TileId {
        let x = x.rem_euclid(self.width as i32) as usize;
        let y = y.rem_euclid(self.height as i32) as usize;
        self.tiles[y * self.width as usize + x]
    }

    pub fn set_tile(&mut self, x: u32, y: u32, tile: TileId) -> Result<(), MapError> {
        if tile as usize >= self.render.len() {
            return Err(MapError::UnknownTile { tile, render_entries: self.render.len() });
        }
        let index = (y % self.height) as usize * self.width as usize + (x % self.width) as usize;
        self.tiles[index] = tile;
        Ok(())
    }

    /// Map data starting at the top-left tile of chunk (`column`, `row`).
    pub fn chunk_tiles(&self, column: u32, row: u32) -> &[TileId] {
        &self.tiles[chunk_origin(self.width, self.chunk_dim, column, row)..]
    }
}

/// Index of the first tile of chunk (`column`, `row`) in a row-major map.
fn chunk_origin(width: u32, chunk_dim: u32, column: u32, row: u32) -> usize {
    (row as usize * width as usize + column as usize) * chunk_dim as usize
}

/// Occluder shapes for the shadow pre-pass.
///
/// `tile_pos` holds three floats per shape (x, y, height) in tiles relative
/// to the view center; the first `left` shapes block the left half of their
/// tile, the next `center` the whole tile, the last `right` the right half.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockingGroups {
    pub left: u32,
    pub center: u32,
    pub right: u32,
    pub tile_pos: Vec<f32>,
}

impl BlockingGroups {
    pub fn shape_count(&self) -> usize {
        (self.left + self.center + self.right) as usize
    }

    /// Shape positions, clamped to what `tile_pos` actually holds.
    pub fn shapes(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.tile_pos
            .chunks_exact(3)
            .take(self.shape_count())
            .map(|p| [p[0], p[1], p[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_table() -> Vec<TileRenderData> {
        vec![TileRenderData::fixed(0), TileRenderData::scrolling(1, 2)]
    }

    #[test]
    fn test_rejects_non_square_chunks() {
        let err = TileMap::new(32, 32, 16, 8, vec![0; 1024], render_table()).unwrap_err();
        assert_eq!(err, MapError::ChunkNotSquare { chunk_width: 16, chunk_height: 8 });
    }

    #[test]
    fn test_rejects_unaligned_and_short_maps() {
        assert!(matches!(
            TileMap::new(40, 32, 16, 16, vec![0; 1280], render_table()),
            Err(MapError::NotChunkAligned { .. })
        ));
        assert_eq!(
            TileMap::new(32, 32, 16, 16, vec![0; 100], render_table()).unwrap_err(),
            MapError::DataLength { expected: 1024, found: 100 }
        );
    }

    #[test]
    fn test_rejects_unaddressable_chunk_grid() {
        let err = TileMap::new(257, 1, 1, 1, vec![0; 257], render_table()).unwrap_err();
        assert_eq!(err, MapError::TooManyChunks { columns: 257, rows: 1 });
    }

    #[test]
    fn test_rejects_tiles_without_render_data() {
        let mut tiles = vec![0; 256];
        tiles[17] = 5;
        let err = TileMap::new(16, 16, 16, 16, tiles, render_table()).unwrap_err();
        assert_eq!(err, MapError::UnknownTile { tile: 5, render_entries: 2 });
    }

    #[test]
    fn test_tile_lookup_wraps() {
        let tiles = (0..64).map(|i| (i % 2) as TileId).collect();
        let map = TileMap::new(8, 8, 4, 4, tiles, render_table()).unwrap();
        assert_eq!(map.tile(-1, 0), map.tile(7, 0));
        assert_eq!(map.tile(9, 8), map.tile(1, 0));
    }

    #[test]
    fn test_chunk_tiles_start_at_chunk_origin() {
        let tiles = (0..64).collect();
        let render = (0..64).map(TileRenderData::fixed).collect();
        let map = TileMap::new(8, 8, 4, 4, tiles, render).unwrap();
        assert_eq!(map.chunk_tiles(1, 0)[0], 4);
        assert_eq!(map.chunk_tiles(0, 1)[0], 32);
        assert_eq!(map.chunk_tiles(1, 1)[0], 36);
    }

    #[test]
    fn test_chunk_origin_on_largest_map() {
        let width = 256 * 256;
        let last = chunk_origin(width, 256, 255, 255);
        assert_eq!(last, (255 * 65_536 + 255) * 256);
        assert!(last > u32::MAX as usize);
        assert_eq!(chunk_origin(8, 4, 1, 1), 36);
    }

    #[test]
    fn test_shapes_ignore_missing_positions() {
        let blocks = BlockingGroups {
            left: 1,
            center: 2,
            right: 0,
            tile_pos: vec![1.0, 2.0, 0.0, 3.0, 4.0, 0.0],
        };
        assert_eq!(blocks.shape_count(), 3);
        assert_eq!(blocks.shapes().count(), 2);
    }
}
