//! Fixed four-slot cache of chunk geometry.
//!
//! Slots are claimed in two passes per frame. The first pass only takes cache
//! hits and empty slots; the bump pass then evicts slots that no corner of
//! the current frame has claimed. A per-frame bitmask records the claims so
//! one corner never evicts geometry another corner of the same frame uses.

use crate::chunk_geometry::{build_chunk_geometry, chunk_vertex_count};
use crate::error::ChunkWriteError;
use crate::map::TileMap;
use crate::toroidal::{locate_chunk, ChunkAnchor, ChunkId};
use crate::vertex::TileVertex;

pub const CHUNK_CACHE_SIZE: usize = 4;

/// Destination of built chunk geometry, one buffer per slot.
pub trait ChunkBuffers {
    /// Replaces the whole contents of `slot` with `vertices`.
    fn write_chunk(&mut self, slot: usize, vertices: &[TileVertex]) -> Result<(), ChunkWriteError>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChunkSlot {
    pub resident: Option<ChunkId>,
    pub anchor: ChunkAnchor,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub fills: u64,
    pub evictions: u64,
    /// Requests that found neither a hit nor a usable slot.
    pub exhausted: u64,
    pub build_failures: u64,
}

impl CacheStats {
    pub fn builds(&self) -> u64 {
        self.fills + self.evictions
    }
}

/// Read-only inputs needed to build chunk geometry.
#[derive(Copy, Clone)]
pub struct ChunkSource<'a> {
    pub map: &'a TileMap,
    pub uvs: &'a [[f32; 4]],
    pub tile_size: f32,
}

/// Slots claimed for the four view corners, in the order
/// top-left, top-right, bottom-left, bottom-right.
pub type CornerSlots = [Option<usize>; 4];

pub struct ChunkCache {
    slots: [ChunkSlot; CHUNK_CACHE_SIZE],
    used_mask: u8,
    chunk_dim: u32,
    scratch: Vec<TileVertex>,
    pub stats: CacheStats,
}

impl ChunkCache {
    pub fn new(chunk_dim: u32) -> Self {
        let mut cache = Self {
            slots: [ChunkSlot::default(); CHUNK_CACHE_SIZE],
            used_mask: 0,
            chunk_dim: 0,
            scratch: Vec::new(),
            stats: CacheStats::default(),
        };
        cache.reset(chunk_dim);
        cache
    }

    /// Empties every slot and resizes the build target for `chunk_dim`.
    pub fn reset(&mut self, chunk_dim: u32) {
        self.slots = [ChunkSlot::default(); CHUNK_CACHE_SIZE];
        self.used_mask = 0;
        self.chunk_dim = chunk_dim;
        self.scratch.clear();
        self.scratch
            .resize(chunk_vertex_count(chunk_dim as usize), TileVertex::default());
    }

    pub fn chunk_dim(&self) -> u32 {
        self.chunk_dim
    }

    pub fn vertex_count(&self) -> usize {
        chunk_vertex_count(self.chunk_dim as usize)
    }

    pub fn slots(&self) -> &[ChunkSlot; CHUNK_CACHE_SIZE] {
        &self.slots
    }

    pub fn used_mask(&self) -> u8 {
        self.used_mask
    }

    pub fn is_used(&self, slot: usize) -> bool {
        self.used_mask & (1 << slot) != 0
    }

    /// Clears the claims of the previous frame.
    pub fn begin_frame(&mut self) {
        self.used_mask = 0;
    }

    /// Finds or builds the chunk holding map tile (`x`, `y`).
    ///
    /// Coordinates may lie outside the map; they are wrapped and the slot's
    /// anchor keeps the unwrapped chunk position. Without `bump_allowed` only
    /// a cache hit or an empty slot is taken. With it, a slot not claimed
    /// this frame is overwritten. Returns `None` when no slot is available or
    /// the chunk could not be written.
    pub fn obtain_chunk(
        &mut self,
        source: &ChunkSource<'_>,
        buffers: &mut impl ChunkBuffers,
        x: i32,
        y: i32,
        bump_allowed: bool,
    ) -> Option<usize> {
        let map = source.map;
        if map.chunk_dim() != self.chunk_dim {
            log::warn!(
                "map chunk dimension {} does not match cache dimension {}",
                map.chunk_dim(),
                self.chunk_dim
            );
            return None;
        }
        let location = locate_chunk(x, y, map.width(), map.height(), self.chunk_dim);

        if let Some(slot) = self.find_resident(location.id) {
            self.stats.hits += 1;
            return Some(self.claim(slot, location.anchor));
        }

        let slot = if bump_allowed {
            (0..CHUNK_CACHE_SIZE).find(|&i| !self.is_used(i))
        } else {
            self.slots.iter().position(|s| s.resident.is_none())
        };
        let Some(slot) = slot else {
            self.stats.exhausted += 1;
            return None;
        };

        let evicted = self.slots[slot].resident;
        if let Some(evicted) = evicted {
            log::debug!("evicting chunk {evicted} from slot {slot} for {}", location.id);
        }
        self.build(source, buffers, slot, location.id)?;
        if evicted.is_some() {
            self.stats.evictions += 1;
        } else {
            self.stats.fills += 1;
        }
        Some(self.claim(slot, location.anchor))
    }

    /// Claims slots for the four corners of the view centered on (`cx`, `cy`).
    pub fn resolve_view(
        &mut self,
        source: &ChunkSource<'_>,
        buffers: &mut impl ChunkBuffers,
        cx: i32,
        cy: i32,
        view_radius: i32,
    ) -> CornerSlots {
        self.begin_frame();

        let (left, top) = (cx - view_radius, cy - view_radius);
        let (right, bottom) = (cx + view_radius, cy + view_radius);
        let corners = [(left, top), (right, top), (left, bottom), (right, bottom)];

        let mut claimed: CornerSlots = [None; 4];
        for (slot, &(x, y)) in claimed.iter_mut().zip(&corners) {
            *slot = self.obtain_chunk(source, buffers, x, y, false);
        }
        for (slot, &(x, y)) in claimed.iter_mut().zip(&corners) {
            if slot.is_none() {
                *slot = self.obtain_chunk(source, buffers, x, y, true);
                if slot.is_none() {
                    log::warn!("no chunk slot for view corner ({x},{y})");
                }
            }
        }
        claimed
    }

    /// Slots claimed this frame with their unwrapped anchors.
    pub fn placements(&self) -> impl Iterator<Item = (usize, ChunkAnchor)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(i, slot)| self.is_used(*i) && slot.resident.is_some())
            .map(|(i, slot)| (i, slot.anchor))
    }

    fn find_resident(&self, id: ChunkId) -> Option<usize> {
        self.slots.iter().position(|s| s.resident == Some(id))
    }

    fn claim(&mut self, slot: usize, anchor: ChunkAnchor) -> usize {
        self.slots[slot].anchor = anchor;
        self.used_mask |= 1 << slot;
        slot
    }

    fn build(
        &mut self,
        source: &ChunkSource<'_>,
        buffers: &mut impl ChunkBuffers,
        slot: usize,
        id: ChunkId,
    ) -> Option<()> {
        let map = source.map;
        let dim = self.chunk_dim as usize;
        // The slot is empty until the new geometry is fully written.
        self.slots[slot].resident = None;

        let built = build_chunk_geometry(
            map.chunk_tiles(id.column(), id.row()),
            dim,
            map.width() as usize,
            map.render_data(),
            source.uvs,
            source.tile_size,
            &mut self.scratch,
        );
        let count = match built {
            Ok(count) => count,
            Err(error) => {
                log::error!("build_chunk_geometry: chunk {id}: {error}");
                self.stats.build_failures += 1;
                return None;
            }
        };
        if let Err(error) = buffers.write_chunk(slot, &self.scratch[..count]) {
            log::error!("build_chunk_geometry: chunk {id}: {error}");
            self.stats.build_failures += 1;
            return None;
        }

        log::debug!("built chunk {id} into slot {slot}");
        self.slots[slot].resident = Some(id);
        Some(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::map::TileRenderData;
    use std::collections::HashSet;

    /// In-memory slot buffers that count writes and can refuse chosen slots.
    #[derive(Default)]
    pub(crate) struct MemoryBuffers {
        pub slots: [Vec<TileVertex>; CHUNK_CACHE_SIZE],
        pub writes: usize,
        pub refuse: HashSet<usize>,
    }

    impl ChunkBuffers for MemoryBuffers {
        fn write_chunk(
            &mut self,
            slot: usize,
            vertices: &[TileVertex],
        ) -> Result<(), ChunkWriteError> {
            if self.refuse.contains(&slot) {
                return Err(ChunkWriteError::NotAllocated(slot));
            }
            self.writes += 1;
            self.slots[slot] = vertices.to_vec();
            Ok(())
        }
    }

    /// A map whose tile ids encode the chunk they belong to.
    pub(crate) fn chunked_map(width: u32, height: u32, dim: u32) -> TileMap {
        let columns = width / dim;
        let tiles = (0..width * height)
            .map(|i| {
                let (x, y) = (i % width, i / width);
                ((y / dim) * columns + x / dim) as u16
            })
            .collect();
        let chunk_count = (width / dim) * (height / dim);
        let render = (0..chunk_count as u16).map(TileRenderData::fixed).collect();
        TileMap::new(width, height, dim, dim, tiles, render).unwrap()
    }

    pub(crate) fn uv_table(entries: usize) -> Vec<[f32; 4]> {
        (0..entries).map(|i| [i as f32, 0.0, i as f32 + 1.0, 1.0]).collect()
    }

    fn assert_unique_residents(cache: &ChunkCache) {
        let ids: Vec<_> = cache.slots().iter().filter_map(|s| s.resident).collect();
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(ids.len(), unique.len(), "duplicate resident chunk in {ids:?}");
    }

    #[test]
    fn test_empty_slots_fill_in_order() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(16);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(16);

        assert_eq!(cache.obtain_chunk(&source, &mut buffers, 0, 0, false), Some(0));
        assert_eq!(cache.obtain_chunk(&source, &mut buffers, 20, 0, false), Some(1));
        assert_eq!(cache.slots()[1].resident, Some(ChunkId::new(1, 0)));
        assert_eq!(buffers.slots[1].len(), 16 * 16 * 6);
        assert_eq!(cache.used_mask(), 0b11);
    }

    #[test]
    fn test_repeat_request_hits_without_rebuild() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(16);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(16);

        let first = cache.obtain_chunk(&source, &mut buffers, 5, 5, false);
        let again = cache.obtain_chunk(&source, &mut buffers, 10, 12, false);
        cache.begin_frame();
        let next_frame = cache.obtain_chunk(&source, &mut buffers, 15, 0, false);
        assert_eq!(first, again);
        assert_eq!(first, next_frame);
        assert_eq!(buffers.writes, 1);
        assert_eq!(cache.stats.hits, 2);
    }

    #[test]
    fn test_full_cache_without_bump_returns_none() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(16);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(16);

        for x in 0..4 {
            assert!(cache.obtain_chunk(&source, &mut buffers, x * 16, 0, false).is_some());
        }
        cache.begin_frame();
        assert_eq!(cache.obtain_chunk(&source, &mut buffers, 0, 16, false), None);
        assert_eq!(cache.stats.exhausted, 1);
        assert_eq!(buffers.writes, 4);
    }

    #[test]
    fn test_bump_skips_slots_claimed_this_frame() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(16);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(16);

        for x in 0..4 {
            cache.obtain_chunk(&source, &mut buffers, x * 16, 0, false);
        }
        cache.begin_frame();
        // Claim slots 0 and 1 as hits, then bump for a new chunk.
        cache.obtain_chunk(&source, &mut buffers, 0, 0, false);
        cache.obtain_chunk(&source, &mut buffers, 16, 0, false);
        let bumped = cache.obtain_chunk(&source, &mut buffers, 0, 16, true);
        assert_eq!(bumped, Some(2));
        assert_eq!(cache.slots()[2].resident, Some(ChunkId::new(0, 1)));
        assert_eq!(cache.stats.evictions, 1);

        let bumped = cache.obtain_chunk(&source, &mut buffers, 16, 16, true);
        assert_eq!(bumped, Some(3));
        assert_eq!(cache.obtain_chunk(&source, &mut buffers, 32, 16, true), None);
        assert_unique_residents(&cache);
    }

    #[test]
    fn test_bump_reuses_chunk_already_resident() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(16);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(16);

        for x in 0..4 {
            cache.obtain_chunk(&source, &mut buffers, x * 16, 0, false);
        }
        cache.begin_frame();
        let first = cache.obtain_chunk(&source, &mut buffers, 0, 16, true);
        let second = cache.obtain_chunk(&source, &mut buffers, 8, 20, true);
        assert_eq!(first, second);
        assert_eq!(buffers.writes, 5);
        assert_unique_residents(&cache);
    }

    #[test]
    fn test_anchor_follows_wrap_offset() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(16);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(16);

        let slot = cache.obtain_chunk(&source, &mut buffers, 70, -2, false).unwrap();
        assert_eq!(cache.slots()[slot].resident, Some(ChunkId::new(0, 3)));
        assert_eq!(cache.slots()[slot].anchor, ChunkAnchor { x: 64, y: -16 });

        // Same chunk seen without wrapping keeps the slot but moves the anchor.
        cache.begin_frame();
        let again = cache.obtain_chunk(&source, &mut buffers, 3, 50, false).unwrap();
        assert_eq!(again, slot);
        assert_eq!(cache.slots()[slot].anchor, ChunkAnchor { x: 0, y: 48 });
    }

    #[test]
    fn test_write_failure_leaves_slot_empty() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(16);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        buffers.refuse.insert(0);
        let mut cache = ChunkCache::new(16);

        assert_eq!(cache.obtain_chunk(&source, &mut buffers, 0, 0, false), None);
        assert_eq!(cache.slots()[0].resident, None);
        assert!(!cache.is_used(0));
        assert_eq!(cache.stats.build_failures, 1);
    }

    #[test]
    fn test_missing_uvs_count_as_build_failure() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(2);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(16);

        assert_eq!(cache.obtain_chunk(&source, &mut buffers, 40, 40, false), None);
        assert_eq!(buffers.writes, 0);
        assert_eq!(cache.stats.build_failures, 1);
    }

    #[test]
    fn test_dimension_mismatch_is_refused() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(16);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(8);
        assert_eq!(cache.obtain_chunk(&source, &mut buffers, 0, 0, false), None);
        assert_eq!(buffers.writes, 0);
    }

    #[test]
    fn test_reset_empties_slots() {
        let map = chunked_map(64, 64, 16);
        let uvs = uv_table(16);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(16);
        cache.resolve_view(&source, &mut buffers, 8, 8, 8);

        cache.reset(16);
        assert!(cache.slots().iter().all(|s| s.resident.is_none()));
        assert_eq!(cache.used_mask(), 0);
        assert_eq!(cache.placements().count(), 0);
    }

    #[test]
    fn test_random_walk_keeps_residents_unique() {
        let map = chunked_map(128, 128, 16);
        let uvs = uv_table(64);
        let source = ChunkSource { map: &map, uvs: &uvs, tile_size: 0.2 };
        let mut buffers = MemoryBuffers::default();
        let mut cache = ChunkCache::new(16);

        // Deterministic walk with occasional jumps across the map.
        let mut state: u32 = 0x2545_f491;
        let (mut cx, mut cy) = (0i32, 0i32);
        for _ in 0..500 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            match state % 7 {
                0 => cx += 40,
                1 => cy -= 33,
                2 => cx -= 1,
                3 => cy += 1,
                _ => {}
            }
            let radius = (state % 9) as i32;
            let claimed = cache.resolve_view(&source, &mut buffers, cx, cy, radius);
            assert_unique_residents(&cache);
            assert!(claimed.iter().all(|slot| slot.is_some()));
        }
    }
}
