//! Per-frame chunk placement: which slots to draw and where.

use crate::chunk_cache::{ChunkBuffers, ChunkCache, ChunkSource, CornerSlots};
use crate::toroidal::ChunkAnchor;

/// Camera input for one frame, in map tiles.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MapView {
    pub cx: i32,
    pub cy: i32,
    pub radius: i32,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChunkDraw {
    pub slot: usize,
    pub anchor: ChunkAnchor,
    /// Offset in normalized device coordinates.
    pub translation: [f32; 2],
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameReport {
    pub drawn: usize,
    pub rebuilt: u64,
    pub missing_corners: usize,
    pub shadowed: bool,
}

#[derive(Clone, Debug)]
pub struct FramePlan {
    pub corners: CornerSlots,
    pub draws: Vec<ChunkDraw>,
    pub report: FrameReport,
}

/// Screen offset of a chunk whose top-left tile is at `anchor`, with the
/// view centered on tile (`cx`, `cy`). Map rows grow downward, NDC Y up.
pub fn chunk_translation(anchor: ChunkAnchor, cx: i32, cy: i32, tile_size: f32) -> [f32; 2] {
    [
        (anchor.x - cx) as f32 * tile_size,
        (cy - anchor.y) as f32 * tile_size,
    ]
}

/// Claims the chunks touching the corners of `view` and lays them out.
pub fn plan_frame(
    cache: &mut ChunkCache,
    source: &ChunkSource<'_>,
    buffers: &mut impl ChunkBuffers,
    view: MapView,
) -> FramePlan {
    let builds_before = cache.stats.builds();
    let corners = cache.resolve_view(source, buffers, view.cx, view.cy, view.radius);

    let draws: Vec<ChunkDraw> = cache
        .placements()
        .map(|(slot, anchor)| ChunkDraw {
            slot,
            anchor,
            translation: chunk_translation(anchor, view.cx, view.cy, source.tile_size),
        })
        .collect();

    let report = FrameReport {
        drawn: draws.len(),
        rebuilt: cache.stats.builds() - builds_before,
        missing_corners: corners.iter().filter(|c| c.is_none()).count(),
        shadowed: false,
    };
    log::trace!(
        "frame at ({},{}) r{}: {} chunks, {} rebuilt",
        view.cx,
        view.cy,
        view.radius,
        report.drawn,
        report.rebuilt
    );
    FramePlan { corners, draws, report }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_is_relative_to_camera() {
        let anchor = ChunkAnchor { x: 16, y: 16 };
        assert_eq!(chunk_translation(anchor, 8, 8, 0.5), [4.0, -4.0]);
        assert_eq!(chunk_translation(anchor, 16, 16, 0.5), [0.0, 0.0]);
    }

    #[test]
    fn test_wrapped_anchor_stays_right_of_camera() {
        let wrapped = ChunkAnchor { x: 64, y: 0 };
        let [dx, _] = chunk_translation(wrapped, 56, 8, 0.25);
        assert_eq!(dx, 2.0);
    }
}
