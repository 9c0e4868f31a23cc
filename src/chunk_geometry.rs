//! Builds the vertex stream for one chunk of map tiles.

use crate::error::GeometryError;
use crate::map::{TileId, TileRenderData};
use crate::vertex::{quad_vertices, scroll_quad_vertices, TileVertex, VERTICES_PER_QUAD};

pub fn chunk_vertex_count(dim: usize) -> usize {
    dim * dim * VERTICES_PER_QUAD
}

/// Writes `dim * dim` tile quads into `target`, returning the vertex count.
///
/// `tiles` starts at the chunk's top-left tile and advances `stride` entries
/// per tile row. The center of the top-left tile sits at the origin, columns
/// step right and rows step down by `tile_size`. Everything is validated
/// before the first write, so an error leaves `target` untouched.
pub fn build_chunk_geometry(
    tiles: &[TileId],
    dim: usize,
    stride: usize,
    render: &[TileRenderData],
    uvs: &[[f32; 4]],
    tile_size: f32,
    target: &mut [TileVertex],
) -> Result<usize, GeometryError> {
    let vertex_count = chunk_vertex_count(dim);
    if target.len() < vertex_count {
        return Err(GeometryError::TargetTooSmall {
            required: vertex_count,
            available: target.len(),
        });
    }
    if dim == 0 {
        return Ok(0);
    }
    let required = (dim - 1) * stride + dim;
    if tiles.len() < required || stride < dim {
        return Err(GeometryError::TilesOutOfRange {
            required,
            available: tiles.len(),
        });
    }
    let rows = || (0..dim).map(move |y| &tiles[y * stride..y * stride + dim]);
    for row in rows() {
        for &tile in row {
            lookup(tile, render, uvs)?;
        }
    }

    let start = -0.5 * tile_size;
    let mut draw_rect = [start, start, tile_size, tile_size];
    let mut quads = target[..vertex_count].chunks_exact_mut(VERTICES_PER_QUAD);

    for row in rows() {
        draw_rect[0] = start;
        for &tile in row {
            let (uv, scroll_v) = lookup(tile, render, uvs)?;
            let quad = match scroll_v {
                Some(source_v) => scroll_quad_vertices(draw_rect, uv, source_v),
                None => quad_vertices(draw_rect, uv),
            };
            if let Some(out) = quads.next() {
                out.copy_from_slice(&quad);
            }
            draw_rect[0] += draw_rect[2];
        }
        draw_rect[1] -= draw_rect[3];
    }

    Ok(vertex_count)
}

/// Uv rect of a tile and, for scrolling tiles, the V its texture scrolls from.
fn lookup(
    tile: TileId,
    render: &[TileRenderData],
    uvs: &[[f32; 4]],
) -> Result<([f32; 4], Option<f32>), GeometryError> {
    let data = render
        .get(tile as usize)
        .ok_or(GeometryError::MissingRenderData(tile))?;
    let uv = *uvs
        .get(data.vid as usize)
        .ok_or(GeometryError::MissingUv(data.vid))?;
    let scroll_v = match data.scroll_source() {
        Some(source) => Some(
            uvs.get(source as usize)
                .ok_or(GeometryError::MissingUv(source))?[1],
        ),
        None => None,
    };
    Ok((uv, scroll_v))
}
