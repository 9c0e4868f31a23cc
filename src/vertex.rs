use bytemuck::{Pod, Zeroable};

pub const LOC_POS: u32 = 0;
pub const LOC_UV: u32 = 1;

/// Position plus a four-component texture coordinate.
///
/// For static quads `uv` is `(u, v, 0, 0)`. Scrolling quads put the vertical
/// unit flag in `uv[2]` and the scroll source V in `uv[3]`.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TileVertex {
    pub position: [f32; 3],
    pub uv: [f32; 4],
}

pub const VERTICES_PER_QUAD: usize = 6;

impl TileVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        LOC_POS => Float32x3,
        LOC_UV => Float32x4
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TileVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Two triangles covering `draw_rect` (x, y, width, height) with `y` at the
/// bottom edge, textured by `uv_rect` (minU, minV, maxU, maxV).
pub fn quad_vertices(draw_rect: [f32; 4], uv_rect: [f32; 4]) -> [TileVertex; VERTICES_PER_QUAD] {
    emit(draw_rect, uv_rect, |_| [0.0, 0.0])
}

/// Like `quad_vertices`, but tags the quad so the fragment stage scrolls its
/// texture down from `scroll_source_v`. Bottom vertices carry a unit flag of
/// 1 and top vertices 0, giving the shader a per-tile scroll fraction.
pub fn scroll_quad_vertices(
    draw_rect: [f32; 4],
    uv_rect: [f32; 4],
    scroll_source_v: f32,
) -> [TileVertex; VERTICES_PER_QUAD] {
    emit(draw_rect, uv_rect, |bottom| {
        [if bottom { 1.0 } else { 0.0 }, scroll_source_v]
    })
}

fn emit(
    draw_rect: [f32; 4],
    uv_rect: [f32; 4],
    extra: impl Fn(bool) -> [f32; 2],
) -> [TileVertex; VERTICES_PER_QUAD] {
    let [x, y, w, h] = draw_rect;
    let [min_u, min_v, max_u, max_v] = uv_rect;
    let vertex = |px: f32, py: f32, u: f32, v: f32, bottom: bool| {
        let [p, q] = extra(bottom);
        TileVertex { position: [px, py, 0.0], uv: [u, v, p, q] }
    };

    let lower_left = vertex(x, y, min_u, max_v, true);
    let lower_right = vertex(x + w, y, max_u, max_v, true);
    let upper_right = vertex(x + w, y + h, max_u, min_v, false);
    let upper_left = vertex(x, y + h, min_u, min_v, false);

    [lower_left, lower_right, upper_right, upper_right, upper_left, lower_left]
}
