//! Streaming renderer for wrap-around tile maps.
//!
//! Map geometry lives in four chunk vertex buffers that are rebuilt on
//! demand as the view moves. Each frame the four view corners are resolved
//! to chunks, occluder shadows are rendered into an off-screen buffer, and
//! every resident chunk is drawn translated by its offset from the camera.

use web_time::Instant;

use crate::chunk_cache::{ChunkBuffers, ChunkCache, ChunkSource, CHUNK_CACHE_SIZE};
use crate::chunk_geometry::chunk_vertex_count;
use crate::compositor::{plan_frame, FrameReport, MapView};
use crate::config::RendererConfig;
use crate::draw_list::{DrawListId, DrawLists, TriangleWriter};
use crate::error::{ChunkWriteError, DrawListError, RendererError};
use crate::map::{BlockingGroups, TileMap};
use crate::map_pass::{
    MapPipelines, MeshDraw, ShadowBindings, TileBindings, TransformBindings, TransformUniform,
    IDENTITY_SLOT,
};
use crate::shadow_pass::{ShadowCasters, ShadowPass};
use crate::vertex::TileVertex;

const VERTEX_SIZE: usize = std::mem::size_of::<TileVertex>();

/// Chunk slot buffers written through the queue.
pub struct GpuChunkBuffers<'a> {
    pub queue: &'a wgpu::Queue,
    pub buffers: &'a [wgpu::Buffer],
}

impl ChunkBuffers for GpuChunkBuffers<'_> {
    fn write_chunk(&mut self, slot: usize, vertices: &[TileVertex]) -> Result<(), ChunkWriteError> {
        let buffer = self
            .buffers
            .get(slot)
            .ok_or(ChunkWriteError::NotAllocated(slot))?;
        let capacity = buffer.size() as usize / VERTEX_SIZE;
        if vertices.len() > capacity {
            return Err(ChunkWriteError::CapacityExceeded {
                slot,
                required: vertices.len(),
                capacity,
            });
        }
        self.queue
            .write_buffer(buffer, 0, bytemuck::cast_slice(vertices));
        Ok(())
    }
}

struct Shadows {
    pass: ShadowPass,
    bindings: ShadowBindings,
}

pub struct MapRenderer {
    config: RendererConfig,
    pipelines: MapPipelines,
    transforms: TransformBindings,
    shadows: Option<Shadows>,
    casters: ShadowCasters,
    tiles: Option<TileBindings>,
    cache: ChunkCache,
    chunk_buffers: Vec<wgpu::Buffer>,
    draw_lists: DrawLists,
    list_buffers: [[wgpu::Buffer; 2]; 2],
    viewport: Option<[f32; 4]>,
    tint: [f32; 4],
    started: Instant,
}

fn create_vertex_buffer(device: &wgpu::Device, label: &str, vertices: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (vertices.max(1) * VERTEX_SIZE) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl MapRenderer {
    /// Builds the tile and shadow programs. Fails if the device rejects any
    /// of them; no renderer exists after a failure.
    pub async fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        config: RendererConfig,
    ) -> Result<Self, RendererError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let pipelines = MapPipelines::new(device, format);
        let transforms = TransformBindings::new(device, &pipelines);
        transforms.write(queue, IDENTITY_SLOT, &TransformUniform::identity());

        let shadows = config.shadows_enabled.then(|| {
            let pass = ShadowPass::new(device, config.shadow_dim);
            let bindings = ShadowBindings::new(device, &pipelines, pass.view());
            Shadows { pass, bindings }
        });

        let draw_lists = DrawLists::new(config.main_list_quads, config.fx_list_quads);
        let list_buffers = DrawListId::ALL.map(|list| {
            let capacity = draw_lists.get(list).capacity();
            [0, 1].map(|i| {
                create_vertex_buffer(device, &format!("Draw List {} {i}", list.name()), capacity)
            })
        });

        if let Some(error) = device.pop_error_scope().await {
            log::error!("MapRenderer::new: {error}");
            return Err(RendererError::Setup {
                stage: "tile pipelines",
                message: error.to_string(),
            });
        }
        log::debug!(
            "map renderer ready: {} tiles across, shadows {}",
            config.view_tiles,
            if shadows.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            pipelines,
            transforms,
            shadows,
            casters: ShadowCasters::default(),
            tiles: None,
            cache: ChunkCache::new(0),
            chunk_buffers: Vec::new(),
            draw_lists,
            list_buffers,
            viewport: None,
            tint: [1.0; 4],
            started: Instant::now(),
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn cache(&self) -> &ChunkCache {
        &self.cache
    }

    /// Binds the tile colormap and material map. `v_dim` is the height of
    /// one tile in texture coordinates, the distance scrolling texels travel.
    pub fn set_tiles_texture(
        &mut self,
        device: &wgpu::Device,
        colormap: &wgpu::TextureView,
        material: &wgpu::TextureView,
        v_dim: f32,
    ) {
        self.tiles = Some(TileBindings::new(device, &self.pipelines, colormap, material, v_dim));
    }

    /// Restricts map drawing to a pixel rectangle (x, y, width, height).
    /// The shadow pass keeps its own viewport.
    pub fn set_viewport(&mut self, viewport: Option<[f32; 4]>) {
        self.viewport = viewport;
    }

    pub fn set_tint(&mut self, tint: [f32; 4]) {
        self.tint = tint;
    }

    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.config.clear_color = color;
    }

    /// Allocates chunk buffers sized for `map` and empties the cache.
    /// Retained occluders are forgotten.
    pub fn reset_map(&mut self, device: &wgpu::Device, map: &TileMap) {
        let dim = map.chunk_dim();
        let vertices = chunk_vertex_count(dim as usize);
        self.chunk_buffers = (0..CHUNK_CACHE_SIZE)
            .map(|i| create_vertex_buffer(device, &format!("Map Chunk {i}"), vertices))
            .collect();
        self.cache.reset(dim);
        self.casters.clear();
        log::debug!(
            "reset map {}x{}, chunk dimension {dim}, {vertices} vertices per chunk",
            map.width(),
            map.height()
        );
    }

    /// Starts a frame by clearing `target` to the configured color.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let _rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.config.clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    /// Draws the map around tile (`view.cx`, `view.cy`).
    ///
    /// `blocks` replaces the shadow occluders; `None` reuses the last ones.
    /// Chunks that cannot be resolved this frame are left out.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_map(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        map: &TileMap,
        uvs: &[[f32; 4]],
        blocks: Option<&BlockingGroups>,
        view: MapView,
    ) -> FrameReport {
        let Some(tiles) = &self.tiles else {
            log::warn!("draw_map called before set_tiles_texture");
            return FrameReport::default();
        };
        if self.chunk_buffers.is_empty() {
            log::warn!("draw_map called before reset_map");
            return FrameReport::default();
        }

        if self.casters.update(blocks) {
            if let Some(shadows) = &self.shadows {
                let uniform = self.casters.uniform(
                    self.config.viewer_height,
                    self.config.view_tiles,
                    shadows.pass.dim(),
                );
                shadows.pass.upload(queue, &uniform);
            }
        }
        let shadow = match &self.shadows {
            Some(shadows) if self.casters.is_active() => {
                shadows.pass.record(encoder);
                Some(&shadows.bindings)
            }
            _ => None,
        };

        let source = ChunkSource {
            map,
            uvs,
            tile_size: self.config.view_tile_size(),
        };
        let mut buffers = GpuChunkBuffers {
            queue,
            buffers: &self.chunk_buffers,
        };
        let plan = plan_frame(&mut self.cache, &source, &mut buffers, view);

        let time = self.started.elapsed().as_secs_f32();
        tiles.write_params(queue, self.tint, time, self.config.scroll_rate);

        let vertex_count = self.cache.vertex_count() as u32;
        let chunks: Vec<MeshDraw> = plan
            .draws
            .iter()
            .map(|draw| {
                self.transforms.write(
                    queue,
                    draw.slot,
                    &TransformUniform::translation(draw.translation),
                );
                MeshDraw {
                    transform_slot: draw.slot,
                    vertices: &self.chunk_buffers[draw.slot],
                    vertex_count,
                }
            })
            .collect();

        {
            let mut rpass = self.begin_load_pass(encoder, target, "Map Pass");
            self.pipelines
                .record_chunks(&mut rpass, &self.transforms, tiles, shadow, &chunks);
        }

        FrameReport {
            shadowed: shadow.is_some(),
            ..plan.report
        }
    }

    /// Starts writing a draw list. Its other buffer may still be in use
    /// by the previous frame and is left untouched.
    pub fn begin_tris(&mut self, list: DrawListId) -> Result<TriangleWriter, DrawListError> {
        self.draw_lists.begin(list).inspect_err(|error| {
            log::warn!("begin_tris: {error}");
        })
    }

    /// Uploads the written triangles into the list's front buffer.
    pub fn end_tris(
        &mut self,
        queue: &wgpu::Queue,
        list: DrawListId,
        writer: TriangleWriter,
    ) -> Result<(), DrawListError> {
        let (front, vertices) = self.draw_lists.end(list, writer).inspect_err(|error| {
            log::warn!("end_tris: {error}");
        })?;
        if !vertices.is_empty() {
            queue.write_buffer(
                &self.list_buffers[list.index()][front],
                0,
                bytemuck::cast_slice(&vertices[..]),
            );
        }
        Ok(())
    }

    /// Draws the last completed contents of `list` blended over `target`.
    pub fn draw_tris(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        list: DrawListId,
    ) {
        let draw_list = self.draw_lists.get(list);
        if draw_list.vertex_count() == 0 {
            return;
        }
        let Some(tiles) = &self.tiles else {
            log::warn!("draw_tris called before set_tiles_texture");
            return;
        };
        let mesh = MeshDraw {
            transform_slot: IDENTITY_SLOT,
            vertices: &self.list_buffers[list.index()][draw_list.front()],
            vertex_count: draw_list.vertex_count(),
        };
        let mut rpass = self.begin_load_pass(encoder, target, "Draw List Pass");
        self.pipelines
            .record_overlay(&mut rpass, &self.transforms, tiles, mesh);
    }

    fn begin_load_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        label: &str,
    ) -> wgpu::RenderPass<'e> {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        if let Some([x, y, w, h]) = self.viewport {
            rpass.set_viewport(x, y, w, h, 0.0, 1.0);
        }
        rpass
    }
}
