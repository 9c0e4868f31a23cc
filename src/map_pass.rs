use bytemuck::{Pod, Zeroable};
use cgmath::{Matrix4, SquareMatrix, Vector3};

use crate::chunk_cache::CHUNK_CACHE_SIZE;
use crate::vertex::TileVertex;

const TRANSFORM_GROUP_ID: u32 = 0;
const TILES_GROUP_ID: u32 = 1;
const CMAP_IDX: u32 = 0;
const MMAP_IDX: u32 = 1;
const TILE_SAMPLER_IDX: u32 = 2;
const TILE_PARAMS_IDX: u32 = 3;
const SHADOW_GROUP_ID: u32 = 2;
const SHADOW_MAP_IDX: u32 = 0;
const SHADOW_SAMPLER_IDX: u32 = 1;

/// One transform per chunk slot plus the identity used by draw lists.
pub const TRANSFORM_SLOTS: usize = CHUNK_CACHE_SIZE + 1;
pub const IDENTITY_SLOT: usize = CHUNK_CACHE_SIZE;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformUniform {
    matrix: [[f32; 4]; 4],
}

impl TransformUniform {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::<f32>::identity().into(),
        }
    }

    pub fn translation(offset: [f32; 2]) -> Self {
        Self {
            matrix: Matrix4::from_translation(Vector3::new(offset[0], offset[1], 0.0)).into(),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TileParamsUniform {
    pub tint: [f32; 4],
    /// Texture tile height, seconds, scroll rate, unused.
    pub scroll: [f32; 4],
}

/// The three tile programs: opaque colormap, opaque colormap with shadows,
/// and blended colormap for draw lists.
pub struct MapPipelines {
    colormap: wgpu::RenderPipeline,
    world: wgpu::RenderPipeline,
    overlay: wgpu::RenderPipeline,
    transform_layout: wgpu::BindGroupLayout,
    tiles_layout: wgpu::BindGroupLayout,
    shadow_layout: wgpu::BindGroupLayout,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

impl MapPipelines {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let transform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Map: Transform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<TransformUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let tiles_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Map: Tiles Bind Group Layout"),
            entries: &[
                texture_entry(CMAP_IDX),
                texture_entry(MMAP_IDX),
                sampler_entry(TILE_SAMPLER_IDX),
                wgpu::BindGroupLayoutEntry {
                    binding: TILE_PARAMS_IDX,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Map: Shadow Bind Group Layout"),
            entries: &[texture_entry(SHADOW_MAP_IDX), sampler_entry(SHADOW_SAMPLER_IDX)],
        });

        let colormap_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Map: Colormap Pipeline Layout"),
            bind_group_layouts: &[&transform_layout, &tiles_layout],
            push_constant_ranges: &[],
        });
        let world_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Map: World Pipeline Layout"),
            bind_group_layouts: &[&transform_layout, &tiles_layout, &shadow_layout],
            push_constant_ranges: &[],
        });

        let shader = device.create_shader_module(wgpu::include_wgsl!("tiles.wgsl"));
        let build = |label: &str,
                     layout: &wgpu::PipelineLayout,
                     fragment_entry: &str,
                     blend: Option<wgpu::BlendState>| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[TileVertex::layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(fragment_entry),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let colormap = build("Map: Colormap Pipeline", &colormap_layout, "fs_colormap", None);
        let world = build("Map: World Pipeline", &world_layout, "fs_world", None);
        let overlay = build(
            "Map: Overlay Pipeline",
            &colormap_layout,
            "fs_colormap",
            Some(wgpu::BlendState::ALPHA_BLENDING),
        );

        Self {
            colormap,
            world,
            overlay,
            transform_layout,
            tiles_layout,
            shadow_layout,
        }
    }
}

/// Per-slot transforms in one uniform buffer, selected by dynamic offset.
pub struct TransformBindings {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
}

impl TransformBindings {
    pub fn new(device: &wgpu::Device, pipelines: &MapPipelines) -> Self {
        let stride = transform_stride(device.limits().min_uniform_buffer_offset_alignment);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Map: Transform Buffer"),
            size: stride * TRANSFORM_SLOTS as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Map: Transform Bind Group"),
            layout: &pipelines.transform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<TransformUniform>() as u64),
                }),
            }],
        });
        Self {
            buffer,
            bind_group,
            stride,
        }
    }

    pub fn offset(&self, slot: usize) -> u32 {
        (self.stride * slot as u64) as u32
    }

    pub fn write(&self, queue: &wgpu::Queue, slot: usize, transform: &TransformUniform) {
        queue.write_buffer(
            &self.buffer,
            self.offset(slot) as u64,
            bytemuck::bytes_of(transform),
        );
    }
}

/// Distance between transforms, rounded up to the device's offset alignment.
pub fn transform_stride(alignment: u32) -> u64 {
    let size = std::mem::size_of::<TransformUniform>() as u64;
    let alignment = alignment.max(1) as u64;
    size.div_ceil(alignment) * alignment
}

/// Tile colormap, material map and the params read by every tile program.
pub struct TileBindings {
    bind_group: wgpu::BindGroup,
    params: wgpu::Buffer,
    v_dim: f32,
}

impl TileBindings {
    pub fn new(
        device: &wgpu::Device,
        pipelines: &MapPipelines,
        colormap: &wgpu::TextureView,
        material: &wgpu::TextureView,
        v_dim: f32,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Map: Tile Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Map: Tile Params Buffer"),
            size: std::mem::size_of::<TileParamsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Map: Tiles Bind Group"),
            layout: &pipelines.tiles_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: CMAP_IDX,
                    resource: wgpu::BindingResource::TextureView(colormap),
                },
                wgpu::BindGroupEntry {
                    binding: MMAP_IDX,
                    resource: wgpu::BindingResource::TextureView(material),
                },
                wgpu::BindGroupEntry {
                    binding: TILE_SAMPLER_IDX,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: TILE_PARAMS_IDX,
                    resource: params.as_entire_binding(),
                },
            ],
        });
        Self {
            bind_group,
            params,
            v_dim,
        }
    }

    pub fn write_params(&self, queue: &wgpu::Queue, tint: [f32; 4], time: f32, scroll_rate: f32) {
        let uniform = TileParamsUniform {
            tint,
            scroll: [self.v_dim, time, scroll_rate, 0.0],
        };
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&uniform));
    }
}

pub struct ShadowBindings {
    bind_group: wgpu::BindGroup,
}

impl ShadowBindings {
    pub fn new(
        device: &wgpu::Device,
        pipelines: &MapPipelines,
        shadow_map: &wgpu::TextureView,
    ) -> Self {
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Map: Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Map: Shadow Bind Group"),
            layout: &pipelines.shadow_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: SHADOW_MAP_IDX,
                    resource: wgpu::BindingResource::TextureView(shadow_map),
                },
                wgpu::BindGroupEntry {
                    binding: SHADOW_SAMPLER_IDX,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });
        Self { bind_group }
    }
}

/// Geometry for one draw: the slot whose transform applies, its vertex
/// buffer and how many vertices to draw.
pub struct MeshDraw<'a> {
    pub transform_slot: usize,
    pub vertices: &'a wgpu::Buffer,
    pub vertex_count: u32,
}

impl<'a> MapPipelines {
    /// Draws map chunks opaque, through the shadowed program when
    /// `shadow` is given.
    pub fn record_chunks<'pass>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'pass>,
        transforms: &'a TransformBindings,
        tiles: &'a TileBindings,
        shadow: Option<&'a ShadowBindings>,
        chunks: &[MeshDraw<'a>],
    ) where
        'a: 'pass,
    {
        match shadow {
            Some(shadow) => {
                rpass.set_pipeline(&self.world);
                rpass.set_bind_group(SHADOW_GROUP_ID, &shadow.bind_group, &[]);
            }
            None => rpass.set_pipeline(&self.colormap),
        }
        rpass.set_bind_group(TILES_GROUP_ID, &tiles.bind_group, &[]);
        for chunk in chunks {
            rpass.set_bind_group(
                TRANSFORM_GROUP_ID,
                &transforms.bind_group,
                &[transforms.offset(chunk.transform_slot)],
            );
            rpass.set_vertex_buffer(0, chunk.vertices.slice(..));
            rpass.draw(0..chunk.vertex_count, 0..1);
        }
    }

    /// Draws a triangle list blended over the map with the identity transform.
    pub fn record_overlay<'pass>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'pass>,
        transforms: &'a TransformBindings,
        tiles: &'a TileBindings,
        mesh: MeshDraw<'a>,
    ) where
        'a: 'pass,
    {
        rpass.set_pipeline(&self.overlay);
        rpass.set_bind_group(
            TRANSFORM_GROUP_ID,
            &transforms.bind_group,
            &[transforms.offset(mesh.transform_slot)],
        );
        rpass.set_bind_group(TILES_GROUP_ID, &tiles.bind_group, &[]);
        rpass.set_vertex_buffer(0, mesh.vertices.slice(..));
        rpass.draw(0..mesh.vertex_count, 0..1);
    }
}
