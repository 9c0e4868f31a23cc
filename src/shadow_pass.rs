use bytemuck::{Pod, Zeroable};

use crate::map::BlockingGroups;

pub const MAX_SHADOW_SHAPES: usize = 128;
pub const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ShadowUniform {
    transform: [[f32; 4]; 4],
    viewer: [f32; 4],
    vport: [f32; 4],
    counts: [u32; 4],
    shapes: [[f32; 4]; MAX_SHADOW_SHAPES],
}

/// Occluder shapes retained between frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShadowCasters {
    counts: [u32; 3],
    shapes: Vec<[f32; 3]>,
}

impl ShadowCasters {
    /// Takes new shapes from `blocks`, or keeps the previous ones on `None`.
    /// Returns whether the shapes were replaced.
    pub fn update(&mut self, blocks: Option<&BlockingGroups>) -> bool {
        let Some(blocks) = blocks else {
            return false;
        };
        let shapes: Vec<[f32; 3]> = blocks.shapes().take(MAX_SHADOW_SHAPES).collect();
        if shapes.len() < blocks.shape_count() {
            log::warn!(
                "shadow pass keeps {} of {} occluders",
                shapes.len(),
                blocks.shape_count()
            );
        }
        // Trim the groups in order so the counts cover exactly the kept shapes.
        let mut budget = shapes.len() as u32;
        let mut take = |count: u32| {
            let kept = count.min(budget);
            budget -= kept;
            kept
        };
        self.counts = [take(blocks.left), take(blocks.center), take(blocks.right)];
        self.shapes = shapes;
        true
    }

    pub fn clear(&mut self) {
        self.counts = [0; 3];
        self.shapes.clear();
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn counts(&self) -> [u32; 3] {
        self.counts
    }

    pub fn is_active(&self) -> bool {
        !self.shapes.is_empty()
    }

    pub fn uniform(&self, viewer_height: f32, view_tiles: u32, shadow_dim: u32) -> ShadowUniform {
        let transform = cgmath::ortho::<f32>(-1.0, 1.0, -1.0, 1.0, -1.0, 1.0);
        let mut uniform = ShadowUniform {
            transform: transform.into(),
            viewer: [0.0, 0.0, viewer_height, view_tiles as f32 * 0.5],
            vport: [0.0, 0.0, shadow_dim as f32, shadow_dim as f32],
            counts: [self.counts[0], self.counts[1], self.counts[2], 0],
            ..ShadowUniform::zeroed()
        };
        for (dst, &[x, y, height]) in uniform.shapes.iter_mut().zip(&self.shapes) {
            *dst = [x, y, height, 0.0];
        }
        uniform
    }
}

/// Renders occluder shadows into an off-screen square texture.
pub struct ShadowPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    view: wgpu::TextureView,
    dim: u32,
}

impl ShadowPass {
    pub fn new(device: &wgpu::Device, dim: u32) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shadow: Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });
        let shader = device.create_shader_module(wgpu::include_wgsl!("shadowcast.wgsl"));
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(SHADOW_FORMAT.into())],
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Uniform Buffer"),
            size: std::mem::size_of::<ShadowUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow: Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Texture"),
            size: wgpu::Extent3d {
                width: dim,
                height: dim,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SHADOW_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            view,
            dim,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn dim(&self) -> u32 {
        self.dim
    }

    pub fn upload(&self, queue: &wgpu::Queue, uniform: &ShadowUniform) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniform));
    }

    pub fn record(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Shadow Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_viewport(0.0, 0.0, self.dim as f32, self.dim as f32, 0.0, 1.0);
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.uniform_bind_group, &[]);
        rpass.draw(0..6, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(left: u32, center: u32, right: u32) -> BlockingGroups {
        let count = (left + center + right) as usize;
        BlockingGroups {
            left,
            center,
            right,
            tile_pos: (0..count).flat_map(|i| [i as f32, 1.0, 1.0]).collect(),
        }
    }

    #[test]
    fn test_omitted_blocks_keep_previous_shapes() {
        let mut casters = ShadowCasters::default();
        assert!(casters.update(Some(&groups(1, 2, 1))));
        assert!(!casters.update(None));
        assert_eq!(casters.shape_count(), 4);
        assert!(casters.is_active());
    }

    #[test]
    fn test_empty_groups_disable_shadows() {
        let mut casters = ShadowCasters::default();
        casters.update(Some(&groups(0, 3, 0)));
        casters.update(Some(&BlockingGroups::default()));
        assert!(!casters.is_active());
    }

    #[test]
    fn test_excess_shapes_are_trimmed_from_the_last_group() {
        let mut casters = ShadowCasters::default();
        casters.update(Some(&groups(100, 20, 30)));
        assert_eq!(casters.shape_count(), MAX_SHADOW_SHAPES);
        assert_eq!(casters.counts(), [100, 20, 8]);
    }

    #[test]
    fn test_uniform_carries_shapes_and_counts() {
        let mut casters = ShadowCasters::default();
        casters.update(Some(&groups(1, 1, 0)));
        let uniform = casters.uniform(11.0, 11, 512);
        assert_eq!(uniform.counts, [1, 1, 0, 0]);
        assert_eq!(uniform.shapes[1], [1.0, 1.0, 1.0, 0.0]);
        assert_eq!(uniform.shapes[2], [0.0; 4]);
        assert_eq!(uniform.viewer, [0.0, 0.0, 11.0, 5.5]);
        assert_eq!(uniform.vport[2], 512.0);
    }

    #[test]
    fn test_clear_forgets_shapes() {
        let mut casters = ShadowCasters::default();
        casters.update(Some(&groups(2, 0, 0)));
        casters.clear();
        assert_eq!(casters, ShadowCasters::default());
    }
}
