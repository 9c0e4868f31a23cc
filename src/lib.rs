pub mod chunk_cache;
pub mod chunk_geometry;
pub mod compositor;
pub mod config;
mod demo_world;
pub mod draw_list;
pub mod error;
pub mod map;
pub mod map_pass;
pub mod renderer;
pub mod shadow_pass;
pub mod toroidal;
pub mod vertex;


use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

pub use crate::compositor::{FrameReport, MapView};
pub use crate::config::RendererConfig;
pub use crate::draw_list::{DrawListId, TriangleWriter};
pub use crate::map::{BlockingGroups, TileId, TileMap, TileRenderData};
pub use crate::renderer::MapRenderer;

use crate::demo_world::{DemoWorld, ATLAS_V_DIM};
use crate::toroidal::wrap_coord;

/// Camera state and overlay content for the demo window.
struct DemoView {
    cx: i32,
    cy: i32,
    radius: i32,
    /// Tile under the mouse, relative to the camera.
    hover: Option<[i32; 2]>,
    occluders_dirty: bool,
}

impl DemoView {
    fn step(&mut self, dx: i32, dy: i32, world: &DemoWorld) {
        let map = world.map();
        self.cx = wrap_coord(self.cx + dx, map.width() as i32).0;
        self.cy = wrap_coord(self.cy + dy, map.height() as i32).0;
        self.occluders_dirty = true;
    }

    fn write_overlays(
        &self,
        renderer: &mut MapRenderer,
        queue: &wgpu::Queue,
        world: &DemoWorld,
    ) -> Result<(), error::DrawListError> {
        let ts = renderer.config().view_tile_size();
        let tile_rect = |[x, y]: [i32; 2]| {
            [x as f32 * ts - 0.5 * ts, y as f32 * ts - 0.5 * ts, ts, ts]
        };

        let mut writer = renderer.begin_tris(DrawListId::Main)?;
        let marker = writer.emit_quad(tile_rect([0, 0]), world.marker_uv());
        renderer.end_tris(queue, DrawListId::Main, writer)?;
        marker?;

        let mut writer = renderer.begin_tris(DrawListId::Fx)?;
        let cursor = match self.hover {
            Some([x, y]) => writer.emit_quad(tile_rect([x, -y]), world.cursor_uv()),
            None => Ok(()),
        };
        renderer.end_tris(queue, DrawListId::Fx, writer)?;
        cursor
    }
}

async fn arun() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title("tilemap-renderer")
        .build(&event_loop)?;

    let size = window.inner_size();

    let instance = wgpu::Instance::default();

    let surface = instance.create_surface(&window)?;
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            // Request an adapter which can render to our surface
            compatible_surface: Some(&surface),
        })
        .await
        .ok_or("no graphics adapter can present to the window")?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults()
                    .using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
            },
            None,
        )
        .await?;

    let mut config = surface
        .get_default_config(&adapter, size.width.max(1), size.height.max(1))
        .ok_or("surface is not supported by the adapter")?;
    surface.configure(&device, &config);

    let world = DemoWorld::new()?;
    let renderer_config = RendererConfig::from_env();
    let radius = (renderer_config.view_tiles as i32 + 1) / 2;
    let mut renderer = MapRenderer::new(&device, &queue, config.format, renderer_config).await?;
    let (colormap, material) = world.upload_atlas(&device, &queue);
    renderer.set_tiles_texture(&device, &colormap, &material, ATLAS_V_DIM);
    renderer.reset_map(&device, world.map());

    let mut view = DemoView {
        cx: 40,
        cy: 35,
        radius,
        hover: None,
        occluders_dirty: true,
    };

    let window = &window;

    let _instance = instance;
    let _adapter = adapter;

    event_loop.run(move |event, target| {
        match event {
            Event::AboutToWait => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(error) => {
                        log::warn!("get_current_texture: {error}");
                        surface.configure(&device, &config);
                        return;
                    }
                };
                let target_view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: None,
                });

                let blocks = view
                    .occluders_dirty
                    .then(|| world.occluders_near(view.cx, view.cy, view.radius));
                view.occluders_dirty = false;

                renderer.clear(&mut encoder, &target_view);
                let report = renderer.draw_map(
                    &queue,
                    &mut encoder,
                    &target_view,
                    world.map(),
                    world.uvs(),
                    blocks.as_ref(),
                    MapView {
                        cx: view.cx,
                        cy: view.cy,
                        radius: view.radius,
                    },
                );
                if report.rebuilt > 0 || report.missing_corners > 0 {
                    log::debug!("{report:?}, {:?}", renderer.cache().stats);
                }

                if let Err(error) = view.write_overlays(&mut renderer, &queue, &world) {
                    log::warn!("overlay: {error}");
                }
                renderer.draw_tris(&mut encoder, &target_view, DrawListId::Main);
                renderer.draw_tris(&mut encoder, &target_view, DrawListId::Fx);

                queue.submit(Some(encoder.finish()));
                frame.present();

                window.request_redraw();
            }
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::Resized(new_size) => {
                    // Reconfigure the surface with the new size
                    config.width = new_size.width.max(1);
                    config.height = new_size.height.max(1);
                    surface.configure(&device, &config);
                    // On macos the window needs to be redrawn manually after resizing
                    window.request_redraw();
                }
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(code),
                            state: ElementState::Pressed,
                            ..
                        },
                    ..
                } => match code {
                    KeyCode::ArrowLeft => view.step(-1, 0, &world),
                    KeyCode::ArrowRight => view.step(1, 0, &world),
                    KeyCode::ArrowUp => view.step(0, -1, &world),
                    KeyCode::ArrowDown => view.step(0, 1, &world),
                    KeyCode::Escape => target.exit(),
                    _ => {}
                },
                WindowEvent::CursorMoved { position, .. } => {
                    let ts = renderer.config().view_tile_size();
                    let ndc_x = position.x as f32 / config.width as f32 * 2.0 - 1.0;
                    let ndc_y = 1.0 - position.y as f32 / config.height as f32 * 2.0;
                    // Screen up is map row minus one.
                    view.hover = Some([(ndc_x / ts).round() as i32, -(ndc_y / ts).round() as i32]);
                }
                WindowEvent::CursorLeft { .. } => view.hover = None,
                WindowEvent::CloseRequested => target.exit(),
                _ => {}
            },
            _ => {}
        }
    })?;
    Ok(())
}

pub fn run() {
    if let Err(error) = pollster::block_on(arun()) {
        log::error!("{error}");
        eprintln!("tilemap-renderer: {error}");
    }
}
