//! Procedural map and tile atlas for the interactive demo.

use wgpu::util::DeviceExt;

use crate::error::MapError;
use crate::map::{BlockingGroups, TileId, TileMap, TileRenderData};

pub const MAP_SIZE: u32 = 64;
pub const CHUNK_DIM: u32 = 16;

const ATLAS_COLUMNS: u32 = 4;
const ATLAS_ROWS: u32 = 2;
const TILE_PIXELS: u32 = 16;
/// Height of one atlas tile in texture coordinates.
pub const ATLAS_V_DIM: f32 = 1.0 / ATLAS_ROWS as f32;

pub const GRASS: TileId = 0;
pub const STONE: TileId = 1;
pub const WALL: TileId = 2;
pub const WATER: TileId = 3;

const VID_CURSOR: usize = 4;
const VID_MARKER: usize = 5;

pub struct DemoWorld {
    map: TileMap,
    uvs: Vec<[f32; 4]>,
}

impl DemoWorld {
    pub fn new() -> Result<Self, MapError> {
        let tiles = (0..MAP_SIZE * MAP_SIZE)
            .map(|i| terrain(i % MAP_SIZE, i / MAP_SIZE))
            .collect();
        let render = vec![
            TileRenderData::fixed(GRASS),
            TileRenderData::fixed(STONE),
            TileRenderData::fixed(WALL),
            TileRenderData::scrolling(WATER, WATER),
        ];
        let map = TileMap::new(MAP_SIZE, MAP_SIZE, CHUNK_DIM, CHUNK_DIM, tiles, render)?;
        let uvs = (0..ATLAS_COLUMNS * ATLAS_ROWS)
            .map(|vid| {
                let (col, row) = ((vid % ATLAS_COLUMNS) as f32, (vid / ATLAS_COLUMNS) as f32);
                let (du, dv) = (1.0 / ATLAS_COLUMNS as f32, ATLAS_V_DIM);
                [col * du, row * dv, (col + 1.0) * du, (row + 1.0) * dv]
            })
            .collect();
        Ok(Self { map, uvs })
    }

    pub fn map(&self) -> &TileMap {
        &self.map
    }

    pub fn uvs(&self) -> &[[f32; 4]] {
        &self.uvs
    }

    pub fn cursor_uv(&self) -> [f32; 4] {
        self.uvs[VID_CURSOR]
    }

    pub fn marker_uv(&self) -> [f32; 4] {
        self.uvs[VID_MARKER]
    }

    /// Walls within `radius` of (`cx`, `cy`) as full-tile occluders.
    pub fn occluders_near(&self, cx: i32, cy: i32, radius: i32) -> BlockingGroups {
        let mut blocks = BlockingGroups::default();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if self.map.tile(cx + dx, cy + dy) == WALL {
                    blocks.center += 1;
                    blocks.tile_pos.extend([dx as f32, dy as f32, 1.0]);
                }
            }
        }
        blocks
    }

    /// Uploads the colormap and material atlas textures.
    pub fn upload_atlas(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> (wgpu::TextureView, wgpu::TextureView) {
        let (colors, materials) = atlas_pixels();
        let upload = |label: &str, format: wgpu::TextureFormat, data: &[u8]| {
            let texture = device.create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: ATLAS_COLUMNS * TILE_PIXELS,
                        height: ATLAS_ROWS * TILE_PIXELS,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                data,
            );
            texture.create_view(&wgpu::TextureViewDescriptor::default())
        };
        (
            upload("Atlas Colormap", wgpu::TextureFormat::Rgba8UnormSrgb, &colors),
            upload("Atlas Material", wgpu::TextureFormat::Rgba8Unorm, &materials),
        )
    }
}

fn terrain(x: u32, y: u32) -> TileId {
    // A river, a walled yard and scattered paving.
    if (20..23).contains(&x) {
        WATER
    } else if (34..46).contains(&x) && (y == 30 || y == 40) && x != 40 {
        WALL
    } else if (x == 34 || x == 45) && (30..=40).contains(&y) {
        WALL
    } else if (x * 7 + y * 13) % 11 == 0 {
        STONE
    } else {
        GRASS
    }
}

/// RGBA8 colormap and material atlas pixels.
fn atlas_pixels() -> (Vec<u8>, Vec<u8>) {
    let width = ATLAS_COLUMNS * TILE_PIXELS;
    let height = ATLAS_ROWS * TILE_PIXELS;
    let mut colors = Vec::with_capacity((width * height * 4) as usize);
    let mut materials = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let vid = (y / TILE_PIXELS) * ATLAS_COLUMNS + x / TILE_PIXELS;
            let (tx, ty) = (x % TILE_PIXELS, y % TILE_PIXELS);
            let edge = tx == 0 || ty == 0 || tx == TILE_PIXELS - 1 || ty == TILE_PIXELS - 1;
            let color: [u8; 4] = match vid as usize {
                0 if (tx * 3 + ty * 5) % 7 == 0 => [70, 150, 60, 255],
                0 => [60, 130, 50, 255],
                1 if edge => [90, 90, 95, 255],
                1 => [140, 140, 145, 255],
                2 if ty % 4 == 0 || (tx + (ty / 4) * 4) % 8 == 0 => [80, 50, 40, 255],
                2 => [150, 80, 60, 255],
                3 if ty % 5 == 0 => [120, 170, 230, 255],
                3 => [40, 90, 180, 255],
                VID_CURSOR if edge => [255, 255, 255, 220],
                VID_CURSOR => [255, 255, 255, 30],
                VID_MARKER => {
                    let (dx, dy) = (tx as i32 * 2 - 15, ty as i32 * 2 - 15);
                    if dx * dx + dy * dy < 120 {
                        [220, 40, 40, 255]
                    } else {
                        [0, 0, 0, 0]
                    }
                }
                _ => [255, 0, 255, 255],
            };
            let material: [u8; 4] = if vid as TileId == WATER {
                [0, 0, 255, 255]
            } else {
                [0, 0, 0, 255]
            };
            colors.extend_from_slice(&color);
            materials.extend_from_slice(&material);
        }
    }
    (colors, materials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_has_every_terrain() {
        let world = DemoWorld::new().unwrap();
        for tile in [GRASS, STONE, WALL, WATER] {
            assert!(world.map().tiles().contains(&tile), "missing tile {tile}");
        }
        assert_eq!(world.uvs().len(), 8);
        assert_eq!(world.uvs()[5], [0.25, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn test_occluders_are_relative_to_camera() {
        let world = DemoWorld::new().unwrap();
        let blocks = world.occluders_near(35, 30, 1);
        assert_eq!(blocks.left + blocks.right, 0);
        assert_eq!(blocks.shape_count(), blocks.shapes().count());
        assert!(blocks.shapes().any(|p| p == [-1.0, 0.0, 1.0]));
        assert!(blocks.shapes().any(|p| p == [0.0, 0.0, 1.0]));
        assert!(world.occluders_near(5, 5, 2).tile_pos.is_empty());
    }

    #[test]
    fn test_only_water_is_marked_scrolling() {
        let (colors, materials) = atlas_pixels();
        assert_eq!(colors.len(), materials.len());
        let width = (ATLAS_COLUMNS * TILE_PIXELS) as usize;
        let water_texel = (3 * TILE_PIXELS as usize + 1) * 4;
        let grass_texel = 4;
        assert_eq!(materials[water_texel + 2], 255);
        assert_eq!(materials[grass_texel + 2], 0);
        assert_eq!(materials.len(), width * (ATLAS_ROWS * TILE_PIXELS) as usize * 4);
    }
}
