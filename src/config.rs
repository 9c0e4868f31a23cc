//! Renderer tunables, overridable from `TILEMAP_*` environment variables.

pub const VIEW_TILES_ENV: &str = "TILEMAP_VIEW_TILES";
pub const SHADOW_DIM_ENV: &str = "TILEMAP_SHADOW_DIM";
pub const MAIN_LIST_QUADS_ENV: &str = "TILEMAP_MAIN_LIST_QUADS";
pub const FX_LIST_QUADS_ENV: &str = "TILEMAP_FX_LIST_QUADS";
pub const SCROLL_RATE_ENV: &str = "TILEMAP_SCROLL_RATE";
pub const DISABLE_SHADOWS_ENV: &str = "TILEMAP_DISABLE_SHADOWS";

#[derive(Clone, Debug, PartialEq)]
pub struct RendererConfig {
    /// Tiles spanning the viewport width.
    pub view_tiles: u32,
    /// Edge length of the square shadow buffer in pixels.
    pub shadow_dim: u32,
    pub main_list_quads: usize,
    pub fx_list_quads: usize,
    /// Scroll speed of flowing tiles in tiles per second.
    pub scroll_rate: f32,
    /// Height of the light above the map for the shadow pass.
    pub viewer_height: f32,
    pub shadows_enabled: bool,
    pub clear_color: wgpu::Color,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            view_tiles: 11,
            shadow_dim: 512,
            main_list_quads: 400,
            fx_list_quads: 20,
            scroll_rate: 0.3,
            viewer_height: 11.0,
            shadows_enabled: true,
            clear_color: wgpu::Color::BLACK,
        }
    }
}

impl RendererConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let usize_var = |name: &str, default_value: usize| {
            let raw = lookup(name);
            let value = parse_positive::<usize>(raw.as_deref());
            if raw.is_some() && value.is_none() {
                log::warn!("ignoring invalid {name}, using {default_value}");
            }
            value.unwrap_or(default_value)
        };

        let scroll_raw = lookup(SCROLL_RATE_ENV);
        let scroll_rate = match parse_positive::<f32>(scroll_raw.as_deref()) {
            Some(rate) => rate,
            None => {
                if scroll_raw.is_some() {
                    log::warn!("ignoring invalid {SCROLL_RATE_ENV}, using {}", defaults.scroll_rate);
                }
                defaults.scroll_rate
            }
        };

        Self {
            view_tiles: usize_var(VIEW_TILES_ENV, defaults.view_tiles as usize) as u32,
            shadow_dim: usize_var(SHADOW_DIM_ENV, defaults.shadow_dim as usize) as u32,
            main_list_quads: usize_var(MAIN_LIST_QUADS_ENV, defaults.main_list_quads),
            fx_list_quads: usize_var(FX_LIST_QUADS_ENV, defaults.fx_list_quads),
            scroll_rate,
            shadows_enabled: !flag_enabled(lookup(DISABLE_SHADOWS_ENV).as_deref()),
            ..defaults
        }
    }

    /// Size of one tile in normalized device coordinates.
    pub fn view_tile_size(&self) -> f32 {
        2.0 / self.view_tiles as f32
    }
}

fn flag_enabled(raw: Option<&str>) -> bool {
    match raw {
        Some(v) => {
            let s = v.trim().to_ascii_lowercase();
            !(s.is_empty() || s == "0" || s == "false" || s == "off" || s == "no")
        }
        None => false,
    }
}

fn parse_positive<T>(raw: Option<&str>) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    raw?.trim().parse::<T>().ok().filter(|v| *v > T::default())
}
