use foundation::math::Projection;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_MAP_URLS: [&str; 3] = [
    "https://a.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png",
    "https://b.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png",
    "https://c.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png",
];

/// Tunables of the map session. Every field has a default, so a partial
/// JSON document (or none at all) is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapConfig {
    /// Projection used when a context view names no `srs`.
    pub projection: Projection,
    pub base_map_urls: Vec<String>,
    /// Keeps the base map below every context layer.
    pub base_map_z_index: i32,
    /// Gutter, in pixels, requested around tiled WMS tiles.
    pub wms_tile_gutter: u32,
    /// Width and height of the GetFeatureInfo request, in pixels.
    pub feature_info_size: u32,
    /// Viewport assumed when fitting an extent before the surface has a size.
    pub fallback_viewport: [f64; 2],
    /// Zoom ceiling for context views that do not set their own.
    pub max_zoom: f64,
    /// Click tolerance for lines and polygon edges, in pixels.
    pub hit_tolerance: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            projection: Projection::WebMercator,
            base_map_urls: DEFAULT_BASE_MAP_URLS.iter().map(|u| u.to_string()).collect(),
            base_map_z_index: -999,
            wms_tile_gutter: 20,
            feature_info_size: 101,
            fallback_viewport: [100.0, 100.0],
            max_zoom: crate::view::DEFAULT_MAX_ZOOM,
            hit_tolerance: 3.0,
        }
    }
}

impl MapConfig {
    /// Replaces the base map templates with a comma separated list, ignoring
    /// blank entries. An all-blank list leaves the defaults in place.
    pub fn with_base_map_urls(mut self, list: &str) -> Self {
        let urls: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        if !urls.is_empty() {
            self.base_map_urls = urls;
        }
        self
    }
}
