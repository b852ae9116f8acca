//! Raster sources: untiled and tiled WMS, WMTS and XYZ templates.
//!
//! Nothing here renders; sources only know how to name the images an engine
//! would request for a given extent or tile.

use foundation::Extent;
use foundation::math::{Coordinate, DEFAULT_TILE_SIZE, Projection};
use url::Url;

/// Position of a tile in the standard top-left origin grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Tile of zoom level `z` covering `coordinate`, or `None` outside the
    /// projection extent or past the deepest addressable level.
    pub fn containing(coordinate: Coordinate, z: u32, projection: Projection) -> Option<Self> {
        let world = projection.extent();
        if !world.contains(coordinate) {
            return None;
        }
        let tiles = 2u32.checked_pow(z)?;
        let tile_size = world.width() / f64::from(tiles);
        let max = tiles - 1;
        let x = ((coordinate[0] - world.min[0]) / tile_size).floor() as u32;
        let y = ((world.max[1] - coordinate[1]) / tile_size).floor() as u32;
        Some(Self {
            z,
            x: x.min(max),
            y: y.min(max),
        })
    }

    /// Extent of the tile, in `projection` units.
    pub fn extent(&self, projection: Projection) -> Extent {
        let world = projection.extent();
        let tile_size = world.width() / 2f64.powf(f64::from(self.z));
        let min_x = world.min[0] + f64::from(self.x) * tile_size;
        let max_y = world.max[1] - f64::from(self.y) * tile_size;
        Extent::new([min_x, max_y - tile_size], [min_x + tile_size, max_y])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WmsParams {
    pub url: String,
    /// Value of `LAYERS`.
    pub layers: String,
}

impl WmsParams {
    pub fn new(url: impl Into<String>, layers: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            layers: layers.into(),
        }
    }

    /// Base request shared by GetMap and GetFeatureInfo.
    pub(crate) fn request(
        &self,
        request: &str,
        extent: Extent,
        size: [u32; 2],
        projection: Projection,
    ) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.url)?;
        url.query_pairs_mut()
            .append_pair("SERVICE", "WMS")
            .append_pair("VERSION", "1.3.0")
            .append_pair("REQUEST", request)
            .append_pair("FORMAT", "image/png")
            .append_pair("TRANSPARENT", "true")
            .append_pair("LAYERS", &self.layers)
            .append_pair("WIDTH", &size[0].to_string())
            .append_pair("HEIGHT", &size[1].to_string())
            .append_pair("CRS", projection.code())
            .append_pair("STYLES", "")
            .append_pair("BBOX", &wms_bbox(extent, projection));
        Ok(url)
    }

    pub fn get_map_url(
        &self,
        extent: Extent,
        size: [u32; 2],
        projection: Projection,
    ) -> Result<String, url::ParseError> {
        Ok(self.request("GetMap", extent, size, projection)?.into())
    }
}

/// WMS 1.3.0 uses latitude first for geographic CRS.
fn wms_bbox(extent: Extent, projection: Projection) -> String {
    let [min_x, min_y, max_x, max_y] = extent.to_array();
    let values = match projection {
        Projection::Geographic => [min_y, min_x, max_y, max_x],
        Projection::WebMercator => [min_x, min_y, max_x, max_y],
    };
    values.map(|v| v.to_string()).join(",")
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Wms(WmsParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileLayer {
    pub source: TileSource,
    /// Extra pixels requested around each tile.
    pub gutter: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileSource {
    Wms(WmsParams),
    Wmts(WmtsSource),
    Xyz(XyzSource),
}

impl TileSource {
    pub fn tile_url(
        &self,
        tile: TileCoord,
        gutter: u32,
        projection: Projection,
    ) -> Result<Option<String>, url::ParseError> {
        match self {
            TileSource::Wms(params) => {
                let resolution = tile.extent(projection).width() / DEFAULT_TILE_SIZE;
                let g = f64::from(gutter) * resolution;
                let e = tile.extent(projection);
                let padded = Extent::new([e.min[0] - g, e.min[1] - g], [e.max[0] + g, e.max[1] + g]);
                let side = DEFAULT_TILE_SIZE as u32 + 2 * gutter;
                params.get_map_url(padded, [side, side], projection).map(Some)
            }
            TileSource::Wmts(source) => source.tile_url(tile).map(Some),
            TileSource::Xyz(source) => Ok(source.tile_url(tile)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WmtsSource {
    pub urls: Vec<String>,
    pub layer: Option<String>,
    pub matrix_set: String,
}

impl WmtsSource {
    /// KVP GetTile request, using the zoom level as tile matrix identifier.
    pub fn tile_url(&self, tile: TileCoord) -> Result<String, url::ParseError> {
        let base = pick(&self.urls, tile).unwrap_or_default();
        let mut url = Url::parse(base)?;
        url.query_pairs_mut()
            .append_pair("SERVICE", "WMTS")
            .append_pair("REQUEST", "GetTile")
            .append_pair("VERSION", "1.0.0")
            .append_pair("LAYER", self.layer.as_deref().unwrap_or_default())
            .append_pair("STYLE", "")
            .append_pair("FORMAT", "image/png")
            .append_pair("TILEMATRIXSET", &self.matrix_set)
            .append_pair("TILEMATRIX", &tile.z.to_string())
            .append_pair("TILEROW", &tile.y.to_string())
            .append_pair("TILECOL", &tile.x.to_string());
        Ok(url.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct XyzSource {
    /// Expanded templates; `{a-c}` style ranges are already resolved.
    pub urls: Vec<String>,
    pub cross_origin: Option<String>,
}

impl XyzSource {
    pub fn new(templates: &[String]) -> Self {
        Self {
            urls: templates.iter().flat_map(|t| expand_url(t)).collect(),
            cross_origin: None,
        }
    }

    pub fn with_cross_origin(mut self, value: impl Into<String>) -> Self {
        self.cross_origin = Some(value.into());
        self
    }

    pub fn tile_url(&self, tile: TileCoord) -> Option<String> {
        let template = pick(&self.urls, tile)?;
        Some(
            template
                .replace("{z}", &tile.z.to_string())
                .replace("{x}", &tile.x.to_string())
                .replace("{y}", &tile.y.to_string()),
        )
    }
}

/// Spreads tiles over the available hosts, the same tile always picking the
/// same one.
fn pick(urls: &[String], tile: TileCoord) -> Option<&str> {
    if urls.is_empty() {
        return None;
    }
    let index = ((tile.x as usize) + (tile.y as usize)) % urls.len();
    Some(urls[index].as_str())
}

/// Expands one `{a-c}` or `{1-4}` range in a URL template into one URL per
/// value. Templates without a range come back unchanged.
pub fn expand_url(template: &str) -> Vec<String> {
    let Some(open) = template.find('{') else {
        return vec![template.to_string()];
    };
    let mut rest = &template[open..];
    let mut offset = open;
    while let Some(close) = rest.find('}') {
        let inner = &rest[1..close];
        if let Some((start, end)) = inner.split_once('-') {
            let prefix = &template[..offset];
            let suffix = &template[offset + close + 1..];
            if let (Some(a), Some(b)) = (single_char(start), single_char(end)) {
                if a.is_ascii_alphabetic() && b.is_ascii_alphabetic() && a <= b {
                    return (a..=b).map(|c| format!("{prefix}{c}{suffix}")).collect();
                }
            }
            if let (Ok(a), Ok(b)) = (start.parse::<u32>(), end.parse::<u32>()) {
                if a <= b {
                    return (a..=b).map(|n| format!("{prefix}{n}{suffix}")).collect();
                }
            }
        }
        let Some(next) = rest[close..].find('{') else {
            break;
        };
        offset += close + next;
        rest = &template[offset..];
    }
    vec![template.to_string()]
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}
