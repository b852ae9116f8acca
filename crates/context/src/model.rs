use std::sync::Arc;

use foundation::Extent;
use foundation::math::Coordinate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ContextError;

/// Shared handle to one layer description.
///
/// Layer identity is the identity of this allocation: two `LayerRef`s are the
/// same layer iff `Arc::ptr_eq` holds. Callers keep the handles of unchanged
/// layers between updates; a structurally equal copy is a different layer.
pub type LayerRef = Arc<MapContextLayer>;

/// Immutable snapshot of the desired map state.
///
/// Every field is optional and absence is meaningful: a missing field means
/// "not part of this update", which differs from an empty value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<Arc<MapContextView>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layers: Option<Arc<Vec<LayerRef>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_base_map: Option<bool>,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(mut self, view: Arc<MapContextView>) -> Self {
        self.view = Some(view);
        self
    }

    pub fn with_layers(mut self, layers: Arc<Vec<LayerRef>>) -> Self {
        self.layers = Some(layers);
        self
    }

    pub fn with_no_base_map(mut self, no_base_map: bool) -> Self {
        self.no_base_map = Some(no_base_map);
        self
    }

    /// Layers of this snapshot, empty when the field is absent.
    pub fn layer_list(&self) -> &[LayerRef] {
        self.layers.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parses a context from JSON.
    ///
    /// Layer discriminants are checked before decoding so that an unknown
    /// `type` is reported as such rather than as a generic decoding error.
    pub fn from_json(payload: &str) -> Result<Self, ContextError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_json_value(value)
    }

    pub fn from_json_value(value: Value) -> Result<Self, ContextError> {
        if let Some(layers) = value.get("layers").and_then(Value::as_array) {
            for (index, layer) in layers.iter().enumerate() {
                let Some(ty) = layer.get("type").and_then(Value::as_str) else {
                    return Err(ContextError::MissingLayerType { index });
                };
                if LayerKind::from_type_name(ty).is_none() {
                    return Err(ContextError::UnrecognizedLayerType(ty.to_string()));
                }
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapContextView {
    /// `[lon, lat]` in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    /// Geographic extent to fit; wins over center/zoom.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<Extent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_zoom: Option<f64>,
    /// Geographic extent the view center is constrained to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_extent: Option<Extent>,
    /// Working projection of the map, e.g. `EPSG:3857`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs: Option<String>,
}

impl MapContextView {
    pub fn from_center(center: Coordinate, zoom: f64) -> Self {
        Self {
            center: Some(center),
            zoom: Some(zoom),
            ..Default::default()
        }
    }

    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent);
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LayerKind {
    Wms,
    Wmts,
    Wfs,
    Xyz,
    Geojson,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Wms,
        LayerKind::Wmts,
        LayerKind::Wfs,
        LayerKind::Xyz,
        LayerKind::Geojson,
    ];

    pub fn type_name(&self) -> &'static str {
        match self {
            LayerKind::Wms => "wms",
            LayerKind::Wmts => "wmts",
            LayerKind::Wfs => "wfs",
            LayerKind::Xyz => "xyz",
            LayerKind::Geojson => "geojson",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        LayerKind::ALL.into_iter().find(|k| k.type_name() == name)
    }
}

/// One layer of a context, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MapContextLayer {
    Wms(WmsLayer),
    Wmts(WmtsLayer),
    Wfs(WfsLayer),
    Xyz(XyzLayer),
    Geojson(GeojsonLayer),
}

impl MapContextLayer {
    pub fn kind(&self) -> LayerKind {
        match self {
            MapContextLayer::Wms(_) => LayerKind::Wms,
            MapContextLayer::Wmts(_) => LayerKind::Wmts,
            MapContextLayer::Wfs(_) => LayerKind::Wfs,
            MapContextLayer::Xyz(_) => LayerKind::Xyz,
            MapContextLayer::Geojson(_) => LayerKind::Geojson,
        }
    }

    pub fn not_queryable(&self) -> bool {
        match self {
            MapContextLayer::Wms(l) => l.not_queryable,
            MapContextLayer::Wmts(l) => l.not_queryable,
            MapContextLayer::Wfs(l) => l.not_queryable,
            MapContextLayer::Xyz(l) => l.not_queryable,
            MapContextLayer::Geojson(l) => l.not_queryable,
        }
    }

    /// Style of a vector layer; raster layers are styled by their service.
    pub fn style(&self) -> Option<&Arc<LayerStyle>> {
        match self {
            MapContextLayer::Wfs(l) => l.style.as_ref(),
            MapContextLayer::Geojson(l) => l.style.as_ref(),
            MapContextLayer::Wms(_) | MapContextLayer::Wmts(_) | MapContextLayer::Xyz(_) => None,
        }
    }

    pub fn into_ref(self) -> LayerRef {
        Arc::new(self)
    }
}

/// A single URL or a list of URLs (round-robin over subdomains).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlSource {
    Single { url: String },
    Multiple { urls: Vec<String> },
}

impl UrlSource {
    pub fn urls(&self) -> Vec<String> {
        match self {
            UrlSource::Single { url } => vec![url.clone()],
            UrlSource::Multiple { urls } => urls.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmsLayer {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub tiled: bool,
    #[serde(default)]
    pub not_queryable: bool,
}

impl WmsLayer {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            tiled: false,
            not_queryable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmtsLayer {
    #[serde(flatten)]
    pub source: UrlSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix_set: Option<String>,
    #[serde(default)]
    pub not_queryable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WfsLayer {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub not_queryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Arc<LayerStyle>>,
}

impl WfsLayer {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            not_queryable: false,
            style: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XyzLayer {
    #[serde(flatten)]
    pub source: UrlSource,
    #[serde(default)]
    pub not_queryable: bool,
}

impl XyzLayer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            source: UrlSource::Single { url: url.into() },
            not_queryable: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeojsonLayer {
    #[serde(flatten)]
    pub source: GeojsonSource,
    #[serde(default)]
    pub not_queryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Arc<LayerStyle>>,
}

impl GeojsonLayer {
    pub fn remote(url: impl Into<String>) -> Self {
        Self {
            source: GeojsonSource::Remote { url: url.into() },
            not_queryable: false,
            style: None,
        }
    }

    pub fn inline(data: InlineGeojson) -> Self {
        Self {
            source: GeojsonSource::Inline { data },
            not_queryable: false,
            style: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GeojsonSource {
    Remote { url: String },
    Inline { data: InlineGeojson },
}

/// Inline GeoJSON, either already decoded or as raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InlineGeojson {
    Text(String),
    Object(Value),
}

/// Rendering rule for vector layers. Unset fields fall back to the engine
/// defaults when the layer is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_radius: Option<f32>,
}
