//! Sample contexts shared by the workspace tests.
//!
//! Each constructor returns a fresh allocation, so two calls never yield the
//! same layer identity.

use std::sync::Arc;

use foundation::Extent;
use serde_json::{Value, json};

use crate::model::{
    GeojsonLayer, InlineGeojson, LayerRef, MapContext, MapContextLayer, MapContextView,
    UrlSource, WfsLayer, WmsLayer, WmtsLayer, XyzLayer,
};

pub const WMS_URL: &str = "https://www.geograndest.fr/geoserver/region-grand-est/ows?";
pub const WMTS_URL: &str = "https://www.geograndest.fr/geoserver/region-grand-est/wmts?";
pub const XYZ_URL: &str = "https://{a-c}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const GEOJSON_URL: &str = "https://my.host.com/data/regions.json";

pub fn layer_xyz() -> LayerRef {
    MapContextLayer::Xyz(XyzLayer::new(XYZ_URL)).into_ref()
}

pub fn layer_wms() -> LayerRef {
    MapContextLayer::Wms(WmsLayer::new(WMS_URL, "commune_actuelle_3857")).into_ref()
}

pub fn layer_wfs() -> LayerRef {
    MapContextLayer::Wfs(WfsLayer::new(WMS_URL, "ms:commune_actuelle_3857")).into_ref()
}

pub fn layer_wmts() -> LayerRef {
    MapContextLayer::Wmts(WmtsLayer {
        source: UrlSource::Single {
            url: WMTS_URL.to_string(),
        },
        name: Some("commune_actuelle_3857".to_string()),
        matrix_set: None,
        not_queryable: false,
    })
    .into_ref()
}

pub fn layer_geojson() -> LayerRef {
    MapContextLayer::Geojson(GeojsonLayer::inline(InlineGeojson::Object(
        feature_collection_polygon(),
    )))
    .into_ref()
}

pub fn layer_geojson_remote() -> LayerRef {
    MapContextLayer::Geojson(GeojsonLayer::remote(GEOJSON_URL)).into_ref()
}

/// Marks a copy of `layer` as not queryable. The copy is a new identity.
pub fn not_queryable(layer: &LayerRef) -> LayerRef {
    let mut copy = (**layer).clone();
    match &mut copy {
        MapContextLayer::Wms(l) => l.not_queryable = true,
        MapContextLayer::Wmts(l) => l.not_queryable = true,
        MapContextLayer::Wfs(l) => l.not_queryable = true,
        MapContextLayer::Xyz(l) => l.not_queryable = true,
        MapContextLayer::Geojson(l) => l.not_queryable = true,
    }
    copy.into_ref()
}

pub fn view() -> Arc<MapContextView> {
    Arc::new(MapContextView::from_center([7.75, 48.6], 9.0))
}

pub fn extent() -> Extent {
    Extent::from_array([-10.0, -20.0, 2.0, 6.0])
}

/// xyz, wms and inline geojson layers around Strasbourg.
pub fn context() -> MapContext {
    MapContext::new()
        .with_view(view())
        .with_layers(Arc::new(vec![layer_xyz(), layer_wms(), layer_geojson()]))
}

/// One triangle in the North Atlantic, in EPSG:4326.
pub fn feature_collection_polygon() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[
                        [-29.071568679613762, 51.138880682112784],
                        [-22.468966178208063, 28.03939224511207],
                        [-16.821275403849654, 45.26343974339443],
                        [-29.071568679613762, 51.138880682112784]
                    ]]
                }
            }
        ]
    })
}
