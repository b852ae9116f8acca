//! Feature lookup at a map coordinate, across every layer of a context.

use context::{LayerRef, MapContext, MapContextLayer};
use formats::{Feature, GeojsonError, ReadOptions, read_features_str};
use foundation::Extent;
use foundation::math::{Coordinate, Projection};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::adapter::{AdapterError, describe, find_engine_layer};
use crate::config::MapConfig;
use crate::engine::{EngineError, MapEngine};
use crate::fetch::{FetchError, Fetcher};
use crate::raster::WmsParams;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("invalid feature info response: {0}")]
    Response(#[from] GeojsonError),
    #[error("invalid service url: {0}")]
    Url(#[from] url::ParseError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

/// Features of one layer: `None` when the layer opted out of queries.
pub type LayerFeatures = Option<Vec<Feature>>;

/// WMS 1.3.0 GetFeatureInfo URL for a `size` x `size` pixel request centered
/// on `coordinate` at `resolution`.
pub fn feature_info_url(
    params: &WmsParams,
    coordinate: Coordinate,
    resolution: f64,
    projection: Projection,
    size: u32,
) -> Result<String, url::ParseError> {
    let side = f64::from(size);
    let extent = Extent::for_view_and_size(coordinate, resolution, [side, side]);
    let i = ((coordinate[0] - extent.min[0]) / resolution).floor();
    let j = ((extent.max[1] - coordinate[1]) / resolution).floor();
    let mut url = params.request("GetFeatureInfo", extent, [size, size], projection)?;
    url.query_pairs_mut()
        .append_pair("QUERY_LAYERS", &params.layers)
        .append_pair("INFO_FORMAT", "application/json")
        .append_pair("I", &i.to_string())
        .append_pair("J", &j.to_string());
    Ok(url.into())
}

/// Features of `layer` at `coordinate`, given in the view projection.
///
/// Image layers other than WMS resolve to an empty list; vector layers are
/// hit-tested by the engine at the matching pixel.
pub async fn query_features<E: MapEngine>(
    layer: &LayerRef,
    engine: &E,
    fetcher: &dyn Fetcher,
    coordinate: Coordinate,
    config: &MapConfig,
) -> Result<LayerFeatures, QueryError> {
    if layer.not_queryable() {
        return Ok(None);
    }
    match &**layer {
        MapContextLayer::Xyz(_) | MapContextLayer::Wmts(_) => Ok(Some(Vec::new())),
        MapContextLayer::Wms(l) => {
            let resolution = engine.view().resolution().ok_or(EngineError::ViewNotReady)?;
            let projection = engine.projection();
            let url = feature_info_url(
                &WmsParams::new(&l.url, &l.name),
                coordinate,
                resolution,
                projection,
                config.feature_info_size,
            )?;
            debug!(%url, "feature info request");
            let body = fetcher.fetch_text(&url).await?;
            let features = read_features_str(&body, ReadOptions::native(projection))?;
            Ok(Some(features))
        }
        MapContextLayer::Wfs(_) | MapContextLayer::Geojson(_) => {
            let id = find_engine_layer(engine, layer)
                .map(|l| l.id())
                .ok_or_else(|| AdapterError::LayerNotFound(describe(layer)))?;
            let pixel = engine
                .pixel_from_coordinate(coordinate)
                .ok_or(EngineError::ViewNotReady)?;
            Ok(Some(engine.features_at_pixel(id, pixel).await?))
        }
    }
}

/// Queries every layer of `context` concurrently.
///
/// The result follows the context layer order. If any layer fails, the
/// failure is logged and the whole result is empty.
pub async fn features_at_coordinate<E: MapEngine>(
    engine: &E,
    context: &MapContext,
    fetcher: &dyn Fetcher,
    coordinate: Coordinate,
    config: &MapConfig,
) -> Vec<LayerFeatures> {
    let queries = context
        .layer_list()
        .iter()
        .map(|layer| query_features(layer, engine, fetcher, coordinate, config));
    let results: Result<Vec<_>, _> = join_all(queries).await.into_iter().collect();
    match results {
        Ok(features) => features,
        Err(err) => {
            warn!(error = %err, ?coordinate, "feature query failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{features_at_coordinate, feature_info_url, query_features};
    use crate::adapter::{add_layer, set_view};
    use crate::config::MapConfig;
    use crate::engine::{EngineFactory, SurfaceTarget};
    use crate::fetch::StaticFetcher;
    use crate::headless::{HeadlessEngine, HeadlessFactory};
    use crate::raster::WmsParams;
    use context::fixtures::{
        WMS_URL, layer_geojson, layer_wms, layer_wmts, layer_xyz,
        not_queryable,
    };
    use context::{LayerRef, MapContext, MapContextView};
    use foundation::math::Projection;
    use pretty_assertions::assert_eq;

    const GFI_BODY: &str = r#"{"type":"FeatureCollection","features":[
        {"type":"Feature","id":"c.1","properties":{"nom":"Strasbourg"},"geometry":null}
    ]}"#;

    /// A 100x100 surface centered on the fixture triangle, with `layers` added.
    fn engine_with(layers: &[&LayerRef]) -> HeadlessEngine {
        let mut engine = HeadlessFactory::new()
            .create_surface_binding(&SurfaceTarget::new("map").with_size(100.0, 100.0));
        let config = MapConfig::default();
        for (position, layer) in layers.iter().enumerate() {
            add_layer(&mut engine, layer, position, Projection::WebMercator, &config);
        }
        set_view(&mut engine, &MapContextView::from_center([-23.0, 42.0], 5.0), &config).unwrap();
        engine
    }

    fn inside_triangle() -> [f64; 2] {
        Projection::WebMercator.from_lon_lat([-23.0, 42.0])
    }

    #[test]
    fn feature_info_url_layout() {
        let url = feature_info_url(
            &WmsParams::new("https://h.org/ows?", "roads"),
            [1000.0, 2000.0],
            10.0,
            Projection::WebMercator,
            101,
        )
        .unwrap();
        assert_eq!(
            url,
            "https://h.org/ows?SERVICE=WMS&VERSION=1.3.0&REQUEST=GetFeatureInfo\
             &FORMAT=image%2Fpng&TRANSPARENT=true&LAYERS=roads&WIDTH=101&HEIGHT=101\
             &CRS=EPSG%3A3857&STYLES=&BBOX=495%2C1495%2C1505%2C2505\
             &QUERY_LAYERS=roads&INFO_FORMAT=application%2Fjson&I=50&J=50"
        );
    }

    #[tokio::test]
    async fn raster_tiles_answer_empty_and_opted_out_layers_answer_none() {
        let (xyz, wmts, quiet) = (layer_xyz(), layer_wmts(), not_queryable(&layer_wms()));
        let engine = engine_with(&[&xyz, &wmts, &quiet]);
        let fetcher = StaticFetcher::offline();
        let config = MapConfig::default();
        let at = inside_triangle();

        assert_eq!(query_features(&xyz, &engine, &fetcher, at, &config).await.unwrap(), Some(vec![]));
        assert_eq!(query_features(&wmts, &engine, &fetcher, at, &config).await.unwrap(), Some(vec![]));
        assert_eq!(query_features(&quiet, &engine, &fetcher, at, &config).await.unwrap(), None);
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn wms_layer_issues_feature_info_request() {
        let wms = layer_wms();
        let engine = engine_with(&[&wms]);
        let fetcher = StaticFetcher::always(GFI_BODY);
        let features = query_features(&wms, &engine, &fetcher, inside_triangle(), &MapConfig::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].properties["nom"], "Strasbourg");

        let requests = fetcher.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with(WMS_URL));
        assert!(requests[0].contains("REQUEST=GetFeatureInfo"));
        assert!(requests[0].contains("QUERY_LAYERS=commune_actuelle_3857"));
        assert!(requests[0].contains("INFO_FORMAT=application%2Fjson"));
    }

    #[tokio::test]
    async fn vector_layer_is_hit_tested() {
        let geojson = layer_geojson();
        let engine = engine_with(&[&geojson]);
        let fetcher = StaticFetcher::offline();
        let config = MapConfig::default();

        let hit = query_features(&geojson, &engine, &fetcher, inside_triangle(), &config)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.len(), 1);

        let far = Projection::WebMercator.from_lon_lat([-23.0, 20.0]);
        let miss = query_features(&geojson, &engine, &fetcher, far, &config)
            .await
            .unwrap()
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn aggregate_follows_context_order() {
        let (xyz, wms, geojson) = (layer_xyz(), not_queryable(&layer_wms()), layer_geojson());
        let engine = engine_with(&[&xyz, &wms, &geojson]);
        let context = MapContext::new().with_layers(Arc::new(vec![xyz, wms, geojson]));
        let results = features_at_coordinate(
            &engine,
            &context,
            &StaticFetcher::offline(),
            inside_triangle(),
            &MapConfig::default(),
        )
        .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Some(vec![]));
        assert_eq!(results[1], None);
        assert_eq!(results[2].as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn any_failure_empties_the_aggregate() {
        let (xyz, wms) = (layer_xyz(), layer_wms());
        let engine = engine_with(&[&xyz, &wms]);
        let context = MapContext::new().with_layers(Arc::new(vec![xyz, wms]));
        let fetcher = StaticFetcher::offline();
        let results = features_at_coordinate(
            &engine,
            &context,
            &fetcher,
            inside_triangle(),
            &MapConfig::default(),
        )
        .await;
        assert!(results.is_empty());
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[tokio::test]
    async fn layer_missing_from_the_engine_fails() {
        let engine = engine_with(&[]);
        let geojson = layer_geojson();
        let res = query_features(
            &geojson,
            &engine,
            &StaticFetcher::offline(),
            inside_triangle(),
            &MapConfig::default(),
        )
        .await;
        assert!(matches!(res, Err(super::QueryError::Adapter(_))));
    }
}
