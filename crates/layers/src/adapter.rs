//! Translates context layers and views into engine state.

use std::sync::Arc;

use context::{GeojsonSource, LayerRef, MapContext, MapContextLayer, MapContextView};
use formats::ReadOptions;
use foundation::math::{Projection, ProjectionError};
use tracing::{debug, warn};

use crate::config::MapConfig;
use crate::engine::MapEngine;
use crate::layer::{EngineLayer, EngineLayerKind, LayerId, LayerTag};
use crate::raster::{ImageSource, TileLayer, TileSource, WmsParams, WmtsSource, XyzSource};
use crate::symbology::VectorStyle;
use crate::vector::{VectorLayer, VectorSource, WfsRequest, read_inline};
use crate::view::MapView;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdapterError {
    #[error("could not find {0} in the map")]
    LayerNotFound(String),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

/// Short human readable description of a context layer, for logs and errors.
pub fn describe(layer: &MapContextLayer) -> String {
    match layer {
        MapContextLayer::Wms(l) => format!("wms layer '{}' ({})", l.name, l.url),
        MapContextLayer::Wfs(l) => format!("wfs layer '{}' ({})", l.name, l.url),
        MapContextLayer::Wmts(l) => match &l.name {
            Some(name) => format!("wmts layer '{name}'"),
            None => format!("wmts layer ({})", l.source.urls().join(", ")),
        },
        MapContextLayer::Xyz(l) => format!("xyz layer ({})", l.source.urls().join(", ")),
        MapContextLayer::Geojson(l) => match &l.source {
            GeojsonSource::Remote { url } => format!("geojson layer ({url})"),
            GeojsonSource::Inline { .. } => "inline geojson layer".to_string(),
        },
    }
}

/// Builds the engine layer for `layer`, stacked at `position`.
///
/// Inline GeoJSON is read into `projection`; invalid data only yields an
/// empty layer.
pub fn create_engine_layer(
    layer: &LayerRef,
    position: usize,
    projection: Projection,
    config: &MapConfig,
) -> EngineLayer {
    let kind = match &**layer {
        MapContextLayer::Wms(l) => {
            let params = WmsParams::new(&l.url, &l.name);
            if l.tiled {
                EngineLayerKind::Tile(TileLayer {
                    source: TileSource::Wms(params),
                    gutter: config.wms_tile_gutter,
                })
            } else {
                EngineLayerKind::Image(ImageSource::Wms(params))
            }
        }
        MapContextLayer::Wmts(l) => EngineLayerKind::Tile(TileLayer {
            source: TileSource::Wmts(WmtsSource {
                urls: l.source.urls(),
                layer: l.name.clone(),
                matrix_set: l
                    .matrix_set
                    .clone()
                    .unwrap_or_else(|| projection.code().to_string()),
            }),
            gutter: 0,
        }),
        MapContextLayer::Xyz(l) => EngineLayerKind::Tile(TileLayer {
            source: TileSource::Xyz(XyzSource::new(&l.source.urls())),
            gutter: 0,
        }),
        MapContextLayer::Wfs(l) => EngineLayerKind::Vector(VectorLayer {
            source: VectorSource::wfs(WfsRequest::new(&l.url, &l.name), projection),
            style: VectorStyle::from_context(l.style.as_ref()),
        }),
        MapContextLayer::Geojson(l) => {
            let source = match &l.source {
                GeojsonSource::Remote { url } => VectorSource::from_url(url, projection),
                GeojsonSource::Inline { data } => {
                    let features = read_inline(data, ReadOptions::into_projection(projection))
                        .unwrap_or_else(|err| {
                            warn!(error = %err, "inline geojson could not be read, layer left empty");
                            Vec::new()
                        });
                    VectorSource::from_features(features, projection)
                }
            };
            EngineLayerKind::Vector(VectorLayer {
                source,
                style: VectorStyle::from_context(l.style.as_ref()),
            })
        }
    };
    let z_index = i32::try_from(position).unwrap_or(i32::MAX);
    EngineLayer::new(z_index, LayerTag::Context(Arc::clone(layer)), kind)
}

/// Adds `layer` to the engine and returns the id of the created engine layer.
pub fn add_layer<E: MapEngine>(
    engine: &mut E,
    layer: &LayerRef,
    position: usize,
    projection: Projection,
    config: &MapConfig,
) -> LayerId {
    let engine_layer = create_engine_layer(layer, position, projection, config);
    let id = engine_layer.id();
    debug!(%id, position, layer = %describe(layer), "adding layer");
    engine.add_layer(engine_layer);
    id
}

/// The engine layer created for `layer`, matched by identity.
pub fn find_engine_layer<'e, E: MapEngine>(
    engine: &'e E,
    layer: &LayerRef,
) -> Option<&'e EngineLayer> {
    engine
        .layers()
        .iter()
        .find(|l| l.tag.is_context_layer(layer))
}

pub fn remove_layer<E: MapEngine>(
    engine: &mut E,
    layer: &LayerRef,
) -> Result<EngineLayer, AdapterError> {
    let id = find_engine_layer(engine, layer)
        .map(EngineLayer::id)
        .ok_or_else(|| AdapterError::LayerNotFound(describe(layer)))?;
    debug!(%id, layer = %describe(layer), "removing layer");
    engine
        .remove_layer(id)
        .ok_or_else(|| AdapterError::LayerNotFound(describe(layer)))
}

/// For every layer of `context`, in order, the engine layer created for it.
pub fn get_engine_layers<'e, E: MapEngine>(
    engine: &'e E,
    context: &MapContext,
) -> Vec<Option<&'e EngineLayer>> {
    context
        .layer_list()
        .iter()
        .map(|layer| find_engine_layer(engine, layer))
        .collect()
}

/// Projection the engine view will use once `view` is applied.
pub fn view_projection(view: &MapContextView, config: &MapConfig) -> Result<Projection, ProjectionError> {
    match &view.srs {
        Some(srs) => srs.parse(),
        None => Ok(config.projection),
    }
}

/// Replaces the engine view with the one described by `view`.
pub fn set_view<E: MapEngine>(
    engine: &mut E,
    view: &MapContextView,
    config: &MapConfig,
) -> Result<(), AdapterError> {
    let size = engine
        .size()
        .filter(|[w, h]| *w > 0.0 && *h > 0.0)
        .unwrap_or(config.fallback_viewport);
    let view = MapContextView {
        max_zoom: view.max_zoom.or(Some(config.max_zoom)),
        ..view.clone()
    };
    let map_view = MapView::from_context(&view, config.projection, size)?;
    debug!(
        projection = %map_view.projection(),
        zoom = ?map_view.zoom(),
        "setting view"
    );
    engine.set_view(map_view);
    Ok(())
}

pub fn create_base_map(config: &MapConfig) -> EngineLayer {
    EngineLayer::new(
        config.base_map_z_index,
        LayerTag::BaseMap,
        EngineLayerKind::Tile(TileLayer {
            source: TileSource::Xyz(
                XyzSource::new(&config.base_map_urls).with_cross_origin("anonymous"),
            ),
            gutter: 0,
        }),
    )
}

pub fn has_base_map<E: MapEngine>(engine: &E) -> bool {
    engine.layers().iter().any(|l| l.tag.is_base_map())
}

/// Shows or hides the base map. Repeated calls with the same value are no-ops.
pub fn set_has_base_map<E: MapEngine>(engine: &mut E, enabled: bool, config: &MapConfig) {
    let current = engine
        .layers()
        .iter()
        .find(|l| l.tag.is_base_map())
        .map(EngineLayer::id);
    match (enabled, current) {
        (true, None) => {
            debug!("adding base map");
            engine.add_layer(create_base_map(config));
        }
        (false, Some(id)) => {
            debug!("removing base map");
            engine.remove_layer(id);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{
        AdapterError, add_layer, create_engine_layer, find_engine_layer, get_engine_layers,
        has_base_map, remove_layer, set_has_base_map, set_view,
    };
    use crate::config::MapConfig;
    use crate::engine::{EngineFactory, MapEngine, SurfaceTarget};
    use crate::headless::{HeadlessEngine, HeadlessFactory};
    use crate::layer::{EngineLayerKind, LayerTag};
    use crate::raster::{ImageSource, TileSource};
    use crate::vector::VectorLoader;
    use context::fixtures::{
        extent, layer_geojson, layer_geojson_remote, layer_wfs, layer_wms, layer_wmts, layer_xyz,
        view,
    };
    use context::{
        GeojsonLayer, InlineGeojson, LayerStyle, MapContext, MapContextLayer, WmsLayer,
    };
    use foundation::math::Projection;
    use pretty_assertions::assert_eq;

    fn engine() -> HeadlessEngine {
        HeadlessFactory::new().create_surface_binding(&SurfaceTarget::new("map"))
    }

    #[test]
    fn wms_layer_is_an_image_layer_at_its_position() {
        let layer = layer_wms();
        let created = create_engine_layer(&layer, 4, Projection::WebMercator, &MapConfig::default());
        assert_eq!(created.z_index, 4);
        assert!(created.tag.is_context_layer(&layer));
        match &created.kind {
            EngineLayerKind::Image(ImageSource::Wms(params)) => {
                assert_eq!(params.layers, "commune_actuelle_3857");
                assert_eq!(params.url, "https://www.geograndest.fr/geoserver/region-grand-est/ows?");
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn tiled_wms_gets_a_gutter() {
        let layer = MapContextLayer::Wms(WmsLayer {
            tiled: true,
            ..WmsLayer::new("https://h.org/ows", "roads")
        })
        .into_ref();
        let created = create_engine_layer(&layer, 0, Projection::WebMercator, &MapConfig::default());
        match &created.kind {
            EngineLayerKind::Tile(tile) => {
                assert_eq!(tile.gutter, 20);
                assert!(matches!(tile.source, TileSource::Wms(_)));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn raster_tile_layers() {
        let config = MapConfig::default();
        let xyz = create_engine_layer(&layer_xyz(), 0, Projection::WebMercator, &config);
        match &xyz.kind {
            EngineLayerKind::Tile(tile) => match &tile.source {
                TileSource::Xyz(source) => assert_eq!(source.urls.len(), 3),
                other => panic!("unexpected source {other:?}"),
            },
            other => panic!("unexpected kind {other:?}"),
        }
        let wmts = create_engine_layer(&layer_wmts(), 1, Projection::WebMercator, &config);
        match &wmts.kind {
            EngineLayerKind::Tile(tile) => match &tile.source {
                TileSource::Wmts(source) => {
                    assert_eq!(source.matrix_set, "EPSG:3857");
                    assert_eq!(source.layer.as_deref(), Some("commune_actuelle_3857"));
                }
                other => panic!("unexpected source {other:?}"),
            },
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn wfs_layer_loads_by_extent() {
        let layer = layer_wfs();
        let created = create_engine_layer(&layer, 0, Projection::WebMercator, &MapConfig::default());
        let vector = created.as_vector().unwrap();
        match vector.source.loader() {
            VectorLoader::Wfs(request) => assert_eq!(request.type_name, "ms:commune_actuelle_3857"),
            other => panic!("unexpected loader {other:?}"),
        }
        assert!(vector.style.custom().is_none());
    }

    #[test]
    fn inline_geojson_is_read_into_the_map_projection() {
        let created =
            create_engine_layer(&layer_geojson(), 0, Projection::WebMercator, &MapConfig::default());
        let features = created.as_vector().unwrap().source.features();
        assert_eq!(features.len(), 1);
        let extent = features[0].geometry.as_ref().unwrap().extent().unwrap();
        // Mercator meters, not degrees.
        assert!(extent.min[0] < -3_000_000.0);
    }

    #[test]
    fn remote_geojson_keeps_its_url_and_style() {
        let style = Arc::new(LayerStyle {
            stroke_width: Some(2.0),
            ..Default::default()
        });
        let layer = MapContextLayer::Geojson(GeojsonLayer {
            style: Some(Arc::clone(&style)),
            ..GeojsonLayer::remote("https://my.host.com/data/regions.json")
        })
        .into_ref();
        let created = create_engine_layer(&layer, 0, Projection::WebMercator, &MapConfig::default());
        let vector = created.as_vector().unwrap();
        assert_eq!(vector.source.url(), Some("https://my.host.com/data/regions.json"));
        assert!(Arc::ptr_eq(vector.style.custom().unwrap(), &style));

        let remote = create_engine_layer(&layer_geojson_remote(), 0, Projection::WebMercator, &MapConfig::default());
        assert!(remote.as_vector().unwrap().source.features().is_empty());
    }

    #[test]
    fn malformed_inline_geojson_yields_an_empty_layer() {
        let layer = MapContextLayer::Geojson(GeojsonLayer::inline(InlineGeojson::Text(
            "{ not json".to_string(),
        )))
        .into_ref();
        let created = create_engine_layer(&layer, 0, Projection::WebMercator, &MapConfig::default());
        assert!(created.as_vector().unwrap().source.features().is_empty());
    }

    #[test]
    fn remove_layer_by_identity() {
        let mut engine = engine();
        let config = MapConfig::default();
        let layer = layer_wms();
        add_layer(&mut engine, &layer, 0, Projection::WebMercator, &config);
        assert_eq!(engine.layers().len(), 1);

        // A structurally equal copy is a different layer.
        let copy = Arc::new((*layer).clone());
        assert_eq!(
            remove_layer(&mut engine, &copy).unwrap_err(),
            AdapterError::LayerNotFound(
                "wms layer 'commune_actuelle_3857' (https://www.geograndest.fr/geoserver/region-grand-est/ows?)"
                    .to_string()
            )
        );
        assert_eq!(engine.layers().len(), 1);

        remove_layer(&mut engine, &layer).unwrap();
        assert!(engine.layers().is_empty());
        assert!(find_engine_layer(&engine, &layer).is_none());
    }

    #[test]
    fn engine_layers_follow_context_order() {
        let mut engine = engine();
        let config = MapConfig::default();
        let (a, b, c) = (layer_xyz(), layer_wms(), layer_geojson());
        add_layer(&mut engine, &b, 1, Projection::WebMercator, &config);
        add_layer(&mut engine, &a, 0, Projection::WebMercator, &config);
        let context = MapContext::new().with_layers(Arc::new(vec![a.clone(), b.clone(), c]));

        let found = get_engine_layers(&engine, &context);
        assert_eq!(found.len(), 3);
        assert!(found[0].unwrap().tag.is_context_layer(&a));
        assert!(found[1].unwrap().tag.is_context_layer(&b));
        assert!(found[2].is_none());
        assert!(get_engine_layers(&engine, &MapContext::new()).is_empty());
    }

    #[test]
    fn base_map_toggle_is_idempotent() {
        let mut engine = engine();
        let config = MapConfig::default();
        set_has_base_map(&mut engine, false, &config);
        set_has_base_map(&mut engine, true, &config);
        set_has_base_map(&mut engine, true, &config);
        assert_eq!(engine.layers().len(), 1);
        let base = &engine.layers()[0];
        assert_eq!(base.z_index, -999);
        assert!(matches!(base.tag, LayerTag::BaseMap));
        match &base.kind {
            EngineLayerKind::Tile(tile) => match &tile.source {
                TileSource::Xyz(source) => {
                    assert_eq!(source.cross_origin.as_deref(), Some("anonymous"));
                    assert_eq!(
                        source.urls[1],
                        "https://b.basemaps.cartocdn.com/light_all/{z}/{x}/{y}.png"
                    );
                }
                other => panic!("unexpected source {other:?}"),
            },
            other => panic!("unexpected kind {other:?}"),
        }

        set_has_base_map(&mut engine, false, &config);
        set_has_base_map(&mut engine, false, &config);
        assert!(!has_base_map(&engine));
        assert!(engine.layers().is_empty());
    }

    #[test]
    fn view_fit_uses_fallback_viewport_without_size() {
        let mut engine = engine();
        let ctx_view = (*view()).clone().with_extent(extent());
        set_view(&mut engine, &ctx_view, &MapConfig::default()).unwrap();
        let zoom = engine.view().zoom().unwrap();
        assert!((zoom - 2.0).abs() < 1e-9);
        let center = engine.view().center().unwrap();
        assert!((center[0] - -445_277.963_173_094_3).abs() < 1e-6);
    }

    #[test]
    fn view_fit_on_a_zero_size_surface_uses_fallback_viewport() {
        let mut engine = HeadlessFactory::new()
            .create_surface_binding(&SurfaceTarget::new("map").with_size(0.0, 0.0));
        let ctx_view = (*view()).clone().with_extent(extent());
        set_view(&mut engine, &ctx_view, &MapConfig::default()).unwrap();
        assert_eq!(engine.size(), Some([0.0, 0.0]));
        let zoom = engine.view().zoom().unwrap();
        assert!((zoom - 2.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_srs_is_reported() {
        let mut engine = engine();
        let ctx_view = context::MapContextView {
            srs: Some("EPSG:2154".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            set_view(&mut engine, &ctx_view, &MapConfig::default()),
            Err(AdapterError::Projection(_))
        ));
    }
}
