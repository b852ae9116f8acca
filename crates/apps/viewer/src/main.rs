use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use clap::Parser;
use context::{ContextError, MapContext};
use foundation::math::Coordinate;
use layers::raster::{ImageSource, TileCoord};
use layers::{
    EngineLayer, EngineLayerKind, Fetcher, HeadlessEngine, HeadlessFactory, HttpFetcher,
    LayerTag, MapConfig, MapEngine, SurfaceTarget, describe,
};
use native_map::{NativeMap, SessionError};
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Opens a map context on a headless surface, prints the resulting layer
/// stack, then reports the features found under each click.
#[derive(Debug, Parser)]
#[command(name = "native-map")]
struct Args {
    /// Map context JSON file.
    context: PathBuf,
    /// Session configuration JSON file; missing fields keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = 800.0)]
    width: f64,
    #[arg(long, default_value_t = 600.0)]
    height: f64,
    /// Click at `lon,lat`. Repeatable.
    #[arg(long = "click", value_parser = parse_lon_lat, allow_hyphen_values = true)]
    clicks: Vec<Coordinate>,
    /// Fetch remote vector data for the initial view before clicking.
    #[arg(long)]
    load_vectors: bool,
    /// Base map URL templates, comma separated.
    #[arg(long, env = "NATIVE_MAP_BASEMAP_URLS")]
    basemap_urls: Option<String>,
}

#[derive(Debug, thiserror::Error)]
enum ViewerError {
    #[error("could not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(#[source] serde_json::Error),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = real_main(Args::parse()).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn real_main(args: Args) -> Result<(), ViewerError> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str(&read(path)?).map_err(ViewerError::Config)?,
        None => MapConfig::default(),
    };
    if let Some(list) = &args.basemap_urls {
        config = config.with_base_map_urls(list);
    }
    let context = MapContext::from_json(&read(&args.context)?)?;

    let fetcher: Rc<dyn Fetcher> = Rc::new(HttpFetcher::new());
    let factory = HeadlessFactory::new().with_hit_tolerance(config.hit_tolerance);
    let target = SurfaceTarget::new("map").with_size(args.width, args.height);
    let mut map = NativeMap::new(factory, target, Rc::clone(&fetcher), config);
    map.set_context(context)?;
    map.attach()?;

    if args.load_vectors {
        if let Some(engine) = map.engine_mut() {
            let features = engine.load_vector_sources(fetcher.as_ref()).await;
            info!(features, "vector sources loaded");
        }
    }

    if let Some(engine) = map.engine() {
        let size = engine.size().unwrap_or(map.config().fallback_viewport);
        println!("{}", serde_json::to_string_pretty(&summary(engine, size))?);
    }

    if !args.clicks.is_empty() {
        map.add_features_clicked_listener(|event| println!("{}", event.to_json()))?;
        if let Some(engine) = map.engine() {
            for lon_lat in &args.clicks {
                engine.click_at_lon_lat(*lon_lat);
            }
        }
        let handled = map.process_clicks().await;
        info!(handled, "clicks handled");
    }

    map.detach();
    Ok(())
}

fn read(path: &Path) -> Result<String, ViewerError> {
    fs::read_to_string(path).map_err(|source| ViewerError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn parse_lon_lat(s: &str) -> Result<Coordinate, String> {
    let (lon, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected lon,lat, got '{s}'"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid number '{v}': {e}"))
    };
    let (lon, lat) = (parse(lon)?, parse(lat)?);
    if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
        return Err(format!("'{s}' is outside the lon/lat range"));
    }
    Ok([lon, lat])
}

fn summary(engine: &HeadlessEngine, size: [f64; 2]) -> Value {
    let view = engine.view();
    let projection = view.projection();
    json!({
        "projection": projection.code(),
        "center": view.center().map(|c| projection.to_lon_lat(c)),
        "zoom": view.zoom(),
        "extent": view.calculate_extent(size).map(|e| e.to_array()),
        "layers": engine
            .layers()
            .iter()
            .map(|l| layer_summary(engine, l, size))
            .collect::<Vec<_>>(),
    })
}

/// One engine layer, with the request it would issue for the current view.
fn layer_summary(engine: &HeadlessEngine, layer: &EngineLayer, size: [f64; 2]) -> Value {
    let view = engine.view();
    let projection = view.projection();
    let source = match &layer.tag {
        LayerTag::Context(l) => describe(l),
        LayerTag::BaseMap => "base map".to_string(),
    };
    let request = match &layer.kind {
        EngineLayerKind::Image(ImageSource::Wms(params)) => view
            .calculate_extent(size)
            .and_then(|extent| {
                let pixels = [size[0].round() as u32, size[1].round() as u32];
                params.get_map_url(extent, pixels, projection).ok()
            }),
        EngineLayerKind::Tile(tile) => view
            .center()
            .zip(view.zoom())
            .and_then(|(center, zoom)| TileCoord::containing(center, zoom.round() as u32, projection))
            .and_then(|coord| tile.source.tile_url(coord, tile.gutter, projection).ok().flatten()),
        EngineLayerKind::Vector(vector) => view
            .calculate_extent(size)
            .and_then(|extent| vector.source.pending_request(&extent)),
    };
    let features = layer.as_vector().map(|v| v.source.features().len());
    json!({
        "id": layer.id().to_string(),
        "kind": layer.kind.name(),
        "zIndex": layer.z_index,
        "source": source,
        "request": request,
        "features": features,
    })
}
