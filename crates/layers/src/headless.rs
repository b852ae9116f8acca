//! An engine that draws nothing.
//!
//! It keeps the same state a real engine would (layers, view, surface size,
//! click listeners), hit-tests vector features and records every call it
//! receives, which makes the session logic observable without a display.

use std::cell::RefCell;
use std::rc::Rc;

use formats::Feature;
use foundation::Id;
use foundation::math::{Coordinate, Pixel};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::engine::{
    BoxFuture, ClickEvent, ClickSink, EngineError, EngineFactory, ListenerKey, MapEngine,
    SurfaceTarget,
};
use crate::fetch::Fetcher;
use crate::layer::{EngineLayer, LayerId};
use crate::view::MapView;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Created { target: String },
    AddLayer(LayerId),
    RemoveLayer(LayerId),
    SetView,
    UpdateSize(Option<[f64; 2]>),
    Listen(ListenerKey),
    Unlisten(ListenerKey),
    Dispose,
}

/// Calls received by every engine of a factory, shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<EngineCall>>>);

impl Journal {
    fn record(&self, call: EngineCall) {
        self.0.borrow_mut().push(call);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.0.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.0.borrow().iter().filter(|c| pred(c)).count()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug, Clone)]
pub struct HeadlessFactory {
    journal: Journal,
    hit_tolerance: f64,
}

impl Default for HeadlessFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessFactory {
    pub fn new() -> Self {
        Self {
            journal: Journal::default(),
            hit_tolerance: 3.0,
        }
    }

    /// Click tolerance for lines and polygon edges, in pixels.
    pub fn with_hit_tolerance(mut self, pixels: f64) -> Self {
        self.hit_tolerance = pixels;
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl EngineFactory for HeadlessFactory {
    type Engine = HeadlessEngine;

    fn create_surface_binding(&self, target: &SurfaceTarget) -> HeadlessEngine {
        self.journal.record(EngineCall::Created {
            target: target.id.clone(),
        });
        HeadlessEngine {
            target: target.clone(),
            size: target.size,
            layers: Vec::new(),
            view: MapView::default(),
            listeners: Vec::new(),
            journal: self.journal.clone(),
            hit_tolerance: self.hit_tolerance,
            disposed: false,
        }
    }
}

#[derive(Debug)]
pub struct HeadlessEngine {
    target: SurfaceTarget,
    size: Option<[f64; 2]>,
    layers: Vec<EngineLayer>,
    view: MapView,
    listeners: Vec<(ListenerKey, ClickSink)>,
    journal: Journal,
    hit_tolerance: f64,
    disposed: bool,
}

impl HeadlessEngine {
    pub fn target(&self) -> &SurfaceTarget {
        &self.target
    }

    /// Changes the host surface size. The engine only notices on
    /// [`update_size`](MapEngine::update_size).
    pub fn resize_surface(&mut self, width: f64, height: f64) {
        self.target.size = Some([width, height]);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn layer(&self, id: LayerId) -> Option<&EngineLayer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    /// Simulates a click at `pixel`. Returns the number of listeners reached.
    pub fn click_at_pixel(&self, pixel: Pixel) -> usize {
        let Some(coordinate) = self
            .size
            .and_then(|size| self.view.coordinate_from_pixel(pixel, size))
        else {
            debug!(?pixel, "click ignored, view not ready");
            return 0;
        };
        self.dispatch(ClickEvent { coordinate, pixel })
    }

    /// Simulates a click at a coordinate of the view projection.
    pub fn click_at(&self, coordinate: Coordinate) -> usize {
        let Some(pixel) = self.pixel_from_coordinate(coordinate) else {
            debug!(?coordinate, "click ignored, view not ready");
            return 0;
        };
        self.dispatch(ClickEvent { coordinate, pixel })
    }

    pub fn click_at_lon_lat(&self, lon_lat: Coordinate) -> usize {
        self.click_at(self.projection().from_lon_lat(lon_lat))
    }

    fn dispatch(&self, event: ClickEvent) -> usize {
        self.listeners
            .iter()
            .filter(|(_, sink)| sink.send(event).is_ok())
            .count()
    }

    /// Fetches what vector layers still miss for the visible extent. Returns
    /// the number of features added; failed loads are logged and skipped.
    pub async fn load_vector_sources(&mut self, fetcher: &dyn Fetcher) -> usize {
        let projection = self.projection();
        let extent = self
            .size
            .and_then(|size| self.view.calculate_extent(size))
            .unwrap_or_else(|| projection.extent());
        let requests: Vec<(LayerId, String)> = self
            .layers
            .iter()
            .filter_map(|l| {
                let url = l.as_vector()?.source.pending_request(&extent)?;
                Some((l.id(), url))
            })
            .collect();
        let bodies = join_all(requests.iter().map(|(_, url)| fetcher.fetch_text(url))).await;

        let mut added = 0;
        for ((id, url), body) in requests.iter().zip(bodies) {
            let body = match body {
                Ok(body) => body,
                Err(err) => {
                    warn!(%id, error = %err, "vector source could not be fetched");
                    continue;
                }
            };
            let Some(vector) = self
                .layers
                .iter_mut()
                .find(|l| l.id() == *id)
                .and_then(EngineLayer::as_vector_mut)
            else {
                continue;
            };
            match vector.source.add_loaded(extent, &body) {
                Ok(n) => {
                    debug!(%id, %url, features = n, "vector source loaded");
                    added += n;
                }
                Err(err) => warn!(%id, %url, error = %err, "vector source answer is not geojson"),
            }
        }
        added
    }

    fn hit_test(&self, id: LayerId, pixel: Pixel) -> Result<Vec<Feature>, EngineError> {
        let layer = self.layer(id).ok_or(EngineError::UnknownLayer(id))?;
        let vector = layer.as_vector().ok_or(EngineError::NotVectorLayer(id))?;
        let size = self.size.ok_or(EngineError::NoSize)?;
        let coordinate = self
            .view
            .coordinate_from_pixel(pixel, size)
            .ok_or(EngineError::ViewNotReady)?;
        let resolution = self.view.resolution().ok_or(EngineError::ViewNotReady)?;
        Ok(vector.source.features_at(
            coordinate,
            f64::from(vector.style.point_radius()) * resolution,
            self.hit_tolerance * resolution,
        ))
    }
}

impl MapEngine for HeadlessEngine {
    fn add_layer(&mut self, layer: EngineLayer) {
        self.journal.record(EngineCall::AddLayer(layer.id()));
        self.layers.push(layer);
    }

    fn remove_layer(&mut self, id: LayerId) -> Option<EngineLayer> {
        let index = self.layers.iter().position(|l| l.id() == id)?;
        self.journal.record(EngineCall::RemoveLayer(id));
        Some(self.layers.remove(index))
    }

    fn layers(&self) -> &[EngineLayer] {
        &self.layers
    }

    fn view(&self) -> &MapView {
        &self.view
    }

    fn set_view(&mut self, view: MapView) {
        self.journal.record(EngineCall::SetView);
        self.view = view;
    }

    fn size(&self) -> Option<[f64; 2]> {
        self.size
    }

    fn update_size(&mut self) {
        self.size = self.target.size;
        self.journal.record(EngineCall::UpdateSize(self.size));
    }

    fn on_click(&mut self, sink: ClickSink) -> ListenerKey {
        let key = ListenerKey(Id::next());
        self.journal.record(EngineCall::Listen(key));
        self.listeners.push((key, sink));
        key
    }

    fn un_listen(&mut self, key: ListenerKey) {
        self.journal.record(EngineCall::Unlisten(key));
        self.listeners.retain(|(k, _)| *k != key);
    }

    fn features_at_pixel(
        &self,
        layer: LayerId,
        pixel: Pixel,
    ) -> BoxFuture<'_, Result<Vec<Feature>, EngineError>> {
        Box::pin(std::future::ready(self.hit_test(layer, pixel)))
    }

    fn dispose(&mut self) {
        self.journal.record(EngineCall::Dispose);
        self.layers.clear();
        self.listeners.clear();
        self.disposed = true;
    }
}
