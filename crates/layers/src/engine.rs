//! The seam between the map session and a rendering engine.

use std::future::Future;
use std::pin::Pin;

use formats::Feature;
use foundation::Id;
use foundation::math::{Coordinate, Pixel, Projection};
use tokio::sync::mpsc;

use crate::layer::{EngineLayer, LayerId};
use crate::view::MapView;

/// Boxed future returned across the engine and fetcher seams. Engines are
/// driven from a single thread, so it is not `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Where an engine draws: the host surface id and its current size in
/// pixels, if laid out yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceTarget {
    pub id: String,
    pub size: Option<[f64; 2]>,
}

impl SurfaceTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Some([width, height]);
        self
    }
}

/// A click on the map surface.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClickEvent {
    /// In the view projection.
    pub coordinate: Coordinate,
    pub pixel: Pixel,
}

pub type ClickSink = mpsc::UnboundedSender<ClickEvent>;

/// Handle of a click subscription on an engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ListenerKey(pub Id);

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("{0} is not part of the map")]
    UnknownLayer(LayerId),
    #[error("{0} holds no features")]
    NotVectorLayer(LayerId),
    #[error("the view has no center or resolution yet")]
    ViewNotReady,
    #[error("the surface has no size yet")]
    NoSize,
}

pub trait MapEngine {
    fn add_layer(&mut self, layer: EngineLayer);
    fn remove_layer(&mut self, id: LayerId) -> Option<EngineLayer>;
    /// Layers in insertion order.
    fn layers(&self) -> &[EngineLayer];
    fn view(&self) -> &MapView;
    fn set_view(&mut self, view: MapView);

    fn projection(&self) -> Projection {
        self.view().projection()
    }

    fn size(&self) -> Option<[f64; 2]>;
    /// Re-reads the size of the surface.
    fn update_size(&mut self);

    fn pixel_from_coordinate(&self, coordinate: Coordinate) -> Option<Pixel> {
        self.view().pixel_from_coordinate(coordinate, self.size()?)
    }

    /// Starts forwarding clicks to `sink`.
    fn on_click(&mut self, sink: ClickSink) -> ListenerKey;
    fn un_listen(&mut self, key: ListenerKey);

    /// Features of a vector layer rendered under `pixel`.
    fn features_at_pixel(
        &self,
        layer: LayerId,
        pixel: Pixel,
    ) -> BoxFuture<'_, Result<Vec<Feature>, EngineError>>;

    /// Releases the surface. The engine is unusable afterwards.
    fn dispose(&mut self);
}

pub trait EngineFactory {
    type Engine: MapEngine;

    fn create_surface_binding(&self, target: &SurfaceTarget) -> Self::Engine;
}
