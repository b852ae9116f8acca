use std::fmt;
use std::sync::Arc;

use context::LayerRef;
use foundation::Id;

use crate::raster::{ImageSource, TileLayer};
use crate::vector::VectorLayer;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LayerId(pub Id);

impl LayerId {
    pub fn next() -> Self {
        Self(Id::next())
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer{}", self.0)
    }
}

/// Back-reference from an engine layer to what created it.
#[derive(Debug, Clone)]
pub enum LayerTag {
    /// Created for this context layer; matched by identity.
    Context(LayerRef),
    BaseMap,
}

impl LayerTag {
    pub fn is_context_layer(&self, layer: &LayerRef) -> bool {
        matches!(self, LayerTag::Context(tagged) if Arc::ptr_eq(tagged, layer))
    }

    pub fn is_base_map(&self) -> bool {
        matches!(self, LayerTag::BaseMap)
    }
}

#[derive(Debug)]
pub enum EngineLayerKind {
    /// One image for the whole viewport.
    Image(ImageSource),
    Tile(TileLayer),
    Vector(VectorLayer),
}

impl EngineLayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            EngineLayerKind::Image(_) => "image",
            EngineLayerKind::Tile(_) => "tile",
            EngineLayerKind::Vector(_) => "vector",
        }
    }
}

/// A layer as the rendering engine holds it.
#[derive(Debug)]
pub struct EngineLayer {
    id: LayerId,
    /// Stacking order; higher draws on top.
    pub z_index: i32,
    pub tag: LayerTag,
    pub kind: EngineLayerKind,
}

impl EngineLayer {
    pub fn new(z_index: i32, tag: LayerTag, kind: EngineLayerKind) -> Self {
        Self {
            id: LayerId::next(),
            z_index,
            tag,
            kind,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn as_vector(&self) -> Option<&VectorLayer> {
        match &self.kind {
            EngineLayerKind::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_vector_mut(&mut self) -> Option<&mut VectorLayer> {
        match &mut self.kind {
            EngineLayerKind::Vector(v) => Some(v),
            _ => None,
        }
    }
}
