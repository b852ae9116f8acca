use std::sync::Arc;

use context::LayerStyle;

/// rgba(255, 255, 255, 0.4)
pub const DEFAULT_FILL: [f32; 4] = [1.0, 1.0, 1.0, 0.4];
/// #3399CC
pub const DEFAULT_STROKE: [f32; 4] = [0.2, 0.6, 0.8, 1.0];
pub const DEFAULT_STROKE_WIDTH: f32 = 1.25;
pub const DEFAULT_POINT_RADIUS: f32 = 5.0;

/// Style of a vector engine layer.
///
/// A style given by the context is kept by reference, so the layer can be
/// matched back to the descriptor it was created from.
#[derive(Debug, Clone, Default)]
pub enum VectorStyle {
    #[default]
    Default,
    Custom(Arc<LayerStyle>),
}

impl VectorStyle {
    pub fn from_context(style: Option<&Arc<LayerStyle>>) -> Self {
        match style {
            Some(style) => VectorStyle::Custom(Arc::clone(style)),
            None => VectorStyle::Default,
        }
    }

    pub fn custom(&self) -> Option<&Arc<LayerStyle>> {
        match self {
            VectorStyle::Custom(style) => Some(style),
            VectorStyle::Default => None,
        }
    }

    pub fn fill_color(&self) -> [f32; 4] {
        self.custom()
            .and_then(|s| s.fill_color)
            .unwrap_or(DEFAULT_FILL)
    }

    pub fn stroke_color(&self) -> [f32; 4] {
        self.custom()
            .and_then(|s| s.stroke_color)
            .unwrap_or(DEFAULT_STROKE)
    }

    pub fn stroke_width(&self) -> f32 {
        self.custom()
            .and_then(|s| s.stroke_width)
            .unwrap_or(DEFAULT_STROKE_WIDTH)
    }

    /// Radius of the circle drawn for point features, in pixels.
    pub fn point_radius(&self) -> f32 {
        self.custom()
            .and_then(|s| s.point_radius)
            .unwrap_or(DEFAULT_POINT_RADIUS)
    }
}
