//! Map view state: center, resolution and the conversions between map
//! coordinates and viewport pixels.

use context::MapContextView;
use foundation::Extent;
use foundation::math::{Coordinate, Pixel, Projection, ProjectionError};

pub const DEFAULT_MAX_ZOOM: f64 = 28.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    projection: Projection,
    center: Option<Coordinate>,
    resolution: Option<f64>,
    max_zoom: f64,
    max_extent: Option<Extent>,
    /// The world is never wrapped horizontally.
    pub multi_world: bool,
    /// Resolutions snap to whole zoom levels.
    pub constrain_resolution: bool,
}

impl Default for MapView {
    fn default() -> Self {
        Self::new(Projection::default())
    }
}

impl MapView {
    /// A view without a center, at zoom 0.
    pub fn new(projection: Projection) -> Self {
        Self {
            projection,
            center: None,
            resolution: Some(projection.max_resolution()),
            max_zoom: DEFAULT_MAX_ZOOM,
            max_extent: None,
            multi_world: false,
            constrain_resolution: true,
        }
    }

    /// Builds the view described by a context view.
    ///
    /// Coordinates of the context are longitude/latitude. When an extent is
    /// given, the view is fitted to it in a viewport of `viewport_size`
    /// pixels, overriding center and zoom.
    pub fn from_context(
        view: &MapContextView,
        default_projection: Projection,
        viewport_size: [f64; 2],
    ) -> Result<Self, ProjectionError> {
        let projection = match &view.srs {
            Some(srs) => srs.parse()?,
            None => default_projection,
        };
        let mut out = Self::new(projection);
        out.resolution = None;
        if let Some(max_zoom) = view.max_zoom {
            out.max_zoom = max_zoom.max(0.0);
        }
        if let Some(max_extent) = view.max_extent {
            out.max_extent = Some(Projection::Geographic.transform_extent(max_extent, projection));
        }
        if let Some(center) = view.center {
            out.set_center(projection.from_lon_lat(center));
        }
        if let Some(zoom) = view.zoom {
            out.set_zoom(zoom);
        }
        if let Some(extent) = view.extent {
            let extent = Projection::Geographic.transform_extent(extent, projection);
            out.fit(&extent, viewport_size);
        }
        Ok(out)
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn center(&self) -> Option<Coordinate> {
        self.center
    }

    /// Map units per pixel.
    pub fn resolution(&self) -> Option<f64> {
        self.resolution
    }

    pub fn zoom(&self) -> Option<f64> {
        self.resolution.map(|r| self.zoom_for_resolution(r))
    }

    pub fn max_zoom(&self) -> f64 {
        self.max_zoom
    }

    pub fn max_extent(&self) -> Option<Extent> {
        self.max_extent
    }

    pub fn resolution_for_zoom(&self, zoom: f64) -> f64 {
        self.projection.max_resolution() / 2f64.powf(zoom)
    }

    pub fn zoom_for_resolution(&self, resolution: f64) -> f64 {
        (self.projection.max_resolution() / resolution).log2()
    }

    pub fn set_center(&mut self, center: Coordinate) {
        self.center = Some(match &self.max_extent {
            Some(extent) => extent.clamp(center),
            None => center,
        });
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        let zoom = if self.constrain_resolution {
            zoom.round()
        } else {
            zoom
        };
        self.resolution = Some(self.resolution_for_zoom(zoom.clamp(0.0, self.max_zoom)));
    }

    /// Centers the view on `extent` at the closest zoom level showing all of
    /// it in a viewport of `size` pixels.
    pub fn fit(&mut self, extent: &Extent, size: [f64; 2]) {
        let resolution = (extent.width() / size[0]).max(extent.height() / size[1]);
        let zoom = self.zoom_for_resolution(resolution);
        let zoom = if self.constrain_resolution {
            // Nudged so an extent that fits a level exactly keeps it.
            (zoom + 1e-9).floor()
        } else {
            zoom
        };
        let zoom = if zoom.is_nan() { 0.0 } else { zoom };
        self.resolution = Some(self.resolution_for_zoom(zoom.clamp(0.0, self.max_zoom)));
        self.set_center(extent.center());
    }

    /// Area shown in a viewport of `size` pixels.
    pub fn calculate_extent(&self, size: [f64; 2]) -> Option<Extent> {
        let (center, resolution) = (self.center?, self.resolution?);
        Some(Extent::for_view_and_size(center, resolution, size))
    }

    pub fn pixel_from_coordinate(&self, coordinate: Coordinate, size: [f64; 2]) -> Option<Pixel> {
        let (center, resolution) = (self.center?, self.resolution?);
        Some([
            (coordinate[0] - center[0]) / resolution + size[0] / 2.0,
            (center[1] - coordinate[1]) / resolution + size[1] / 2.0,
        ])
    }

    pub fn coordinate_from_pixel(&self, pixel: Pixel, size: [f64; 2]) -> Option<Coordinate> {
        let (center, resolution) = (self.center?, self.resolution?);
        Some([
            center[0] + (pixel[0] - size[0] / 2.0) * resolution,
            center[1] - (pixel[1] - size[1] / 2.0) * resolution,
        ])
    }
}
