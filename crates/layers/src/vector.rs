//! Vector layers: feature storage, remote loading strategies and hit testing.

use context::InlineGeojson;
use formats::{Feature, GeojsonError, Geometry, ReadOptions, read_features, read_features_str};
use foundation::Extent;
use foundation::math::{Coordinate, Projection};

use crate::symbology::VectorStyle;

#[derive(Debug)]
pub struct VectorLayer {
    pub source: VectorSource,
    pub style: VectorStyle,
}

/// WFS GetFeature request issued for every extent the map needs.
#[derive(Debug, Clone, PartialEq)]
pub struct WfsRequest {
    pub url: String,
    pub type_name: String,
}

impl WfsRequest {
    pub fn new(url: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            type_name: type_name.into(),
        }
    }

    /// GetFeature URL for `extent`, given in EPSG:3857.
    pub fn url_for_extent(&self, extent: &Extent) -> String {
        let separator = if self.url.ends_with('?') || self.url.ends_with('&') {
            ""
        } else if self.url.contains('?') {
            "&"
        } else {
            "?"
        };
        let bbox = extent.to_array().map(|v| v.to_string()).join(",");
        format!(
            "{}{separator}service=WFS&version=1.1.0&request=GetFeature\
             &outputFormat=application/json&typename={}&srsname=EPSG:3857\
             &bbox={bbox},EPSG:3857",
            self.url, self.type_name
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VectorLoader {
    /// Features were given up front.
    Static,
    /// One GeoJSON document, fetched once.
    Url(String),
    /// Features fetched per extent.
    Wfs(WfsRequest),
}

#[derive(Debug)]
pub struct VectorSource {
    loader: VectorLoader,
    /// Frame the stored features are expressed in.
    projection: Projection,
    features: Vec<Feature>,
    loaded_extents: Vec<Extent>,
}

impl VectorSource {
    pub fn from_features(features: Vec<Feature>, projection: Projection) -> Self {
        Self {
            loader: VectorLoader::Static,
            projection,
            features,
            loaded_extents: Vec::new(),
        }
    }

    pub fn from_url(url: impl Into<String>, projection: Projection) -> Self {
        Self {
            loader: VectorLoader::Url(url.into()),
            projection,
            features: Vec::new(),
            loaded_extents: Vec::new(),
        }
    }

    pub fn wfs(request: WfsRequest, projection: Projection) -> Self {
        Self {
            loader: VectorLoader::Wfs(request),
            projection,
            features: Vec::new(),
            loaded_extents: Vec::new(),
        }
    }

    pub fn loader(&self) -> &VectorLoader {
        &self.loader
    }

    /// The document URL of a `Url` loaded source.
    pub fn url(&self) -> Option<&str> {
        match &self.loader {
            VectorLoader::Url(url) => Some(url),
            _ => None,
        }
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    /// URL to fetch before `extent` can be shown, if any.
    pub fn pending_request(&self, extent: &Extent) -> Option<String> {
        match &self.loader {
            VectorLoader::Static => None,
            VectorLoader::Url(url) => self.loaded_extents.is_empty().then(|| url.clone()),
            VectorLoader::Wfs(request) => {
                let covered = self.loaded_extents.iter().any(|e| covers(e, extent));
                if covered {
                    return None;
                }
                let mercator = self.projection.transform_extent(*extent, Projection::WebMercator);
                Some(request.url_for_extent(&mercator))
            }
        }
    }

    /// Stores the answer to [`pending_request`](Self::pending_request) for
    /// `extent`. Returns the number of features that were new.
    pub fn add_loaded(&mut self, extent: Extent, payload: &str) -> Result<usize, GeojsonError> {
        let opts = match &self.loader {
            VectorLoader::Wfs(_) => ReadOptions {
                data_projection: Projection::WebMercator,
                feature_projection: self.projection,
            },
            _ => ReadOptions::into_projection(self.projection),
        };
        let loaded = read_features_str(payload, opts)?;
        let mut added = 0;
        for feature in loaded {
            let known = feature.id.is_some()
                && self.features.iter().any(|f| f.id == feature.id);
            if !known {
                self.features.push(feature);
                added += 1;
            }
        }
        let extent = match self.loader {
            VectorLoader::Url(_) => self.projection.extent(),
            _ => extent,
        };
        self.loaded_extents.push(extent);
        Ok(added)
    }

    /// Features under `coordinate`. Tolerances are in map units.
    pub fn features_at(
        &self,
        coordinate: Coordinate,
        point_radius: f64,
        line_tolerance: f64,
    ) -> Vec<Feature> {
        self.features
            .iter()
            .filter(|f| {
                f.geometry
                    .as_ref()
                    .is_some_and(|g| hits(g, coordinate, point_radius, line_tolerance))
            })
            .cloned()
            .collect()
    }
}

/// Reads inline GeoJSON given as text or as a parsed document.
pub fn read_inline(data: &InlineGeojson, opts: ReadOptions) -> Result<Vec<Feature>, GeojsonError> {
    match data {
        InlineGeojson::Text(text) => read_features_str(text, opts),
        InlineGeojson::Object(value) => read_features(value, opts),
    }
}

fn covers(outer: &Extent, inner: &Extent) -> bool {
    outer.contains(inner.min) && outer.contains(inner.max)
}

fn hits(geometry: &Geometry, c: Coordinate, point_radius: f64, line_tolerance: f64) -> bool {
    match geometry {
        Geometry::Point(p) => distance(*p, c) <= point_radius,
        Geometry::MultiPoint(ps) => ps.iter().any(|p| distance(*p, c) <= point_radius),
        Geometry::LineString(line) => near_line(line, c, line_tolerance),
        Geometry::MultiLineString(lines) => lines.iter().any(|l| near_line(l, c, line_tolerance)),
        Geometry::Polygon(rings) => polygon_hit(rings, c, line_tolerance),
        Geometry::MultiPolygon(polys) => polys.iter().any(|r| polygon_hit(r, c, line_tolerance)),
    }
}

fn polygon_hit(rings: &[Vec<Coordinate>], c: Coordinate, line_tolerance: f64) -> bool {
    // Even-odd over every ring, so holes are excluded.
    let crossings = rings.iter().filter(|ring| ring_crosses(ring, c)).count();
    crossings % 2 == 1 || rings.iter().any(|ring| near_line(ring, c, line_tolerance))
}

/// Whether a ray from `c` towards +x crosses `ring` an odd number of times.
fn ring_crosses(ring: &[Coordinate], c: Coordinate) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a[1] > c[1]) != (b[1] > c[1]) {
            let x = a[0] + (c[1] - a[1]) * (b[0] - a[0]) / (b[1] - a[1]);
            if c[0] < x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn near_line(line: &[Coordinate], c: Coordinate, tolerance: f64) -> bool {
    match line {
        [] => false,
        [p] => distance(*p, c) <= tolerance,
        _ => line
            .windows(2)
            .any(|w| segment_distance(c, w[0], w[1]) <= tolerance),
    }
}

fn distance(a: Coordinate, b: Coordinate) -> f64 {
    (a[0] - b[0]).hypot(a[1] - b[1])
}

fn segment_distance(p: Coordinate, a: Coordinate, b: Coordinate) -> f64 {
    let (dx, dy) = (b[0] - a[0], b[1] - a[1]);
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return distance(p, a);
    }
    let t = (((p[0] - a[0]) * dx + (p[1] - a[1]) * dy) / len2).clamp(0.0, 1.0);
    distance(p, [a[0] + t * dx, a[1] + t * dy])
}
