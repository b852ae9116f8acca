//! Map projections understood by the map session.
//!
//! Only the two frames a browser map actually works in are supported:
//! geographic longitude/latitude and spherical ("web") mercator. Anything else
//! is rejected when the SRS code is parsed, never silently treated as mercator.

use std::f64::consts::PI;
use std::str::FromStr;

use super::Coordinate;
use crate::bounds::Extent;

/// WGS84 semi-major axis (meters), used as the sphere radius for web mercator.
pub const WGS84_A: f64 = 6_378_137.0;

/// Half the width of the web mercator world, in meters.
pub const MERCATOR_HALF_SIZE: f64 = PI * WGS84_A;

/// Tile size used to derive the zoom 0 resolution.
pub const DEFAULT_TILE_SIZE: f64 = 256.0;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProjectionError {
    #[error("unsupported projection: {0}")]
    Unsupported(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Projection {
    /// EPSG:4326, degrees.
    Geographic,
    /// EPSG:3857, meters.
    #[default]
    WebMercator,
}

impl Projection {
    pub fn code(&self) -> &'static str {
        match self {
            Projection::Geographic => "EPSG:4326",
            Projection::WebMercator => "EPSG:3857",
        }
    }

    /// Validity extent of the projection, in its own units.
    pub fn extent(&self) -> Extent {
        match self {
            Projection::Geographic => Extent::from_array([-180.0, -90.0, 180.0, 90.0]),
            Projection::WebMercator => Extent::from_array([
                -MERCATOR_HALF_SIZE,
                -MERCATOR_HALF_SIZE,
                MERCATOR_HALF_SIZE,
                MERCATOR_HALF_SIZE,
            ]),
        }
    }

    /// Resolution (units per pixel) at zoom 0.
    pub fn max_resolution(&self) -> f64 {
        self.extent().width() / DEFAULT_TILE_SIZE
    }

    /// Converts a `[lon, lat]` pair in degrees into this projection.
    pub fn from_lon_lat(&self, lon_lat: Coordinate) -> Coordinate {
        match self {
            Projection::Geographic => lon_lat,
            Projection::WebMercator => {
                let x = WGS84_A * lon_lat[0].to_radians();
                let y = WGS84_A * (PI * (lon_lat[1] + 90.0) / 360.0).tan().ln();
                [x, y.clamp(-MERCATOR_HALF_SIZE, MERCATOR_HALF_SIZE)]
            }
        }
    }

    /// Converts a coordinate of this projection back to `[lon, lat]` degrees.
    pub fn to_lon_lat(&self, coord: Coordinate) -> Coordinate {
        match self {
            Projection::Geographic => coord,
            Projection::WebMercator => {
                let lon = (coord[0] / WGS84_A).to_degrees();
                let lat = 360.0 * (coord[1] / WGS84_A).exp().atan() / PI - 90.0;
                [lon, lat]
            }
        }
    }

    /// Transforms a coordinate from `self` into `target`.
    pub fn transform(&self, coord: Coordinate, target: Projection) -> Coordinate {
        if *self == target {
            return coord;
        }
        target.from_lon_lat(self.to_lon_lat(coord))
    }

    /// Transforms an extent corner-wise. Both supported projections keep axes
    /// monotonic, so transforming the two corners is exact.
    pub fn transform_extent(&self, extent: Extent, target: Projection) -> Extent {
        Extent::new(
            self.transform(extent.min, target),
            self.transform(extent.max, target),
        )
    }
}

impl FromStr for Projection {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "EPSG:4326" | "CRS:84" | "WGS84" | "URN:OGC:DEF:CRS:EPSG::4326" => {
                Ok(Projection::Geographic)
            }
            "EPSG:3857" | "EPSG:900913" | "EPSG:102100" | "EPSG:102113"
            | "URN:OGC:DEF:CRS:EPSG::3857" => Ok(Projection::WebMercator),
            _ => Err(ProjectionError::Unsupported(s.to_string())),
        }
    }
}

impl TryFrom<String> for Projection {
    type Error = ProjectionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Projection> for String {
    fn from(value: Projection) -> Self {
        value.code().to_string()
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
