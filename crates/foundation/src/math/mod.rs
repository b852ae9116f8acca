pub mod projection;

pub use projection::*;

/// A coordinate in a map frame: `[x, y]`, or `[lon, lat]` in degrees for
/// geographic coordinates.
pub type Coordinate = [f64; 2];

/// A position on the rendering surface in CSS pixels, origin top-left.
pub type Pixel = [f64; 2];
