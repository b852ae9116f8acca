use serde::{Deserialize, Serialize};

/// Axis-aligned 2D extent, `[min_x, min_y, max_x, max_y]`.
///
/// Units depend on the frame the extent was built in: degrees for geographic
/// extents, projected units once transformed into a map projection.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Extent {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Extent { min, max }
    }

    /// Corners may come in any order.
    pub fn from_array(a: [f64; 4]) -> Self {
        Extent::new(
            [a[0].min(a[2]), a[1].min(a[3])],
            [a[0].max(a[2]), a[1].max(a[3])],
        )
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.min[0], self.min[1], self.max[0], self.max[1]]
    }

    pub fn width(&self) -> f64 {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> f64 {
        self.max[1] - self.min[1]
    }

    pub fn center(&self) -> [f64; 2] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
        ]
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        p[0] >= self.min[0] && p[0] <= self.max[0] && p[1] >= self.min[1] && p[1] <= self.max[1]
    }

    /// Clamps `p` into the extent.
    pub fn clamp(&self, p: [f64; 2]) -> [f64; 2] {
        [
            p[0].max(self.min[0]).min(self.max[0]),
            p[1].max(self.min[1]).min(self.max[1]),
        ]
    }

    /// Smallest extent containing every point, or `None` for an empty input.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a [f64; 2]>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut out = Extent::new(*first, *first);
        for p in iter {
            out.min[0] = out.min[0].min(p[0]);
            out.min[1] = out.min[1].min(p[1]);
            out.max[0] = out.max[0].max(p[0]);
            out.max[1] = out.max[1].max(p[1]);
        }
        Some(out)
    }

    /// Extent of `size` pixels centered on `center` at `resolution` units per pixel.
    pub fn for_view_and_size(center: [f64; 2], resolution: f64, size: [f64; 2]) -> Self {
        let dx = resolution * size[0] / 2.0;
        let dy = resolution * size[1] / 2.0;
        Extent::new(
            [center[0] - dx, center[1] - dy],
            [center[0] + dx, center[1] + dy],
        )
    }
}

impl From<[f64; 4]> for Extent {
    fn from(a: [f64; 4]) -> Self {
        Extent::from_array(a)
    }
}

impl From<Extent> for [f64; 4] {
    fn from(e: Extent) -> Self {
        e.to_array()
    }
}
