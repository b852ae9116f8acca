//! GeoJSON reading into projected features.
//!
//! Input coordinates are read in `data_projection` (GeoJSON is geographic by
//! definition, but WMS GetFeatureInfo answers in the map projection) and
//! stored in `feature_projection`, the frame the map works in.

use foundation::Extent;
use foundation::math::{Coordinate, Projection};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coordinate),
    MultiPoint(Vec<Coordinate>),
    LineString(Vec<Coordinate>),
    MultiLineString(Vec<Vec<Coordinate>>),
    Polygon(Vec<Vec<Coordinate>>),
    MultiPolygon(Vec<Vec<Vec<Coordinate>>>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<String>,
    pub properties: Map<String, Value>,
    /// GeoJSON allows features without geometry.
    pub geometry: Option<Geometry>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReadOptions {
    pub data_projection: Projection,
    pub feature_projection: Projection,
}

impl ReadOptions {
    /// Geographic input, stored in `feature_projection`.
    pub fn into_projection(feature_projection: Projection) -> Self {
        Self {
            data_projection: Projection::Geographic,
            feature_projection,
        }
    }

    /// Input already expressed in `projection`.
    pub fn native(projection: Projection) -> Self {
        Self {
            data_projection: projection,
            feature_projection: projection,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GeojsonError {
    #[error("invalid GeoJSON text: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a GeoJSON FeatureCollection, Feature or geometry")]
    NotGeojson,
    #[error("invalid feature at index {index}: {reason}")]
    InvalidFeature { index: usize, reason: String },
}

/// Reads every feature of a FeatureCollection, a single Feature, or a bare
/// geometry (wrapped in a property-less feature).
pub fn read_features_str(payload: &str, opts: ReadOptions) -> Result<Vec<Feature>, GeojsonError> {
    let value: Value = serde_json::from_str(payload)?;
    read_features(&value, opts)
}

pub fn read_features(value: &Value, opts: ReadOptions) -> Result<Vec<Feature>, GeojsonError> {
    let obj = value.as_object().ok_or(GeojsonError::NotGeojson)?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or(GeojsonError::NotGeojson)?;

    match ty {
        "FeatureCollection" => {
            let features_val = obj
                .get("features")
                .and_then(|v| v.as_array())
                .ok_or(GeojsonError::NotGeojson)?;
            let mut features = Vec::with_capacity(features_val.len());
            for (index, feat_val) in features_val.iter().enumerate() {
                features.push(read_feature(feat_val, opts, index)?);
            }
            Ok(features)
        }
        "Feature" => Ok(vec![read_feature(value, opts, 0)?]),
        _ => {
            let geometry = parse_geometry(value)
                .map_err(|reason| GeojsonError::InvalidFeature { index: 0, reason })?;
            Ok(vec![Feature {
                id: None,
                properties: Map::new(),
                geometry: Some(reproject(geometry, opts)),
            }])
        }
    }
}

fn read_feature(value: &Value, opts: ReadOptions, index: usize) -> Result<Feature, GeojsonError> {
    let feat_obj = value.as_object().ok_or(GeojsonError::InvalidFeature {
        index,
        reason: "feature must be an object".to_string(),
    })?;

    let feat_type = feat_obj.get("type").and_then(|v| v.as_str()).ok_or(
        GeojsonError::InvalidFeature {
            index,
            reason: "feature missing type".to_string(),
        },
    )?;
    if feat_type != "Feature" {
        return Err(GeojsonError::InvalidFeature {
            index,
            reason: format!("unexpected feature type: {feat_type}"),
        });
    }

    let id = match feat_obj.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    let properties = feat_obj
        .get("properties")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let geometry = match feat_obj.get("geometry") {
        None | Some(Value::Null) => None,
        Some(geometry_val) => {
            let geometry = parse_geometry(geometry_val)
                .map_err(|reason| GeojsonError::InvalidFeature { index, reason })?;
            Some(reproject(geometry, opts))
        }
    };

    Ok(Feature {
        id,
        properties,
        geometry,
    })
}

fn reproject(geometry: Geometry, opts: ReadOptions) -> Geometry {
    if opts.data_projection == opts.feature_projection {
        return geometry;
    }
    geometry.transform(opts.data_projection, opts.feature_projection)
}

impl Geometry {
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    pub fn transform(&self, from: Projection, to: Projection) -> Geometry {
        let t = |c: &Coordinate| from.transform(*c, to);
        let line = |l: &Vec<Coordinate>| l.iter().map(t).collect::<Vec<_>>();
        match self {
            Geometry::Point(p) => Geometry::Point(t(p)),
            Geometry::MultiPoint(ps) => Geometry::MultiPoint(line(ps)),
            Geometry::LineString(ps) => Geometry::LineString(line(ps)),
            Geometry::MultiLineString(lines) => {
                Geometry::MultiLineString(lines.iter().map(line).collect())
            }
            Geometry::Polygon(rings) => Geometry::Polygon(rings.iter().map(line).collect()),
            Geometry::MultiPolygon(polys) => Geometry::MultiPolygon(
                polys
                    .iter()
                    .map(|rings| rings.iter().map(line).collect::<Vec<_>>())
                    .collect(),
            ),
        }
    }

    /// Every vertex, in document order.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        match self {
            Geometry::Point(p) => vec![*p],
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => ps.clone(),
            Geometry::MultiLineString(rings) | Geometry::Polygon(rings) => {
                rings.iter().flatten().copied().collect()
            }
            Geometry::MultiPolygon(polys) => polys.iter().flatten().flatten().copied().collect(),
        }
    }

    pub fn extent(&self) -> Option<Extent> {
        Extent::from_points(self.coordinates().iter())
    }
}

impl Feature {
    /// Semantic exporter: emits a GeoJSON Feature with coordinates as stored.
    pub fn to_geojson_value(&self) -> Value {
        let mut fobj = Map::new();
        fobj.insert("type".to_string(), Value::String("Feature".to_string()));
        if let Some(id) = &self.id {
            fobj.insert("id".to_string(), Value::String(id.clone()));
        }
        fobj.insert(
            "properties".to_string(),
            Value::Object(self.properties.clone()),
        );
        fobj.insert(
            "geometry".to_string(),
            self.geometry
                .as_ref()
                .map(geometry_to_geojson_value)
                .unwrap_or(Value::Null),
        );
        Value::Object(fobj)
    }
}

fn geometry_to_geojson_value(geom: &Geometry) -> Value {
    let coords = match geom {
        Geometry::Point(p) => point_coords(p),
        Geometry::MultiPoint(ps) | Geometry::LineString(ps) => line_coords(ps),
        Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
            Value::Array(lines.iter().map(|l| line_coords(l)).collect())
        }
        Geometry::MultiPolygon(polys) => Value::Array(
            polys
                .iter()
                .map(|rings| Value::Array(rings.iter().map(|l| line_coords(l)).collect()))
                .collect(),
        ),
    };
    let mut obj = Map::new();
    obj.insert(
        "type".to_string(),
        Value::String(geom.type_name().to_string()),
    );
    obj.insert("coordinates".to_string(), coords);
    Value::Object(obj)
}

fn point_coords(p: &Coordinate) -> Value {
    Value::Array(vec![Value::from(p[0]), Value::from(p[1])])
}

fn line_coords(ps: &[Coordinate]) -> Value {
    Value::Array(ps.iter().map(point_coords).collect())
}

fn parse_geometry(value: &Value) -> Result<Geometry, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Point" => Ok(Geometry::Point(parse_point(coords)?)),
        "MultiPoint" => Ok(Geometry::MultiPoint(parse_points(coords)?)),
        "LineString" => Ok(Geometry::LineString(parse_points(coords)?)),
        "MultiLineString" => Ok(Geometry::MultiLineString(parse_rings(coords)?)),
        "Polygon" => Ok(Geometry::Polygon(parse_rings(coords)?)),
        "MultiPolygon" => {
            let polys = coords
                .as_array()
                .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
            let mut out = Vec::with_capacity(polys.len());
            for poly in polys {
                out.push(parse_rings(poly)?);
            }
            Ok(Geometry::MultiPolygon(out))
        }
        other => Err(format!("unsupported geometry type: {other}")),
    }
}

fn parse_point(coords: &Value) -> Result<Coordinate, String> {
    let arr = coords
        .as_array()
        .ok_or("Point coordinates must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("Point coordinates must have [x, y]".to_string());
    }
    let x = arr[0].as_f64().ok_or("x must be a number".to_string())?;
    let y = arr[1].as_f64().ok_or("y must be a number".to_string())?;
    Ok([x, y])
}

fn parse_points(coords: &Value) -> Result<Vec<Coordinate>, String> {
    let arr = coords
        .as_array()
        .ok_or("coordinates must be an array".to_string())?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        out.push(parse_point(item)?);
    }
    Ok(out)
}

fn parse_rings(coords: &Value) -> Result<Vec<Vec<Coordinate>>, String> {
    let rings = coords
        .as_array()
        .ok_or("coordinates must be an array of rings".to_string())?;
    let mut out = Vec::with_capacity(rings.len());
    for ring in rings {
        out.push(parse_points(ring)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{Geometry, GeojsonError, ReadOptions, read_features, read_features_str};
    use foundation::math::Projection;
    use serde_json::json;

    fn polygon_collection() -> serde_json::Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "id": 12,
                "properties": { "name": "triangle" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-29.07, 51.13], [-22.46, 28.03], [-16.82, 45.26], [-29.07, 51.13]]]
                }
            }]
        })
    }

    #[test]
    fn reads_and_reprojects_collection() {
        let features = read_features(
            &polygon_collection(),
            ReadOptions::into_projection(Projection::WebMercator),
        )
        .expect("valid collection");
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].id.as_deref(), Some("12"));
        assert_eq!(features[0].properties["name"], "triangle");

        let Some(Geometry::Polygon(rings)) = &features[0].geometry else {
            panic!("expected polygon");
        };
        let expected = Projection::WebMercator.from_lon_lat([-29.07, 51.13]);
        assert_eq!(rings[0][0], expected);
    }

    #[test]
    fn keeps_native_coordinates() {
        let features = read_features(
            &json!({ "type": "Point", "coordinates": [1000.0, 2000.0] }),
            ReadOptions::native(Projection::WebMercator),
        )
        .expect("bare geometry");
        assert_eq!(features[0].geometry, Some(Geometry::Point([1000.0, 2000.0])));
    }

    #[test]
    fn reads_single_feature_with_null_geometry() {
        let features = read_features(
            &json!({ "type": "Feature", "properties": null, "geometry": null }),
            ReadOptions::native(Projection::Geographic),
        )
        .expect("feature");
        assert_eq!(features.len(), 1);
        assert!(features[0].geometry.is_none());
        assert!(features[0].properties.is_empty());
    }

    #[test]
    fn rejects_malformed_text() {
        let err = read_features_str("{ not json", ReadOptions::native(Projection::Geographic))
            .expect_err("malformed");
        assert!(matches!(err, GeojsonError::Json(_)));

        let err = read_features(&json!([1, 2]), ReadOptions::native(Projection::Geographic))
            .expect_err("not an object");
        assert!(matches!(err, GeojsonError::NotGeojson));
    }

    #[test]
    fn exports_feature_value() {
        let features = read_features(
            &polygon_collection(),
            ReadOptions::native(Projection::Geographic),
        )
        .expect("valid collection");
        let value = features[0].to_geojson_value();
        assert_eq!(value["geometry"]["type"], "Polygon");
        assert_eq!(value["geometry"]["coordinates"][0][1], json!([-22.46, 28.03]));
        assert_eq!(value["id"], "12");
    }
}
