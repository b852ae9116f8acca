use foundation::math::Coordinate;
use layers::LayerFeatures;
use serde_json::{Value, json};

/// Emitted once per click, after every context layer was queried.
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturesClicked {
    /// In the view projection.
    pub coordinate: Coordinate,
    pub lon_lat: Coordinate,
    /// One entry per context layer, in context order: `None` for layers
    /// that are not queryable. Empty when any query failed.
    pub features: Vec<LayerFeatures>,
}

impl FeaturesClicked {
    pub fn to_json(&self) -> Value {
        let features: Vec<Value> = self
            .features
            .iter()
            .map(|layer| match layer {
                Some(list) => Value::Array(list.iter().map(|f| f.to_geojson_value()).collect()),
                None => Value::Null,
            })
            .collect();
        json!({
            "coordinate": self.coordinate,
            "lonLat": self.lon_lat,
            "features": features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FeaturesClicked;
    use formats::{Feature, Geometry};
    use pretty_assertions::assert_eq;
    use serde_json::{Map, json};

    #[test]
    fn json_keeps_layer_slots() {
        let event = FeaturesClicked {
            coordinate: [1.0, 2.0],
            lon_lat: [0.5, 0.25],
            features: vec![
                None,
                Some(vec![]),
                Some(vec![Feature {
                    id: Some("f1".to_string()),
                    properties: Map::new(),
                    geometry: Some(Geometry::Point([1.0, 2.0])),
                }]),
            ],
        };
        assert_eq!(
            event.to_json(),
            json!({
                "coordinate": [1.0, 2.0],
                "lonLat": [0.5, 0.25],
                "features": [
                    null,
                    [],
                    [{
                        "type": "Feature",
                        "id": "f1",
                        "properties": {},
                        "geometry": { "type": "Point", "coordinates": [1.0, 2.0] }
                    }]
                ]
            })
        );
    }
}
