//! Geo finding types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One step from the document root: an object key or an array index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Array index
    Index(usize),
    /// Object key
    Key(String),
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "[{}]", i),
            PathSegment::Key(k) => write!(f, ".{}", k),
        }
    }
}

/// Geo data found in a request body
///
/// Serialized as `{"geo": {...}, "radius": 8, "path": ["location"]}`; an
/// empty path means the document root itself was the geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoFinding {
    /// GeoJSON-shaped object (verbatim, or a synthesized `Point`)
    #[serde(rename = "geo")]
    pub geometry: Map<String, Value>,

    /// Accuracy/radius reported next to a lat/lng pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,

    /// Keys and indices from the document root to the source node
    pub path: Vec<PathSegment>,
}

impl GeoFinding {
    /// Create a finding without a radius
    pub fn new(geometry: Map<String, Value>, path: Vec<PathSegment>) -> Self {
        Self {
            geometry,
            radius: None,
            path,
        }
    }

    /// Attach a radius
    pub fn with_radius(mut self, radius: Option<f64>) -> Self {
        self.radius = radius;
        self
    }

    /// GeoJSON `type` of the geometry
    pub fn geometry_type(&self) -> Option<&str> {
        self.geometry.get("type").and_then(Value::as_str)
    }

    /// Render the path as `.key[0].other`
    pub fn path_string(&self) -> String {
        self.path.iter().map(ToString::to_string).collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn point(lng: f64, lat: f64) -> Map<String, Value> {
        match json!({"type": "Point", "coordinates": [lng, lat]}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_serialize_envelope() {
        let finding = GeoFinding::new(point(10.0, -10.0), vec!["location".into(), 2.into()])
            .with_radius(Some(5.0));

        let value = serde_json::to_value(&finding).unwrap();
        assert_eq!(
            value,
            json!({
                "geo": {"type": "Point", "coordinates": [10.0, -10.0]},
                "radius": 5.0,
                "path": ["location", 2]
            })
        );
    }

    #[test]
    fn test_radius_omitted_when_unset() {
        let finding = GeoFinding::new(point(1.0, 2.0), Vec::new());
        let value = serde_json::to_value(&finding).unwrap();

        assert!(value.get("radius").is_none());
        assert_eq!(value["path"], json!([]));
    }

    #[test]
    fn test_path_segment_deserialize() {
        let path: Vec<PathSegment> = serde_json::from_str(r#"["trigger", 0, "geo"]"#).unwrap();
        assert_eq!(
            path,
            vec![
                PathSegment::Key("trigger".into()),
                PathSegment::Index(0),
                PathSegment::Key("geo".into())
            ]
        );
    }

    #[test]
    fn test_path_string() {
        let finding = GeoFinding::new(point(0.0, 0.0), vec!["geos".into(), 1.into()]);
        assert_eq!(finding.path_string(), ".geos[1]");
        assert_eq!(finding.geometry_type(), Some("Point"));
    }
}
