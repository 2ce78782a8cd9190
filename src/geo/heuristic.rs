//! Non-standard geo encodings
//!
//! Looks at an object's own key/value pairs (never nested ones) for a
//! latitude/longitude pair. Key matching is case-insensitive.

use serde_json::{Map, Number, Value};

/// Keys holding a latitude
pub const LATITUDE_KEYS: &[&str] = &["lat", "latitude", "y"];

/// Keys holding a longitude
pub const LONGITUDE_KEYS: &[&str] = &["lng", "lon", "long", "longitude", "x"];

/// Keys holding an accuracy radius
pub const RADIUS_KEYS: &[&str] = &["dst", "dist", "distance", "rad", "radius", "acc", "accuracy"];

/// Keys holding a `[longitude, latitude]` pair
pub const PAIR_KEYS: &[&str] = &[
    "geo",
    "loc",
    "location",
    "coord",
    "coordinate",
    "coords",
    "coordinates",
];

/// A point synthesized from loose lat/lng fields
#[derive(Debug, Clone, PartialEq)]
pub struct LoosePoint {
    /// `{"type": "Point", "coordinates": [lng, lat]}`
    pub geometry: Map<String, Value>,
    /// Radius, if a radius key was present
    pub radius: Option<f64>,
}

#[derive(Default)]
struct Scan<'a> {
    lat: Option<&'a Number>,
    lng: Option<&'a Number>,
    pair: Option<(&'a Number, &'a Number)>,
    radius: Option<f64>,
}

/// Scan `object` for a lat/lng pair
///
/// An explicit lat/lng pair wins over a `[lng, lat]` pair key. The pair must
/// satisfy `-90 <= lat <= 90` and `-180 <= lng <= 180`.
pub fn detect(object: &Map<String, Value>) -> Option<LoosePoint> {
    let mut scan = Scan::default();

    for (key, value) in object {
        let key = key.to_ascii_lowercase();
        let key = key.as_str();

        if LATITUDE_KEYS.contains(&key) {
            if let (None, Value::Number(n)) = (scan.lat, value) {
                scan.lat = Some(n);
            }
        } else if LONGITUDE_KEYS.contains(&key) {
            if let (None, Value::Number(n)) = (scan.lng, value) {
                scan.lng = Some(n);
            }
        } else if RADIUS_KEYS.contains(&key) {
            if scan.radius.is_none() {
                scan.radius = value.as_f64().filter(|r| *r >= 0.0);
            }
        } else if PAIR_KEYS.contains(&key) && scan.pair.is_none() {
            scan.pair = number_pair(value);
        }
    }

    let (lng, lat) = match (scan.lng, scan.lat, scan.pair) {
        (Some(lng), Some(lat), _) => (lng, lat),
        (_, _, Some(pair)) => pair,
        _ => return None,
    };

    if !in_range(lat, 90.0) || !in_range(lng, 180.0) {
        return None;
    }

    let mut geometry = Map::new();
    geometry.insert("type".into(), Value::String("Point".into()));
    geometry.insert(
        "coordinates".into(),
        Value::Array(vec![Value::Number(lng.clone()), Value::Number(lat.clone())]),
    );

    Some(LoosePoint {
        geometry,
        radius: scan.radius,
    })
}

fn number_pair(value: &Value) -> Option<(&Number, &Number)> {
    match value.as_array().map(Vec::as_slice) {
        Some([Value::Number(lng), Value::Number(lat)]) => Some((lng, lat)),
        _ => None,
    }
}

fn in_range(n: &Number, limit: f64) -> bool {
    n.as_f64().is_some_and(|v| (-limit..=limit).contains(&v))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn scan(value: Value) -> Option<LoosePoint> {
        detect(value.as_object().unwrap())
    }

    fn coordinates(point: &LoosePoint) -> Value {
        point.geometry["coordinates"].clone()
    }

    #[test]
    fn test_every_lat_lng_alias() {
        for lat_key in LATITUDE_KEYS {
            for lng_key in LONGITUDE_KEYS {
                let mut object = Map::new();
                object.insert(lat_key.to_string(), json!(-10));
                object.insert(lng_key.to_string(), json!(10));

                let point = detect(&object).unwrap();
                assert_eq!(
                    Value::Object(point.geometry),
                    json!({"type": "Point", "coordinates": [10, -10]}),
                    "{} / {}",
                    lat_key,
                    lng_key
                );
                assert_eq!(point.radius, None);
            }
        }
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let point = scan(json!({"Latitude": 45.5, "LONG": -122.6})).unwrap();
        assert_eq!(coordinates(&point), json!([-122.6, 45.5]));
    }

    #[test]
    fn test_every_radius_alias() {
        for radius_key in RADIUS_KEYS {
            let mut object = Map::new();
            object.insert("x".into(), json!(10));
            object.insert("y".into(), json!(-10));
            object.insert(radius_key.to_string(), json!(5));

            let point = detect(&object).unwrap();
            assert_eq!(point.radius, Some(5.0), "{}", radius_key);
        }
    }

    #[test]
    fn test_every_pair_alias() {
        for pair_key in PAIR_KEYS {
            let mut object = Map::new();
            object.insert(pair_key.to_string(), json!([10, -10]));

            let point = detect(&object).unwrap();
            assert_eq!(coordinates(&point), json!([10, -10]), "{}", pair_key);
        }
    }

    #[test]
    fn test_out_of_range() {
        assert!(scan(json!({"lat": 91, "lng": 0})).is_none());
        assert!(scan(json!({"lat": -90.5, "lng": 0})).is_none());
        assert!(scan(json!({"lat": 0, "lng": 180.1})).is_none());
        assert!(scan(json!({"coords": [-181, 0]})).is_none());
        assert!(scan(json!({"lat": 90, "lng": -180})).is_some());
    }

    #[test]
    fn test_requires_both_numbers() {
        assert!(scan(json!({"lat": 10})).is_none());
        assert!(scan(json!({"lat": "10", "lng": 20})).is_none());
        assert!(scan(json!({"x": 1, "foo": "bar"})).is_none());
        assert!(scan(json!({"loc": [1, 2, 3]})).is_none());
        assert!(scan(json!({"loc": {"x": 1, "y": 2}})).is_none());
    }

    #[test]
    fn test_explicit_pair_wins_over_pair_key() {
        let point = scan(json!({"lat": 1, "lng": 2, "coords": [30, 40]})).unwrap();
        assert_eq!(coordinates(&point), json!([2, 1]));
    }

    #[test]
    fn test_negative_radius_ignored() {
        let point = scan(json!({"lat": 1, "lng": 2, "accuracy": -3})).unwrap();
        assert_eq!(point.radius, None);
    }
}
