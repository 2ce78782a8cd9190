//! Strict GeoJSON recognition
//!
//! Checks that an object's `type` names a supported GeoJSON container and
//! that the member holding its data has the right shape. Ring closure,
//! winding order and coordinate ranges are not checked.

use serde_json::{Map, Value};

/// Returns true if `object` is a GeoJSON geometry, `Feature` or `FeatureCollection`
pub fn is_geojson(object: &Map<String, Value>) -> bool {
    match type_of(object) {
        Some("Feature") => is_feature(object),
        Some("FeatureCollection") => is_feature_collection(object),
        Some(_) => is_geometry(object),
        None => false,
    }
}

fn type_of(object: &Map<String, Value>) -> Option<&str> {
    object.get("type").and_then(Value::as_str)
}

fn is_geometry(object: &Map<String, Value>) -> bool {
    let coordinates = object.get("coordinates");
    match type_of(object) {
        Some("Point") => coordinates.is_some_and(is_position),
        Some("LineString") => coordinates.is_some_and(is_line),
        Some("Polygon") => coordinates.is_some_and(is_polygon),
        Some("MultiPoint") => coordinates.is_some_and(|c| is_list_of(c, 0, is_position)),
        Some("MultiPolygon") => coordinates.is_some_and(|c| is_list_of(c, 0, is_polygon)),
        Some("GeometryCollection") => object
            .get("geometries")
            .is_some_and(|g| is_list_of(g, 0, |v| v.as_object().is_some_and(is_geometry))),
        _ => false,
    }
}

fn is_feature(object: &Map<String, Value>) -> bool {
    object
        .get("geometry")
        .and_then(Value::as_object)
        .is_some_and(is_geometry)
}

fn is_feature_collection(object: &Map<String, Value>) -> bool {
    object.get("features").is_some_and(|features| {
        is_list_of(features, 0, |f| {
            f.as_object()
                .is_some_and(|f| type_of(f) == Some("Feature") && is_feature(f))
        })
    })
}

/// `[x, y]` or `[x, y, z, ...]`, all numbers
fn is_position(value: &Value) -> bool {
    value
        .as_array()
        .is_some_and(|a| a.len() >= 2 && a.iter().all(Value::is_number))
}

fn is_line(value: &Value) -> bool {
    is_list_of(value, 2, is_position)
}

fn is_ring(value: &Value) -> bool {
    is_list_of(value, 4, is_position)
}

fn is_polygon(value: &Value) -> bool {
    is_list_of(value, 0, is_ring)
}

fn is_list_of(value: &Value, min_len: usize, item: impl Fn(&Value) -> bool) -> bool {
    value
        .as_array()
        .is_some_and(|a| a.len() >= min_len && a.iter().all(item))
}
