//! Document traversal
//!
//! [`extract`] fans out one task per child container and collects findings
//! on a channel; the channel closes once every task has dropped its sender,
//! which is the join point. [`extract_sequential`] walks depth-first on the
//! caller's thread and returns findings in document order.

use serde_json::{Map, Value};
use tokio::sync::mpsc;

use super::finding::{GeoFinding, PathSegment};
use super::geojson::is_geojson;
use super::heuristic;

/// Outcome of inspecting a single node
enum Visit {
    /// The node is geo data; stop here
    Found(GeoFinding),
    /// Descend into these children
    Children(Vec<(PathSegment, Value)>),
    /// Scalar or empty container
    Leaf,
}

fn visit(value: Value, path: &[PathSegment]) -> Visit {
    match value {
        Value::Object(object) => visit_object(object, path),
        Value::Array(items) => Visit::Children(
            items
                .into_iter()
                .enumerate()
                .filter(|(_, v)| is_container(v))
                .map(|(i, v)| (PathSegment::Index(i), v))
                .collect(),
        ),
        _ => Visit::Leaf,
    }
}

fn visit_object(object: Map<String, Value>, path: &[PathSegment]) -> Visit {
    if is_geojson(&object) {
        return Visit::Found(GeoFinding::new(object, path.to_vec()));
    }

    if let Some(point) = heuristic::detect(&object) {
        return Visit::Found(
            GeoFinding::new(point.geometry, path.to_vec()).with_radius(point.radius),
        );
    }

    Visit::Children(
        object
            .into_iter()
            .filter(|(_, v)| is_container(v))
            .map(|(k, v)| (PathSegment::Key(k), v))
            .collect(),
    )
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn child_path(path: &[PathSegment], segment: PathSegment) -> Vec<PathSegment> {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(segment);
    child
}

/// Decode `body` and extract geo findings concurrently
///
/// Returns an empty list if `body` is not JSON. Finding order is not stable
/// between calls; sort by `path` if it matters.
pub async fn extract(body: &[u8]) -> Vec<GeoFinding> {
    match decode(body) {
        Some(value) => extract_value(value).await,
        None => Vec::new(),
    }
}

/// Extract geo findings from an already decoded document, concurrently
pub async fn extract_value(value: Value) -> Vec<GeoFinding> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    spawn_walk(value, Vec::new(), tx);

    let mut findings = Vec::new();
    while let Some(finding) = rx.recv().await {
        findings.push(finding);
    }

    tracing::debug!(findings = findings.len(), "Geo extraction complete");
    findings
}

fn spawn_walk(value: Value, path: Vec<PathSegment>, tx: mpsc::UnboundedSender<GeoFinding>) {
    tokio::spawn(async move {
        match visit(value, &path) {
            Visit::Found(finding) => {
                let _ = tx.send(finding);
            }
            Visit::Children(children) => {
                for (segment, child) in children {
                    spawn_walk(child, child_path(&path, segment), tx.clone());
                }
            }
            Visit::Leaf => {}
        }
    });
}

/// Decode `body` and extract geo findings depth-first, in document order
pub fn extract_sequential(body: &[u8]) -> Vec<GeoFinding> {
    match decode(body) {
        Some(value) => extract_value_sequential(value),
        None => Vec::new(),
    }
}

/// Extract geo findings from an already decoded document, depth-first
pub fn extract_value_sequential(value: Value) -> Vec<GeoFinding> {
    let mut findings = Vec::new();
    let mut stack = vec![(Vec::new(), value)];

    while let Some((path, value)) = stack.pop() {
        match visit(value, &path) {
            Visit::Found(finding) => findings.push(finding),
            Visit::Children(children) => {
                // reversed so the first child is popped first
                for (segment, child) in children.into_iter().rev() {
                    stack.push((child_path(&path, segment), child));
                }
            }
            Visit::Leaf => {}
        }
    }

    findings
}

fn decode(body: &[u8]) -> Option<Value> {
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(error = %e, len = body.len(), "Request body is not JSON");
            None
        }
    }
}
