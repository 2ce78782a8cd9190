//! Geo data detection
//!
//! Walks an arbitrary JSON document and reports every piece of geospatial
//! data it contains, tagged with the path to the node that produced it.
//!
//! Each object node is checked in two stages:
//!
//! 1. Strict GeoJSON (`Point`, `LineString`, `Polygon`, `MultiPoint`,
//!    `MultiPolygon`, `GeometryCollection`, `Feature`, `FeatureCollection`).
//!    The object is reported verbatim.
//! 2. A scan of the object's own keys for latitude/longitude pairs
//!    (`lat`/`lng`, `latitude`/`longitude`, `y`/`x`, ...), optionally with a
//!    radius (`acc`, `radius`, `dist`, ...), or a `[lng, lat]` pair under a
//!    key like `loc` or `coords`. A `Point` is synthesized from the match.
//!
//! A node that produces a finding is not descended into. Everything else is
//! traversed; siblings are independent and [`extract`] walks them on separate
//! tasks.
//!
//! ```text
//! {"device": {"lat": 45.5, "lng": -122.6, "acc": 8}, "trail": [[0,0],[1,1]]}
//!            └── finding at ["device"], radius 8
//! ```

pub mod extract;
pub mod finding;
pub mod geojson;
pub mod heuristic;

pub use extract::{extract, extract_sequential, extract_value, extract_value_sequential};
pub use finding::{GeoFinding, PathSegment};
pub use geojson::is_geojson;
