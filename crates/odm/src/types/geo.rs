//! Geo value types.
//!
//! [`GeoPoint`] maps directly onto the store's `{lat, lon}` representation.
//! [`Point`] is a planar x/y pair that the converter rewrites to `{lat: y, lon: x}`.
//! [`GeoJson`] follows the GeoJSON geometry grammar and maps to `geo_shape` fields.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl GeoPoint {
    /// Creates a new point.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

impl From<Point> for GeoPoint {
    fn from(point: Point) -> Self {
        Self {
            lat: point.y,
            lon: point.x,
        }
    }
}

/// A planar point where `x` is the longitude and `y` the latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A GeoJSON geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GeoJson {
    /// A single position.
    Point {
        /// `[lon, lat]`.
        coordinates: [f64; 2],
    },
    /// Several positions.
    MultiPoint {
        /// One `[lon, lat]` per point.
        coordinates: Vec<[f64; 2]>,
    },
    /// A line through positions.
    LineString {
        /// The positions in drawing order; at least two.
        coordinates: Vec<[f64; 2]>,
    },
    /// Several lines.
    MultiLineString {
        /// One position list per line.
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    /// A polygon made of linear rings.
    Polygon {
        /// The exterior ring first, then holes. Each ring is closed.
        coordinates: Vec<Vec<[f64; 2]>>,
    },
    /// Several polygons.
    MultiPolygon {
        /// One ring list per polygon.
        coordinates: Vec<Vec<Vec<[f64; 2]>>>,
    },
    /// A collection of geometries.
    GeometryCollection {
        /// The member geometries.
        geometries: Vec<GeoJson>,
    },
}

/// The canonical GeoJSON type names.
pub(crate) const GEOJSON_TYPES: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Returns the canonical GeoJSON name for a type name in any case.
pub(crate) fn canonical_geojson_type(name: &str) -> Option<&'static str> {
    GEOJSON_TYPES
        .iter()
        .copied()
        .find(|t| t.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_to_geo_point() {
        let point = Point::new(13.4, 52.5);
        let geo: GeoPoint = point.into();
        assert_eq!(geo, GeoPoint::new(52.5, 13.4));
    }

    #[test]
    fn test_geojson_serialization() {
        let line = GeoJson::LineString {
            coordinates: vec![[1.0, 2.0], [3.0, 4.0]],
        };
        let value = serde_json::to_value(&line).unwrap();
        assert_eq!(
            value,
            json!({"type": "LineString", "coordinates": [[1.0, 2.0], [3.0, 4.0]]})
        );
    }

    #[test]
    fn test_geometry_collection_nests_members() {
        let collection = GeoJson::GeometryCollection {
            geometries: vec![
                GeoJson::Point { coordinates: [1.0, 2.0] },
                GeoJson::MultiPolygon {
                    coordinates: vec![vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]],
                },
            ],
        };
        let value = serde_json::to_value(&collection).unwrap();
        assert_eq!(value["type"], json!("GeometryCollection"));
        assert_eq!(value["geometries"][0], json!({"type": "Point", "coordinates": [1.0, 2.0]}));
        assert_eq!(value["geometries"][1]["type"], json!("MultiPolygon"));

        let back: GeoJson = serde_json::from_value(value).unwrap();
        assert_eq!(back, collection);
    }

    #[test]
    fn test_canonical_type_names() {
        assert_eq!(canonical_geojson_type("multipolygon"), Some("MultiPolygon"));
        assert_eq!(canonical_geojson_type("POINT"), Some("Point"));
        assert_eq!(canonical_geojson_type("circle"), None);
    }
}
