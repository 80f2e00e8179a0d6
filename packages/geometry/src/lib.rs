#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! GeoJSON-style geometry model and point traversal utilities.
//!
//! Geometry values are immutable snapshots: every operation that
//! produces geometry returns a fresh value and never aliases or
//! mutates its input, so one feature's reprojection can never corrupt
//! another feature's cached shape.
//!
//! Editable shapes are restricted to the primitive types (`Point`,
//! `LineString`, `Polygon`); the full type set including `Multi*` and
//! nested collections is accepted read-only from OSM imports via
//! [`convert`].

pub mod convert;
pub mod traverse;

use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub use convert::{from_geojson, parse_osm_geojson};
pub use traverse::{Bounds, bounding_box, for_each_position, map_positions, reproject};

/// Coordinate reference name used when nothing else is specified.
pub const WGS84: &str = "EPSG:4326";

/// Errors that can occur while parsing or traversing geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// A `type` tag in the input does not name a known geometry type.
    #[error("malformed geometry: unrecognized type tag `{tag}`")]
    MalformedGeometry {
        /// The offending type tag.
        tag: String,
    },

    /// A coordinate array had fewer than two elements.
    #[error("malformed geometry: position must have at least 2 coordinates, got {len}")]
    TruncatedPosition {
        /// How many coordinates the position actually had.
        len: usize,
    },

    /// The input was not structurally valid JSON geometry.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// GeoJSON import parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

/// A single coordinate: planar x/y plus an optional altitude.
///
/// Serializes as a 2- or 3-element JSON array, matching GeoJSON
/// positions. For geographic coordinates the axis order is
/// `[lon, lat]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub alt: Option<f64>,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y, alt: None }
    }

    #[must_use]
    pub const fn with_alt(x: f64, y: f64, alt: f64) -> Self {
        Self {
            x,
            y,
            alt: Some(alt),
        }
    }

    /// Returns a copy with new planar coordinates and the altitude
    /// preserved. Point-mapping traversal uses this so that transforms
    /// operating on the plane never discard a third coordinate.
    #[must_use]
    pub const fn replace_xy(&self, x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            alt: self.alt,
        }
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = if self.alt.is_some() { 3 } else { 2 };
        let mut seq = serializer.serialize_seq(Some(len))?;
        seq.serialize_element(&self.x)?;
        seq.serialize_element(&self.y)?;
        if let Some(alt) = self.alt {
            seq.serialize_element(&alt)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PositionVisitor;

        impl<'de> Visitor<'de> for PositionVisitor {
            type Value = Position;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a coordinate array of 2 or 3 numbers")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Position, A::Error> {
                let x: f64 = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(0, &self))?;
                let y: f64 = seq
                    .next_element()?
                    .ok_or_else(|| serde::de::Error::invalid_length(1, &self))?;
                let alt: Option<f64> = seq.next_element()?;
                // GeoJSON permits trailing elements; drain them.
                while seq.next_element::<f64>()?.is_some() {}
                Ok(Position { x, y, alt })
            }
        }

        deserializer.deserialize_seq(PositionVisitor)
    }
}

/// Legacy GeoJSON named coordinate reference member.
///
/// Only ever present on a top-level `GeometryCollection`; nested
/// geometries resolve their reference through the feature hierarchy
/// instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crs {
    /// Always `"name"`.
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: CrsProperties,
}

/// Properties of a named [`Crs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrsProperties {
    pub name: String,
}

impl Crs {
    /// A named CRS, e.g. `Crs::named("EPSG:3857")`.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            kind: "name".to_string(),
            properties: CrsProperties { name: name.into() },
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.properties.name
    }
}

/// The geometry sum type.
///
/// A tagged union over the GeoJSON type set, including `Feature` and
/// `FeatureCollection` so that imported documents traverse uniformly.
/// Aggregates hold ordered sequences of the next-lower type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point {
        coordinates: Position,
    },
    MultiPoint {
        coordinates: Vec<Position>,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    MultiLineString {
        coordinates: Vec<Vec<Position>>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
    GeometryCollection {
        geometries: Vec<Geometry>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crs: Option<Crs>,
    },
    Feature {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<serde_json::Value>,
        geometry: Option<Box<Geometry>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        properties: Option<serde_json::Map<String, serde_json::Value>>,
    },
    FeatureCollection {
        features: Vec<Geometry>,
    },
}

/// The recognized `type` tags, in declaration order.
const KNOWN_TAGS: [&str; 9] = [
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
    "Feature",
    "FeatureCollection",
];

impl Geometry {
    /// Parses a geometry from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::MalformedGeometry`] when a `type` tag
    /// anywhere in the document is not a recognized geometry type, or
    /// [`GeometryError::Json`] for structural JSON problems.
    pub fn from_json_str(input: &str) -> Result<Self, GeometryError> {
        let value: serde_json::Value = serde_json::from_str(input)?;
        Self::from_json_value(value)
    }

    /// Converts an already-parsed JSON value into a geometry.
    ///
    /// # Errors
    ///
    /// Same as [`Geometry::from_json_str`].
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, GeometryError> {
        if let Some(tag) = find_unknown_tag(&value) {
            return Err(GeometryError::MalformedGeometry {
                tag: tag.to_string(),
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Serializes the geometry to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::Json`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String, GeometryError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether the geometry contains no coordinates at all.
    ///
    /// A `Point` is never empty; sequence types are empty iff their
    /// outer sequence is; collections are empty iff their member list
    /// is; a `Feature` delegates to its geometry (and a feature
    /// without geometry is empty).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Point { .. } => false,
            Self::MultiPoint { coordinates } | Self::LineString { coordinates } => {
                coordinates.is_empty()
            }
            Self::MultiLineString { coordinates } | Self::Polygon { coordinates } => {
                coordinates.is_empty()
            }
            Self::MultiPolygon { coordinates } => coordinates.is_empty(),
            Self::GeometryCollection { geometries, .. } => geometries.is_empty(),
            Self::Feature { geometry, .. } => {
                geometry.as_ref().is_none_or(|geometry| geometry.is_empty())
            }
            Self::FeatureCollection { features } => features.is_empty(),
        }
    }

    /// The coordinate reference carried by a top-level
    /// `GeometryCollection`, if any.
    #[must_use]
    pub const fn crs(&self) -> Option<&Crs> {
        match self {
            Self::GeometryCollection { crs, .. } => crs.as_ref(),
            _ => None,
        }
    }
}

/// Finds the first `type` tag in the JSON tree that is not a known
/// geometry type. Only inspects objects that look like geometry (have
/// a string `type` member).
pub(crate) fn find_unknown_tag(value: &serde_json::Value) -> Option<&str> {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(tag)) = map.get("type") {
                if !KNOWN_TAGS.contains(&tag.as_str()) {
                    return Some(tag);
                }
            }
            // Geometry nests only under these members. Anything else
            // (properties, foreign members like crs) is free-form data
            // that may carry its own unrelated `type` strings.
            ["geometry", "geometries", "features"]
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(find_unknown_tag)
        }
        serde_json::Value::Array(items) => items.iter().find_map(find_unknown_tag),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_round_trips_through_json() {
        let geometry = Geometry::from_json_str(r#"{"type":"Point","coordinates":[13.4,52.5]}"#)
            .expect("valid point");
        assert_eq!(
            geometry,
            Geometry::Point {
                coordinates: Position::new(13.4, 52.5)
            }
        );
        let json = geometry.to_json_string().expect("serializable");
        assert_eq!(json, r#"{"type":"Point","coordinates":[13.4,52.5]}"#);
    }

    #[test]
    fn altitude_survives_parsing() {
        let geometry =
            Geometry::from_json_str(r#"{"type":"Point","coordinates":[1.0,2.0,30.5]}"#).unwrap();
        assert_eq!(
            geometry,
            Geometry::Point {
                coordinates: Position::with_alt(1.0, 2.0, 30.5)
            }
        );
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let err = Geometry::from_json_str(r#"{"type":"Circle","coordinates":[0,0]}"#).unwrap_err();
        match err {
            GeometryError::MalformedGeometry { tag } => assert_eq!(tag, "Circle"),
            other => panic!("expected MalformedGeometry, got {other:?}"),
        }
    }

    #[test]
    fn nested_unknown_tag_is_malformed() {
        let err = Geometry::from_json_str(
            r#"{"type":"GeometryCollection","geometries":[{"type":"Blob","coordinates":[]}]}"#,
        )
        .unwrap_err();
        match err {
            GeometryError::MalformedGeometry { tag } => assert_eq!(tag, "Blob"),
            other => panic!("expected MalformedGeometry, got {other:?}"),
        }
    }

    #[test]
    fn collection_crs_parses_and_strips_nowhere_else() {
        let geometry = Geometry::from_json_str(
            r#"{
                "type": "GeometryCollection",
                "crs": {"type": "name", "properties": {"name": "EPSG:3857"}},
                "geometries": [{"type": "Point", "coordinates": [0, 0]}]
            }"#,
        )
        .unwrap();
        assert_eq!(geometry.crs().map(Crs::name), Some("EPSG:3857"));
    }

    #[test]
    fn point_is_never_empty() {
        let point = Geometry::Point {
            coordinates: Position::new(0.0, 0.0),
        };
        assert!(!point.is_empty());
    }

    #[test]
    fn empty_polygon_is_empty() {
        let polygon = Geometry::Polygon {
            coordinates: vec![],
        };
        assert!(polygon.is_empty());
    }

    #[test]
    fn feature_emptiness_delegates_to_geometry() {
        let feature = Geometry::Feature {
            id: None,
            geometry: Some(Box::new(Geometry::LineString {
                coordinates: vec![],
            })),
            properties: None,
        };
        assert!(feature.is_empty());

        let bare = Geometry::Feature {
            id: None,
            geometry: None,
            properties: None,
        };
        assert!(bare.is_empty());
    }

    #[test]
    fn empty_collection_is_empty() {
        let collection = Geometry::GeometryCollection {
            geometries: vec![],
            crs: None,
        };
        assert!(collection.is_empty());
        let features = Geometry::FeatureCollection { features: vec![] };
        assert!(features.is_empty());
    }
}
