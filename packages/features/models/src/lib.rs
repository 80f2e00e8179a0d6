#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature hierarchy, shape, control point, and raster basemap types.
//!
//! These are the plain data types exchanged with the persistence and
//! UI layers. Geometry, coordinate-reference information, and raster
//! basemaps attach to features *sparsely*: a feature without its own
//! shape, transform, or image inherits each of them independently from
//! the nearest ancestor that defines one. The inheritance walk itself
//! lives in `venue_map_features`; this crate only describes the data.
//!
//! Resolution always runs over a [`MapSnapshot`] — an id-indexed
//! arena passed by value — never over live object references, so a
//! resolution pass can neither observe nor cause concurrent mutation.

pub mod shape;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use shape::Shape;

/// Errors raised by data-model validation and shape edits.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A shape member was not a primitive geometry.
    #[error("shape member {index} is not a primitive geometry (`{tag}`)")]
    NonPrimitiveShape {
        /// Index of the offending member in the collection.
        index: usize,
        /// Type tag of the offending member.
        tag: String,
    },

    /// A point-level shape edit addressed a nonexistent member, ring,
    /// or point.
    #[error("shape edit out of range: {detail}")]
    EditOutOfRange {
        /// Which index was out of range.
        detail: String,
    },
}

/// Generates a fresh entity id (random UUID).
#[must_use]
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// The kind of a feature node in the hierarchy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureKind {
    /// An outdoor administrative or campus area.
    Area,
    Building,
    Floor,
    Apartment,
    Room,
    /// A linear feature (corridor, road, path).
    Way,
    /// A point of interest.
    Point,
}

/// Reference from a feature to its coordinate transform.
///
/// The sentinel value means "this feature's geometry is already in
/// WGS84, no transform needed" — distinct from *no* reference, which
/// means the transform is inherited from an ancestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransformRef {
    /// Geometry is in WGS84 as-is.
    Wgs84,
    /// Id of a stored [`CoordinateTransform`].
    Transform(String),
}

/// Wire form of the [`TransformRef::Wgs84`] sentinel.
pub const WGS84_SENTINEL: &str = "WGS84";

impl From<String> for TransformRef {
    fn from(value: String) -> Self {
        if value == WGS84_SENTINEL {
            Self::Wgs84
        } else {
            Self::Transform(value)
        }
    }
}

impl From<TransformRef> for String {
    fn from(value: TransformRef) -> Self {
        match value {
            TransformRef::Wgs84 => WGS84_SENTINEL.to_string(),
            TransformRef::Transform(id) => id,
        }
    }
}

/// Vertical extent of a feature, in meters above the reference floor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerticalRange {
    pub min: f64,
    pub max: f64,
}

/// A node in the feature forest.
///
/// `shape`, `image`, and `transform` are references into the snapshot
/// tables, not owned values — a shape can outlive the feature pointing
/// at it and may be shared through inheritance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub name: String,
    /// Parent feature id; `None` marks a root. The parent graph is
    /// expected to be acyclic — the resolver still defends against
    /// cycles since snapshots arrive from outside.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub indoor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<TransformRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical_range: Option<VerticalRange>,
    /// Free-form attributes (OSM tags, display hints, ...).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

/// A user-placed georeferencing point.
///
/// `crs_feature` names the feature whose raster pixel space the
/// coordinates are expressed in; absent means WGS84.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPoint {
    pub id: String,
    pub coordinates: [f64; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs_feature: Option<String>,
}

impl ControlPoint {
    /// Whether the coordinates are geographic (no pixel-space owner).
    #[must_use]
    pub const fn is_wgs84(&self) -> bool {
        self.crs_feature.is_none()
    }
}

/// A correspondence pairing one WGS84 control point with one
/// image-space control point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlLink {
    pub id: String,
    pub wgs84_point: String,
    pub image_point: String,
}

/// A coordinate transform: a bag of control links.
///
/// Created empty when a raster basemap is attached to a feature;
/// links come and go as the user places or deletes control points.
/// The numeric matrices are *derived* — refit from the current links
/// whenever needed — and never stored here, so there is no cache to
/// invalidate on edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinateTransform {
    pub id: String,
    #[serde(default)]
    pub control_links: BTreeMap<String, ControlLink>,
}

impl CoordinateTransform {
    /// A new transform with no links yet.
    #[must_use]
    pub const fn new(id: String) -> Self {
        Self {
            id,
            control_links: BTreeMap::new(),
        }
    }

    /// Adds or replaces a link, returning the previous one if any.
    pub fn upsert_link(&mut self, link: ControlLink) -> Option<ControlLink> {
        self.control_links.insert(link.id.clone(), link)
    }

    /// Removes a link by id.
    pub fn remove_link(&mut self, link_id: &str) -> Option<ControlLink> {
        self.control_links.remove(link_id)
    }

    /// Number of control links currently attached.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.control_links.len()
    }
}

/// A raster basemap attached to a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterImage {
    pub id: String,
    pub name: String,
    pub file_name: String,
    /// Pixel dimensions.
    pub width: u32,
    pub height: u32,
    /// File size in bytes.
    pub size: u64,
    /// Opaque reference into the storage backend.
    pub storage_ref: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// An immutable snapshot of the map data, indexed by entity id.
///
/// The persistence layer hands one of these to the core per
/// resolution pass. All cross-entity references (`Feature::parent`,
/// `Feature::shape`, `ControlLink::wgs84_point`, ...) are resolved
/// against these tables; a reference that misses is surfaced as an
/// invalid-reference error by the resolver, never followed blindly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapSnapshot {
    #[serde(default)]
    pub features: BTreeMap<String, Feature>,
    #[serde(default)]
    pub shapes: BTreeMap<String, Shape>,
    #[serde(default)]
    pub control_points: BTreeMap<String, ControlPoint>,
    #[serde(default)]
    pub transforms: BTreeMap<String, CoordinateTransform>,
    #[serde(default)]
    pub images: BTreeMap<String, RasterImage>,
}

impl MapSnapshot {
    #[must_use]
    pub fn feature(&self, id: &str) -> Option<&Feature> {
        self.features.get(id)
    }

    #[must_use]
    pub fn shape(&self, id: &str) -> Option<&Shape> {
        self.shapes.get(id)
    }

    #[must_use]
    pub fn control_point(&self, id: &str) -> Option<&ControlPoint> {
        self.control_points.get(id)
    }

    #[must_use]
    pub fn transform(&self, id: &str) -> Option<&CoordinateTransform> {
        self.transforms.get(id)
    }

    #[must_use]
    pub fn image(&self, id: &str) -> Option<&RasterImage> {
        self.images.get(id)
    }

    /// Inserts a feature, keyed by its id.
    pub fn insert_feature(&mut self, feature: Feature) {
        self.features.insert(feature.id.clone(), feature);
    }

    /// Inserts a shape, keyed by its id.
    pub fn insert_shape(&mut self, shape: Shape) {
        self.shapes.insert(shape.id().to_owned(), shape);
    }

    /// Inserts a control point, keyed by its id.
    pub fn insert_control_point(&mut self, point: ControlPoint) {
        self.control_points.insert(point.id.clone(), point);
    }

    /// Inserts a coordinate transform, keyed by its id.
    pub fn insert_transform(&mut self, transform: CoordinateTransform) {
        self.transforms.insert(transform.id.clone(), transform);
    }

    /// Inserts a raster image, keyed by its id.
    pub fn insert_image(&mut self, image: RasterImage) {
        self.images.insert(image.id.clone(), image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_kind_wire_form() {
        assert_eq!(FeatureKind::Building.to_string(), "BUILDING");
        assert_eq!(
            "ROOM".parse::<FeatureKind>().unwrap(),
            FeatureKind::Room
        );
    }

    #[test]
    fn transform_ref_sentinel_round_trips() {
        let json = serde_json::to_string(&TransformRef::Wgs84).unwrap();
        assert_eq!(json, "\"WGS84\"");
        let back: TransformRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TransformRef::Wgs84);

        let id = TransformRef::Transform("t-1".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"t-1\"");
        assert_eq!(serde_json::from_str::<TransformRef>(&json).unwrap(), id);
    }

    #[test]
    fn feature_serializes_camel_case() {
        let feature = Feature {
            id: "f-1".to_string(),
            kind: FeatureKind::Floor,
            name: "Level 2".to_string(),
            parent: Some("f-0".to_string()),
            indoor: true,
            shape: None,
            image: None,
            transform: None,
            vertical_range: Some(VerticalRange { min: 4.0, max: 8.0 }),
            attrs: serde_json::Map::new(),
        };

        let json = serde_json::to_value(&feature).unwrap();
        assert_eq!(json["type"], "FLOOR");
        assert_eq!(json["verticalRange"]["min"], 4.0);
        assert!(json.get("shape").is_none());
    }

    #[test]
    fn control_link_lifecycle() {
        let mut transform = CoordinateTransform::new("t-1".to_string());
        assert_eq!(transform.link_count(), 0);

        let link = ControlLink {
            id: "l-1".to_string(),
            wgs84_point: "p-geo".to_string(),
            image_point: "p-px".to_string(),
        };
        assert!(transform.upsert_link(link.clone()).is_none());
        assert_eq!(transform.link_count(), 1);

        // Replacing keeps the count and returns the old link.
        assert_eq!(transform.upsert_link(link.clone()), Some(link.clone()));
        assert_eq!(transform.link_count(), 1);

        assert_eq!(transform.remove_link("l-1"), Some(link));
        assert_eq!(transform.link_count(), 0);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn snapshot_lookup_by_id() {
        let mut snapshot = MapSnapshot::default();
        snapshot.insert_control_point(ControlPoint {
            id: "cp-1".to_string(),
            coordinates: [10.0, 20.0],
            crs_feature: None,
        });

        let point = snapshot.control_point("cp-1").unwrap();
        assert!(point.is_wgs84());
        assert!(snapshot.control_point("cp-2").is_none());
    }
}
