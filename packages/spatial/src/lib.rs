#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index for feature lookup.
//!
//! Resolves every shape-owning feature of a snapshot into WGS84,
//! builds an R-tree over the polygon envelopes, and answers "which
//! features contain this point" queries, most specific (deepest)
//! feature first. This is the query side of the system: given a
//! location, find the room, then the building, then the area around
//! it.
//!
//! Only features that *define* a shape are indexed. A floor
//! inheriting its building's outline covers the same region by
//! construction; indexing it too would only duplicate every answer.

use geo::Contains;
use rstar::{AABB, RTree, RTreeObject};

use venue_map_features::{ResolveError, ancestors, effective_shape_in_wgs84, resolve_shape};
use venue_map_features_models::MapSnapshot;
use venue_map_geometry::{Geometry, Position, bounding_box};

/// A resolved feature shape stored in the R-tree.
struct ShapeEntry {
    feature_id: String,
    /// Length of the feature's ancestor chain; deeper wins.
    depth: usize,
    envelope: AABB<[f64; 2]>,
    polygons: geo::MultiPolygon<f64>,
}

impl RTreeObject for ShapeEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built point-in-shape index over a snapshot.
///
/// Constructed once per snapshot and shared across queries; like the
/// rest of the core it never mutates after construction.
pub struct ShapeIndex {
    entries: RTree<ShapeEntry>,
}

impl ShapeIndex {
    /// Resolves all shape-owning features into WGS84 and bulk-loads
    /// the index.
    ///
    /// Features whose chain has no shape are simply not indexed, and
    /// features whose basemap is not yet georeferenced (too few or
    /// degenerate control links) are skipped with a warning — both
    /// are ordinary editing states, not corruption.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] for corrupted snapshots: dangling
    /// references or a cyclic hierarchy.
    pub fn build(snapshot: &MapSnapshot) -> Result<Self, ResolveError> {
        let mut entries = Vec::new();

        for feature_id in snapshot.features.keys() {
            let resolved = match resolve_shape(snapshot, feature_id) {
                Ok(resolved) => resolved,
                Err(ResolveError::ShapeNotFound { .. }) => continue,
                Err(other) => return Err(other),
            };
            if resolved.owner.id != *feature_id {
                continue;
            }

            let effective = match effective_shape_in_wgs84(snapshot, feature_id) {
                Ok(effective) => effective,
                Err(ResolveError::Transform(err)) => {
                    log::warn!("Skipping feature {feature_id} in spatial index: {err}");
                    continue;
                }
                Err(other) => return Err(other),
            };

            let polygons = collect_polygons(effective.shape.geometries());
            if polygons.0.is_empty() {
                continue;
            }

            let bounds = bounding_box(&effective.shape.to_collection());

            entries.push(ShapeEntry {
                feature_id: feature_id.clone(),
                depth: chain_depth(snapshot, feature_id)?,
                envelope: AABB::from_corners(
                    [bounds.left, bounds.bottom],
                    [bounds.right, bounds.top],
                ),
                polygons,
            });
        }

        log::info!("Loaded {} feature shapes into spatial index", entries.len());

        Ok(Self {
            entries: RTree::bulk_load(entries),
        })
    }

    /// Number of indexed shapes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.entries.size()
    }

    /// All features whose shape contains the point, deepest first.
    #[must_use]
    pub fn locate(&self, lon: f64, lat: f64) -> Vec<&str> {
        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        let mut hits: Vec<&ShapeEntry> = self
            .entries
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| entry.polygons.contains(&point))
            .collect();

        hits.sort_by(|a, b| {
            b.depth
                .cmp(&a.depth)
                .then_with(|| a.feature_id.cmp(&b.feature_id))
        });

        hits.into_iter()
            .map(|entry| entry.feature_id.as_str())
            .collect()
    }

    /// The single most specific feature containing the point.
    #[must_use]
    pub fn locate_most_specific(&self, lon: f64, lat: f64) -> Option<&str> {
        self.locate(lon, lat).first().copied()
    }
}

/// Gathers a shape's polygon members as `geo` polygons. Point and
/// line-string members cannot contain anything and are ignored.
fn collect_polygons(members: &[Geometry]) -> geo::MultiPolygon<f64> {
    let polygons = members
        .iter()
        .filter_map(|member| match member {
            Geometry::Polygon { coordinates } => to_geo_polygon(coordinates),
            _ => None,
        })
        .collect();
    geo::MultiPolygon(polygons)
}

fn to_geo_polygon(rings: &[Vec<Position>]) -> Option<geo::Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    Some(geo::Polygon::new(
        to_geo_ring(exterior),
        interiors.iter().map(|ring| to_geo_ring(ring)).collect(),
    ))
}

fn to_geo_ring(ring: &[Position]) -> geo::LineString<f64> {
    geo::LineString::from(
        ring.iter()
            .map(|position| (position.x, position.y))
            .collect::<Vec<_>>(),
    )
}

/// Number of ancestors above the feature (root = 0).
fn chain_depth(snapshot: &MapSnapshot, feature_id: &str) -> Result<usize, ResolveError> {
    let mut depth = 0;
    for ancestor in ancestors(snapshot, feature_id) {
        ancestor?;
        depth += 1;
    }
    Ok(depth - 1)
}
