//! Point traversal over the geometry model.
//!
//! Both traversals use the same fixed order: depth-first,
//! left-to-right across each aggregate's member sequence, collection
//! members in array order, a `Feature` visiting its geometry and a
//! `FeatureCollection` its features in order. Everything else in the
//! workspace that touches coordinates goes through here.

use serde::{Deserialize, Serialize};

use crate::{Geometry, Position, WGS84};

/// Invokes `visitor` once per coordinate, in traversal order.
pub fn for_each_position<F: FnMut(&Position)>(geometry: &Geometry, visitor: &mut F) {
    match geometry {
        Geometry::Point { coordinates } => visitor(coordinates),
        Geometry::MultiPoint { coordinates } | Geometry::LineString { coordinates } => {
            for position in coordinates {
                visitor(position);
            }
        }
        Geometry::MultiLineString { coordinates } | Geometry::Polygon { coordinates } => {
            for ring in coordinates {
                for position in ring {
                    visitor(position);
                }
            }
        }
        Geometry::MultiPolygon { coordinates } => {
            for polygon in coordinates {
                for ring in polygon {
                    for position in ring {
                        visitor(position);
                    }
                }
            }
        }
        Geometry::GeometryCollection { geometries, .. } => {
            for member in geometries {
                for_each_position(member, visitor);
            }
        }
        Geometry::Feature { geometry, .. } => {
            if let Some(geometry) = geometry {
                for_each_position(geometry, visitor);
            }
        }
        Geometry::FeatureCollection { features } => {
            for feature in features {
                for_each_position(feature, visitor);
            }
        }
    }
}

/// Returns a new geometry with every coordinate replaced by
/// `f(coordinate)`, sibling structure preserved. The input is not
/// mutated; non-coordinate members (ids, properties, `crs`) are
/// carried over unchanged.
#[must_use]
pub fn map_positions<F: Fn(&Position) -> Position>(geometry: &Geometry, f: &F) -> Geometry {
    match geometry {
        Geometry::Point { coordinates } => Geometry::Point {
            coordinates: f(coordinates),
        },
        Geometry::MultiPoint { coordinates } => Geometry::MultiPoint {
            coordinates: coordinates.iter().map(f).collect(),
        },
        Geometry::LineString { coordinates } => Geometry::LineString {
            coordinates: coordinates.iter().map(f).collect(),
        },
        Geometry::MultiLineString { coordinates } => Geometry::MultiLineString {
            coordinates: map_rings(coordinates, f),
        },
        Geometry::Polygon { coordinates } => Geometry::Polygon {
            coordinates: map_rings(coordinates, f),
        },
        Geometry::MultiPolygon { coordinates } => Geometry::MultiPolygon {
            coordinates: coordinates
                .iter()
                .map(|polygon| map_rings(polygon, f))
                .collect(),
        },
        Geometry::GeometryCollection { geometries, crs } => Geometry::GeometryCollection {
            geometries: geometries
                .iter()
                .map(|member| map_positions(member, f))
                .collect(),
            crs: crs.clone(),
        },
        Geometry::Feature {
            id,
            geometry,
            properties,
        } => Geometry::Feature {
            id: id.clone(),
            geometry: geometry
                .as_ref()
                .map(|geometry| Box::new(map_positions(geometry, f))),
            properties: properties.clone(),
        },
        Geometry::FeatureCollection { features } => Geometry::FeatureCollection {
            features: features
                .iter()
                .map(|feature| map_positions(feature, f))
                .collect(),
        },
    }
}

fn map_rings<F: Fn(&Position) -> Position>(rings: &[Vec<Position>], f: &F) -> Vec<Vec<Position>> {
    rings
        .iter()
        .map(|ring| ring.iter().map(f).collect())
        .collect()
}

/// An axis-aligned bounding box over planar coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl Bounds {
    #[must_use]
    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f64 {
        self.top - self.bottom
    }
}

/// Reduces all visited coordinates to their min/max on both axes.
///
/// On an empty geometry the fold never runs and the result keeps its
/// non-finite seed values; callers must check [`Geometry::is_empty`]
/// first.
#[must_use]
pub fn bounding_box(geometry: &Geometry) -> Bounds {
    let mut bounds = Bounds {
        left: f64::INFINITY,
        bottom: f64::INFINITY,
        right: f64::NEG_INFINITY,
        top: f64::NEG_INFINITY,
    };

    for_each_position(geometry, &mut |position| {
        bounds.left = bounds.left.min(position.x);
        bounds.bottom = bounds.bottom.min(position.y);
        bounds.right = bounds.right.max(position.x);
        bounds.top = bounds.top.max(position.y);
    });

    bounds
}

/// Reprojects a geometry through an arbitrary point transform.
///
/// The source reference is resolved from `source_hint` first, then
/// from a `crs` member on the top-level geometry, then defaults to
/// WGS84. The result is a fresh copy with any `crs` member stripped
/// and every coordinate replaced by `transform(source, coordinate)`.
///
/// `transform` may be a named-projection conversion or any other
/// point function, e.g. the homography apply step.
#[must_use]
pub fn reproject<F>(geometry: &Geometry, source_hint: Option<&str>, transform: F) -> Geometry
where
    F: Fn(&str, &Position) -> Position,
{
    let source = source_hint
        .or_else(|| geometry.crs().map(crate::Crs::name))
        .unwrap_or(WGS84)
        .to_string();

    let mut mapped = map_positions(geometry, &|position| transform(&source, position));

    if let Geometry::GeometryCollection { crs, .. } = &mut mapped {
        *crs = None;
    }

    mapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Crs;

    fn sample_collection() -> Geometry {
        Geometry::GeometryCollection {
            geometries: vec![
                Geometry::Point {
                    coordinates: Position::new(1.0, 2.0),
                },
                Geometry::LineString {
                    coordinates: vec![Position::new(3.0, 4.0), Position::new(5.0, 6.0)],
                },
                Geometry::Polygon {
                    coordinates: vec![vec![
                        Position::new(0.0, 0.0),
                        Position::new(10.0, 0.0),
                        Position::new(10.0, 5.0),
                        Position::new(0.0, 0.0),
                    ]],
                },
            ],
            crs: None,
        }
    }

    #[test]
    fn visits_points_depth_first_left_to_right() {
        let mut seen = Vec::new();
        for_each_position(&sample_collection(), &mut |position| {
            seen.push((position.x, position.y));
        });
        assert_eq!(
            seen,
            vec![
                (1.0, 2.0),
                (3.0, 4.0),
                (5.0, 6.0),
                (0.0, 0.0),
                (10.0, 0.0),
                (10.0, 5.0),
                (0.0, 0.0),
            ]
        );
    }

    #[test]
    fn identity_map_round_trips() {
        let original = sample_collection();
        let mapped = map_positions(&original, &|position| *position);
        assert_eq!(mapped, original);
    }

    #[test]
    fn map_does_not_mutate_input() {
        let original = sample_collection();
        let snapshot = original.clone();
        let _shifted = map_positions(&original, &|position| {
            position.replace_xy(position.x + 1.0, position.y)
        });
        assert_eq!(original, snapshot);
    }

    #[test]
    fn map_preserves_altitude() {
        let point = Geometry::Point {
            coordinates: Position::with_alt(1.0, 2.0, 99.0),
        };
        let mapped = map_positions(&point, &|position| position.replace_xy(0.0, 0.0));
        assert_eq!(
            mapped,
            Geometry::Point {
                coordinates: Position::with_alt(0.0, 0.0, 99.0)
            }
        );
    }

    #[test]
    fn bounding_box_of_line_string() {
        let line = Geometry::LineString {
            coordinates: vec![Position::new(0.0, 0.0), Position::new(10.0, 5.0)],
        };
        let bounds = bounding_box(&line);
        assert_eq!(bounds.left, 0.0);
        assert_eq!(bounds.bottom, 0.0);
        assert_eq!(bounds.right, 10.0);
        assert_eq!(bounds.top, 5.0);
    }

    #[test]
    fn bounding_box_of_empty_geometry_is_non_finite() {
        let empty = Geometry::MultiPoint {
            coordinates: vec![],
        };
        let bounds = bounding_box(&empty);
        assert!(!bounds.left.is_finite());
        assert!(!bounds.top.is_finite());
    }

    #[test]
    fn reproject_strips_crs_and_applies_transform() {
        let collection = Geometry::GeometryCollection {
            geometries: vec![Geometry::Point {
                coordinates: Position::new(2.0, 3.0),
            }],
            crs: Some(Crs::named("EPSG:3857")),
        };

        let reprojected = reproject(&collection, None, |source, position| {
            assert_eq!(source, "EPSG:3857");
            position.replace_xy(position.x * 2.0, position.y * 2.0)
        });

        assert_eq!(reprojected.crs(), None);
        let mut seen = Vec::new();
        for_each_position(&reprojected, &mut |position| {
            seen.push((position.x, position.y));
        });
        assert_eq!(seen, vec![(4.0, 6.0)]);
    }

    #[test]
    fn reproject_hint_overrides_crs_member() {
        let point = Geometry::Point {
            coordinates: Position::new(1.0, 1.0),
        };
        let _ = reproject(&point, Some("EPSG:3857"), |source, position| {
            assert_eq!(source, "EPSG:3857");
            *position
        });
        let _ = reproject(&point, None, |source, position| {
            assert_eq!(source, WGS84);
            *position
        });
    }
}
