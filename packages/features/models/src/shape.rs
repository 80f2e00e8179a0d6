//! Editable shapes: primitive-only geometry collections.
//!
//! Shapes are what the map editor mutates one point at a time, so
//! they are restricted to `Point`, `LineString`, and `Polygon`
//! members — no `Multi*` types, no nested collections. Full GeoJSON
//! imported from OSM is converted into primitives by the import layer
//! before a shape is ever constructed from it.

use serde::{Deserialize, Serialize};

use venue_map_geometry::{Geometry, Position};

use crate::ModelError;

/// An editable geometry collection attached to features by reference.
///
/// Features reference shapes by id and do not own them: deleting a
/// shape and deleting a feature are independent operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ShapeWire", into = "ShapeWire")]
pub struct Shape {
    id: String,
    geometries: Vec<Geometry>,
}

/// Wire form: `{ id, geometries: <GeometryCollection> }`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapeWire {
    id: String,
    geometries: Geometry,
}

impl TryFrom<ShapeWire> for Shape {
    type Error = ModelError;

    fn try_from(wire: ShapeWire) -> Result<Self, ModelError> {
        match wire.geometries {
            Geometry::GeometryCollection { geometries, .. } => Self::new(wire.id, geometries),
            other => Err(ModelError::NonPrimitiveShape {
                index: 0,
                tag: tag_of(&other).to_string(),
            }),
        }
    }
}

impl From<Shape> for ShapeWire {
    fn from(shape: Shape) -> Self {
        Self {
            id: shape.id,
            geometries: Geometry::GeometryCollection {
                geometries: shape.geometries,
                crs: None,
            },
        }
    }
}

impl Shape {
    /// Builds a shape from primitive members.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NonPrimitiveShape`] if any member is not
    /// a `Point`, `LineString`, or `Polygon`.
    pub fn new(id: String, geometries: Vec<Geometry>) -> Result<Self, ModelError> {
        for (index, member) in geometries.iter().enumerate() {
            if !matches!(
                member,
                Geometry::Point { .. } | Geometry::LineString { .. } | Geometry::Polygon { .. }
            ) {
                return Err(ModelError::NonPrimitiveShape {
                    index,
                    tag: tag_of(member).to_string(),
                });
            }
        }
        Ok(Self { id, geometries })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// Whether the shape has no members at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// The shape as a `GeometryCollection` value, for traversal and
    /// reprojection.
    #[must_use]
    pub fn to_collection(&self) -> Geometry {
        Geometry::GeometryCollection {
            geometries: self.geometries.clone(),
            crs: None,
        }
    }

    /// Rebuilds the shape from a mapped copy of its collection,
    /// keeping the id. Used after reprojection, where the member
    /// structure is preserved by construction.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NonPrimitiveShape`] if `collection` is
    /// not a collection of primitives (it always is when produced by
    /// mapping this shape's own collection).
    pub fn with_collection(&self, collection: Geometry) -> Result<Self, ModelError> {
        match collection {
            Geometry::GeometryCollection { geometries, .. } => {
                Self::new(self.id.clone(), geometries)
            }
            other => Err(ModelError::NonPrimitiveShape {
                index: 0,
                tag: tag_of(&other).to_string(),
            }),
        }
    }

    /// Appends a point to member `member`.
    ///
    /// For a `LineString`, `ring` must be 0. For a `Polygon`, `ring`
    /// may address an existing ring or equal the ring count to start
    /// a new one. `Point` members cannot grow.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EditOutOfRange`] when the member or ring
    /// does not exist or the member is a `Point`.
    pub fn append_position(
        &mut self,
        member: usize,
        ring: usize,
        position: Position,
    ) -> Result<(), ModelError> {
        match self.member_mut(member)? {
            Geometry::Point { .. } => Err(ModelError::EditOutOfRange {
                detail: format!("member {member} is a Point; points cannot grow"),
            }),
            Geometry::LineString { coordinates } => {
                if ring != 0 {
                    return Err(ModelError::EditOutOfRange {
                        detail: format!("line string has no ring {ring}"),
                    });
                }
                coordinates.push(position);
                Ok(())
            }
            Geometry::Polygon { coordinates } => {
                if ring < coordinates.len() {
                    coordinates[ring].push(position);
                } else if ring == coordinates.len() {
                    coordinates.push(vec![position]);
                } else {
                    return Err(ModelError::EditOutOfRange {
                        detail: format!("polygon has no ring {ring}"),
                    });
                }
                Ok(())
            }
            _ => unreachable!("shape members are validated primitive"),
        }
    }

    /// Moves an existing point of member `member` to `position`.
    ///
    /// `Point` members are addressed with `ring == 0, index == 0`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EditOutOfRange`] when the member, ring,
    /// or point index does not exist.
    pub fn move_position(
        &mut self,
        member: usize,
        ring: usize,
        index: usize,
        position: Position,
    ) -> Result<(), ModelError> {
        match self.member_mut(member)? {
            Geometry::Point { coordinates } => {
                if ring != 0 || index != 0 {
                    return Err(ModelError::EditOutOfRange {
                        detail: format!("point member has no coordinate ({ring}, {index})"),
                    });
                }
                *coordinates = position;
                Ok(())
            }
            Geometry::LineString { coordinates } => {
                if ring != 0 {
                    return Err(ModelError::EditOutOfRange {
                        detail: format!("line string has no ring {ring}"),
                    });
                }
                let slot =
                    coordinates
                        .get_mut(index)
                        .ok_or_else(|| ModelError::EditOutOfRange {
                            detail: format!("line string has no point {index}"),
                        })?;
                *slot = position;
                Ok(())
            }
            Geometry::Polygon { coordinates } => {
                let ring_slot =
                    coordinates
                        .get_mut(ring)
                        .ok_or_else(|| ModelError::EditOutOfRange {
                            detail: format!("polygon has no ring {ring}"),
                        })?;
                let slot = ring_slot
                    .get_mut(index)
                    .ok_or_else(|| ModelError::EditOutOfRange {
                        detail: format!("ring {ring} has no point {index}"),
                    })?;
                *slot = position;
                Ok(())
            }
            _ => unreachable!("shape members are validated primitive"),
        }
    }

    fn member_mut(&mut self, member: usize) -> Result<&mut Geometry, ModelError> {
        let count = self.geometries.len();
        self.geometries
            .get_mut(member)
            .ok_or_else(|| ModelError::EditOutOfRange {
                detail: format!("shape has {count} members, no member {member}"),
            })
    }
}

fn tag_of(geometry: &Geometry) -> &'static str {
    match geometry {
        Geometry::Point { .. } => "Point",
        Geometry::MultiPoint { .. } => "MultiPoint",
        Geometry::LineString { .. } => "LineString",
        Geometry::MultiLineString { .. } => "MultiLineString",
        Geometry::Polygon { .. } => "Polygon",
        Geometry::MultiPolygon { .. } => "MultiPolygon",
        Geometry::GeometryCollection { .. } => "GeometryCollection",
        Geometry::Feature { .. } => "Feature",
        Geometry::FeatureCollection { .. } => "FeatureCollection",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_shape() -> Shape {
        Shape::new(
            "s-1".to_string(),
            vec![Geometry::LineString {
                coordinates: vec![Position::new(0.0, 0.0), Position::new(1.0, 1.0)],
            }],
        )
        .unwrap()
    }

    #[test]
    fn rejects_multi_geometry_members() {
        let err = Shape::new(
            "s-1".to_string(),
            vec![
                Geometry::Point {
                    coordinates: Position::new(0.0, 0.0),
                },
                Geometry::MultiPolygon {
                    coordinates: vec![],
                },
            ],
        )
        .unwrap_err();

        match err {
            ModelError::NonPrimitiveShape { index, tag } => {
                assert_eq!(index, 1);
                assert_eq!(tag, "MultiPolygon");
            }
            other => panic!("expected NonPrimitiveShape, got {other:?}"),
        }
    }

    #[test]
    fn wire_form_is_a_geometry_collection() {
        let shape = line_shape();
        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["geometries"]["type"], "GeometryCollection");

        let back: Shape = serde_json::from_value(json).unwrap();
        assert_eq!(back, shape);
    }

    #[test]
    fn wire_form_rejects_non_collection() {
        let err = serde_json::from_value::<Shape>(serde_json::json!({
            "id": "s-1",
            "geometries": {"type": "Point", "coordinates": [0, 0]}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("not a primitive"));
    }

    #[test]
    fn append_extends_line_string() {
        let mut shape = line_shape();
        shape
            .append_position(0, 0, Position::new(2.0, 2.0))
            .unwrap();
        let Geometry::LineString { coordinates } = &shape.geometries()[0] else {
            panic!("expected line string");
        };
        assert_eq!(coordinates.len(), 3);
        assert_eq!(coordinates[2], Position::new(2.0, 2.0));
    }

    #[test]
    fn append_can_start_a_new_polygon_ring() {
        let mut shape = Shape::new(
            "s-2".to_string(),
            vec![Geometry::Polygon {
                coordinates: vec![],
            }],
        )
        .unwrap();

        shape
            .append_position(0, 0, Position::new(5.0, 5.0))
            .unwrap();
        let Geometry::Polygon { coordinates } = &shape.geometries()[0] else {
            panic!("expected polygon");
        };
        assert_eq!(coordinates, &vec![vec![Position::new(5.0, 5.0)]]);
    }

    #[test]
    fn append_to_point_fails() {
        let mut shape = Shape::new(
            "s-3".to_string(),
            vec![Geometry::Point {
                coordinates: Position::new(0.0, 0.0),
            }],
        )
        .unwrap();
        assert!(matches!(
            shape.append_position(0, 0, Position::new(1.0, 1.0)),
            Err(ModelError::EditOutOfRange { .. })
        ));
    }

    #[test]
    fn move_replaces_a_point() {
        let mut shape = line_shape();
        shape
            .move_position(0, 0, 1, Position::new(9.0, 9.0))
            .unwrap();
        let Geometry::LineString { coordinates } = &shape.geometries()[0] else {
            panic!("expected line string");
        };
        assert_eq!(coordinates[1], Position::new(9.0, 9.0));
    }

    #[test]
    fn move_out_of_range_fails() {
        let mut shape = line_shape();
        assert!(matches!(
            shape.move_position(0, 0, 5, Position::new(0.0, 0.0)),
            Err(ModelError::EditOutOfRange { .. })
        ));
        assert!(matches!(
            shape.move_position(3, 0, 0, Position::new(0.0, 0.0)),
            Err(ModelError::EditOutOfRange { .. })
        ));
    }
}
