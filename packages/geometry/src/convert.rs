//! Read-only conversion from `geojson` crate values.
//!
//! OSM boundary imports arrive as full GeoJSON, `Multi*` types and
//! nested collections included. The import layer parses them with the
//! `geojson` crate; this module converts the parsed document into the
//! workspace geometry model. Editable shapes stay restricted to the
//! primitive types — the restriction is enforced where shapes are
//! constructed, not here.

use geojson::GeoJson;

use crate::{Crs, Geometry, GeometryError, Position};

/// Parses a GeoJSON document into the geometry model.
///
/// # Errors
///
/// Returns [`GeometryError::MalformedGeometry`] for unrecognized type
/// tags, [`GeometryError::TruncatedPosition`] for coordinate arrays
/// with fewer than two elements, and [`GeometryError::Json`] /
/// [`GeometryError::GeoJson`] for structural problems.
pub fn parse_osm_geojson(input: &str) -> Result<Geometry, GeometryError> {
    let value: serde_json::Value = serde_json::from_str(input)?;
    if let Some(tag) = crate::find_unknown_tag(&value) {
        return Err(GeometryError::MalformedGeometry {
            tag: tag.to_string(),
        });
    }
    let geojson = GeoJson::from_json_value(value)?;
    from_geojson(&geojson)
}

/// Converts a parsed [`GeoJson`] document into the geometry model.
///
/// # Errors
///
/// Returns [`GeometryError::TruncatedPosition`] if any coordinate
/// array has fewer than two elements.
pub fn from_geojson(geojson: &GeoJson) -> Result<Geometry, GeometryError> {
    match geojson {
        GeoJson::Geometry(geometry) => from_geometry(geometry),
        GeoJson::Feature(feature) => from_feature(feature),
        GeoJson::FeatureCollection(collection) => Ok(Geometry::FeatureCollection {
            features: collection
                .features
                .iter()
                .map(from_feature)
                .collect::<Result<_, _>>()?,
        }),
    }
}

fn from_geometry(geometry: &geojson::Geometry) -> Result<Geometry, GeometryError> {
    let converted = match &geometry.value {
        geojson::Value::Point(raw) => Geometry::Point {
            coordinates: position(raw)?,
        },
        geojson::Value::MultiPoint(raw) => Geometry::MultiPoint {
            coordinates: positions(raw)?,
        },
        geojson::Value::LineString(raw) => Geometry::LineString {
            coordinates: positions(raw)?,
        },
        geojson::Value::MultiLineString(raw) => Geometry::MultiLineString {
            coordinates: rings(raw)?,
        },
        geojson::Value::Polygon(raw) => Geometry::Polygon {
            coordinates: rings(raw)?,
        },
        geojson::Value::MultiPolygon(raw) => Geometry::MultiPolygon {
            coordinates: raw.iter().map(|polygon| rings(polygon)).collect::<Result<_, _>>()?,
        },
        geojson::Value::GeometryCollection(members) => Geometry::GeometryCollection {
            geometries: members
                .iter()
                .map(from_geometry)
                .collect::<Result<_, _>>()?,
            crs: foreign_crs(geometry.foreign_members.as_ref()),
        },
    };
    Ok(converted)
}

fn from_feature(feature: &geojson::Feature) -> Result<Geometry, GeometryError> {
    Ok(Geometry::Feature {
        id: feature.id.as_ref().map(|id| match id {
            geojson::feature::Id::String(value) => serde_json::Value::String(value.clone()),
            geojson::feature::Id::Number(value) => serde_json::Value::Number(value.clone()),
        }),
        geometry: feature
            .geometry
            .as_ref()
            .map(|geometry| from_geometry(geometry).map(Box::new))
            .transpose()?,
        properties: feature.properties.clone(),
    })
}

/// A legacy `crs` member survives `geojson` parsing as a foreign
/// member; pick it up so reference resolution can see it.
fn foreign_crs(members: Option<&geojson::JsonObject>) -> Option<Crs> {
    let crs = members?.get("crs")?;
    serde_json::from_value(crs.clone()).ok()
}

fn position(raw: &[f64]) -> Result<Position, GeometryError> {
    match raw {
        [x, y] => Ok(Position::new(*x, *y)),
        [x, y, alt, ..] => Ok(Position::with_alt(*x, *y, *alt)),
        short => Err(GeometryError::TruncatedPosition { len: short.len() }),
    }
}

fn positions(raw: &[Vec<f64>]) -> Result<Vec<Position>, GeometryError> {
    raw.iter().map(|point| position(point)).collect()
}

fn rings(raw: &[Vec<Vec<f64>>]) -> Result<Vec<Vec<Position>>, GeometryError> {
    raw.iter().map(|ring| positions(ring)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_osm_feature_collection() {
        let input = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "id": 42,
                "properties": {"type": "relation", "tags": {"name": "Main Hall"}},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[0, 0], [4, 0], [4, 4], [0, 0]]]]
                }
            }]
        }"#;

        let geometry = parse_osm_geojson(input).expect("valid import");
        let Geometry::FeatureCollection { features } = &geometry else {
            panic!("expected feature collection");
        };
        assert_eq!(features.len(), 1);
        assert!(!geometry.is_empty());
    }

    #[test]
    fn rejects_unknown_type_tag() {
        let err = parse_osm_geojson(r#"{"type":"Donut","coordinates":[]}"#).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::MalformedGeometry { tag } if tag == "Donut"
        ));
    }

    #[test]
    fn rejects_one_element_position() {
        let geojson: GeoJson = r#"{"type":"Point","coordinates":[5.0]}"#.parse().unwrap();
        let err = from_geojson(&geojson).unwrap_err();
        assert!(matches!(err, GeometryError::TruncatedPosition { len: 1 }));
    }

    #[test]
    fn preserves_altitude_from_import() {
        let geojson: GeoJson = r#"{"type":"Point","coordinates":[5.0,6.0,7.0]}"#.parse().unwrap();
        let geometry = from_geojson(&geojson).unwrap();
        assert_eq!(
            geometry,
            Geometry::Point {
                coordinates: Position::with_alt(5.0, 6.0, 7.0)
            }
        );
    }
}
