#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! WGS84 ⇄ Web-Mercator conversion and uncertainty buffer geometry.
//!
//! This is deliberately not a general projection library. The
//! workspace needs exactly two planar frames: WGS84 geographic
//! coordinates and the spherical Web-Mercator metric frame used to
//! buffer uncertainty radii. Everything else (raster pixel spaces) is
//! handled by fitted homographies, not named projections.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use strum_macros::{AsRefStr, Display, EnumString};

use venue_map_geometry::{Geometry, Position};

/// Spherical earth radius used by EPSG:3857, in meters.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Number of segments approximating an uncertainty circle.
const CIRCLE_SEGMENTS: usize = 64;

/// The named planar references this workspace understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
pub enum Projection {
    /// Geographic WGS84, `[lon, lat]` degrees.
    #[strum(
        to_string = "EPSG:4326",
        serialize = "WGS84",
        serialize = "CRS:84",
        serialize = "urn:ogc:def:crs:OGC:1.3:CRS84"
    )]
    Wgs84,

    /// Spherical Web Mercator, meters.
    #[strum(to_string = "EPSG:3857", serialize = "EPSG:900913")]
    WebMercator,
}

impl Projection {
    /// Converts a point expressed in `self` into `target`.
    #[must_use]
    pub fn convert(self, target: Self, position: &Position) -> Position {
        match (self, target) {
            (Self::Wgs84, Self::WebMercator) => wgs84_to_web_mercator(position),
            (Self::WebMercator, Self::Wgs84) => web_mercator_to_wgs84(position),
            _ => *position,
        }
    }
}

/// Point transform suitable for `venue_map_geometry::reproject`,
/// converting from the resolved source reference into `target`.
///
/// An unrecognized source name leaves points unchanged (and logs);
/// reference resolution is the feature hierarchy's job, so by the time
/// geometry reaches a named reprojection the name should be one of the
/// two known frames.
pub fn to_named(target: Projection) -> impl Fn(&str, &Position) -> Position {
    move |source, position| {
        source.parse::<Projection>().map_or_else(
            |_| {
                log::warn!("Unrecognized source reference `{source}`; leaving point unchanged");
                *position
            },
            |source| source.convert(target, position),
        )
    }
}

/// Projects geographic WGS84 coordinates into spherical Web Mercator.
#[must_use]
pub fn wgs84_to_web_mercator(position: &Position) -> Position {
    let x = position.x.to_radians() * EARTH_RADIUS_M;
    let y = (FRAC_PI_4 + position.y.to_radians() / 2.0).tan().ln() * EARTH_RADIUS_M;
    position.replace_xy(x, y)
}

/// Projects spherical Web-Mercator coordinates back to WGS84.
#[must_use]
pub fn web_mercator_to_wgs84(position: &Position) -> Position {
    let lon = (position.x / EARTH_RADIUS_M).to_degrees();
    let lat = (2.0 * (position.y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
    position.replace_xy(lon, lat)
}

/// Converts a point plus uncertainty radius into displayable geometry.
///
/// `None` means a precise point: the center is returned unchanged.
/// Otherwise the center is projected into the Web-Mercator metric
/// frame, buffered with a Euclidean circle of `radius_m` meters, and
/// the resulting ring is projected back to WGS84.
///
/// The Euclidean circle approximates a geodesic one — acceptable for
/// radii from meters to low kilometers, not valid near the poles or
/// for large radii.
#[must_use]
pub fn uncertainty_circle(center: &Position, radius_m: Option<f64>) -> Geometry {
    let Some(radius_m) = radius_m else {
        return Geometry::Point {
            coordinates: *center,
        };
    };

    let projected = wgs84_to_web_mercator(center);
    let mut ring = Vec::with_capacity(CIRCLE_SEGMENTS + 1);

    for segment in 0..CIRCLE_SEGMENTS {
        #[allow(clippy::cast_precision_loss)]
        let angle = 2.0 * PI * (segment as f64) / (CIRCLE_SEGMENTS as f64);
        let vertex = Position::new(
            projected.x + radius_m * angle.cos(),
            projected.y + radius_m * angle.sin(),
        );
        ring.push(web_mercator_to_wgs84(&vertex));
    }
    // Close the ring.
    ring.push(ring[0]);

    Geometry::Polygon {
        coordinates: vec![ring],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use venue_map_geometry::bounding_box;

    #[test]
    fn mercator_round_trips() {
        let berlin = Position::new(13.405, 52.52);
        let projected = wgs84_to_web_mercator(&berlin);
        let back = web_mercator_to_wgs84(&projected);
        assert!((back.x - berlin.x).abs() < 1e-9);
        assert!((back.y - berlin.y).abs() < 1e-9);
    }

    #[test]
    fn mercator_matches_known_extent() {
        let edge = wgs84_to_web_mercator(&Position::new(180.0, 0.0));
        assert!((edge.x - 20_037_508.342_789_244).abs() < 1e-3);
        assert!(edge.y.abs() < 1e-6);
    }

    #[test]
    fn projection_names_parse() {
        assert_eq!("EPSG:4326".parse::<Projection>(), Ok(Projection::Wgs84));
        assert_eq!("WGS84".parse::<Projection>(), Ok(Projection::Wgs84));
        assert_eq!(
            "EPSG:3857".parse::<Projection>(),
            Ok(Projection::WebMercator)
        );
        assert_eq!(Projection::Wgs84.to_string(), "EPSG:4326");
        assert!("EPSG:32633".parse::<Projection>().is_err());
    }

    #[test]
    fn no_radius_returns_center_unchanged() {
        let center = Position::with_alt(13.4, 52.5, 12.0);
        let geometry = uncertainty_circle(&center, None);
        assert_eq!(
            geometry,
            Geometry::Point {
                coordinates: center
            }
        );
    }

    #[test]
    fn circle_ring_is_closed() {
        let geometry = uncertainty_circle(&Position::new(13.4, 52.5), Some(50.0));
        let Geometry::Polygon { coordinates } = &geometry else {
            panic!("expected polygon");
        };
        let ring = &coordinates[0];
        assert_eq!(ring.len(), 65);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn circle_extent_matches_radius_in_metric_frame() {
        let radius = 50.0;
        let geometry = uncertainty_circle(&Position::new(13.4, 52.5), Some(radius));

        // Measure the circle where it was drawn: back in Web Mercator,
        // through the named reprojection path the UI uses.
        let metric = venue_map_geometry::reproject(&geometry, None, to_named(Projection::WebMercator));
        let bounds = bounding_box(&metric);

        assert!((bounds.width() - 2.0 * radius).abs() < 0.01);
        assert!((bounds.height() - 2.0 * radius).abs() < 0.01);
    }
}
