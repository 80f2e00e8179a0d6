#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Effective-attribute resolution over the feature hierarchy.
//!
//! Shape, coordinate transform, and raster basemap attach to features
//! sparsely; each resolves *independently* by walking parent links
//! toward the root. A room with its own shape but no transform gets
//! the room's shape reprojected through the building's transform.
//!
//! All resolution runs over an immutable [`MapSnapshot`]: no shared
//! caches, no global state, so two features can be resolved
//! concurrently without coordination. Mutating the snapshot during a
//! pass is the caller's bug to prevent — pass each resolution its own
//! value.

use std::collections::BTreeSet;

use thiserror::Error;

use venue_map_features_models::{
    CoordinateTransform, Feature, MapSnapshot, ModelError, RasterImage, Shape, TransformRef,
};
use venue_map_geometry::map_positions;
use venue_map_transform::{Correspondence, FittedTransform, TransformError};

/// Errors that can occur during hierarchy resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The walk reached a root without any feature defining a shape.
    #[error("no feature in the ancestor chain of `{feature}` defines a shape")]
    ShapeNotFound {
        /// The feature the resolution started from.
        feature: String,
    },

    /// The parent chain revisited a feature. Should not be
    /// constructible through the public mutation API; indicates a
    /// corrupted snapshot.
    #[error("feature hierarchy contains a cycle through `{feature}`")]
    CyclicFeatureHierarchy {
        /// The first feature seen twice.
        feature: String,
    },

    /// An entity referenced by id does not exist in the snapshot.
    #[error("invalid reference: {kind} `{id}` does not exist in the snapshot")]
    InvalidReference {
        /// The table the reference points into.
        kind: &'static str,
        /// The missing id.
        id: String,
    },

    /// Fitting the resolved coordinate transform failed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Rebuilding a shape from reprojected geometry failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// A shape resolved through the hierarchy, together with the feature
/// that actually defines it.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedShape<'a> {
    /// The nearest ancestor-or-self that defines the shape.
    pub owner: &'a Feature,
    pub shape: &'a Shape,
}

/// A raster basemap resolved through the hierarchy.
#[derive(Debug, Clone)]
pub struct RasterBase<'a> {
    /// The nearest ancestor-or-self that defines the image.
    pub owner: &'a Feature,
    pub image: &'a RasterImage,
    /// The owner's effective transform reference — the
    /// georeferencing the basemap is displayed with.
    pub transform: TransformRef,
}

/// A shape reprojected into WGS84, still carrying the resolved
/// shape's id, plus the feature that defined it.
#[derive(Debug, Clone)]
pub struct EffectiveShape<'a> {
    pub owner: &'a Feature,
    pub shape: Shape,
}

/// Iterator over a feature's ancestor chain, self first.
///
/// Yields an error (then stops) on a dangling parent reference or a
/// repeat visit; the walk is therefore always finite even on
/// corrupted snapshots.
pub struct Ancestors<'a> {
    snapshot: &'a MapSnapshot,
    next: Option<String>,
    visited: BTreeSet<String>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = Result<&'a Feature, ResolveError>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;

        if !self.visited.insert(id.clone()) {
            return Some(Err(ResolveError::CyclicFeatureHierarchy { feature: id }));
        }

        let Some(feature) = self.snapshot.feature(&id) else {
            return Some(Err(ResolveError::InvalidReference {
                kind: "feature",
                id,
            }));
        };

        self.next = feature.parent.clone();
        Some(Ok(feature))
    }
}

/// Walks from `feature_id` toward the root, yielding each feature.
#[must_use]
pub fn ancestors<'a>(snapshot: &'a MapSnapshot, feature_id: &str) -> Ancestors<'a> {
    Ancestors {
        snapshot,
        next: Some(feature_id.to_string()),
        visited: BTreeSet::new(),
    }
}

/// Resolves the effective shape: the nearest ancestor-or-self shape
/// reference, together with the feature defining it.
///
/// # Errors
///
/// Returns [`ResolveError::ShapeNotFound`] if no feature in the chain
/// defines a shape, [`ResolveError::InvalidReference`] for dangling
/// feature/shape ids, and [`ResolveError::CyclicFeatureHierarchy`] on
/// a corrupted parent chain.
pub fn resolve_shape<'a>(
    snapshot: &'a MapSnapshot,
    feature_id: &str,
) -> Result<ResolvedShape<'a>, ResolveError> {
    for ancestor in ancestors(snapshot, feature_id) {
        let feature = ancestor?;
        if let Some(shape_id) = &feature.shape {
            let shape =
                snapshot
                    .shape(shape_id)
                    .ok_or_else(|| ResolveError::InvalidReference {
                        kind: "shape",
                        id: shape_id.clone(),
                    })?;
            if feature.id != feature_id {
                log::debug!("Feature {feature_id} inherits shape from {}", feature.id);
            }
            return Ok(ResolvedShape {
                owner: feature,
                shape,
            });
        }
    }

    Err(ResolveError::ShapeNotFound {
        feature: feature_id.to_string(),
    })
}

/// Resolves the effective transform reference: the nearest
/// ancestor-or-self reference, or the WGS84 sentinel once the root is
/// reached with none set — an untransformed root is implicitly in
/// WGS84, never an error.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidReference`] or
/// [`ResolveError::CyclicFeatureHierarchy`] if the walk itself fails.
pub fn resolve_transform_ref(
    snapshot: &MapSnapshot,
    feature_id: &str,
) -> Result<TransformRef, ResolveError> {
    for ancestor in ancestors(snapshot, feature_id) {
        let feature = ancestor?;
        if let Some(reference) = &feature.transform {
            return Ok(reference.clone());
        }
    }

    Ok(TransformRef::Wgs84)
}

/// Resolves the effective raster basemap: the nearest
/// ancestor-or-self image, paired with that owner's effective
/// transform reference. A feature with no basemap anywhere in its
/// chain is purely vector — `Ok(None)`, not an error.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidReference`] or
/// [`ResolveError::CyclicFeatureHierarchy`] if the walk itself fails.
pub fn resolve_raster_base<'a>(
    snapshot: &'a MapSnapshot,
    feature_id: &str,
) -> Result<Option<RasterBase<'a>>, ResolveError> {
    for ancestor in ancestors(snapshot, feature_id) {
        let feature = ancestor?;
        if let Some(image_id) = &feature.image {
            let image =
                snapshot
                    .image(image_id)
                    .ok_or_else(|| ResolveError::InvalidReference {
                        kind: "image",
                        id: image_id.clone(),
                    })?;
            let transform = resolve_transform_ref(snapshot, &feature.id)?;
            return Ok(Some(RasterBase {
                owner: feature,
                image,
                transform,
            }));
        }
    }

    Ok(None)
}

/// Fits the matrices for a stored coordinate transform from its
/// current control links.
///
/// Matrices are derived, never cached: call again after any link
/// edit.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidReference`] for dangling transform
/// or control-point ids, and the underlying
/// [`TransformError`](venue_map_transform::TransformError) when the
/// links are too few or degenerate.
pub fn fit_coordinate_transform(
    snapshot: &MapSnapshot,
    transform_id: &str,
) -> Result<FittedTransform, ResolveError> {
    let transform =
        snapshot
            .transform(transform_id)
            .ok_or_else(|| ResolveError::InvalidReference {
                kind: "transform",
                id: transform_id.to_string(),
            })?;

    let pairs = correspondences(snapshot, transform)?;
    Ok(venue_map_transform::fit(&pairs)?)
}

/// Assembles fit input from a transform's control links: source =
/// image-space point, dest = WGS84 point.
fn correspondences(
    snapshot: &MapSnapshot,
    transform: &CoordinateTransform,
) -> Result<Vec<Correspondence>, ResolveError> {
    transform
        .control_links
        .values()
        .map(|link| {
            let image_point = snapshot.control_point(&link.image_point).ok_or_else(|| {
                ResolveError::InvalidReference {
                    kind: "control point",
                    id: link.image_point.clone(),
                }
            })?;
            let wgs84_point = snapshot.control_point(&link.wgs84_point).ok_or_else(|| {
                ResolveError::InvalidReference {
                    kind: "control point",
                    id: link.wgs84_point.clone(),
                }
            })?;
            Ok(Correspondence {
                source: image_point.coordinates,
                dest: wgs84_point.coordinates,
            })
        })
        .collect()
}

/// Resolves a feature's shape and reprojects it into WGS84.
///
/// The UI calls this before rendering any feature's geometry on a
/// WGS84 basemap. If the owning feature's effective transform is the
/// WGS84 sentinel the shape is returned unchanged; otherwise the
/// transform is fitted from its control links and every point flows
/// through the forward (pixel → WGS84) matrix. The returned shape is
/// a fresh value keeping the resolved shape's id.
///
/// # Errors
///
/// Anything [`resolve_shape`], [`resolve_transform_ref`], or
/// [`fit_coordinate_transform`] can return.
pub fn effective_shape_in_wgs84<'a>(
    snapshot: &'a MapSnapshot,
    feature_id: &str,
) -> Result<EffectiveShape<'a>, ResolveError> {
    let resolved = resolve_shape(snapshot, feature_id)?;

    match resolve_transform_ref(snapshot, &resolved.owner.id)? {
        TransformRef::Wgs84 => Ok(EffectiveShape {
            owner: resolved.owner,
            shape: resolved.shape.clone(),
        }),
        TransformRef::Transform(transform_id) => {
            let fitted = fit_coordinate_transform(snapshot, &transform_id)?;
            let reprojected = map_positions(&resolved.shape.to_collection(), &|position| {
                let [x, y] = fitted.forward_point([position.x, position.y]);
                position.replace_xy(x, y)
            });
            Ok(EffectiveShape {
                owner: resolved.owner,
                shape: resolved.shape.with_collection(reprojected)?,
            })
        }
    }
}
