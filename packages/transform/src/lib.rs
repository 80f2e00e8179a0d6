#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Projective transform estimation from control point correspondences.
//!
//! Fits a 3×3 homography (8 degrees of freedom, bottom-right entry
//! normalized to 1) mapping one plane onto another — in this workspace
//! always a raster image's pixel space and WGS84 geographic space.
//! The solve is a direct linear least squares; with exactly four
//! non-degenerate correspondences it is exact, with more it minimizes
//! the residual.
//!
//! Matrices are derived values, recomputed from the current control
//! links whenever needed. Nothing here caches a fit: after any
//! control-link edit the caller simply fits again.

use nalgebra::{DMatrix, DVector, Matrix3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of correspondences needed to constrain a homography.
pub const MIN_CONTROL_POINTS: usize = 4;

/// Errors that can occur while fitting a transform.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Fewer correspondences than the 8 degrees of freedom require.
    #[error("insufficient control points: got {got}, need at least {min}")]
    InsufficientControlPoints {
        /// How many correspondences were supplied.
        got: usize,
        /// The required minimum.
        min: usize,
    },

    /// The correspondences do not constrain a full projective
    /// transform (collinear or duplicated points).
    #[error("degenerate control points: {detail}")]
    DegenerateControlPoints {
        /// What made the system unsolvable.
        detail: String,
    },
}

/// One control-point correspondence between the two planes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correspondence {
    /// Point in the source plane (pixel space for a forward fit).
    pub source: [f64; 2],
    /// The same real-world location in the destination plane.
    pub dest: [f64; 2],
}

/// A fitted transform: one matrix per direction.
///
/// `backward` is obtained by re-fitting with the pair order swapped
/// rather than by inverting `forward` — both directions then match
/// the actual correspondences independently instead of relying on the
/// inverse of a possibly ill-conditioned matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedTransform {
    /// Source → destination (pixel → WGS84).
    pub forward: Matrix3<f64>,
    /// Destination → source (WGS84 → pixel).
    pub backward: Matrix3<f64>,
}

impl FittedTransform {
    /// Applies the forward matrix to a point.
    #[must_use]
    pub fn forward_point(&self, point: [f64; 2]) -> [f64; 2] {
        apply(&self.forward, point)
    }

    /// Applies the backward matrix to a point.
    #[must_use]
    pub fn backward_point(&self, point: [f64; 2]) -> [f64; 2] {
        apply(&self.backward, point)
    }
}

/// Fits forward and backward homographies from correspondences.
///
/// # Errors
///
/// Returns [`TransformError::InsufficientControlPoints`] for fewer
/// than [`MIN_CONTROL_POINTS`] pairs and
/// [`TransformError::DegenerateControlPoints`] when the pairs do not
/// constrain all eight degrees of freedom.
pub fn fit(correspondences: &[Correspondence]) -> Result<FittedTransform, TransformError> {
    Ok(FittedTransform {
        forward: fit_matrix(correspondences, Direction::Forward)?,
        backward: fit_matrix(correspondences, Direction::Backward)?,
    })
}

/// Applies a homography to a single point.
///
/// Computes the homogeneous denominator `d = m31·a + m32·b + m33`. A
/// denominator within machine epsilon of zero is substituted with
/// `f64::MIN_POSITIVE` — a deliberate fallback that keeps the result
/// finite but is *not* geometrically meaningful: a true zero
/// denominator means the point maps to infinity.
#[must_use]
pub fn apply(matrix: &Matrix3<f64>, point: [f64; 2]) -> [f64; 2] {
    let [a, b] = point;

    let mut d = matrix[(2, 0)] * a + matrix[(2, 1)] * b + matrix[(2, 2)];
    if d.abs() < f64::EPSILON {
        d = f64::MIN_POSITIVE;
    }

    [
        (matrix[(0, 0)] * a + matrix[(0, 1)] * b + matrix[(0, 2)]) / d,
        (matrix[(1, 0)] * a + matrix[(1, 1)] * b + matrix[(1, 2)]) / d,
    ]
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Sets up and solves the 2N×8 linear system for one direction.
///
/// Each correspondence contributes two rows:
///
/// ```text
/// sx·h11 + sy·h12 + h13 − dx·sx·h31 − dx·sy·h32 = dx
/// sx·h21 + sy·h22 + h23 − dy·sx·h31 − dy·sy·h32 = dy
/// ```
fn fit_matrix(
    correspondences: &[Correspondence],
    direction: Direction,
) -> Result<Matrix3<f64>, TransformError> {
    if correspondences.len() < MIN_CONTROL_POINTS {
        return Err(TransformError::InsufficientControlPoints {
            got: correspondences.len(),
            min: MIN_CONTROL_POINTS,
        });
    }

    let rows = 2 * correspondences.len();
    let mut system = DMatrix::<f64>::zeros(rows, 8);
    let mut rhs = DVector::<f64>::zeros(rows);

    for (index, correspondence) in correspondences.iter().enumerate() {
        let ([sx, sy], [dx, dy]) = match direction {
            Direction::Forward => (correspondence.source, correspondence.dest),
            Direction::Backward => (correspondence.dest, correspondence.source),
        };

        let row = 2 * index;
        system[(row, 0)] = sx;
        system[(row, 1)] = sy;
        system[(row, 2)] = 1.0;
        system[(row, 6)] = -dx * sx;
        system[(row, 7)] = -dx * sy;
        rhs[row] = dx;

        let row = row + 1;
        system[(row, 3)] = sx;
        system[(row, 4)] = sy;
        system[(row, 5)] = 1.0;
        system[(row, 6)] = -dy * sx;
        system[(row, 7)] = -dy * sy;
        rhs[row] = dy;
    }

    let svd = system.svd(true, true);
    let largest = svd.singular_values.iter().copied().fold(0.0_f64, f64::max);
    #[allow(clippy::cast_precision_loss)]
    let tolerance = largest * f64::EPSILON * (rows as f64);

    if svd.rank(tolerance) < 8 {
        return Err(TransformError::DegenerateControlPoints {
            detail: "rank-deficient system (collinear or duplicate control points)".to_string(),
        });
    }

    let solution = svd
        .solve(&rhs, tolerance)
        .map_err(|message| TransformError::DegenerateControlPoints {
            detail: message.to_string(),
        })?;

    if solution.iter().any(|entry| !entry.is_finite()) {
        return Err(TransformError::DegenerateControlPoints {
            detail: "solution contains non-finite entries".to_string(),
        });
    }

    Ok(Matrix3::new(
        solution[0],
        solution[1],
        solution[2],
        solution[3],
        solution[4],
        solution[5],
        solution[6],
        solution[7],
        1.0,
    ))
}
