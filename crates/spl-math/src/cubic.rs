//! Cubic polynomial machinery shared by curve segments and bicubic patches.
//!
//! A cubic span is evaluated as `g · B · tv`, where `g` is a geometry row of
//! control data, `B` a fixed 4x4 basis matrix, and `tv` the power vector
//! `[t^3, t^2, t, 1]` (or one of its derivatives).  Basis matrices follow the
//! textbook convention: rows index geometry entries, columns index powers of
//! `t` in descending order.

use glam::DVec4;
use nalgebra::{Matrix4, Vector4};

/// The power vector `[t^3, t^2, t, 1]`.
#[inline]
pub fn power_vector(t: f64) -> Vector4<f64> {
    Vector4::new(t * t * t, t * t, t, 1.0)
}

/// The first-derivative vector `[3t^2, 2t, 1, 0]`.
#[inline]
pub fn derivative_vector(t: f64) -> Vector4<f64> {
    Vector4::new(3.0 * t * t, 2.0 * t, 1.0, 0.0)
}

/// The second-derivative vector `[6t, 2, 0, 0]`.
#[inline]
pub fn second_derivative_vector(t: f64) -> Vector4<f64> {
    Vector4::new(6.0 * t, 2.0, 0.0, 0.0)
}

/// The Hermite basis matrix.  Geometry rows are
/// `[p0, p1, out_tangent, in_tangent]`.
#[rustfmt::skip]
pub fn hermite_matrix() -> Matrix4<f64> {
    Matrix4::new(
        2.0, -3.0, 0.0, 1.0,
       -2.0,  3.0, 0.0, 0.0,
        1.0, -2.0, 1.0, 0.0,
        1.0, -1.0, 0.0, 0.0,
    )
}

/// The cubic Bezier basis matrix.  Geometry rows are the four control
/// points.  The matrix is symmetric.
#[rustfmt::skip]
pub fn bezier_matrix() -> Matrix4<f64> {
    Matrix4::new(
       -1.0,  3.0, -3.0, 1.0,
        3.0, -6.0,  3.0, 0.0,
       -3.0,  3.0,  0.0, 0.0,
        1.0,  0.0,  0.0, 0.0,
    )
}

/// The inverse of [`bezier_matrix`], used to recover representative Bezier
/// control points from a combined basis.  Also symmetric.
#[rustfmt::skip]
pub fn bezier_inverse_matrix() -> Matrix4<f64> {
    Matrix4::new(
        0.0, 0.0,       0.0,       1.0,
        0.0, 0.0,       1.0 / 3.0, 1.0,
        0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0,
        1.0, 1.0,       1.0,       1.0,
    )
}

/// Build a matrix from four row vectors.
#[inline]
pub fn from_rows(r0: Vector4<f64>, r1: Vector4<f64>, r2: Vector4<f64>, r3: Vector4<f64>) -> Matrix4<f64> {
    Matrix4::from_rows(&[r0.transpose(), r1.transpose(), r2.transpose(), r3.transpose()])
}

/// Convert a homogeneous glam vector to nalgebra.
#[inline]
pub fn to_na(v: DVec4) -> Vector4<f64> {
    Vector4::new(v.x, v.y, v.z, v.w)
}

/// Convert an nalgebra vector back to glam.
#[inline]
pub fn to_glam(v: Vector4<f64>) -> DVec4 {
    DVec4::new(v.x, v.y, v.z, v.w)
}
