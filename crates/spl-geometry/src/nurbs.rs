//! NURBS basis-matrix construction.
//!
//! A single cubic segment (or one direction of a bicubic patch) covers one
//! non-degenerate knot span.  The blending functions over a local window of
//! `2 * order` knots, rescaled to `[0, 1]`, collapse into one 4x4 matrix
//! whose rows are the polynomial coefficients of each control point's
//! influence over the span.

use nalgebra::{Matrix4, Vector4};
use spl_core::{Result, SplError};

/// Largest supported order (degree + 1).
pub const MAX_ORDER: usize = 4;

/// Recursively evaluate the blending function `N_{i,j}` over `knots` as a
/// coefficient vector against `[t^3, t^2, t, 1]`.
fn blending_function(order: usize, i: usize, j: usize, knots: &[f64]) -> Vector4<f64> {
    if j == 1 {
        return if i == order - 1 && knots[i] < knots[i + 1] {
            Vector4::new(0.0, 0.0, 0.0, 1.0)
        } else {
            Vector4::zeros()
        };
    }

    let bi0 = blending_function(order, i, j - 1, knots);
    let bi1 = blending_function(order, i + 1, j - 1, knots);

    let d0 = knots[i + j - 1] - knots[i];
    let d1 = knots[i + j] - knots[i + 1];

    // Division by a zero knot span is defined to contribute zero.
    let mut r = Vector4::zeros();
    if d0 != 0.0 {
        r += bi0 / d0;
    }
    if d1 != 0.0 {
        r -= bi1 / d1;
    }

    // Multiply the accumulated polynomial by t: shift coefficients one
    // power higher.
    r = Vector4::new(r[1], r[2], r[3], 0.0);

    if d0 != 0.0 {
        r += bi0 * (-knots[i] / d0);
    }
    if d1 != 0.0 {
        r += bi1 * (knots[i + j] / d1);
    }

    r
}

/// Build the basis matrix for one knot span.
///
/// `window` holds the `2 * order` knots surrounding the span; the span
/// itself is `[window[order-1], window[order]]`.  Rows beyond `order` are
/// zero.  A zero-width span cannot be rescaled and is reported as a
/// degenerate error rather than silently returning zeros.
pub fn segment_basis(order: usize, window: &[f64]) -> Result<Matrix4<f64>> {
    if order < 1 || order > MAX_ORDER {
        return Err(SplError::InvalidOperation(format!(
            "NURBS order must be 1..=4, got {order}"
        )));
    }
    if window.len() != 2 * order {
        return Err(SplError::InvalidOperation(format!(
            "knot window must hold {} values, got {}",
            2 * order,
            window.len()
        )));
    }

    let min_k = window[order - 1];
    let max_k = window[order];
    if min_k == max_k {
        return Err(SplError::Degenerate(format!(
            "zero-width knot span at {min_k}"
        )));
    }

    let mut local = [0.0; 2 * MAX_ORDER];
    for (dst, &src) in local.iter_mut().zip(window) {
        *dst = (src - min_k) / (max_k - min_k);
    }
    let local = &local[..2 * order];

    let mut basis = Matrix4::zeros();
    for i in 0..order {
        basis.set_row(i, &blending_function(order, i, order, local).transpose());
    }

    Ok(basis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use spl_math::cubic::{bezier_matrix, power_vector};

    #[test]
    fn test_order_two_is_linear_interpolation() {
        let basis = segment_basis(2, &[0.0, 0.0, 1.0, 1.0]).unwrap();
        // Row 0 weighs CV0 by (1 - t), row 1 weighs CV1 by t.
        for &t in &[0.0, 0.25, 0.5, 1.0] {
            let tv = power_vector(t);
            assert_relative_eq!(basis.row(0).transpose().dot(&tv), 1.0 - t, epsilon = 1e-12);
            assert_relative_eq!(basis.row(1).transpose().dot(&tv), t, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_bezier_knots_reproduce_bezier_matrix() {
        // Order 4 with a fully clamped knot window is exactly a Bezier span.
        let basis = segment_basis(4, &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let mb = bezier_matrix();
        for i in 0..4 {
            for j in 0..4 {
                assert_relative_eq!(basis[(i, j)], mb[(i, j)], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_partition_of_unity() {
        let basis = segment_basis(3, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        for &t in &[0.0, 0.3, 0.7, 1.0] {
            let tv = power_vector(t);
            let sum: f64 = (0..3).map(|i| basis.row(i).transpose().dot(&tv)).sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_degenerate_span_is_an_error() {
        let err = segment_basis(2, &[0.0, 1.0, 1.0, 2.0]).unwrap_err();
        assert!(matches!(err, SplError::Degenerate(_)));
    }

    #[test]
    fn test_bad_order_rejected() {
        assert!(segment_basis(5, &[0.0; 10]).is_err());
        assert!(segment_basis(0, &[]).is_err());
    }
}
