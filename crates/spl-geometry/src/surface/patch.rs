//! A single bicubic surface patch over `(s, t)` in `[0, 1] x [0, 1]`.

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};
use spl_core::{Result, SplError};
use spl_math::cubic::{
    bezier_inverse_matrix, bezier_matrix, derivative_vector, hermite_matrix, power_vector,
};
use spl_math::{HVec4, Point3, Vector3};

use crate::nurbs;
use crate::sample::Sample;
use crate::surface::{BezierPatch, Surface};

/// One corner of a Hermite patch: the point, the four boundary tangents
/// leading into and out of it, and the twist (the mixed partial
/// d2/ds dt).  Tangents are per unit of the patch's local parameter.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HermitePatchCv {
    pub point: Point3,
    pub s_in: Vector3,
    pub s_out: Vector3,
    pub t_in: Vector3,
    pub t_out: Vector3,
    pub twist: Vector3,
}

impl HermitePatchCv {
    pub fn new(point: Point3) -> Self {
        Self {
            point,
            ..Self::default()
        }
    }
}

/// A bicubic parametric surface patch, stored as one combined
/// basis-times-geometry matrix per axis.  Evaluation is `sv . B . tv`
/// against the two power vectors, regardless of which form (Hermite,
/// Bezier, NURBS) defined the patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BicubicPatch {
    bx: Matrix4<f64>,
    by: Matrix4<f64>,
    bz: Matrix4<f64>,
    bw: Matrix4<f64>,
    rational: bool,
}

impl BicubicPatch {
    /// Builds the patch from its four Hermite corners, indexed
    /// `cvs[s][t]`.  Rows of the geometry matrix blend in `s`, columns
    /// in `t`.
    pub fn hermite(cvs: &[[HermitePatchCv; 2]; 2]) -> Self {
        let mh = hermite_matrix();
        let mht = mh.transpose();
        let cv00 = &cvs[0][0];
        let cv01 = &cvs[0][1];
        let cv10 = &cvs[1][0];
        let cv11 = &cvs[1][1];

        let geometry = |pick: &dyn Fn(Point3) -> f64, pickv: &dyn Fn(Vector3) -> f64| {
            Matrix4::new(
                pick(cv00.point), pick(cv01.point), pickv(cv00.t_out), pickv(cv01.t_in),
                pick(cv10.point), pick(cv11.point), pickv(cv10.t_out), pickv(cv11.t_in),
                pickv(cv00.s_out), pickv(cv01.s_out), pickv(cv00.twist), pickv(cv01.twist),
                pickv(cv10.s_in), pickv(cv11.s_in), pickv(cv10.twist), pickv(cv11.twist),
            )
        };

        let gx = geometry(&|p| p.x, &|v| v.x);
        let gy = geometry(&|p| p.y, &|v| v.y);
        let gz = geometry(&|p| p.z, &|v| v.z);

        BicubicPatch {
            bx: mht * gx * mh,
            by: mht * gy * mh,
            bz: mht * gz * mh,
            bw: Matrix4::zeros(),
            rational: false,
        }
    }

    /// Builds the patch from sixteen Bezier control points, indexed
    /// `points[s][t]`.
    pub fn bezier(points: &[[Point3; 4]; 4]) -> Self {
        let mb = bezier_matrix();

        let geometry = |pick: &dyn Fn(Point3) -> f64| {
            Matrix4::from_fn(|si, ti| pick(points[si][ti]))
        };
        let gx = geometry(&|p| p.x);
        let gy = geometry(&|p| p.y);
        let gz = geometry(&|p| p.z);

        // The Bezier basis matrix is symmetric, so the transpose on the
        // left is the matrix itself.
        BicubicPatch {
            bx: mb * gx * mb,
            by: mb * gy * mb,
            bz: mb * gz * mb,
            bw: Matrix4::zeros(),
            rational: false,
        }
    }

    /// Builds the patch from one span pair of a NURBS surface.
    ///
    /// `s_window` and `t_window` hold the `2 * order` knots surrounding
    /// the span in each direction.  `cvs` is a pool of homogeneous
    /// control vertices; the vertex blending `(s, t)` is
    /// `cvs[(t + t_offset) * row_stride + (s + s_offset)]`.
    pub fn nurbs(
        s_order: usize,
        t_order: usize,
        s_window: &[f64],
        t_window: &[f64],
        cvs: &[HVec4],
        row_stride: usize,
        s_offset: usize,
        t_offset: usize,
    ) -> Result<Self> {
        let sb = nurbs::segment_basis(s_order, s_window)?;
        let tb = nurbs::segment_basis(t_order, t_window)?;

        let last = (t_order - 1 + t_offset) * row_stride + (s_order - 1 + s_offset);
        if last >= cvs.len() {
            return Err(SplError::InvalidOperation(format!(
                "control vertex pool holds {} entries, span needs index {}",
                cvs.len(),
                last
            )));
        }

        // Zero-fill the unused vertices of lower orders.
        let c = |s: usize, t: usize| {
            if s < s_order && t < t_order {
                cvs[(t + t_offset) * row_stride + (s + s_offset)]
            } else {
                HVec4::ZERO
            }
        };
        let gx = Matrix4::from_fn(|s, t| c(s, t).x);
        let gy = Matrix4::from_fn(|s, t| c(s, t).y);
        let gz = Matrix4::from_fn(|s, t| c(s, t).z);
        let gw = Matrix4::from_fn(|s, t| c(s, t).w);

        let sbt = sb.transpose();
        Ok(BicubicPatch {
            bx: sbt * gx * tb,
            by: sbt * gy * tb,
            bz: sbt * gz * tb,
            bw: sbt * gw * tb,
            rational: true,
        })
    }

    pub fn is_rational(&self) -> bool {
        self.rational
    }

    /// Evaluates a position-like quantity against the given power
    /// vectors, dividing through by the homogeneous coordinate when
    /// rational.
    fn evaluate_point(&self, sv: Vector4<f64>, tv: Vector4<f64>) -> Point3 {
        let x = (self.bx * tv).dot(&sv);
        let y = (self.by * tv).dot(&sv);
        let z = (self.bz * tv).dot(&sv);
        if self.rational {
            let w = (self.bw * tv).dot(&sv);
            Point3::new(x / w, y / w, z / w)
        } else {
            Point3::new(x, y, z)
        }
    }

    /// Evaluates a derivative-like quantity.  As with curve segments,
    /// rational partials differentiate the homogeneous coordinates only,
    /// without the quotient rule, so they are scaled by the weight
    /// function rather than exact.
    fn evaluate_vector(&self, sv: Vector4<f64>, tv: Vector4<f64>) -> Vector3 {
        Vector3::new(
            (self.bx * tv).dot(&sv),
            (self.by * tv).dot(&sv),
            (self.bz * tv).dot(&sv),
        )
    }

    /// The sixteen Bezier control points representing this patch,
    /// indexed `[s][t]`.  For a rational patch the homogeneous control
    /// vertices are projected down to 3-space.
    pub fn bezier_points(&self) -> [[Point3; 4]; 4] {
        let mbi = bezier_inverse_matrix();
        let gx = mbi * self.bx * mbi;
        let gy = mbi * self.by * mbi;
        let gz = mbi * self.bz * mbi;
        let gw = if self.rational {
            mbi * self.bw * mbi
        } else {
            Matrix4::from_element(1.0)
        };

        let mut v = [[Point3::ZERO; 4]; 4];
        for si in 0..4 {
            for ti in 0..4 {
                let w = gw[(si, ti)];
                v[si][ti] = Point3::new(gx[(si, ti)] / w, gy[(si, ti)] / w, gz[(si, ti)] / w);
            }
        }
        v
    }
}

impl Surface for BicubicPatch {
    fn point_at(&self, s: f64, t: f64) -> Sample<Point3> {
        let cs = s.clamp(0.0, 1.0);
        let ct = t.clamp(0.0, 1.0);
        Sample::new(
            self.evaluate_point(power_vector(cs), power_vector(ct)),
            s == cs && t == ct,
        )
    }

    fn s_tangent_at(&self, s: f64, t: f64) -> Sample<Vector3> {
        let cs = s.clamp(0.0, 1.0);
        let ct = t.clamp(0.0, 1.0);
        Sample::new(
            self.evaluate_vector(derivative_vector(cs), power_vector(ct)),
            s == cs && t == ct,
        )
    }

    fn t_tangent_at(&self, s: f64, t: f64) -> Sample<Vector3> {
        let cs = s.clamp(0.0, 1.0);
        let ct = t.clamp(0.0, 1.0);
        Sample::new(
            self.evaluate_vector(power_vector(cs), derivative_vector(ct)),
            s == cs && t == ct,
        )
    }

    fn bezier_patches(&self) -> Option<Vec<Vec<BezierPatch>>> {
        Some(vec![vec![BezierPatch::new(1.0, 1.0, self.bezier_points())]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_points_eq(a: Point3, b: Point3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-9);
    }

    fn bowl() -> [[Point3; 4]; 4] {
        let mut v = [[Point3::ZERO; 4]; 4];
        for si in 0..4 {
            for ti in 0..4 {
                let s = si as f64 / 3.0;
                let t = ti as f64 / 3.0;
                v[si][ti] = Point3::new(s, t, (s - 0.5) * (t - 0.5));
            }
        }
        v
    }

    #[test]
    fn test_bezier_interpolates_corners() {
        let v = bowl();
        let patch = BicubicPatch::bezier(&v);
        assert_points_eq(patch.point_at(0.0, 0.0).value, v[0][0]);
        assert_points_eq(patch.point_at(1.0, 0.0).value, v[3][0]);
        assert_points_eq(patch.point_at(0.0, 1.0).value, v[0][3]);
        assert_points_eq(patch.point_at(1.0, 1.0).value, v[3][3]);
    }

    #[test]
    fn test_bezier_round_trip_recovers_control_points() {
        let v = bowl();
        let patch = BicubicPatch::bezier(&v);
        let back = patch.bezier_points();
        for si in 0..4 {
            for ti in 0..4 {
                assert_points_eq(back[si][ti], v[si][ti]);
            }
        }
    }

    #[test]
    fn test_hermite_corners_and_tangents() {
        let mut cvs = [[HermitePatchCv::default(); 2]; 2];
        cvs[0][0] = HermitePatchCv::new(Point3::new(0.0, 0.0, 0.0));
        cvs[0][1] = HermitePatchCv::new(Point3::new(0.0, 2.0, 0.0));
        cvs[1][0] = HermitePatchCv::new(Point3::new(2.0, 0.0, 0.0));
        cvs[1][1] = HermitePatchCv::new(Point3::new(2.0, 2.0, 0.0));
        for row in cvs.iter_mut() {
            for cv in row.iter_mut() {
                cv.s_in = Vector3::new(2.0, 0.0, 0.0);
                cv.s_out = Vector3::new(2.0, 0.0, 0.0);
                cv.t_in = Vector3::new(0.0, 2.0, 0.0);
                cv.t_out = Vector3::new(0.0, 2.0, 0.0);
            }
        }

        let patch = BicubicPatch::hermite(&cvs);
        assert_points_eq(patch.point_at(0.0, 0.0).value, cvs[0][0].point);
        assert_points_eq(patch.point_at(1.0, 1.0).value, cvs[1][1].point);
        // Matching linear tangents make the patch a flat bilinear sheet.
        assert_points_eq(patch.point_at(0.5, 0.5).value, Point3::new(1.0, 1.0, 0.0));
        assert_points_eq(patch.s_tangent_at(0.0, 0.0).value, cvs[0][0].s_out);
        assert_points_eq(patch.t_tangent_at(0.0, 0.0).value, cvs[0][0].t_out);
    }

    #[test]
    fn test_normal_of_planar_patch() {
        let mut v = [[Point3::ZERO; 4]; 4];
        for si in 0..4 {
            for ti in 0..4 {
                v[si][ti] = Point3::new(si as f64, ti as f64, 5.0);
            }
        }
        let patch = BicubicPatch::bezier(&v);
        let n = patch.normal_at(0.3, 0.7).value;
        assert_points_eq(n, Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_nurbs_bilinear_span() {
        let cvs = [
            HVec4::new(0.0, 0.0, 0.0, 1.0),
            HVec4::new(2.0, 0.0, 0.0, 1.0),
            HVec4::new(0.0, 2.0, 0.0, 1.0),
            HVec4::new(2.0, 2.0, 0.0, 1.0),
        ];
        let window = [0.0, 0.0, 1.0, 1.0];
        let patch = BicubicPatch::nurbs(2, 2, &window, &window, &cvs, 2, 0, 0).unwrap();
        assert!(patch.is_rational());
        assert_points_eq(patch.point_at(0.5, 0.5).value, Point3::new(1.0, 1.0, 0.0));
        assert_points_eq(patch.point_at(1.0, 0.0).value, Point3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_nurbs_rejects_short_pool() {
        let cvs = [HVec4::ONE; 3];
        let window = [0.0, 0.0, 1.0, 1.0];
        assert!(BicubicPatch::nurbs(2, 2, &window, &window, &cvs, 2, 0, 0).is_err());
    }

    #[test]
    fn test_clamping_reports_out_of_domain() {
        let patch = BicubicPatch::bezier(&bowl());
        let sample = patch.point_at(1.5, 0.5);
        assert!(!sample.in_domain);
        assert_points_eq(sample.value, patch.point_at(1.0, 0.5).value);
        assert!(patch.point_at(0.5, 0.5).in_domain);
    }
}
