//! A single cubic curve segment over `t` in `[0, 1]`.

use nalgebra::{Matrix4, Vector4};
use serde::{Deserialize, Serialize};
use spl_core::{Result, SplError};
use spl_math::cubic::{
    self, bezier_inverse_matrix, bezier_matrix, derivative_vector, hermite_matrix, power_vector,
    second_derivative_vector,
};
use spl_math::{HVec4, Point3, Vector3};

use crate::curve::bezier::BezierSeg;
use crate::curve::hermite::HermiteCv;
use crate::curve::{Curve, CurveType};
use crate::nurbs;
use crate::sample::Sample;

/// One property pinning down a cubic segment during a refit.  Four of
/// these fully determine the segment.  A `None` value means the property
/// keeps whatever value the original curve had there, so a refit can move
/// one feature while holding the other three fixed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegConstraint {
    /// The curve must pass through a point at local parameter `t`.
    Point { t: f64, value: Option<HVec4> },
    /// The curve must have a given tangent at local parameter `t`.
    Tangent { t: f64, value: Option<HVec4> },
    /// A control vertex of the working basis.  Which vertex is determined
    /// by the constraint's position in the array.
    ControlVertex { value: Option<HVec4> },
}

/// A cubic parametric curve segment, stored as the rows of the combined
/// geometry-times-basis matrix, one row per axis.  Evaluation is a dot
/// product against the power vector, regardless of which form (Hermite,
/// Bezier, NURBS) defined the segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubicSegment {
    bx: [f64; 4],
    by: [f64; 4],
    bz: [f64; 4],
    bw: [f64; 4],
    rational: bool,
}

impl CubicSegment {
    /// Builds the segment from a Hermite span.  `tlength` is the
    /// parametric width of the span; tangents are given per unit of
    /// global parameter and must be rescaled to the local domain.
    pub fn hermite(cv0: &HermiteCv, cv1: &HermiteCv, tlength: f64) -> Self {
        let mh = hermite_matrix().transpose();
        let gx = Vector4::new(cv0.point.x, cv1.point.x, cv0.tan_out.x * tlength, cv1.tan_in.x * tlength);
        let gy = Vector4::new(cv0.point.y, cv1.point.y, cv0.tan_out.y * tlength, cv1.tan_in.y * tlength);
        let gz = Vector4::new(cv0.point.z, cv1.point.z, cv0.tan_out.z * tlength, cv1.tan_in.z * tlength);

        CubicSegment {
            bx: (mh * gx).into(),
            by: (mh * gy).into(),
            bz: (mh * gz).into(),
            bw: [0.0, 0.0, 0.0, 1.0],
            rational: false,
        }
    }

    /// Builds the segment from four Bezier control points.
    pub fn bezier(seg: &BezierSeg) -> Self {
        let mb = bezier_matrix();
        let gx = Vector4::new(seg.v[0].x, seg.v[1].x, seg.v[2].x, seg.v[3].x);
        let gy = Vector4::new(seg.v[0].y, seg.v[1].y, seg.v[2].y, seg.v[3].y);
        let gz = Vector4::new(seg.v[0].z, seg.v[1].z, seg.v[2].z, seg.v[3].z);

        CubicSegment {
            bx: (mb * gx).into(),
            by: (mb * gy).into(),
            bz: (mb * gz).into(),
            bw: [0.0, 0.0, 0.0, 1.0],
            rational: false,
        }
    }

    /// Builds the segment from one span of a NURBS curve.  `knots` holds
    /// the `2 * order` knots surrounding the span and `cvs` the `order`
    /// homogeneous control vertices weighting it.
    pub fn nurbs(order: usize, knots: &[f64], cvs: &[HVec4]) -> Result<Self> {
        if cvs.len() < order {
            return Err(SplError::InvalidOperation(format!(
                "need {} control vertices, got {}",
                order,
                cvs.len()
            )));
        }
        let basis = nurbs::segment_basis(order, knots)?;

        // Zero-fill the unused vertices of lower orders.
        let c = |i: usize| {
            if i < order {
                cubic::to_na(cvs[i])
            } else {
                Vector4::zeros()
            }
        };
        let bt = basis.transpose();
        let gx = Vector4::new(c(0).x, c(1).x, c(2).x, c(3).x);
        let gy = Vector4::new(c(0).y, c(1).y, c(2).y, c(3).y);
        let gz = Vector4::new(c(0).z, c(1).z, c(2).z, c(3).z);
        let gw = Vector4::new(c(0).w, c(1).w, c(2).w, c(3).w);

        Ok(CubicSegment {
            bx: (bt * gx).into(),
            by: (bt * gy).into(),
            bz: (bt * gz).into(),
            bw: (bt * gw).into(),
            rational: true,
        })
    }

    pub(crate) fn from_rows(
        bx: Vector4<f64>,
        by: Vector4<f64>,
        bz: Vector4<f64>,
        bw: Vector4<f64>,
        rational: bool,
    ) -> Self {
        CubicSegment {
            bx: bx.into(),
            by: by.into(),
            bz: bz.into(),
            bw: bw.into(),
            rational,
        }
    }

    pub fn is_rational(&self) -> bool {
        self.rational
    }

    fn row(&self, r: &[f64; 4]) -> Vector4<f64> {
        Vector4::new(r[0], r[1], r[2], r[3])
    }

    /// Evaluates a position-like quantity against the given power vector,
    /// dividing through by the homogeneous coordinate when rational.
    fn evaluate_point(&self, tv: Vector4<f64>) -> Point3 {
        let x = self.row(&self.bx).dot(&tv);
        let y = self.row(&self.by).dot(&tv);
        let z = self.row(&self.bz).dot(&tv);
        if self.rational {
            let w = self.row(&self.bw).dot(&tv);
            Point3::new(x / w, y / w, z / w)
        } else {
            Point3::new(x, y, z)
        }
    }

    /// Evaluates a derivative-like quantity.  For rational segments this
    /// differentiates the homogeneous coordinates only, without applying
    /// the quotient rule to the divide, so rational tangents are scaled
    /// by the weight function rather than exact.
    fn evaluate_vector(&self, tv: Vector4<f64>) -> Vector3 {
        Vector3::new(
            self.row(&self.bx).dot(&tv),
            self.row(&self.by).dot(&tv),
            self.row(&self.bz).dot(&tv),
        )
    }

    /// The four Bezier control points representing this segment.  For a
    /// rational segment the homogeneous control vertices are projected
    /// down to 3-space.
    pub fn bezier_points(&self) -> [Point3; 4] {
        let mbi = bezier_inverse_matrix();
        let gx = mbi * self.row(&self.bx);
        let gy = mbi * self.row(&self.by);
        let gz = mbi * self.row(&self.bz);

        let mut v = [Point3::ZERO; 4];
        if self.rational {
            let gw = mbi * self.row(&self.bw);
            for i in 0..4 {
                v[i] = Point3::new(gx[i] / gw[i], gy[i] / gw[i], gz[i] / gw[i]);
            }
        } else {
            for i in 0..4 {
                v[i] = Point3::new(gx[i], gy[i], gz[i]);
            }
        }
        v
    }

    /// Re-solves the segment from four constraints expressed against the
    /// working `basis` (whose inverse is `basis_inv`).  Constraints with
    /// no value pin the segment to its current shape at that property, so
    /// a single feature can be moved in isolation.  Fails if the
    /// constraints are linearly dependent.
    pub fn refit(
        &mut self,
        constraints: &[SegConstraint; 4],
        basis: &Matrix4<f64>,
        basis_inv: &Matrix4<f64>,
    ) -> Result<()> {
        let gb = cubic::from_rows(
            self.row(&self.bx),
            self.row(&self.by),
            self.row(&self.bz),
            self.row(&self.bw),
        );
        // Current geometry in the working basis, for kept control vertices.
        let g_orig = gb * basis_inv;

        let mut t_mat = Matrix4::<f64>::zeros();
        let mut p_mat = Matrix4::<f64>::zeros();

        for (c, constraint) in constraints.iter().enumerate() {
            let (tv, value) = match *constraint {
                SegConstraint::Point { t, value } => (power_vector(t), value),
                SegConstraint::Tangent { t, value } => (derivative_vector(t), value),
                SegConstraint::ControlVertex { value } => {
                    t_mat.set_column(c, &basis_inv.column(c).into_owned());
                    let p = match value {
                        Some(v) => cubic::to_na(v),
                        None => g_orig.column(c).into_owned(),
                    };
                    p_mat.set_column(c, &p);
                    continue;
                }
            };

            t_mat.set_column(c, &tv);
            let p = match value {
                Some(v) => cubic::to_na(v),
                None => gb * tv,
            };
            p_mat.set_column(c, &p);
        }

        let t_inv = t_mat
            .try_inverse()
            .ok_or_else(|| SplError::Singular("curve refit constraints are dependent".into()))?;

        // P = G * B * T, so G = P * T^-1 * B^-1.
        let g = p_mat * t_inv * basis_inv;
        let gb = g * basis;

        self.bx = gb.row(0).transpose().into();
        self.by = gb.row(1).transpose().into();
        self.bz = gb.row(2).transpose().into();
        self.bw = gb.row(3).transpose().into();
        Ok(())
    }
}

impl Curve for CubicSegment {
    fn max_t(&self) -> f64 {
        1.0
    }

    fn curve_type(&self) -> CurveType {
        CurveType::None
    }

    fn point_at(&self, t: f64) -> Sample<Point3> {
        let clamped = t.clamp(0.0, 1.0);
        Sample::new(self.evaluate_point(power_vector(clamped)), t == clamped)
    }

    fn tangent_at(&self, t: f64) -> Sample<Vector3> {
        let clamped = t.clamp(0.0, 1.0);
        Sample::new(self.evaluate_vector(derivative_vector(clamped)), t == clamped)
    }

    fn second_tangent_at(&self, t: f64) -> Sample<Vector3> {
        let clamped = t.clamp(0.0, 1.0);
        Sample::new(
            self.evaluate_vector(second_derivative_vector(clamped)),
            t == clamped,
        )
    }

    fn bezier_segments(&self) -> Option<Vec<BezierSeg>> {
        Some(vec![BezierSeg::new(1.0, self.bezier_points())])
    }
}
