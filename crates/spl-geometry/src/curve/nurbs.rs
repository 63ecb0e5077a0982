//! An editable NURBS curve that retains its control vertices and knots.

use serde::{Deserialize, Serialize};
use spl_core::{Result, SplError};
use spl_math::{HVec4, Point3, Vector3};

use crate::curve::bezier::BezierSeg;
use crate::curve::piecewise::PiecewiseCurve;
use crate::curve::{Curve, CurveType};
use crate::observer::Observers;
use crate::sample::Sample;

/// A NURBS curve of order 1 to 4.  Control vertices are homogeneous; the
/// knot vector always holds `num_cvs + order` nondecreasing values.
///
/// Edits accumulate on the CV and knot vectors and take effect when
/// [`NurbsCurve::recompute`] rebuilds the backing piecewise curve, which
/// is how several knots can be changed without passing through an invalid
/// intermediate state.
#[derive(Debug, Serialize, Deserialize)]
pub struct NurbsCurve {
    order: usize,
    cvs: Vec<HVec4>,
    knots: Vec<f64>,
    curve: PiecewiseCurve,
}

impl Default for NurbsCurve {
    fn default() -> Self {
        Self::new(4)
    }
}

impl NurbsCurve {
    pub fn new(order: usize) -> Self {
        NurbsCurve {
            order,
            cvs: Vec::new(),
            knots: vec![0.0; order],
            curve: PiecewiseCurve::new(),
        }
    }

    /// Builds and computes the curve in one step.
    pub fn from_parts(order: usize, knots: &[f64], cvs: &[HVec4]) -> Result<Self> {
        let mut nc = NurbsCurve {
            order,
            cvs: cvs.to_vec(),
            knots: knots.to_vec(),
            curve: PiecewiseCurve::new(),
        };
        nc.recompute()?;
        Ok(nc)
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Changes the order.  The knot vector is resized to match; call
    /// [`NurbsCurve::recompute`] afterwards.
    pub fn set_order(&mut self, order: usize) {
        self.order = order;
        let want = self.cvs.len() + order;
        let last = self.knots.last().copied().unwrap_or(0.0);
        self.knots.resize(want, last);
    }

    pub fn num_cvs(&self) -> usize {
        self.cvs.len()
    }

    pub fn num_knots(&self) -> usize {
        self.knots.len()
    }

    pub fn set_curve_type(&mut self, curve_type: CurveType) {
        self.curve.set_curve_type(curve_type);
    }

    pub fn observers(&mut self) -> &mut Observers {
        self.curve.observers()
    }

    /// Appends a control vertex with unit weight, extending the knot
    /// vector by one unit past its current end.  Returns its index.
    pub fn append_cv(&mut self, point: Point3) -> usize {
        self.append_cv_weighted(HVec4::new(point.x, point.y, point.z, 1.0))
    }

    /// Appends a homogeneous control vertex.
    pub fn append_cv_weighted(&mut self, cv: HVec4) -> usize {
        self.cvs.push(cv);
        let last = self.knots.last().copied().unwrap_or(0.0);
        self.knots.push(last + 1.0);
        self.cvs.len() - 1
    }

    pub fn remove_cv(&mut self, n: usize) -> Result<()> {
        if n >= self.cvs.len() {
            return Err(SplError::NotFound(format!("no CV {n}")));
        }
        self.cvs.remove(n);
        self.knots.pop();
        Ok(())
    }

    pub fn remove_all_cvs(&mut self) {
        self.cvs.clear();
        self.knots.truncate(self.order);
        self.curve.clear();
    }

    /// Moves CV `n`, preserving its weight.
    pub fn set_cv_point(&mut self, n: usize, point: Point3) -> Result<()> {
        let cv = self
            .cvs
            .get_mut(n)
            .ok_or_else(|| SplError::NotFound(format!("no CV {n}")))?;
        let w = cv.w;
        *cv = HVec4::new(point.x * w, point.y * w, point.z * w, w);
        Ok(())
    }

    /// The projected (3-space) position of CV `n`.
    pub fn cv_point(&self, n: usize) -> Point3 {
        let cv = self.cvs[n];
        Point3::new(cv.x / cv.w, cv.y / cv.w, cv.z / cv.w)
    }

    /// Reweights CV `n`, keeping its projected position fixed.
    pub fn set_cv_weight(&mut self, n: usize, weight: f64) -> Result<()> {
        if n >= self.cvs.len() {
            return Err(SplError::NotFound(format!("no CV {n}")));
        }
        let p = self.cv_point(n);
        self.cvs[n] = HVec4::new(p.x * weight, p.y * weight, p.z * weight, weight);
        Ok(())
    }

    pub fn cv_weight(&self, n: usize) -> f64 {
        self.cvs[n].w
    }

    pub fn set_knot(&mut self, n: usize, t: f64) -> Result<()> {
        let knot = self
            .knots
            .get_mut(n)
            .ok_or_else(|| SplError::NotFound(format!("no knot {n}")))?;
        *knot = t;
        Ok(())
    }

    pub fn knot(&self, n: usize) -> f64 {
        self.knots[n]
    }

    /// Rescales the knot vector so every non-degenerate span has unit
    /// parametric width, without changing the shape of the curve.
    pub fn normalize_knots(&mut self) {
        let mut width = 0.0;
        let mut prev = self.knots.first().copied().unwrap_or(0.0);
        let mut rescaled = Vec::with_capacity(self.knots.len());
        for &k in &self.knots {
            if k > prev {
                width += 1.0;
                prev = k;
            }
            rescaled.push(width);
        }
        self.knots = rescaled;
    }

    /// Rebuilds the sampled form from the current CVs and knots.
    pub fn recompute(&mut self) -> Result<()> {
        self.curve.make_nurbs(self.order, &self.knots, &self.cvs)
    }
}

impl Curve for NurbsCurve {
    fn is_valid(&self) -> bool {
        self.cvs.len() >= self.order && self.curve.is_valid()
    }

    fn max_t(&self) -> f64 {
        self.curve.max_t()
    }

    fn curve_type(&self) -> CurveType {
        self.curve.curve_type()
    }

    fn point_at(&self, t: f64) -> Sample<Point3> {
        self.curve.point_at(t)
    }

    fn tangent_at(&self, t: f64) -> Sample<Vector3> {
        self.curve.tangent_at(t)
    }

    fn point_tangent_at(&self, t: f64) -> (Sample<Point3>, Sample<Vector3>) {
        self.curve.point_tangent_at(t)
    }

    fn second_tangent_at(&self, t: f64) -> Sample<Vector3> {
        self.curve.second_tangent_at(t)
    }

    fn bezier_segments(&self) -> Option<Vec<BezierSeg>> {
        self.curve.bezier_segments()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn clamped_cubic() -> NurbsCurve {
        let cvs = [
            HVec4::new(0.0, 0.0, 0.0, 1.0),
            HVec4::new(1.0, 2.0, 0.0, 1.0),
            HVec4::new(3.0, 2.0, 0.0, 1.0),
            HVec4::new(4.0, 0.0, 0.0, 1.0),
        ];
        let knots = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        NurbsCurve::from_parts(4, &knots, &cvs).unwrap()
    }

    #[test]
    fn test_clamped_curve_interpolates_end_cvs() {
        let nc = clamped_cubic();
        assert!(nc.is_valid());
        assert_eq!(nc.max_t(), 1.0);

        let p = nc.point_at(0.0).value;
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-9);
        let p = nc.point_at(1.0).value;
        assert_relative_eq!(p.x, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_too_few_cvs_is_an_error() {
        let mut nc = NurbsCurve::new(4);
        nc.append_cv(Point3::ZERO);
        nc.append_cv(Point3::ONE);
        assert!(nc.recompute().is_err());
        assert!(!nc.is_valid());
    }

    #[test]
    fn test_weight_edit_keeps_position() {
        let mut nc = clamped_cubic();
        let before = nc.cv_point(1);
        nc.set_cv_weight(1, 4.0).unwrap();
        let after = nc.cv_point(1);
        assert_relative_eq!(before.x, after.x, epsilon = 1e-12);
        assert_eq!(nc.cv_weight(1), 4.0);

        // A heavier CV pulls the curve toward itself.
        nc.recompute().unwrap();
        let p = nc.point_at(0.3).value;
        let pull = clamped_cubic().point_at(0.3).value;
        assert!(p.distance(before) < pull.distance(before));
    }

    #[test]
    fn test_edits_take_effect_on_recompute() {
        let mut nc = clamped_cubic();
        nc.set_cv_point(3, Point3::new(8.0, 0.0, 0.0)).unwrap();
        // Not yet recomputed; the sampled curve is unchanged.
        assert_relative_eq!(nc.point_at(1.0).value.x, 4.0, epsilon = 1e-9);
        nc.recompute().unwrap();
        assert_relative_eq!(nc.point_at(1.0).value.x, 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_normalize_knots() {
        let cvs = [
            HVec4::new(0.0, 0.0, 0.0, 1.0),
            HVec4::new(1.0, 0.0, 0.0, 1.0),
            HVec4::new(2.0, 0.0, 0.0, 1.0),
        ];
        let mut nc = NurbsCurve::from_parts(2, &[0.0, 0.0, 2.5, 10.0, 10.0], &cvs).unwrap();
        assert_eq!(nc.max_t(), 10.0);

        nc.normalize_knots();
        nc.recompute().unwrap();
        assert_eq!(nc.max_t(), 2.0);
        // Shape is preserved; only the parameterization changed.
        let recovered = nc.point_at(1.0).value;
        assert_relative_eq!(recovered.x, 1.0, epsilon = 1e-9);
    }
}
