//! A curve assembled from consecutive child spans.

use serde::{Deserialize, Serialize};
use spl_core::{Result, SplError};
use spl_math::{HVec4, Point3, Vector3};

use crate::curve::bezier::BezierSeg;
use crate::curve::segment::{CubicSegment, SegConstraint};
use crate::curve::{Curve, CurveType};
use crate::observer::Observers;
use crate::sample::Sample;

/// Slop when matching a parametric value against a span boundary, so a
/// query at exactly `max_t` (or a rounding hair past it) lands on the last
/// span instead of falling off the end.
const BORDER_SLOP: f64 = 0.00001;

/// A wider window for the undefined-child fallback: a query this close to
/// the start of a span whose child cannot be sampled lands on the previous
/// span's endpoint instead.
const UNDEFINED_CHILD_SLOP: f64 = 0.0001;

/// A child span of a piecewise curve.  The recursion is closed: a span is
/// either a single cubic segment or a nested piecewise curve.
#[derive(Debug, Serialize, Deserialize)]
pub enum CurveNode {
    Segment(CubicSegment),
    Piecewise(Box<PiecewiseCurve>),
}

impl CurveNode {
    fn as_curve(&self) -> &dyn Curve {
        match self {
            CurveNode::Segment(seg) => seg,
            CurveNode::Piecewise(pw) => pw.as_ref(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Span {
    node: CurveNode,
    /// Global parametric value at the end of this span.
    tend: f64,
}

/// A curve defined over `[0, max_t]` as a sequence of child spans, each
/// owning a slice `[tstart, tend]` of the global domain.  Sampling maps the
/// global parameter into the child's local domain; span lookup is a binary
/// search over the end values.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PiecewiseCurve {
    spans: Vec<Span>,
    curve_type: CurveType,
    #[serde(skip)]
    observers: Observers,
}

impl PiecewiseCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_curve_type(&mut self, curve_type: CurveType) {
        self.curve_type = curve_type;
    }

    pub fn num_segs(&self) -> usize {
        self.spans.len()
    }

    pub fn segment(&self, ti: usize) -> Option<&CurveNode> {
        self.spans.get(ti).map(|s| &s.node)
    }

    /// The invalidation registry for this curve.
    pub fn observers(&mut self) -> &mut Observers {
        &mut self.observers
    }

    /// Parametric start of span `ti`.
    pub fn t_start(&self, ti: usize) -> f64 {
        if ti == 0 {
            0.0
        } else {
            self.spans[ti - 1].tend
        }
    }

    /// Parametric end of span `ti`.
    pub fn t_end(&self, ti: usize) -> f64 {
        self.spans[ti].tend
    }

    /// Parametric width of span `ti`.
    pub fn t_length(&self, ti: usize) -> f64 {
        self.t_end(ti) - self.t_start(ti)
    }

    /// Changes the parametric width of span `ti`.  The following span
    /// absorbs the difference, so the overall domain is unchanged.
    pub fn set_t_length(&mut self, ti: usize, tlength: f64) -> Result<()> {
        if ti >= self.spans.len() {
            return Err(SplError::NotFound(format!("no curve span {ti}")));
        }
        let delta = tlength - self.t_length(ti);
        self.spans[ti].tend += delta;
        self.observers.invalidate_all();
        Ok(())
    }

    /// Inserts a child span at index `ti` with the given parametric width.
    /// Unless the span lands at the end, the width comes out of the
    /// following span, keeping the overall domain fixed.
    pub fn insert(&mut self, ti: usize, node: CurveNode, tlength: f64) -> Result<()> {
        if ti > self.spans.len() {
            return Err(SplError::NotFound(format!("no curve span {ti}")));
        }

        let tend = if ti == self.spans.len() {
            self.max_t() + tlength
        } else {
            self.t_start(ti) + tlength
        };
        self.spans.insert(ti, Span { node, tend });
        self.observers.invalidate_all();
        Ok(())
    }

    /// Appends a child span covering the next `tlength` of the domain.
    pub fn push(&mut self, node: CurveNode, tlength: f64) {
        let tend = self.max_t() + tlength;
        self.spans.push(Span { node, tend });
        self.observers.invalidate_all();
    }

    /// Removes span `ti` and closes the parametric gap it leaves.
    pub fn remove(&mut self, ti: usize) -> Result<CurveNode> {
        if ti >= self.spans.len() {
            return Err(SplError::NotFound(format!("no curve span {ti}")));
        }
        let tlength = self.t_length(ti);
        let span = self.spans.remove(ti);
        for following in &mut self.spans[ti..] {
            following.tend -= tlength;
        }
        self.observers.invalidate_all();
        Ok(span.node)
    }

    pub fn clear(&mut self) {
        self.spans.clear();
        self.observers.invalidate_all();
    }

    /// Defines the whole curve as a general NURBS: `order` is the degree
    /// plus one, `cvs` the homogeneous control vertices, `knots` a
    /// nondecreasing array of `cvs.len() + order` values.  Each
    /// non-degenerate knot span becomes one cubic child.  The CVs and
    /// knots are not retained; use [`crate::curve::NurbsCurve`] to keep an
    /// editable form.
    pub fn make_nurbs(&mut self, order: usize, knots: &[f64], cvs: &[HVec4]) -> Result<()> {
        if order < 1 || order > 4 {
            return Err(SplError::InvalidOperation(format!(
                "NURBS order must be 1..=4, got {order}"
            )));
        }
        if cvs.len() < order {
            return Err(SplError::Degenerate(format!(
                "need at least {} control vertices for order {}, got {}",
                order,
                order,
                cvs.len()
            )));
        }
        if knots.len() != cvs.len() + order {
            return Err(SplError::InvalidOperation(format!(
                "expected {} knots, got {}",
                cvs.len() + order,
                knots.len()
            )));
        }
        if knots.windows(2).any(|w| w[0] > w[1]) {
            return Err(SplError::InvalidOperation(
                "knot vector must be nondecreasing".into(),
            ));
        }

        self.spans.clear();
        for i in 0..cvs.len() - order + 1 {
            // Zero-width knot spans contribute no geometry.
            if knots[i + order] > knots[i + order - 1] {
                let seg =
                    CubicSegment::nurbs(order, &knots[i..i + 2 * order], &cvs[i..i + order])?;
                let tlength = knots[i + order] - knots[i + order - 1];
                let tend = self.max_t() + tlength;
                self.spans.push(Span {
                    node: CurveNode::Segment(seg),
                    tend,
                });
            }
        }
        self.observers.invalidate_all();
        Ok(())
    }

    /// Recomputes the curve so it passes through `point` at time `t`,
    /// keeping the tangent there.
    pub fn adjust_point(&mut self, t: f64, point: Point3) -> Result<()> {
        self.refit_at(
            t,
            Some(HVec4::new(point.x, point.y, point.z, 1.0)),
            None,
        )
    }

    /// Recomputes the curve so it has `tangent` at time `t`, keeping the
    /// position there.
    pub fn adjust_tangent(&mut self, t: f64, tangent: Vector3) -> Result<()> {
        self.refit_at(
            t,
            None,
            Some(HVec4::new(tangent.x, tangent.y, tangent.z, 0.0)),
        )
    }

    /// Recomputes the curve so it passes through `point` with `tangent`
    /// at time `t`.
    pub fn adjust_point_tangent(&mut self, t: f64, point: Point3, tangent: Vector3) -> Result<()> {
        self.refit_at(
            t,
            Some(HVec4::new(point.x, point.y, point.z, 1.0)),
            Some(HVec4::new(tangent.x, tangent.y, tangent.z, 0.0)),
        )
    }

    fn refit_at(
        &mut self,
        t: f64,
        point: Option<HVec4>,
        tangent: Option<HVec4>,
    ) -> Result<()> {
        let (ti, local_t, in_domain) = self
            .find_segment(t)
            .ok_or_else(|| SplError::NotFound(format!("no curve span at t = {t}")))?;
        if !in_domain {
            return Err(SplError::NotFound(format!("no curve span at t = {t}")));
        }

        let t0 = self.t_start(ti);
        let t1 = self.t_end(ti);

        match &mut self.spans[ti].node {
            CurveNode::Segment(seg) => {
                let basis = spl_math::cubic::bezier_matrix();
                let basis_inv = spl_math::cubic::bezier_inverse_matrix();
                seg.refit(
                    &[
                        SegConstraint::ControlVertex { value: None },
                        SegConstraint::Point {
                            t: local_t,
                            value: point,
                        },
                        SegConstraint::Tangent {
                            t: local_t,
                            value: tangent,
                        },
                        SegConstraint::ControlVertex { value: None },
                    ],
                    &basis,
                    &basis_inv,
                )?;
            }
            CurveNode::Piecewise(_) => {
                return Err(SplError::InvalidOperation(
                    "cannot refit a nested piecewise span".into(),
                ));
            }
        }

        let max_t = self.max_t();
        self.observers.invalidate(t0, t1, max_t);
        Ok(())
    }

    /// Maps a global parametric value to `(span index, local t, whether t
    /// was inside the domain)`.  Out-of-domain queries clamp to the
    /// nearest end of the nearest span.  Returns `None` only for an empty
    /// curve.
    pub(crate) fn find_segment(&self, t: f64) -> Option<(usize, f64, bool)> {
        if self.spans.is_empty() {
            return None;
        }

        if t < 0.0 {
            return Some((0, 0.0, false));
        }

        // First span whose end (with slop) covers t.
        let ti = self.spans.partition_point(|s| s.tend + BORDER_SLOP <= t);
        if ti >= self.spans.len() {
            let last = self.spans.len() - 1;
            let child_max = self.spans[last].node.as_curve().max_t();
            return Some((last, child_max, false));
        }

        let tstart = self.t_start(ti);

        // A span whose child cannot be sampled (an empty nested piecewise,
        // say) defers boundary queries to its predecessor's endpoint.
        if ti > 0 && !self.spans[ti].node.as_curve().is_valid() && t < tstart + UNDEFINED_CHILD_SLOP
        {
            let prev_max = self.spans[ti - 1].node.as_curve().max_t();
            return Some((ti - 1, prev_max, true));
        }

        let tlength = self.spans[ti].tend - tstart;
        let child_max = self.spans[ti].node.as_curve().max_t();
        let local = if tlength > 0.0 {
            ((t - tstart) / tlength).clamp(0.0, 1.0) * child_max
        } else {
            0.0
        };
        Some((ti, local, true))
    }
}

impl Curve for PiecewiseCurve {
    fn is_valid(&self) -> bool {
        !self.spans.is_empty()
    }

    fn max_t(&self) -> f64 {
        self.spans.last().map_or(0.0, |s| s.tend)
    }

    fn curve_type(&self) -> CurveType {
        self.curve_type
    }

    fn point_at(&self, t: f64) -> Sample<Point3> {
        match self.find_segment(t) {
            Some((ti, local, in_domain)) => self.spans[ti]
                .node
                .as_curve()
                .point_at(local)
                .narrow(in_domain),
            None => Sample::undefined(),
        }
    }

    fn tangent_at(&self, t: f64) -> Sample<Vector3> {
        match self.find_segment(t) {
            Some((ti, local, in_domain)) => self.spans[ti]
                .node
                .as_curve()
                .tangent_at(local)
                .narrow(in_domain),
            None => Sample::undefined(),
        }
    }

    fn point_tangent_at(&self, t: f64) -> (Sample<Point3>, Sample<Vector3>) {
        match self.find_segment(t) {
            Some((ti, local, in_domain)) => {
                let child = self.spans[ti].node.as_curve();
                let (p, v) = child.point_tangent_at(local);
                (p.narrow(in_domain), v.narrow(in_domain))
            }
            None => (
                Sample::undefined(),
                Sample::undefined(),
            ),
        }
    }

    fn second_tangent_at(&self, t: f64) -> Sample<Vector3> {
        match self.find_segment(t) {
            Some((ti, local, in_domain)) => self.spans[ti]
                .node
                .as_curve()
                .second_tangent_at(local)
                .narrow(in_domain),
            None => Sample::undefined(),
        }
    }

    fn bezier_segments(&self) -> Option<Vec<BezierSeg>> {
        let mut segs = Vec::with_capacity(self.spans.len());
        for span in &self.spans {
            match &span.node {
                CurveNode::Segment(seg) => {
                    segs.push(BezierSeg::new(span.tend, seg.bezier_points()));
                }
                // A nested piecewise span has no single-cubic form.
                CurveNode::Piecewise(_) => return None,
            }
        }
        Some(segs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use spl_core::Tolerance;

    fn line_segment(a: Point3, b: Point3) -> CubicSegment {
        let third = (b - a) / 3.0;
        CubicSegment::bezier(&BezierSeg::new(1.0, [a, a + third, b - third, b]))
    }

    fn two_span_line() -> PiecewiseCurve {
        let mut pw = PiecewiseCurve::new();
        pw.push(
            CurveNode::Segment(line_segment(Point3::ZERO, Point3::new(1.0, 0.0, 0.0))),
            1.0,
        );
        pw.push(
            CurveNode::Segment(line_segment(
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 2.0, 0.0),
            )),
            2.0,
        );
        pw
    }

    #[test]
    fn test_empty_curve_is_invalid() {
        let pw = PiecewiseCurve::new();
        assert!(!pw.is_valid());
        assert_eq!(pw.max_t(), 0.0);
        assert!(!pw.point_at(0.0).in_domain);
    }

    #[test]
    fn test_spans_partition_the_domain() {
        let pw = two_span_line();
        assert_eq!(pw.max_t(), 3.0);
        assert_eq!(pw.t_start(1), 1.0);
        assert_eq!(pw.t_length(1), 2.0);

        let p = pw.point_at(0.5);
        assert!(p.in_domain);
        assert_relative_eq!(p.value.x, 0.5, epsilon = 1e-9);

        // Halfway through the second span.
        let p = pw.point_at(2.0);
        assert!(p.in_domain);
        assert_relative_eq!(p.value.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(p.value.y, 1.0, epsilon = 1e-9);

        // Exactly max_t stays in domain.
        assert!(pw.point_at(3.0).in_domain);
    }

    #[test]
    fn test_out_of_domain_clamps_and_flags() {
        let pw = two_span_line();

        let below = pw.point_at(-1.0);
        assert!(!below.in_domain);
        assert_relative_eq!(below.value.x, 0.0, epsilon = 1e-9);

        let above = pw.point_at(10.0);
        assert!(!above.in_domain);
        assert_relative_eq!(above.value.y, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_border_query_prefers_earlier_span_when_child_is_empty() {
        let mut pw = two_span_line();
        pw.push(CurveNode::Piecewise(Box::new(PiecewiseCurve::new())), 1.0);

        // On the border of the empty span, and a rounding hair past it,
        // the previous span's endpoint is the answer.
        let p = pw.point_at(3.0);
        assert!(p.in_domain);
        assert_relative_eq!(p.value.y, 2.0, epsilon = 1e-9);
        let p = pw.point_at(3.0 + 5e-5);
        assert!(p.in_domain);
        assert_relative_eq!(p.value.y, 2.0, epsilon = 1e-9);

        // Deeper into the empty span there is nothing to fall back to.
        assert!(!pw.point_at(3.5).in_domain);
    }

    #[test]
    fn test_backward_then_forward_queries_agree() {
        let pw = two_span_line();
        let forward = pw.point_at(2.5).value;
        let _ = pw.point_at(0.1);
        let again = pw.point_at(2.5).value;
        assert_eq!(forward, again);
    }

    #[test]
    fn test_set_t_length_keeps_domain() {
        let mut pw = two_span_line();
        pw.set_t_length(0, 2.0).unwrap();
        assert_eq!(pw.t_length(0), 2.0);
        assert_eq!(pw.t_length(1), 1.0);
        assert_eq!(pw.max_t(), 3.0);
    }

    #[test]
    fn test_remove_closes_the_gap() {
        let mut pw = two_span_line();
        pw.remove(0).unwrap();
        assert_eq!(pw.num_segs(), 1);
        assert_eq!(pw.max_t(), 2.0);
        assert!(pw.remove(5).is_err());
    }

    #[test]
    fn test_length_is_additive() {
        let pw = two_span_line();
        let tol = Tolerance::default_precision();
        let total = pw.length(&tol);
        let first = pw.length_from(0.0, 1.0, &tol);
        let second = pw.length_from(1.0, 3.0, &tol);
        assert_relative_eq!(total, 3.0, epsilon = 1e-5);
        assert_relative_eq!(first + second, total, epsilon = 1e-5);
    }

    #[test]
    fn test_t_at_length_inverts_length() {
        let pw = two_span_line();
        let tol = Tolerance::default_precision();
        // 1.5 units of arc from the start of this unit-speed polyline.
        let t = pw.t_at_length(0.0, 1.5, 1.0, 1e-5, &tol);
        assert_relative_eq!(pw.length_from(0.0, t, &tol), 1.5, epsilon = 1e-4);
        // Running off the end clamps.
        let t = pw.t_at_length(0.0, 100.0, 1.0, 1e-5, &tol);
        assert_relative_eq!(t, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_adjust_point_moves_curve_through_point() {
        let mut pw = two_span_line();
        let target = Point3::new(0.5, 1.0, 0.0);
        let tangent_before = pw.tangent_at(0.5).value;

        pw.adjust_point(0.5, target).unwrap();

        let p = pw.point_at(0.5).value;
        assert_relative_eq!(p.x, target.x, epsilon = 1e-9);
        assert_relative_eq!(p.y, target.y, epsilon = 1e-9);

        let tangent_after = pw.tangent_at(0.5).value;
        assert_relative_eq!(tangent_after.x, tangent_before.x, epsilon = 1e-9);
        assert_relative_eq!(tangent_after.y, tangent_before.y, epsilon = 1e-9);

        // Adjusting outside the domain is an error.
        assert!(pw.adjust_point(99.0, target).is_err());
    }

    #[test]
    fn test_adjust_notifies_observers() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let mut pw = two_span_line();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        pw.observers().register(move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });

        pw.adjust_tangent(0.5, Vector3::new(1.0, 1.0, 0.0)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_make_nurbs_linear_midpoint() {
        let mut pw = PiecewiseCurve::new();
        let cvs = [
            HVec4::new(0.0, 0.0, 0.0, 1.0),
            HVec4::new(4.0, 0.0, 0.0, 1.0),
        ];
        pw.make_nurbs(2, &[0.0, 0.0, 1.0, 1.0], &cvs).unwrap();
        assert_eq!(pw.num_segs(), 1);
        let p = pw.point_at(0.5).value;
        assert_relative_eq!(p.x, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_make_nurbs_skips_degenerate_spans() {
        let mut pw = PiecewiseCurve::new();
        let cvs = [
            HVec4::new(0.0, 0.0, 0.0, 1.0),
            HVec4::new(1.0, 0.0, 0.0, 1.0),
            HVec4::new(2.0, 0.0, 0.0, 1.0),
        ];
        // The repeated interior knot makes the middle span zero width.
        pw.make_nurbs(2, &[0.0, 0.0, 1.0, 1.0, 2.0], &cvs).unwrap();
        assert_eq!(pw.num_segs(), 2);
        assert_eq!(pw.max_t(), 2.0);
    }

    #[test]
    fn test_make_nurbs_validates_input() {
        let mut pw = PiecewiseCurve::new();
        let cvs = [HVec4::ONE, HVec4::ONE];
        assert!(pw.make_nurbs(5, &[0.0; 7], &cvs).is_err());
        assert!(pw.make_nurbs(2, &[0.0, 0.0, 1.0], &cvs).is_err());
        assert!(pw.make_nurbs(2, &[0.0, 1.0, 0.5, 2.0], &cvs).is_err());
    }
}
