//! Parametric curves.
//!
//! Everything that can be sampled by a scalar parameter `t` implements the
//! [`Curve`] trait: single cubic segments, piecewise assemblies, Hermite and
//! NURBS forms, and the iso-parametric slices of a surface.  The trait also
//! carries arc-length measurement and cross-format conversion, which work
//! for any curve that can describe itself as a chain of Bezier segments.

pub mod bezier;
pub mod hermite;
pub mod nurbs;
pub mod piecewise;
pub mod segment;

pub use bezier::BezierSeg;
pub use hermite::{CvKind, HermiteCurve, HermiteCv};
pub use nurbs::NurbsCurve;
pub use piecewise::{CurveNode, PiecewiseCurve};
pub use segment::{CubicSegment, SegConstraint};

use serde::{Deserialize, Serialize};
use spl_core::{Result, SplError, Tolerance};
use spl_math::{Point3, Vector3};

use crate::sample::Sample;

/// What the coordinates of a curve mean.  Purely advisory; carried through
/// conversions so a consumer can tell a position channel from a rotation or
/// timing channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveType {
    #[default]
    None,
    /// Spatial position.
    Xyz,
    /// Heading, pitch, roll.
    Hpr,
    /// A timewarp: only the x coordinate is meaningful.
    Time,
}

/// Cap on the bisection depth of arc-length refinement.  The parametric
/// tolerance normally terminates the recursion well before this.
const MAX_LENGTH_DEPTH: u32 = 64;

/// Cap on the number of rescale iterations when inverting arc length.
const MAX_T_ITERATIONS: u32 = 100;

pub trait Curve {
    /// Whether the curve is fully defined and can be sampled.
    fn is_valid(&self) -> bool {
        true
    }

    /// Upper bound of the parametric domain.  The domain always starts
    /// at zero.
    fn max_t(&self) -> f64 {
        1.0
    }

    fn curve_type(&self) -> CurveType {
        CurveType::None
    }

    /// The point at parametric value `t`.  Out-of-domain queries clamp
    /// and report themselves via the sample's validity flag.
    fn point_at(&self, t: f64) -> Sample<Point3>;

    /// The first derivative with respect to `t`.
    fn tangent_at(&self, t: f64) -> Sample<Vector3>;

    /// Point and tangent together.  Piecewise curves override this to
    /// resolve the segment once.
    fn point_tangent_at(&self, t: f64) -> (Sample<Point3>, Sample<Vector3>) {
        (self.point_at(t), self.tangent_at(t))
    }

    /// The second derivative with respect to `t`.
    fn second_tangent_at(&self, t: f64) -> Sample<Vector3>;

    /// Describes the curve as a chain of Bezier segments, if it can.
    /// Each entry carries the parametric value at which that segment
    /// ends.  Returns `None` for curves with no cubic decomposition.
    fn bezier_segments(&self) -> Option<Vec<BezierSeg>> {
        None
    }

    /// Approximate arc length of the whole curve.
    fn length(&self, tol: &Tolerance) -> f64 {
        self.length_from(0.0, self.max_t(), tol)
    }

    /// Approximate arc length between two parametric values, by adaptive
    /// chord subdivision.
    fn length_from(&self, from: f64, to: f64, tol: &Tolerance) -> f64 {
        let (from, to) = if to < from { (to, from) } else { (from, to) };

        // Seed with roughly one interval per unit of t.
        let num_segs = ((to - from + 1.0).floor() as usize).max(1);

        let mut t2 = from;
        let mut p2 = self.point_at(t2).value;
        let mut net = 0.0;

        for i in 1..=num_segs {
            let t1 = t2;
            let p1 = p2;

            t2 = (to - from) * (i as f64) / (num_segs as f64) + from;
            p2 = self.point_at(t2).value;

            net += r_calc_length(self, t1, t2, p1, p2, p1.distance(p2), tol, 0);
        }
        net
    }

    /// The inverse of [`Curve::length_from`]: finds the parametric value
    /// at the given arc-length offset from `start_t`.  `guess` seeds the
    /// search; `threshold` is the acceptable arc-length error.  Clamps to
    /// the end of the curve if the offset runs past it.
    fn t_at_length(
        &self,
        start_t: f64,
        length_offset: f64,
        guess: f64,
        threshold: f64,
        tol: &Tolerance,
    ) -> f64 {
        let mut guess = guess;

        if length_offset > 0.0 {
            // Looking forward.  The guess must be past the start.
            if guess < start_t {
                guess = start_t + (start_t - guess);
            } else if guess == start_t {
                guess = start_t + 1.0;
            }
        } else if length_offset < 0.0 {
            // Looking backward.  The guess must precede the start.
            if guess > start_t {
                guess = start_t - (guess - start_t);
            } else if guess == start_t {
                guess = start_t - 1.0;
            }
        } else {
            return start_t;
        }

        let max_t = self.max_t();
        let mut actual_length = self.length_from(start_t, guess, tol);
        let mut clamped = false;

        for _ in 0..MAX_T_ITERATIONS {
            if (actual_length.abs() - length_offset.abs()).abs() <= threshold {
                break;
            }

            // Rescale the guess as if arc length were evenly distributed
            // over the parametric range covered so far.
            guess = (guess - start_t) * length_offset.abs() / actual_length.abs().max(1e-12)
                + start_t;

            // Clamp to the end of the curve.  Two clamps in a row means
            // the requested offset runs off the end.
            if guess > max_t {
                if clamped {
                    return max_t;
                }
                clamped = true;
                guess = max_t;
            } else if guess < 0.0 {
                if clamped {
                    return 0.0;
                }
                clamped = true;
                guess = 0.0;
            } else {
                clamped = false;
            }

            actual_length = self.length_from(start_t, guess, tol);
        }

        guess
    }

    /// Rebuilds this curve as an equivalent Hermite curve.
    fn to_hermite(&self) -> Result<HermiteCurve> {
        let bz_segs = self.bezier_segments().ok_or_else(|| {
            SplError::Conversion("curve has no cubic Bezier decomposition".into())
        })?;

        let mut hc = HermiteCurve::new();
        hc.set_curve_type(self.curve_type());

        if !bz_segs.is_empty() {
            let mut scale_out = bz_segs[0].t;
            let mut n = hc.append_cv(CvKind::Smooth, bz_segs[0].v[0]);
            hc.set_cv_out(n, 3.0 * (bz_segs[0].v[1] - bz_segs[0].v[0]) / scale_out);

            for i in 0..bz_segs.len() - 1 {
                let scale_in = scale_out;
                scale_out = bz_segs[i + 1].t - bz_segs[i].t;

                if !points_coincide(bz_segs[i].v[3], bz_segs[i + 1].v[0]) {
                    // The segments do not join head to tail: a cut.
                    hc.set_cv_kind_raw(n, CvKind::Cut);
                }

                n = hc.append_cv(CvKind::Free, bz_segs[i + 1].v[0]);
                hc.set_cv_in(n, 3.0 * (bz_segs[i].v[3] - bz_segs[i].v[2]) / scale_in);
                hc.set_cv_tstart(n, bz_segs[i].t)?;
                hc.set_cv_out(n, 3.0 * (bz_segs[i + 1].v[1] - bz_segs[i + 1].v[0]) / scale_out);
            }

            let scale_in = scale_out;
            let last = &bz_segs[bz_segs.len() - 1];
            let n = hc.append_cv(CvKind::Smooth, last.v[3]);
            hc.set_cv_in(n, 3.0 * (last.v[3] - last.v[2]) / scale_in);
            hc.set_cv_tstart(n, last.t)?;
        }

        // Classify the interior CVs by comparing incoming and outgoing
        // tangents.
        for n in 1..hc.num_cvs().saturating_sub(1) {
            if hc.cv_kind(n) != CvKind::Cut {
                let cv_in = hc.cv_in(n);
                let cv_out = hc.cv_out(n);

                if vectors_coincide(cv_in, cv_out) {
                    hc.set_cv_kind_raw(n, CvKind::Smooth);
                } else if vectors_coincide(cv_in.normalize_or_zero(), cv_out.normalize_or_zero())
                {
                    hc.set_cv_kind_raw(n, CvKind::G1);
                }
            }
        }

        Ok(hc)
    }

    /// Rebuilds this curve as an equivalent order-4 NURBS curve.
    fn to_nurbs(&self) -> Result<NurbsCurve> {
        let bz_segs = self.bezier_segments().ok_or_else(|| {
            SplError::Conversion("curve has no cubic Bezier decomposition".into())
        })?;

        let mut nc = NurbsCurve::new(4);
        nc.set_curve_type(self.curve_type());

        if !bz_segs.is_empty() {
            for (i, seg) in bz_segs.iter().enumerate() {
                nc.append_cv(seg.v[0]);
                nc.append_cv(seg.v[1]);
                nc.append_cv(seg.v[2]);
                // The last point of one segment is the first point of the
                // next unless there is a cut; only keep it where it adds
                // information.
                if i == bz_segs.len() - 1 || !points_coincide(seg.v[3], bz_segs[i + 1].v[0]) {
                    nc.append_cv(seg.v[3]);
                }
            }

            let mut ki = 4;
            for k in 0..4 {
                nc.set_knot(k, 0.0)?;
            }
            for (i, seg) in bz_segs.iter().enumerate() {
                let t = seg.t;
                nc.set_knot(ki, t)?;
                nc.set_knot(ki + 1, t)?;
                nc.set_knot(ki + 2, t)?;
                ki += 3;
                if i == bz_segs.len() - 1 || !points_coincide(seg.v[3], bz_segs[i + 1].v[0]) {
                    nc.set_knot(ki, t)?;
                    ki += 1;
                }
            }
        }

        nc.recompute()?;
        Ok(nc)
    }
}

/// Tolerance for deciding that two Bezier endpoints join head to tail.
const JOIN_TOLERANCE: f64 = 0.0001;

pub(crate) fn points_coincide(a: Point3, b: Point3) -> bool {
    a.abs_diff_eq(b, JOIN_TOLERANCE)
}

fn vectors_coincide(a: Vector3, b: Vector3) -> bool {
    a.abs_diff_eq(b, JOIN_TOLERANCE)
}

/// Recursive half of arc-length measurement.  `seglength` is the chord
/// length between `p1` and `p2`; the interval is bisected until the chord
/// stops growing by more than the length tolerance.
fn r_calc_length<C: Curve + ?Sized>(
    curve: &C,
    t1: f64,
    t2: f64,
    p1: Point3,
    p2: Point3,
    seglength: f64,
    tol: &Tolerance,
    depth: u32,
) -> f64 {
    if t2 - t1 < tol.parametric || depth >= MAX_LENGTH_DEPTH {
        // Walked off the limit for representing smaller values of t.
        return seglength;
    }

    let tmid = (t1 + t2) / 2.0;
    let pmid = curve.point_at(tmid).value;

    let left = p1.distance(pmid);
    let right = pmid.distance(p2);

    if (left + right) - seglength < tol.length {
        // Subdividing did not measurably lengthen the chord.
        seglength
    } else {
        r_calc_length(curve, t1, tmid, p1, pmid, left, tol, depth + 1)
            + r_calc_length(curve, tmid, t2, pmid, p2, right, tol, depth + 1)
    }
}
