//! Iso-parametric slices of a surface, viewed as curves.
//!
//! An [`SIsoCurve`] holds `s` fixed and runs along `t`; a [`TIsoCurve`]
//! holds `t` fixed and runs along `s`.  Both borrow the surface, so they
//! always reflect its current shape, and both expose a cubic Bezier
//! decomposition when the surface has one, which makes the curve-side
//! conversions and arc-length machinery available on surface slices.

use spl_math::{Point3, Vector3};

use crate::curve::bezier::BezierSeg;
use crate::curve::segment::CubicSegment;
use crate::curve::Curve;
use crate::sample::Sample;
use crate::surface::{BezierPatch, Surface};

/// Slop when matching the fixed coordinate against a patch boundary.
const BORDER_SLOP: f64 = 0.00001;

/// Maps a fixed coordinate to `(row index, local fraction)` within a
/// sequence of patch end values.
fn locate(ends: &[f64], v: f64) -> (usize, f64) {
    let i = ends
        .partition_point(|&end| end + BORDER_SLOP <= v)
        .min(ends.len() - 1);
    let start = if i == 0 { 0.0 } else { ends[i - 1] };
    let width = ends[i] - start;
    let local = if width > 0.0 { (v - start) / width } else { 0.0 };
    (i, local)
}

/// Evaluates one control point of an iso segment by building a Bezier
/// curve in the perpendicular direction and sampling it at the fixed
/// local coordinate.
fn perpendicular_point(control: [Point3; 4], local: f64) -> Point3 {
    CubicSegment::bezier(&BezierSeg::new(1.0, control))
        .point_at(local)
        .value
}

/// The curve of constant `s` across a surface, parameterized by `t`.
pub struct SIsoCurve<'a> {
    surface: &'a dyn Surface,
    s: f64,
}

impl<'a> SIsoCurve<'a> {
    pub fn new(surface: &'a dyn Surface, s: f64) -> Self {
        Self { surface, s }
    }

    /// The fixed `s` coordinate.
    pub fn s(&self) -> f64 {
        self.s
    }
}

impl Curve for SIsoCurve<'_> {
    fn is_valid(&self) -> bool {
        self.surface.is_valid() && self.s >= 0.0 && self.s <= self.surface.max_s()
    }

    fn max_t(&self) -> f64 {
        self.surface.max_t()
    }

    fn point_at(&self, t: f64) -> Sample<Point3> {
        self.surface.point_at(self.s, t)
    }

    fn tangent_at(&self, t: f64) -> Sample<Vector3> {
        // The running parameter is t, so the tangent along the curve is
        // the t partial.
        self.surface.t_tangent_at(self.s, t)
    }

    fn second_tangent_at(&self, _t: f64) -> Sample<Vector3> {
        // The mixed second partials of the surface are not exposed.
        Sample::undefined()
    }

    fn bezier_segments(&self) -> Option<Vec<BezierSeg>> {
        if !self.is_valid() {
            return None;
        }
        let patches: Vec<Vec<BezierPatch>> = self.surface.bezier_patches()?;
        if patches.is_empty() || patches[0].is_empty() {
            return None;
        }

        // Which row of patches covers our s, and where within it.
        let s_ends: Vec<f64> = patches.iter().map(|row| row[0].s).collect();
        let (si, local_s) = locate(&s_ends, self.s);

        let segs = patches[si]
            .iter()
            .map(|bp| {
                let mut v = [Point3::ZERO; 4];
                for (i, point) in v.iter_mut().enumerate() {
                    let column = [bp.v[0][i], bp.v[1][i], bp.v[2][i], bp.v[3][i]];
                    *point = perpendicular_point(column, local_s);
                }
                BezierSeg::new(bp.t, v)
            })
            .collect();
        Some(segs)
    }
}

/// The curve of constant `t` across a surface, parameterized by `s`.
pub struct TIsoCurve<'a> {
    surface: &'a dyn Surface,
    t: f64,
}

impl<'a> TIsoCurve<'a> {
    pub fn new(surface: &'a dyn Surface, t: f64) -> Self {
        Self { surface, t }
    }

    /// The fixed `t` coordinate.
    pub fn t(&self) -> f64 {
        self.t
    }
}

impl Curve for TIsoCurve<'_> {
    fn is_valid(&self) -> bool {
        self.surface.is_valid() && self.t >= 0.0 && self.t <= self.surface.max_t()
    }

    fn max_t(&self) -> f64 {
        self.surface.max_s()
    }

    fn point_at(&self, t: f64) -> Sample<Point3> {
        self.surface.point_at(t, self.t)
    }

    fn tangent_at(&self, t: f64) -> Sample<Vector3> {
        self.surface.s_tangent_at(t, self.t)
    }

    fn second_tangent_at(&self, _t: f64) -> Sample<Vector3> {
        Sample::undefined()
    }

    fn bezier_segments(&self) -> Option<Vec<BezierSeg>> {
        if !self.is_valid() {
            return None;
        }
        let patches: Vec<Vec<BezierPatch>> = self.surface.bezier_patches()?;
        if patches.is_empty() || patches[0].is_empty() {
            return None;
        }

        // Which column of patches covers our t, and where within it.
        let t_ends: Vec<f64> = patches[0].iter().map(|bp| bp.t).collect();
        let (ti, local_t) = locate(&t_ends, self.t);

        let segs = patches
            .iter()
            .map(|row| {
                let bp = &row[ti];
                let mut v = [Point3::ZERO; 4];
                for (i, point) in v.iter_mut().enumerate() {
                    *point = perpendicular_point(bp.v[i], local_t);
                }
                BezierSeg::new(bp.s, v)
            })
            .collect();
        Some(segs)
    }
}
