//! Parametric surfaces.
//!
//! Everything that can be sampled by a parameter pair `(s, t)` implements
//! the [`Surface`] trait: single bicubic patches and quilts of them.  The
//! arc-length machinery of [`Curve`](crate::curve::Curve) carries over by
//! slicing the surface into iso-parametric curves.

pub mod iso;
pub mod patch;
pub mod quilt;

pub use iso::{SIsoCurve, TIsoCurve};
pub use patch::{BicubicPatch, HermitePatchCv};
pub use quilt::{Quilt, SurfaceNode};

use serde::{Deserialize, Serialize};
use spl_core::Tolerance;
use spl_math::{Point3, Vector3};

use crate::curve::Curve;
use crate::sample::Sample;

/// One bicubic span of a surface in Bezier form.  `s` and `t` are the
/// parametric values at which the span ends; control points are indexed
/// `v[si][ti]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BezierPatch {
    pub s: f64,
    pub t: f64,
    pub v: [[Point3; 4]; 4],
}

impl BezierPatch {
    pub fn new(s: f64, t: f64, v: [[Point3; 4]; 4]) -> Self {
        Self { s, t, v }
    }
}

pub trait Surface {
    /// Whether the surface is fully defined and can be sampled.
    fn is_valid(&self) -> bool {
        true
    }

    /// Upper bound of the `s` domain.  The domain always starts at zero.
    fn max_s(&self) -> f64 {
        1.0
    }

    /// Upper bound of the `t` domain.
    fn max_t(&self) -> f64 {
        1.0
    }

    /// The point at `(s, t)`.  Out-of-domain queries clamp and report
    /// themselves via the sample's validity flag.
    fn point_at(&self, s: f64, t: f64) -> Sample<Point3>;

    /// The partial derivative with respect to `s`.
    fn s_tangent_at(&self, s: f64, t: f64) -> Sample<Vector3>;

    /// The partial derivative with respect to `t`.
    fn t_tangent_at(&self, s: f64, t: f64) -> Sample<Vector3>;

    /// The unit surface normal, the normalized cross product of the two
    /// partials.  Degenerate where either partial vanishes.
    fn normal_at(&self, s: f64, t: f64) -> Sample<Vector3> {
        let sv = self.s_tangent_at(s, t);
        let tv = self.t_tangent_at(s, t);
        Sample::new(
            sv.value.cross(tv.value).normalize_or_zero(),
            sv.in_domain && tv.in_domain,
        )
    }

    /// Point and normal together.
    fn point_normal_at(&self, s: f64, t: f64) -> (Sample<Point3>, Sample<Vector3>) {
        (self.point_at(s, t), self.normal_at(s, t))
    }

    /// Describes the surface as a grid of Bezier patches, if it can.
    /// The outer vector runs over `s` spans, the inner over `t` spans.
    /// Returns `None` for surfaces with no bicubic decomposition.
    fn bezier_patches(&self) -> Option<Vec<Vec<BezierPatch>>> {
        None
    }

    /// Approximate arc length across the surface in the `s` direction,
    /// along the iso-parametric curve at the given `t`.
    fn s_length(&self, t: f64, tol: &Tolerance) -> f64
    where
        Self: Sized,
    {
        TIsoCurve::new(self, t).length(tol)
    }

    /// Approximate arc length in the `t` direction, along the
    /// iso-parametric curve at the given `s`.
    fn t_length(&self, s: f64, tol: &Tolerance) -> f64
    where
        Self: Sized,
    {
        SIsoCurve::new(self, s).length(tol)
    }
}
