//! Spline engine geometry: piecewise cubic curves, NURBS, and bicubic
//! surfaces.
//!
//! Curves are defined over a single parameter `t` in `[0, max_t]`, surfaces
//! over a pair `(s, t)`.  Control data (Hermite tangents, Bezier control
//! points, NURBS control points and knots) is combined with a fixed basis
//! matrix into per-segment basis vectors; only the combined basis is kept
//! for evaluation.

pub mod curve;
pub mod nurbs;
pub mod observer;
pub mod sample;
pub mod surface;

pub use curve::{
    BezierSeg, CubicSegment, Curve, CurveNode, CurveType, CvKind, HermiteCurve, HermiteCv,
    NurbsCurve, PiecewiseCurve, SegConstraint,
};
pub use observer::{CurveEvent, ObserverKey, Observers};
pub use sample::Sample;
pub use surface::{
    BezierPatch, BicubicPatch, HermitePatchCv, Quilt, SIsoCurve, Surface, SurfaceNode, TIsoCurve,
};
