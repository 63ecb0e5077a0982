//! The interchange form for cubic curve conversion.

use serde::{Deserialize, Serialize};
use spl_math::Point3;

/// One cubic Bezier segment of a larger curve: four control points plus the
/// parametric value at which the segment ends.  Chains of these are the
/// common currency between curve representations; every convertible curve
/// can describe itself this way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BezierSeg {
    /// Parametric value at the end of the segment.
    pub t: f64,
    /// The four Bezier control points.
    pub v: [Point3; 4],
}

impl BezierSeg {
    pub fn new(t: f64, v: [Point3; 4]) -> Self {
        BezierSeg { t, v }
    }
}
