//! An editable Hermite curve: control points with in and out tangents.

use serde::{Deserialize, Serialize};
use spl_core::{Result, SplError};
use spl_math::{Point3, Vector3};

use crate::curve::bezier::BezierSeg;
use crate::curve::piecewise::{CurveNode, PiecewiseCurve};
use crate::curve::segment::CubicSegment;
use crate::curve::{Curve, CurveType};
use crate::observer::Observers;
use crate::sample::Sample;

/// Continuity class of a Hermite control point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CvKind {
    /// The curve breaks here; the two sides are independent.
    Cut,
    /// In and out tangents are fully independent.
    Free,
    /// In and out tangents share a direction but not a magnitude.
    G1,
    /// In and out tangents are identical.
    #[default]
    Smooth,
}

/// One Hermite control point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HermiteCv {
    pub kind: CvKind,
    pub point: Point3,
    pub tan_in: Vector3,
    pub tan_out: Vector3,
    /// Global parametric value at which the curve reaches this CV.
    pub tstart: f64,
    pub name: Option<String>,
}

impl HermiteCv {
    pub fn new(point: Point3) -> Self {
        HermiteCv {
            kind: CvKind::Smooth,
            point,
            tan_in: Vector3::ZERO,
            tan_out: Vector3::ZERO,
            tstart: 0.0,
            name: None,
        }
    }
}

/// A curve defined by Hermite control points.  Every mutation rebuilds the
/// backing piecewise curve, so sampling always reflects the current CVs.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HermiteCurve {
    cvs: Vec<HermiteCv>,
    curve: PiecewiseCurve,
}

impl HermiteCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_curve_type(&mut self, curve_type: CurveType) {
        self.curve.set_curve_type(curve_type);
    }

    pub fn num_cvs(&self) -> usize {
        self.cvs.len()
    }

    pub fn cv(&self, n: usize) -> Option<&HermiteCv> {
        self.cvs.get(n)
    }

    pub fn observers(&mut self) -> &mut Observers {
        self.curve.observers()
    }

    /// Appends a CV one parametric unit past the previous one.  Returns
    /// its index.
    pub fn append_cv(&mut self, kind: CvKind, point: Point3) -> usize {
        let tstart = self.cvs.last().map_or(0.0, |cv| cv.tstart + 1.0);
        let mut cv = HermiteCv::new(point);
        cv.kind = kind;
        cv.tstart = tstart;
        self.cvs.push(cv);
        self.rebuild();
        self.cvs.len() - 1
    }

    /// Removes CV `n` and stitches the neighbors together.
    pub fn remove_cv(&mut self, n: usize) -> Result<HermiteCv> {
        if n >= self.cvs.len() {
            return Err(SplError::NotFound(format!("no CV {n}")));
        }
        let cv = self.cvs.remove(n);
        self.rebuild();
        Ok(cv)
    }

    pub fn remove_all_cvs(&mut self) {
        self.cvs.clear();
        self.rebuild();
    }

    pub fn set_cv_point(&mut self, n: usize, point: Point3) {
        self.cvs[n].point = point;
        self.rebuild();
    }

    /// Sets the incoming tangent.  Smooth CVs mirror it to the outgoing
    /// tangent; G1 CVs reorient the outgoing tangent while keeping its
    /// magnitude.
    pub fn set_cv_in(&mut self, n: usize, tangent: Vector3) {
        let cv = &mut self.cvs[n];
        cv.tan_in = tangent;
        match cv.kind {
            CvKind::Smooth => cv.tan_out = tangent,
            CvKind::G1 => {
                cv.tan_out = tangent.normalize_or_zero() * cv.tan_out.length();
            }
            CvKind::Free | CvKind::Cut => {}
        }
        self.rebuild();
    }

    /// Sets the outgoing tangent, with the same continuity coupling as
    /// [`HermiteCurve::set_cv_in`].
    pub fn set_cv_out(&mut self, n: usize, tangent: Vector3) {
        let cv = &mut self.cvs[n];
        cv.tan_out = tangent;
        match cv.kind {
            CvKind::Smooth => cv.tan_in = tangent,
            CvKind::G1 => {
                cv.tan_in = tangent.normalize_or_zero() * cv.tan_in.length();
            }
            CvKind::Free | CvKind::Cut => {}
        }
        self.rebuild();
    }

    /// Reclassifies a CV.  Tightening continuity reconciles the tangents:
    /// smooth copies the incoming tangent outward, G1 redirects the
    /// outgoing tangent along the incoming one.
    pub fn set_cv_kind(&mut self, n: usize, kind: CvKind) {
        let cv = &mut self.cvs[n];
        cv.kind = kind;
        match kind {
            CvKind::Smooth => cv.tan_out = cv.tan_in,
            CvKind::G1 => {
                cv.tan_out = cv.tan_in.normalize_or_zero() * cv.tan_out.length();
            }
            CvKind::Free | CvKind::Cut => {}
        }
        self.rebuild();
    }

    /// Moves the parametric position of CV `n`.  The ordering of CVs
    /// along the parameter must be preserved.
    pub fn set_cv_tstart(&mut self, n: usize, tstart: f64) -> Result<()> {
        if n > 0 && tstart <= self.cvs[n - 1].tstart {
            return Err(SplError::InvalidOperation(format!(
                "tstart {tstart} precedes CV {}",
                n - 1
            )));
        }
        if n + 1 < self.cvs.len() && tstart >= self.cvs[n + 1].tstart {
            return Err(SplError::InvalidOperation(format!(
                "tstart {tstart} passes CV {}",
                n + 1
            )));
        }
        self.cvs[n].tstart = tstart;
        self.rebuild();
        Ok(())
    }

    /// Sets the continuity class without reconciling the tangents, for
    /// callers that have already produced consistent ones.
    pub(crate) fn set_cv_kind_raw(&mut self, n: usize, kind: CvKind) {
        self.cvs[n].kind = kind;
    }

    pub fn set_cv_name(&mut self, n: usize, name: impl Into<String>) {
        self.cvs[n].name = Some(name.into());
    }

    pub fn cv_kind(&self, n: usize) -> CvKind {
        self.cvs[n].kind
    }

    pub fn cv_point(&self, n: usize) -> Point3 {
        self.cvs[n].point
    }

    pub fn cv_in(&self, n: usize) -> Vector3 {
        self.cvs[n].tan_in
    }

    pub fn cv_out(&self, n: usize) -> Vector3 {
        self.cvs[n].tan_out
    }

    pub fn cv_tstart(&self, n: usize) -> f64 {
        self.cvs[n].tstart
    }

    /// Regenerates the backing piecewise curve from the CV list.  The
    /// first CV anchors the domain at zero; each following CV closes one
    /// cubic span.
    fn rebuild(&mut self) {
        self.curve.clear();
        for pair in self.cvs.windows(2) {
            let tlength = pair[1].tstart - pair[0].tstart;
            let seg = CubicSegment::hermite(&pair[0], &pair[1], tlength);
            self.curve.push(CurveNode::Segment(seg), tlength);
        }
    }
}

impl Curve for HermiteCurve {
    fn is_valid(&self) -> bool {
        self.cvs.len() > 1
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
