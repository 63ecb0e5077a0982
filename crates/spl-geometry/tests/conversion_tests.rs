use approx::assert_relative_eq;
use spl_core::Tolerance;
use spl_geometry::{
    BezierSeg, CubicSegment, Curve, CurveNode, CvKind, HermiteCurve, PiecewiseCurve,
};
use spl_math::{Point3, Vector3};

fn assert_points_eq(a: Point3, b: Point3, eps: f64) {
    assert_relative_eq!(a.x, b.x, epsilon = eps);
    assert_relative_eq!(a.y, b.y, epsilon = eps);
    assert_relative_eq!(a.z, b.z, epsilon = eps);
}

/// A two-span Hermite wave through three CVs.
fn wave() -> HermiteCurve {
    let mut hc = HermiteCurve::new();
    let n = hc.append_cv(CvKind::Smooth, Point3::new(0.0, 0.0, 0.0));
    hc.set_cv_out(n, Vector3::new(1.0, 2.0, 0.0));
    let n = hc.append_cv(CvKind::Smooth, Point3::new(2.0, 1.0, 0.0));
    hc.set_cv_in(n, Vector3::new(1.0, -1.0, 0.0));
    let n = hc.append_cv(CvKind::Smooth, Point3::new(4.0, 0.0, 1.0));
    hc.set_cv_in(n, Vector3::new(2.0, 0.0, 1.0));
    hc
}

fn bezier_span(v: [Point3; 4]) -> CurveNode {
    CurveNode::Segment(CubicSegment::bezier(&BezierSeg::new(1.0, v)))
}

#[test]
fn test_hermite_to_nurbs_preserves_shape() {
    let hc = wave();
    let nc = hc.to_nurbs().unwrap();
    assert!(nc.is_valid());
    assert_relative_eq!(nc.max_t(), hc.max_t(), epsilon = 1e-12);

    for i in 0..=20 {
        let t = hc.max_t() * (i as f64) / 20.0;
        assert_points_eq(nc.point_at(t).value, hc.point_at(t).value, 1e-9);
    }
}

#[test]
fn test_nurbs_to_hermite_round_trip() {
    let nc = wave().to_nurbs().unwrap();
    let hc = nc.to_hermite().unwrap();
    assert!(hc.is_valid());

    for i in 0..=20 {
        let t = nc.max_t() * (i as f64) / 20.0;
        assert_points_eq(hc.point_at(t).value, nc.point_at(t).value, 1e-9);
    }

    // Interior joins of a smooth source stay smooth.
    assert_eq!(hc.cv_kind(1), CvKind::Smooth);
}

#[test]
fn test_conversion_classifies_g1_joins() {
    // Two segments meeting with collinear tangents of different
    // magnitude: geometric but not parametric continuity.
    let mut pw = PiecewiseCurve::new();
    pw.push(
        bezier_span([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(3.0, 1.0, 0.0),
        ]),
        1.0,
    );
    pw.push(
        bezier_span([
            Point3::new(3.0, 1.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(7.0, 0.0, 0.0),
        ]),
        1.0,
    );

    let hc = pw.to_hermite().unwrap();
    assert_eq!(hc.num_cvs(), 3);
    assert_eq!(hc.cv_kind(1), CvKind::G1);
}

#[test]
fn test_conversion_marks_cuts() {
    // Two segments that do not join head to tail.
    let mut pw = PiecewiseCurve::new();
    pw.push(
        bezier_span([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ]),
        1.0,
    );
    pw.push(
        bezier_span([
            Point3::new(3.0, 5.0, 0.0),
            Point3::new(4.0, 5.0, 0.0),
            Point3::new(5.0, 5.0, 0.0),
            Point3::new(6.0, 5.0, 0.0),
        ]),
        1.0,
    );

    let hc = pw.to_hermite().unwrap();
    assert_eq!(hc.num_cvs(), 3);
    assert_eq!(hc.cv_kind(0), CvKind::Cut);
    // Past the cut the geometry is preserved.
    assert_points_eq(hc.point_at(1.5).value, pw.point_at(1.5).value, 1e-9);
    assert_points_eq(hc.point_at(2.0).value, pw.point_at(2.0).value, 1e-9);

    // The NURBS form keeps the discontinuity through repeated knots.
    let nc = pw.to_nurbs().unwrap();
    assert_points_eq(nc.point_at(1.5).value, pw.point_at(1.5).value, 1e-9);
    assert_points_eq(nc.point_at(0.5).value, pw.point_at(0.5).value, 1e-9);
}

#[test]
fn test_length_is_preserved_across_conversion() {
    let hc = wave();
    let nc = hc.to_nurbs().unwrap();
    let tol = Tolerance::default_precision();
    assert_relative_eq!(nc.length(&tol), hc.length(&tol), epsilon = 1e-4);
}

#[test]
fn test_t_at_length_round_trip() {
    let hc = wave();
    let tol = Tolerance::default_precision();
    let total = hc.length(&tol);

    // Walk a third of the arc from the start, then verify the arc
    // length back to the found parameter.
    let target = total / 3.0;
    let t = hc.t_at_length(0.0, target, 1.0, 1e-6, &tol);
    assert_relative_eq!(hc.length_from(0.0, t, &tol), target, epsilon = 1e-4);

    // And backward from the end.
    let t = hc.t_at_length(hc.max_t(), -target, hc.max_t() - 1.0, 1e-6, &tol);
    assert_relative_eq!(
        hc.length_from(t, hc.max_t(), &tol),
        target,
        epsilon = 1e-4
    );
}

#[test]
fn test_tolerances_trade_accuracy_for_work() {
    let hc = wave();
    let loose = hc.length(&Tolerance::loose());
    let tight = hc.length(&Tolerance::tight());
    // Both agree to well within the loose tolerance's scale.
    assert_relative_eq!(loose, tight, epsilon = 1e-2);
    // Refinement only ever adds length.
    assert!(tight >= loose - 1e-9);
}
