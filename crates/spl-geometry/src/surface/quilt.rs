//! A surface assembled from a rectangular grid of child patches.

use serde::{Deserialize, Serialize};
use spl_core::{Result, SplError};
use spl_math::{HVec4, Point3, Vector3};

use crate::observer::Observers;
use crate::sample::Sample;
use crate::surface::patch::BicubicPatch;
use crate::surface::{BezierPatch, Surface};

/// Slop when matching a parametric value against a patch boundary, so a
/// query at exactly an end value (or a rounding hair past it) lands on
/// the nearer patch instead of falling off the grid.
const BORDER_SLOP: f64 = 0.00001;

/// A cell of a quilt.  The recursion is closed: a cell is either a
/// single bicubic patch or a nested quilt.
#[derive(Debug, Serialize, Deserialize)]
pub enum SurfaceNode {
    Patch(BicubicPatch),
    Quilt(Box<Quilt>),
}

impl SurfaceNode {
    fn as_surface(&self) -> &dyn Surface {
        match self {
            SurfaceNode::Patch(patch) => patch,
            SurfaceNode::Quilt(quilt) => quilt.as_ref(),
        }
    }
}

/// A surface defined over `[0, max_s] x [0, max_t]` as a grid of child
/// cells, each owning one rectangle of the global domain.  The grid may
/// have holes; sampling a hole yields an undefined result.  Cell lookup
/// is a binary search over the end values in each direction.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Quilt {
    /// Grid cells in row-major order, indexed `si * num_t + ti`.
    cells: Vec<Option<SurfaceNode>>,
    s_ends: Vec<f64>,
    t_ends: Vec<f64>,
    #[serde(skip)]
    observers: Observers,
}

impl Quilt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(num_s: usize, num_t: usize) -> Self {
        let mut quilt = Self::default();
        quilt.reset(num_s, num_t);
        quilt
    }

    /// Recreates the quilt at the given size.  Every cell starts empty,
    /// with the grid evenly distributed over `[0, 1] x [0, 1]`.
    pub fn reset(&mut self, num_s: usize, num_t: usize) {
        self.cells.clear();
        self.cells.resize_with(num_s * num_t, || None);
        self.s_ends = (1..=num_s).map(|i| i as f64 / num_s as f64).collect();
        self.t_ends = (1..=num_t).map(|i| i as f64 / num_t as f64).collect();
        self.observers.invalidate_all();
    }

    pub fn num_s_patches(&self) -> usize {
        self.s_ends.len()
    }

    pub fn num_t_patches(&self) -> usize {
        self.t_ends.len()
    }

    /// The invalidation registry for this surface.
    pub fn observers(&mut self) -> &mut Observers {
        &mut self.observers
    }

    pub fn patch(&self, si: usize, ti: usize) -> Option<&SurfaceNode> {
        if si >= self.num_s_patches() || ti >= self.num_t_patches() {
            return None;
        }
        self.cells[si * self.num_t_patches() + ti].as_ref()
    }

    /// Fills the cell at the given grid index.
    pub fn set_patch(&mut self, si: usize, ti: usize, node: SurfaceNode) -> Result<()> {
        let num_t = self.num_t_patches();
        if si >= self.num_s_patches() || ti >= num_t {
            return Err(SplError::NotFound(format!("no quilt cell ({si}, {ti})")));
        }
        self.cells[si * num_t + ti] = Some(node);
        self.observers.invalidate_all();
        Ok(())
    }

    /// Empties the cell at the given grid index, returning what it held.
    pub fn remove_patch(&mut self, si: usize, ti: usize) -> Option<SurfaceNode> {
        let num_t = self.num_t_patches();
        if si >= self.num_s_patches() || ti >= num_t {
            return None;
        }
        let node = self.cells[si * num_t + ti].take();
        if node.is_some() {
            self.observers.invalidate_all();
        }
        node
    }

    /// Parametric width in `s` of grid column `si`.
    pub fn s_width(&self, si: usize) -> f64 {
        if si == 0 {
            self.s_ends[0]
        } else {
            self.s_ends[si] - self.s_ends[si - 1]
        }
    }

    /// Parametric width in `t` of grid row `ti`.
    pub fn t_width(&self, ti: usize) -> f64 {
        if ti == 0 {
            self.t_ends[0]
        } else {
            self.t_ends[ti] - self.t_ends[ti - 1]
        }
    }

    /// Changes the parametric width in `s` of column `si`.  Later
    /// columns shift accordingly, so the overall `s` domain grows or
    /// shrinks by the difference.
    pub fn set_s_width(&mut self, si: usize, swidth: f64) -> Result<()> {
        if si >= self.num_s_patches() {
            return Err(SplError::NotFound(format!("no quilt column {si}")));
        }
        let diff = swidth - self.s_width(si);
        for end in &mut self.s_ends[si..] {
            *end += diff;
        }
        self.observers.invalidate_all();
        Ok(())
    }

    /// Changes the parametric width in `t` of row `ti`.  Later rows
    /// shift accordingly.
    pub fn set_t_width(&mut self, ti: usize, twidth: f64) -> Result<()> {
        if ti >= self.num_t_patches() {
            return Err(SplError::NotFound(format!("no quilt row {ti}")));
        }
        let diff = twidth - self.t_width(ti);
        for end in &mut self.t_ends[ti..] {
            *end += diff;
        }
        self.observers.invalidate_all();
        Ok(())
    }

    /// Rescales the `s` domain so its upper bound is as given.
    pub fn set_max_s(&mut self, max_s: f64) {
        if let Some(&last) = self.s_ends.last() {
            let scale = max_s / last;
            for end in &mut self.s_ends {
                *end *= scale;
            }
            self.observers.invalidate_all();
        }
    }

    /// Rescales the `t` domain so its upper bound is as given.
    pub fn set_max_t(&mut self, max_t: f64) {
        if let Some(&last) = self.t_ends.last() {
            let scale = max_t / last;
            for end in &mut self.t_ends {
                *end *= scale;
            }
            self.observers.invalidate_all();
        }
    }

    /// Recreates the quilt as a general NURBS surface.  `cvs` is a pool
    /// of `num_s_cvs * num_t_cvs` homogeneous control vertices with the
    /// `s` index changing fastest, where `num_s_cvs` is
    /// `s_knots.len() - s_order` (and likewise for `t`).  Each pair of
    /// non-degenerate knot spans becomes one bicubic cell, with the
    /// grid's parametric lengths taken from the knot widths.
    pub fn make_nurbs(
        &mut self,
        s_order: usize,
        t_order: usize,
        s_knots: &[f64],
        t_knots: &[f64],
        cvs: &[HVec4],
    ) -> Result<()> {
        for (name, order) in [("s", s_order), ("t", t_order)] {
            if order < 1 || order > 4 {
                return Err(SplError::InvalidOperation(format!(
                    "NURBS {name} order must be 1..=4, got {order}"
                )));
            }
        }
        let num_s_cvs = s_knots.len().saturating_sub(s_order);
        let num_t_cvs = t_knots.len().saturating_sub(t_order);
        if num_s_cvs < s_order || num_t_cvs < t_order {
            return Err(SplError::Degenerate(format!(
                "control net of {num_s_cvs} x {num_t_cvs} is too small for \
                 order {s_order} x {t_order}"
            )));
        }
        if cvs.len() != num_s_cvs * num_t_cvs {
            return Err(SplError::InvalidOperation(format!(
                "expected {} control vertices, got {}",
                num_s_cvs * num_t_cvs,
                cvs.len()
            )));
        }
        for (name, knots) in [("s", s_knots), ("t", t_knots)] {
            if knots.windows(2).any(|w| w[0] > w[1]) {
                return Err(SplError::InvalidOperation(format!(
                    "{name} knot vector must be nondecreasing"
                )));
            }
        }

        // Zero-width knot spans contribute no geometry.
        let spans = |order: usize, knots: &[f64], count: usize| -> Vec<(usize, f64)> {
            (0..count - order + 1)
                .filter(|&n| knots[n + order] > knots[n + order - 1])
                .map(|n| (n, knots[n + order] - knots[n + order - 1]))
                .collect()
        };
        let s_spans = spans(s_order, s_knots, num_s_cvs);
        let t_spans = spans(t_order, t_knots, num_t_cvs);

        let num_t = t_spans.len();
        let mut cells = Vec::with_capacity(s_spans.len() * num_t);
        for &(sn, _) in &s_spans {
            for &(tn, _) in &t_spans {
                let patch = BicubicPatch::nurbs(
                    s_order,
                    t_order,
                    &s_knots[sn..sn + 2 * s_order],
                    &t_knots[tn..tn + 2 * t_order],
                    cvs,
                    num_s_cvs,
                    sn,
                    tn,
                )?;
                cells.push(Some(SurfaceNode::Patch(patch)));
            }
        }

        self.cells = cells;
        self.s_ends = s_spans
            .iter()
            .scan(0.0, |acc, &(_, w)| {
                *acc += w;
                Some(*acc)
            })
            .collect();
        self.t_ends = t_spans
            .iter()
            .scan(0.0, |acc, &(_, w)| {
                *acc += w;
                Some(*acc)
            })
            .collect();
        self.observers.invalidate_all();
        Ok(())
    }

    /// Maps a global parametric value to `(index, local fraction in
    /// [0, 1], whether the value was inside the domain)` along one
    /// direction.  Out-of-domain values clamp to the nearest end.
    fn locate(ends: &[f64], v: f64) -> (usize, f64, bool) {
        if v < 0.0 {
            return (0, 0.0, false);
        }
        let i = ends.partition_point(|&end| end + BORDER_SLOP <= v);
        if i >= ends.len() {
            return (ends.len() - 1, 1.0, false);
        }
        let start = if i == 0 { 0.0 } else { ends[i - 1] };
        let width = ends[i] - start;
        let local = if width > 0.0 {
            ((v - start) / width).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (i, local, true)
    }

    /// Maps a global `(s, t)` to a defined cell and local fractions.
    /// When the target cell is empty but the query sits exactly on a
    /// border, the cell on the near side is tried instead.  Returns
    /// `None` for an empty quilt or a hole in the grid.
    pub(crate) fn find_patch(&self, s: f64, t: f64) -> Option<(usize, usize, f64, f64, bool)> {
        if !self.is_valid() {
            return None;
        }

        let (mut si, mut ls, s_ok) = Self::locate(&self.s_ends, s);
        let (mut ti, mut lt, t_ok) = Self::locate(&self.t_ends, t);

        if self.patch(si, ti).is_none() {
            if si > 0 && ls == 0.0 {
                si -= 1;
                ls = 1.0;
            }
            if ti > 0 && lt == 0.0 {
                ti -= 1;
                lt = 1.0;
            }
            self.patch(si, ti)?;
        }

        Some((si, ti, ls, lt, s_ok && t_ok))
    }

    fn sample_with<T: Default>(
        &self,
        s: f64,
        t: f64,
        f: impl FnOnce(&dyn Surface, f64, f64) -> Sample<T>,
    ) -> Sample<T> {
        match self.find_patch(s, t) {
            Some((si, ti, ls, lt, in_domain)) => {
                // find_patch only returns defined cells.
                match self.patch(si, ti) {
                    Some(node) => {
                        let child = node.as_surface();
                        f(child, ls * child.max_s(), lt * child.max_t()).narrow(in_domain)
                    }
                    None => Sample::undefined(),
                }
            }
            None => Sample::undefined(),
        }
    }
}

impl Surface for Quilt {
    fn is_valid(&self) -> bool {
        !self.s_ends.is_empty() && !self.t_ends.is_empty()
    }

    fn max_s(&self) -> f64 {
        self.s_ends.last().copied().unwrap_or(0.0)
    }

    fn max_t(&self) -> f64 {
        self.t_ends.last().copied().unwrap_or(0.0)
    }

    fn point_at(&self, s: f64, t: f64) -> Sample<Point3> {
        self.sample_with(s, t, |child, ls, lt| child.point_at(ls, lt))
    }

    fn s_tangent_at(&self, s: f64, t: f64) -> Sample<Vector3> {
        self.sample_with(s, t, |child, ls, lt| child.s_tangent_at(ls, lt))
    }

    fn t_tangent_at(&self, s: f64, t: f64) -> Sample<Vector3> {
        self.sample_with(s, t, |child, ls, lt| child.t_tangent_at(ls, lt))
    }

    fn normal_at(&self, s: f64, t: f64) -> Sample<Vector3> {
        self.sample_with(s, t, |child, ls, lt| child.normal_at(ls, lt))
    }

    fn bezier_patches(&self) -> Option<Vec<Vec<BezierPatch>>> {
        let num_t = self.num_t_patches();
        let mut rows = Vec::with_capacity(self.num_s_patches());
        for si in 0..self.num_s_patches() {
            let mut row = Vec::with_capacity(num_t);
            for ti in 0..num_t {
                match &self.cells[si * num_t + ti] {
                    Some(SurfaceNode::Patch(patch)) => {
                        row.push(BezierPatch::new(
                            self.s_ends[si],
                            self.t_ends[ti],
                            patch.bezier_points(),
                        ));
                    }
                    // A hole or a nested quilt has no single-patch form.
                    _ => return None,
                }
            }
            rows.push(row);
        }
        Some(rows)
    }
}
