//! Path construction and painting operators.
//!
//! Handles: m, l, c, v, y, h, re, S, s, f, F, f*, B, B*, b, b*, n, W, W*
//!
//! Path construction:
//! - m: Move to
//! - l: Line to
//! - c, v, y: Bezier curves (cubic variants)
//! - h: Close subpath
//! - re: Rectangle shorthand
//!
//! Path painting:
//! - S/s: Stroke (s closes first)
//! - f/F/f*: Fill (F is legacy, f* uses even-odd rule)
//! - B/B*/b/b*: Fill then stroke
//! - n: End path (no-op, often with clipping)
//!
//! Clipping:
//! - W/W*: Request a clip (non-zero/even-odd), installed by the next paint
//!   or `n`
//!
//! Every painting operator consumes the path; afterwards there is no
//! current point.

use crate::error::{RenderError, Result};
use crate::interp::device::{DrawingSurface, StrokeStyle};
use crate::interp::interpreter::PageInterpreter;
use crate::model::path::{FillRule, Path};
use crate::parser::lexer::Keyword;

#[allow(non_snake_case)]
impl<'a, D: DrawingSurface + ?Sized> PageInterpreter<'a, D> {
    // ========================================================================
    // Path Construction Operators
    // ========================================================================

    /// Begins a new subpath at the given point.
    ///
    /// PDF operator: `m`
    pub fn do_m(&mut self, x: f64, y: f64) {
        self.path.move_to((x, y));
    }

    /// Appends a straight line segment from the current point.
    ///
    /// PDF operator: `l`
    pub fn do_l(&mut self, x: f64, y: f64) {
        if !self.path.line_to((x, y)) {
            tracing::warn!(x, y, "l without current point");
        }
    }

    /// Appends a cubic Bezier curve to the path.
    ///
    /// The curve extends from the current point to (x3, y3),
    /// using (x1, y1) and (x2, y2) as control points.
    ///
    /// PDF operator: `c`
    pub fn do_c(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {
        if !self.path.curve_to((x1, y1), (x2, y2), (x3, y3)) {
            tracing::warn!("c without current point");
        }
    }

    /// Appends a cubic Bezier curve with the current point as first control point.
    ///
    /// PDF operator: `v`
    pub fn do_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) {
        if !self.path.curve_to_v((x2, y2), (x3, y3)) {
            tracing::warn!("v without current point");
        }
    }

    /// Appends a cubic Bezier curve with the end point as second control point.
    ///
    /// PDF operator: `y`
    pub fn do_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) {
        if !self.path.curve_to_y((x1, y1), (x3, y3)) {
            tracing::warn!("y without current point");
        }
    }

    /// Closes the current subpath.
    ///
    /// PDF operator: `h`
    pub fn do_h(&mut self) {
        self.path.close();
    }

    /// Appends a rectangle as a complete subpath.
    ///
    /// PDF operator: `re`
    pub fn do_re(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.path.rect(x, y, w, h);
    }

    // ========================================================================
    // Path Painting Operators
    // ========================================================================

    /// Strokes the current path.
    ///
    /// PDF operator: `S`
    pub fn do_S(&mut self) -> Result<()> {
        self.paint_path(Keyword::S, None, true, false)
    }

    /// Closes and strokes the current path.
    ///
    /// PDF operator: `s`
    pub fn do_s(&mut self) -> Result<()> {
        self.paint_path(Keyword::Ss, None, true, true)
    }

    /// Fills the current path using the nonzero winding number rule.
    ///
    /// `F` is the obsolete spelling and shares this handler.
    ///
    /// PDF operator: `f`
    pub fn do_f(&mut self) -> Result<()> {
        self.paint_path(Keyword::Ff, Some(FillRule::NonZero), false, false)
    }

    /// Fills the current path using the even-odd rule.
    ///
    /// PDF operator: `f*`
    pub fn do_f_star(&mut self) -> Result<()> {
        self.paint_path(Keyword::FStar, Some(FillRule::EvenOdd), false, false)
    }

    /// Fills and strokes the current path using the nonzero winding number rule.
    ///
    /// PDF operator: `B`
    pub fn do_B(&mut self) -> Result<()> {
        self.paint_path(Keyword::B, Some(FillRule::NonZero), true, false)
    }

    /// Fills and strokes the current path using the even-odd rule.
    ///
    /// PDF operator: `B*`
    pub fn do_B_star(&mut self) -> Result<()> {
        self.paint_path(Keyword::BStar, Some(FillRule::EvenOdd), true, false)
    }

    /// Closes, fills, and strokes the current path using the nonzero winding number rule.
    ///
    /// PDF operator: `b`
    pub fn do_b(&mut self) -> Result<()> {
        self.paint_path(Keyword::Bb, Some(FillRule::NonZero), true, true)
    }

    /// Closes, fills, and strokes the current path using the even-odd rule.
    ///
    /// PDF operator: `b*`
    pub fn do_b_star(&mut self) -> Result<()> {
        self.paint_path(Keyword::BbStar, Some(FillRule::EvenOdd), true, true)
    }

    /// Ends the path without filling or stroking it.
    ///
    /// This is primarily used in combination with clipping operators.
    ///
    /// PDF operator: `n`
    pub fn do_n(&mut self) {
        let path = self.path.take();
        self.finish_path(path);
    }

    // ========================================================================
    // Clipping Path Operators
    // ========================================================================

    /// Requests a clip with the nonzero winding number rule.
    ///
    /// PDF operator: `W`
    pub fn do_W(&mut self) {
        self.pending_clip = Some(FillRule::NonZero);
    }

    /// Requests a clip with the even-odd rule.
    ///
    /// PDF operator: `W*`
    pub fn do_W_star(&mut self) {
        self.pending_clip = Some(FillRule::EvenOdd);
    }

    // ========================================================================
    // Painting
    // ========================================================================

    fn paint_path(
        &mut self,
        op: Keyword,
        fill: Option<FillRule>,
        stroke: bool,
        close: bool,
    ) -> Result<()> {
        if close {
            self.path.close();
        }
        let path = self.path.take();
        if !path.is_empty() {
            if let Some(rule) = fill {
                let result = self.fill_current(&path, rule);
                self.recover(&op, result)?;
            }
            if stroke {
                let result = self.stroke_current(&path);
                self.recover(&op, result)?;
            }
        }
        self.finish_path(path);
        Ok(())
    }

    /// Install a pending clip from the consumed path.
    fn finish_path(&mut self, path: Path) {
        let Some(rule) = self.pending_clip.take() else {
            return;
        };
        if path.is_empty() {
            tracing::debug!("clip requested without a path");
            return;
        }
        let device_path = path.transform(self.gstate.ctm);
        self.intersect_clip(device_path, rule);
    }

    /// Fill a user-space path with the current fill color or pattern.
    pub(crate) fn fill_current(&mut self, path: &Path, rule: FillRule) -> Result<()> {
        let space = &self.gstate.fill.space;
        if space.is_no_draw() {
            return Ok(());
        }
        if space.is_pattern() {
            let area = path.transform(self.gstate.ctm);
            return self.fill_with_pattern(&area);
        }
        let paint = self.fill_paint()?;
        self.sync_transform();
        self.device.fill_path(path, rule, &paint);
        Ok(())
    }

    fn stroke_current(&mut self, path: &Path) -> Result<()> {
        let space = &self.gstate.stroke.space;
        if space.is_no_draw() {
            return Ok(());
        }
        if space.is_pattern() {
            return Err(RenderError::UnsupportedFeature(
                "stroking with a pattern".into(),
            ));
        }
        let paint = self.stroke_paint()?;
        let style = self.stroke_style();
        self.sync_transform();
        self.device.stroke_path(path, &style, &paint);
        Ok(())
    }

    pub(crate) fn stroke_style(&self) -> StrokeStyle {
        StrokeStyle {
            width: self.gstate.line_width,
            cap: self.gstate.line_cap,
            join: self.gstate.line_join,
            miter_limit: self.gstate.miter_limit,
            dash: self.gstate.dash.clone(),
        }
    }
}
