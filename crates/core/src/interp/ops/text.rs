//! Text operators.
//!
//! Handles: BT, ET, Tc, Tw, Tz, TL, Tf, Tr, Ts, Td, TD, Tm, T*, Tj, TJ, ', "
//!
//! Text state:
//! - Tc, Tw: Character and word spacing
//! - Tz: Horizontal scaling
//! - TL: Leading
//! - Tf: Font and size
//! - Tr: Rendering mode
//! - Ts: Rise
//!
//! Text positioning:
//! - Td, TD: Move to next line (TD also sets leading)
//! - Tm: Set text matrix
//! - T*: Move to next line using leading
//!
//! Text showing:
//! - Tj: Show string
//! - TJ: Show strings with individual glyph positioning
//! - ': Move to next line and show string
//! - ": Set spacing, move to next line, and show string
//!
//! Each showing operator produces at most one [`GlyphRun`], with glyph
//! transforms in user space.

use crate::error::{RenderError, Result};
use crate::interp::device::{DrawingSurface, GlyphRun, Paint, PositionedGlyph};
use crate::interp::interpreter::PageInterpreter;
use crate::interp::resources::category;
use crate::model::objects::PDFObject;
use crate::model::state::TextRenderMode;
use crate::utils::{Matrix, mult_matrix, translate_matrix};

/// One element of a `TJ` array.
#[derive(Debug, Clone, Copy)]
enum TextItem<'s> {
    Bytes(&'s [u8]),
    /// Position adjustment in thousandths of text space.
    Adjust(f64),
}

#[allow(non_snake_case)]
impl<'a, D: DrawingSurface + ?Sized> PageInterpreter<'a, D> {
    /// Begins a text object, resetting the text matrices.
    ///
    /// PDF operator: `BT`
    pub fn do_BT(&mut self) {
        self.gstate.text.reset();
    }

    /// Ends a text object.
    ///
    /// PDF operator: `ET`
    pub fn do_ET(&mut self) {}

    /// PDF operator: `Tc`
    pub fn do_Tc(&mut self, space: f64) {
        self.gstate.text.char_spacing = space;
    }

    /// PDF operator: `Tw`
    pub fn do_Tw(&mut self, space: f64) {
        self.gstate.text.word_spacing = space;
    }

    /// Sets horizontal scaling, in percent.
    ///
    /// PDF operator: `Tz`
    pub fn do_Tz(&mut self, scale: f64) {
        self.gstate.text.horizontal_scale = scale;
    }

    /// PDF operator: `TL`
    pub fn do_TL(&mut self, leading: f64) {
        self.gstate.text.leading = leading;
    }

    /// Sets the font and size.
    ///
    /// A font that cannot be loaded leaves the text state without a font;
    /// later showing operators are skipped.
    ///
    /// PDF operator: `Tf`
    pub fn do_Tf(&mut self, name: &str, size: f64) -> Result<()> {
        let text = &mut self.gstate.text;
        text.font_name = Some(name.to_string());
        text.font_size = size;
        text.font = None;
        let entry = self.require_resource(category::FONT, name)?;
        match self.resources.font(&entry, self.resolver) {
            Ok(font) => self.gstate.text.font = Some(font),
            Err(err) => tracing::warn!(name, error = %err, "cannot load font"),
        }
        Ok(())
    }

    /// PDF operator: `Tr`
    pub fn do_Tr(&mut self, mode: i64) {
        match TextRenderMode::from_int(mode) {
            Some(mode) => self.gstate.text.render_mode = mode,
            None => tracing::warn!(mode, "invalid text rendering mode"),
        }
    }

    /// PDF operator: `Ts`
    pub fn do_Ts(&mut self, rise: f64) {
        self.gstate.text.rise = rise;
    }

    /// Moves to the start of the next line, offset by (tx, ty).
    ///
    /// PDF operator: `Td`
    pub fn do_Td(&mut self, tx: f64, ty: f64) {
        let text = &mut self.gstate.text;
        text.line_matrix = translate_matrix(text.line_matrix, (tx, ty));
        text.matrix = text.line_matrix;
    }

    /// Like `Td`, also setting the leading to `-ty`.
    ///
    /// PDF operator: `TD`
    pub fn do_TD(&mut self, tx: f64, ty: f64) {
        self.gstate.text.leading = -ty;
        self.do_Td(tx, ty);
    }

    /// Sets the text matrix and the text line matrix.
    ///
    /// PDF operator: `Tm`
    pub fn do_Tm(&mut self, matrix: Matrix) {
        self.gstate.text.matrix = matrix;
        self.gstate.text.line_matrix = matrix;
    }

    /// PDF operator: `T*`
    pub fn do_T_star(&mut self) {
        let leading = self.gstate.text.leading;
        self.do_Td(0.0, -leading);
    }

    /// Shows a text string.
    ///
    /// PDF operator: `Tj`
    pub fn do_Tj(&mut self, string: &[u8]) -> Result<()> {
        self.show_text("Tj", &[TextItem::Bytes(string)])
    }

    /// Shows strings, adjusting the position between them.
    ///
    /// PDF operator: `TJ`
    pub fn do_TJ(&mut self, array: &[PDFObject]) -> Result<()> {
        let items = array
            .iter()
            .map(|item| match item {
                PDFObject::String(s) => Ok(TextItem::Bytes(s)),
                PDFObject::Int(_) | PDFObject::Real(_) => Ok(TextItem::Adjust(item.as_num()?)),
                other => Err(RenderError::malformed(
                    "TJ",
                    format!("array element should be a string or number, found {}", other.type_name()),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        self.show_text("TJ", &items)
    }

    /// PDF operator: `'`
    pub fn do_quote(&mut self, string: &[u8]) -> Result<()> {
        self.do_T_star();
        self.show_text("'", &[TextItem::Bytes(string)])
    }

    /// PDF operator: `"`
    pub fn do_double_quote(&mut self, aw: f64, ac: f64, string: &[u8]) -> Result<()> {
        self.do_Tw(aw);
        self.do_Tc(ac);
        self.do_T_star();
        self.show_text("\"", &[TextItem::Bytes(string)])
    }

    fn show_text(&mut self, op: &str, items: &[TextItem<'_>]) -> Result<()> {
        let Some(font) = self.gstate.text.font.clone() else {
            tracing::warn!(op, font = ?self.gstate.text.font_name, "text shown without a font");
            return Ok(());
        };
        let text = &self.gstate.text;
        let size = text.font_size;
        let hscale = text.horizontal_scale / 100.0;
        let mode = text.render_mode;
        let visible = !matches!(mode, TextRenderMode::Invisible | TextRenderMode::Clip);
        let glyph_space = (size * hscale, 0.0, 0.0, size, 0.0, text.rise);

        let mut tm = text.matrix;
        let mut glyphs = Vec::new();
        for item in items {
            match *item {
                TextItem::Adjust(n) => {
                    tm = translate_matrix(tm, (-n / 1000.0 * size * hscale, 0.0));
                }
                TextItem::Bytes(bytes) => {
                    for glyph in font.decode(bytes) {
                        if visible {
                            glyphs.push(PositionedGlyph {
                                code: glyph.code,
                                gid: glyph.gid,
                                transform: mult_matrix(glyph_space, tm),
                            });
                        }
                        let word = if glyph.is_space { text.word_spacing } else { 0.0 };
                        let tx = (glyph.width / 1000.0 * size + text.char_spacing + word) * hscale;
                        tm = translate_matrix(tm, (tx, 0.0));
                    }
                }
            }
        }
        self.gstate.text.matrix = tm;

        if mode.clips() {
            let err = RenderError::UnsupportedFeature("text clipping".into());
            tracing::warn!(op, error = %err, "painting text without its clip");
        }
        if glyphs.is_empty() {
            return Ok(());
        }
        let fill = if mode.fills() { self.text_paint(false)? } else { None };
        let stroke = if mode.strokes() { self.text_paint(true)? } else { None };
        if fill.is_none() && stroke.is_none() {
            return Ok(());
        }
        let run = GlyphRun {
            font: self.gstate.text.font_name.clone().unwrap_or_default(),
            size,
            render_mode: mode,
            glyphs,
            fill,
            stroke,
        };
        self.sync_transform();
        self.device.draw_glyph_run(&run);
        Ok(())
    }

    /// Paint for glyphs. Pattern and no-draw colors leave the glyphs
    /// unpainted.
    fn text_paint(&self, stroke: bool) -> Result<Option<Paint>> {
        let color = if stroke { &self.gstate.stroke } else { &self.gstate.fill };
        if color.space.is_no_draw() {
            return Ok(None);
        }
        if color.space.is_pattern() {
            tracing::debug!("pattern-colored text is not painted");
            return Ok(None);
        }
        let paint = if stroke { self.stroke_paint()? } else { self.fill_paint()? };
        Ok(Some(paint))
    }
}
