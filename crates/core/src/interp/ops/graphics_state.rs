//! Graphics state operators.
//!
//! Handles: q, Q, cm, w, J, j, M, d, ri, i, gs
//!
//! These operators manage the graphics state stack and transformation matrix.
//! - q/Q: Push/pop graphics state
//! - cm: Concatenate transformation matrix
//! - w, J, j, M, d: Line styling (width, cap, join, miter limit, dash)
//! - ri, i: Rendering intent and flatness
//! - gs: Set parameters from graphics state dictionary

use crate::error::{RenderError, Result};
use crate::interp::device::DrawingSurface;
use crate::interp::interpreter::PageInterpreter;
use crate::interp::resources::category;
use crate::model::objects::PDFObject;
use crate::model::state::{BlendMode, Dash, LineCap, LineJoin};
use crate::utils::{Matrix, mult_matrix};

#[allow(non_snake_case)]
impl<'a, D: DrawingSurface + ?Sized> PageInterpreter<'a, D> {
    /// Saves the current graphics state to the stack.
    ///
    /// PDF operator: `q`
    pub fn do_q(&mut self) {
        self.save_state();
    }

    /// Restores the graphics state from the stack.
    ///
    /// PDF operator: `Q`
    pub fn do_Q(&mut self) {
        if self.gstack.len() <= self.stack_floor {
            tracing::warn!("Q without matching q");
            return;
        }
        if let Some(state) = self.gstack.pop() {
            self.set_state(state);
        }
    }

    /// Concatenates a matrix to the current transformation matrix.
    ///
    /// PDF operator: `cm`
    pub fn do_cm(&mut self, matrix: Matrix) {
        self.gstate.ctm = mult_matrix(matrix, self.gstate.ctm);
    }

    /// Sets the line width in the graphics state.
    ///
    /// PDF operator: `w`
    pub fn do_w(&mut self, linewidth: f64) {
        self.gstate.line_width = linewidth.abs();
    }

    /// Sets the line cap style in the graphics state.
    ///
    /// PDF operator: `J`
    pub fn do_J(&mut self, linecap: i64) {
        match LineCap::from_int(linecap) {
            Some(cap) => self.gstate.line_cap = cap,
            None => tracing::warn!(linecap, "invalid line cap"),
        }
    }

    /// Sets the line join style in the graphics state.
    ///
    /// PDF operator: `j`
    pub fn do_j(&mut self, linejoin: i64) {
        match LineJoin::from_int(linejoin) {
            Some(join) => self.gstate.line_join = join,
            None => tracing::warn!(linejoin, "invalid line join"),
        }
    }

    /// Sets the miter limit in the graphics state.
    ///
    /// PDF operator: `M`
    pub fn do_M(&mut self, miterlimit: f64) {
        self.gstate.miter_limit = miterlimit;
    }

    /// Sets the line dash pattern in the graphics state.
    ///
    /// PDF operator: `d`
    pub fn do_d(&mut self, array: Vec<f64>, phase: f64) -> Result<()> {
        if array.iter().any(|v| *v < 0.0) {
            return Err(RenderError::malformed("d", "negative dash length"));
        }
        // an all-zero array would never advance
        let array = if array.iter().all(|v| *v == 0.0) {
            Vec::new()
        } else {
            array
        };
        self.gstate.dash = Dash { array, phase };
        Ok(())
    }

    /// Sets the color rendering intent in the graphics state.
    ///
    /// PDF operator: `ri`
    pub fn do_ri(&mut self, intent: &str) {
        self.gstate.rendering_intent = intent.to_string();
    }

    /// Sets the flatness tolerance in the graphics state.
    ///
    /// PDF operator: `i`
    pub fn do_i(&mut self, flatness: f64) {
        self.gstate.flatness = flatness;
    }

    /// Sets parameters from a graphics state parameter dictionary.
    ///
    /// PDF operator: `gs`
    pub fn do_gs(&mut self, name: &str) -> Result<()> {
        let entry = self.require_resource(category::EXT_GSTATE, name)?;
        let dict = self.resolver.resolve_dict(&entry)?;
        for (key, value) in &dict {
            let value = self.resolver.resolve(value)?;
            match key.as_str() {
                "LW" => self.do_w(value.as_num()?),
                "LC" => self.do_J(value.as_int()?),
                "LJ" => self.do_j(value.as_int()?),
                "ML" => self.do_M(value.as_num()?),
                "D" => match value.as_array()?.as_slice() {
                    [array, phase] => self.do_d(
                        self.resolver.resolve_num_array(array)?,
                        self.resolver.resolve(phase)?.as_num()?,
                    )?,
                    _ => tracing::warn!(name, "malformed /D in ExtGState"),
                },
                "RI" => self.do_ri(value.as_name()?),
                "FL" => self.do_i(value.as_num()?),
                "BM" => self.gstate.blend_mode = blend_mode(&value),
                "CA" => self.gstate.stroke_alpha = value.as_num()?.clamp(0.0, 1.0),
                "ca" => self.gstate.fill_alpha = value.as_num()?.clamp(0.0, 1.0),
                "AIS" => self.gstate.alpha_is_shape = value.as_bool()?,
                "SMask" => {
                    if !matches!(&value, PDFObject::Name(n) if n == "None") {
                        let err = RenderError::UnsupportedFeature("soft masks".into());
                        tracing::warn!(name, error = %err, "ignoring /SMask");
                    }
                }
                "Font" => self.set_gs_font(&value)?,
                "Type" => {}
                other => tracing::debug!(key = other, "ignoring ExtGState entry"),
            }
        }
        Ok(())
    }

    /// `/Font [font size]` of an ExtGState dictionary.
    fn set_gs_font(&mut self, value: &PDFObject) -> Result<()> {
        let [font, size] = value.as_array()?.as_slice() else {
            tracing::warn!("malformed /Font in ExtGState");
            return Ok(());
        };
        self.gstate.text.font_size = self.resolver.resolve(size)?.as_num()?;
        match self.resources.font(font, self.resolver) {
            Ok(loaded) => {
                self.gstate.text.font_name = Some(loaded.base_font().to_string());
                self.gstate.text.font = Some(loaded);
            }
            Err(err) => {
                tracing::warn!(error = %err, "ExtGState font");
                self.gstate.text.font = None;
            }
        }
        Ok(())
    }
}

/// `/BM`: a name, or an array whose first recognized entry wins.
fn blend_mode(value: &PDFObject) -> BlendMode {
    let found = match value {
        PDFObject::Name(n) => BlendMode::from_name(n),
        PDFObject::Array(items) => items
            .iter()
            .filter_map(|item| item.as_name().ok())
            .find_map(BlendMode::from_name),
        _ => None,
    };
    found.unwrap_or_else(|| {
        tracing::warn!(?value, "unknown blend mode, using Normal");
        BlendMode::Normal
    })
}
