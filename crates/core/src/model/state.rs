//! Graphics and text state.
//!
//! `q` pushes a clone of [`GraphicsState`]; everything the painting
//! operators read lives here, including the clip and the text state.

use super::color::{ColorSpace, Components};
use super::objects::PDFObject;
use super::path::ClipPath;
use crate::font::GlyphSource;
use crate::utils::{MATRIX_IDENTITY, Matrix};
use std::sync::Arc;

/// Line cap style (`J`, `/LC`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub const fn from_int(n: i64) -> Option<Self> {
        match n {
            0 => Some(Self::Butt),
            1 => Some(Self::Round),
            2 => Some(Self::Square),
            _ => None,
        }
    }
}

/// Line join style (`j`, `/LJ`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub const fn from_int(n: i64) -> Option<Self> {
        match n {
            0 => Some(Self::Miter),
            1 => Some(Self::Round),
            2 => Some(Self::Bevel),
            _ => None,
        }
    }
}

/// Dash pattern: on/off lengths and phase.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Dash {
    pub array: Vec<f64>,
    pub phase: f64,
}

impl Dash {
    pub fn is_solid(&self) -> bool {
        self.array.is_empty()
    }
}

/// Blend modes accepted by `/BM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

impl BlendMode {
    /// Parse a blend mode name. `Compatible` is an alias of `Normal`.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Normal" | "Compatible" => Self::Normal,
            "Multiply" => Self::Multiply,
            "Screen" => Self::Screen,
            "Overlay" => Self::Overlay,
            "Darken" => Self::Darken,
            "Lighten" => Self::Lighten,
            "ColorDodge" => Self::ColorDodge,
            "ColorBurn" => Self::ColorBurn,
            "HardLight" => Self::HardLight,
            "SoftLight" => Self::SoftLight,
            "Difference" => Self::Difference,
            "Exclusion" => Self::Exclusion,
            "Hue" => Self::Hue,
            "Saturation" => Self::Saturation,
            "Color" => Self::Color,
            "Luminosity" => Self::Luminosity,
            _ => return None,
        })
    }
}

/// Text rendering mode (`Tr`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TextRenderMode {
    #[default]
    Fill,
    Stroke,
    FillStroke,
    Invisible,
    FillClip,
    StrokeClip,
    FillStrokeClip,
    Clip,
}

impl TextRenderMode {
    pub const fn from_int(n: i64) -> Option<Self> {
        Some(match n {
            0 => Self::Fill,
            1 => Self::Stroke,
            2 => Self::FillStroke,
            3 => Self::Invisible,
            4 => Self::FillClip,
            5 => Self::StrokeClip,
            6 => Self::FillStrokeClip,
            7 => Self::Clip,
            _ => return None,
        })
    }

    pub const fn fills(self) -> bool {
        matches!(self, Self::Fill | Self::FillStroke | Self::FillClip | Self::FillStrokeClip)
    }

    pub const fn strokes(self) -> bool {
        matches!(
            self,
            Self::Stroke | Self::FillStroke | Self::StrokeClip | Self::FillStrokeClip
        )
    }

    /// Modes 4-7 add glyph outlines to the clip.
    pub const fn clips(self) -> bool {
        matches!(
            self,
            Self::FillClip | Self::StrokeClip | Self::FillStrokeClip | Self::Clip
        )
    }
}

/// A color selection: its space, its components, and for Pattern spaces
/// the pattern resource it names.
#[derive(Debug, Clone)]
pub struct ColorState {
    pub space: Arc<ColorSpace>,
    pub components: Components,
    /// Unresolved pattern entry (an indirect reference for most documents).
    pub pattern: Option<PDFObject>,
}

impl ColorState {
    /// Select `space` with its default color.
    pub fn new(space: Arc<ColorSpace>) -> Self {
        let components = space.default_color();
        Self {
            space,
            components,
            pattern: None,
        }
    }
}

impl Default for ColorState {
    fn default() -> Self {
        Self::new(ColorSpace::device_gray())
    }
}

/// Text state parameters.
#[derive(Debug, Clone)]
pub struct TextState {
    pub font: Option<Arc<dyn GlyphSource>>,
    /// Resource name of the current font (e.g. "F1").
    pub font_name: Option<String>,
    pub font_size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// Horizontal scaling in percent.
    pub horizontal_scale: f64,
    pub leading: f64,
    pub rise: f64,
    pub render_mode: TextRenderMode,
    /// Text matrix (Tm)
    pub matrix: Matrix,
    /// Matrix at the start of the current line
    pub line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: None,
            font_name: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 100.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: TextRenderMode::Fill,
            matrix: MATRIX_IDENTITY,
            line_matrix: MATRIX_IDENTITY,
        }
    }
}

impl TextState {
    /// Reset the text and line matrices (`BT`).
    pub const fn reset(&mut self) {
        self.matrix = MATRIX_IDENTITY;
        self.line_matrix = MATRIX_IDENTITY;
    }
}

/// The graphics state.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    /// User space to device space
    pub ctm: Matrix,
    pub fill: ColorState,
    pub stroke: ColorState,
    /// Line width in user space units
    pub line_width: f64,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
    pub miter_limit: f64,
    pub dash: Dash,
    pub rendering_intent: String,
    pub flatness: f64,
    pub blend_mode: BlendMode,
    pub fill_alpha: f64,
    pub stroke_alpha: f64,
    pub alpha_is_shape: bool,
    /// Device-space clip; `None` means unclipped.
    pub clip: Option<Arc<ClipPath>>,
    pub text: TextState,
}

impl GraphicsState {
    pub fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: ColorState::default(),
            stroke: ColorState::default(),
            line_width: 1.0,
            line_cap: LineCap::Butt,
            line_join: LineJoin::Miter,
            miter_limit: 10.0,
            dash: Dash::default(),
            rendering_intent: "RelativeColorimetric".to_string(),
            flatness: 1.0,
            blend_mode: BlendMode::Normal,
            fill_alpha: 1.0,
            stroke_alpha: 1.0,
            alpha_is_shape: false,
            clip: None,
            text: TextState::default(),
        }
    }

    /// Whether two states carry the same clip object.
    pub fn same_clip(&self, other: &GraphicsState) -> bool {
        match (&self.clip, &other.clip) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self::new(MATRIX_IDENTITY)
    }
}
