//! Shadings and patterns.
//!
//! - `axial`, `radial`, `function_based`: the parameter math of shading
//!   types 2, 3 and 1
//! - `tiling`: tiling pattern descriptors and tile geometry
//!
//! A [`Shading`] is parsed once and shared. Painting goes through a
//! [`ShadingContext`], which fixes the device-to-shading transform and
//! produces ARGB pixels.

pub mod axial;
pub mod function_based;
pub mod radial;
pub mod tiling;

pub use axial::Axial;
pub use function_based::FunctionBased;
pub use radial::Radial;
pub use tiling::{PaintType, TileGeometry, TileSpec, TilingPattern};

use crate::error::{RenderError, Result};
use crate::interp::resources::ResourceResolver;
use crate::model::color::{ColorSpace, Rgb};
use crate::model::function::{FunctionOutput, PDFFunction};
use crate::model::objects::PDFDict;
use crate::utils::{MATRIX_IDENTITY, Matrix, Rect, apply_matrix_pt, apply_matrix_rect, invert_matrix, normalize_rect};
use std::sync::Arc;

fn invalid(msg: impl Into<String>) -> RenderError {
    RenderError::InvalidShading(msg.into())
}

/// Geometry of a supported shading type.
#[derive(Debug, Clone)]
pub enum ShadingKind {
    FunctionBased(FunctionBased),
    Axial(Axial),
    Radial(Radial),
}

/// A parsed shading dictionary.
#[derive(Debug)]
pub struct Shading {
    pub colorspace: Arc<ColorSpace>,
    /// Color outside the gradient, used by shading patterns only.
    pub background: Option<Rgb>,
    /// Clip in shading space.
    pub bbox: Option<Rect>,
    pub anti_alias: bool,
    pub kind: ShadingKind,
    pub function: Arc<PDFFunction>,
}

fn numbers(
    dict: &PDFDict,
    key: &str,
    resolver: &dyn ResourceResolver,
) -> Result<Option<Vec<f64>>> {
    dict.get(key)
        .map(|v| resolver.resolve_num_array(v))
        .transpose()
}

fn fixed<const N: usize>(
    dict: &PDFDict,
    key: &str,
    resolver: &dyn ResourceResolver,
) -> Result<Option<[f64; N]>> {
    match numbers(dict, key, resolver)? {
        Some(v) => v
            .try_into()
            .map(Some)
            .map_err(|v: Vec<f64>| invalid(format!("/{key} needs {N} numbers, got {}", v.len()))),
        None => Ok(None),
    }
}

fn extend(dict: &PDFDict, resolver: &dyn ResourceResolver) -> Result<[bool; 2]> {
    let Some(obj) = dict.get("Extend") else {
        return Ok([false, false]);
    };
    let items = resolver.resolve(obj)?;
    let items = items.as_array()?;
    let flag = |i: usize| -> Result<bool> {
        match items.get(i) {
            Some(v) => resolver.resolve(v)?.as_bool(),
            None => Ok(false),
        }
    };
    Ok([flag(0)?, flag(1)?])
}

impl Shading {
    /// Build a shading from its dictionary.
    ///
    /// The color space and function are resolved by the caller so they can
    /// go through the resource caches.
    pub fn from_dict(
        dict: &PDFDict,
        resolver: &dyn ResourceResolver,
        colorspace: Arc<ColorSpace>,
        function: Option<Arc<PDFFunction>>,
    ) -> Result<Self> {
        let shading_type = match dict.get("ShadingType") {
            Some(t) => resolver.resolve(t)?.as_int()?,
            None => return Err(invalid("missing /ShadingType")),
        };
        if (4..=7).contains(&shading_type) {
            return Err(RenderError::UnsupportedFeature(format!(
                "mesh shading type {shading_type}"
            )));
        }
        if colorspace.is_pattern() {
            return Err(invalid("shading color space cannot be a Pattern space"));
        }
        let function = function.ok_or_else(|| invalid("missing /Function"))?;

        let kind = match shading_type {
            1 => {
                let domain = fixed::<4>(dict, "Domain", resolver)?.unwrap_or([0.0, 1.0, 0.0, 1.0]);
                let matrix = match fixed::<6>(dict, "Matrix", resolver)? {
                    Some([a, b, c, d, e, f]) => (a, b, c, d, e, f),
                    None => MATRIX_IDENTITY,
                };
                ShadingKind::FunctionBased(FunctionBased::new(domain, matrix)?)
            }
            2 => {
                let coords = fixed::<4>(dict, "Coords", resolver)?
                    .ok_or_else(|| invalid("axial shading without /Coords"))?;
                let domain = fixed::<2>(dict, "Domain", resolver)?.unwrap_or([0.0, 1.0]);
                ShadingKind::Axial(Axial::new(coords, domain, extend(dict, resolver)?)?)
            }
            3 => {
                let coords = fixed::<6>(dict, "Coords", resolver)?
                    .ok_or_else(|| invalid("radial shading without /Coords"))?;
                let domain = fixed::<2>(dict, "Domain", resolver)?.unwrap_or([0.0, 1.0]);
                ShadingKind::Radial(Radial::new(coords, domain, extend(dict, resolver)?)?)
            }
            other => return Err(invalid(format!("unknown shading type {other}"))),
        };

        let inputs = if shading_type == 1 { 2 } else { 1 };
        if function.num_inputs() != inputs {
            return Err(invalid(format!(
                "shading type {shading_type} needs a {inputs}-input function, got {}",
                function.num_inputs()
            )));
        }
        if function.num_outputs() != colorspace.ncomponents() {
            return Err(invalid(format!(
                "function has {} outputs for a {}-component {} space",
                function.num_outputs(),
                colorspace.ncomponents(),
                colorspace.family()
            )));
        }

        let background = match numbers(dict, "Background", resolver)? {
            Some(comps) => Some(colorspace.to_rgb(&comps)?),
            None => None,
        };
        let bbox = fixed::<4>(dict, "BBox", resolver)?.map(|[a, b, c, d]| normalize_rect((a, b, c, d)));
        let anti_alias = match dict.get("AntiAlias") {
            Some(v) => resolver.resolve(v)?.as_bool()?,
            None => false,
        };

        Ok(Self {
            colorspace,
            background,
            bbox,
            anti_alias,
            kind,
            function,
        })
    }

    /// Shading type as a name, for diagnostics and traces.
    pub const fn kind_name(&self) -> &'static str {
        match self.kind {
            ShadingKind::FunctionBased(_) => "function",
            ShadingKind::Axial(_) => "axial",
            ShadingKind::Radial(_) => "radial",
        }
    }

    /// Color at a shading-space point, or `None` outside the gradient.
    fn color_at(&self, x: f64, y: f64, buf: &mut FunctionOutput) -> Option<Rgb> {
        if let Some((x0, y0, x1, y1)) = self.bbox
            && !((x0..=x1).contains(&x) && (y0..=y1).contains(&y))
        {
            return None;
        }
        match &self.kind {
            ShadingKind::FunctionBased(f) => {
                let input = f.input(x, y)?;
                self.function.evaluate_into(&input, buf);
            }
            ShadingKind::Axial(a) => {
                let t = a.parameter(x, y)?;
                self.function.evaluate_into(&[t], buf);
            }
            ShadingKind::Radial(r) => {
                let t = r.parameter(x, y)?;
                self.function.evaluate_into(&[t], buf);
            }
        }
        self.colorspace.to_rgb(buf).ok()
    }

    /// A painting context for this shading.
    ///
    /// `to_device` maps shading space to device space (the ctm for `sh`,
    /// pattern matrix times the page's base ctm for shading patterns).
    /// Returns `None` when the transform is singular, i.e. nothing is
    /// visible.
    pub fn paint_context(
        self: &Arc<Self>,
        to_device: Matrix,
        use_background: bool,
    ) -> Option<ShadingContext> {
        ShadingContext::new(Arc::clone(self), to_device, use_background)
    }
}

/// Integer pixel rectangle in device space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A shading fixed to a device transform.
#[derive(Debug, Clone)]
pub struct ShadingContext {
    shading: Arc<Shading>,
    to_device: Matrix,
    to_shading: Matrix,
    use_background: bool,
}

impl ShadingContext {
    pub fn new(shading: Arc<Shading>, to_device: Matrix, use_background: bool) -> Option<Self> {
        let to_shading = invert_matrix(to_device)?;
        Some(Self {
            shading,
            to_device,
            to_shading,
            use_background,
        })
    }

    pub fn shading(&self) -> &Shading {
        &self.shading
    }

    pub const fn to_device(&self) -> Matrix {
        self.to_device
    }

    pub const fn uses_background(&self) -> bool {
        self.use_background
    }

    /// Device-space bounds of the shading's `/BBox`, if it has one.
    pub fn device_bounds(&self) -> Option<Rect> {
        self.shading
            .bbox
            .map(|bbox| apply_matrix_rect(self.to_device, bbox))
    }

    fn pixel(&self, x: f64, y: f64, buf: &mut FunctionOutput) -> u32 {
        let (sx, sy) = apply_matrix_pt(self.to_shading, (x, y));
        match self.shading.color_at(sx, sy, buf) {
            Some(rgb) => rgb.to_argb(1.0),
            None if self.use_background => self
                .shading
                .background
                .map_or(0, |bg| bg.to_argb(1.0)),
            None => 0,
        }
    }

    /// ARGB color at a device-space point; 0 means transparent.
    pub fn sample(&self, x: f64, y: f64) -> u32 {
        self.pixel(x, y, &mut FunctionOutput::new())
    }

    /// Fill `out` with the pixels of `rect`, row by row, sampling at pixel
    /// centres. Extra rows that do not fit in `out` are skipped.
    pub fn fill(&self, rect: PixelRect, out: &mut [u32]) {
        let width = rect.width as usize;
        if width == 0 {
            return;
        }
        let mut buf = FunctionOutput::new();
        for (row, line) in out.chunks_exact_mut(width).take(rect.height as usize).enumerate() {
            let y = f64::from(rect.y) + row as f64 + 0.5;
            for (col, px) in line.iter_mut().enumerate() {
                let x = f64::from(rect.x) + col as f64 + 0.5;
                *px = self.pixel(x, y, &mut buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::resources::ObjectStore;
    use crate::model::objects::{PDFObject, dict_from};

    fn gray_ramp() -> Arc<PDFFunction> {
        Arc::new(
            PDFFunction::exponential(vec![0.0, 1.0], None, vec![0.0], vec![1.0], 1.0).unwrap(),
        )
    }

    fn nums(values: &[f64]) -> PDFObject {
        PDFObject::Array(values.iter().map(|&v| PDFObject::Real(v)).collect())
    }

    fn axial_dict(extra: Vec<(&str, PDFObject)>) -> PDFDict {
        let mut dict = dict_from([
            ("ShadingType", PDFObject::Int(2)),
            ("Coords", nums(&[0.0, 0.0, 100.0, 0.0])),
        ]);
        dict.extend(extra.into_iter().map(|(k, v)| (k.to_string(), v)));
        dict
    }

    #[test]
    fn test_axial_pixels() {
        let store = ObjectStore::new();
        let shading = Shading::from_dict(
            &axial_dict(vec![]),
            &store,
            ColorSpace::device_gray(),
            Some(gray_ramp()),
        )
        .unwrap();
        let ctx = Arc::new(shading).paint_context(MATRIX_IDENTITY, false).unwrap();
        assert_eq!(ctx.sample(0.0, 5.0), 0xFF00_0000);
        assert_eq!(ctx.sample(100.0, 5.0), 0xFFFF_FFFF);
        assert_eq!(ctx.sample(150.0, 5.0), 0);

        let mut out = vec![7u32; 4];
        ctx.fill(
            PixelRect {
                x: 98,
                y: 0,
                width: 4,
                height: 1,
            },
            &mut out,
        );
        assert_ne!(out[0], 0);
        assert_ne!(out[1], 0);
        assert_eq!(out[2], 0);
        assert_eq!(out[3], 0);
    }

    #[test]
    fn test_background_only_when_requested() {
        let store = ObjectStore::new();
        let shading = Arc::new(
            Shading::from_dict(
                &axial_dict(vec![("Background", nums(&[1.0]))]),
                &store,
                ColorSpace::device_gray(),
                Some(gray_ramp()),
            )
            .unwrap(),
        );
        let pattern = shading.paint_context(MATRIX_IDENTITY, true).unwrap();
        assert_eq!(pattern.sample(-10.0, 0.0), 0xFFFF_FFFF);
        let sh = shading.paint_context(MATRIX_IDENTITY, false).unwrap();
        assert_eq!(sh.sample(-10.0, 0.0), 0);
    }

    #[test]
    fn test_bbox_clips_in_shading_space() {
        let store = ObjectStore::new();
        let shading = Arc::new(
            Shading::from_dict(
                &axial_dict(vec![
                    ("BBox", nums(&[0.0, 0.0, 50.0, 10.0])),
                    ("Extend", PDFObject::Array(vec![PDFObject::Bool(true), PDFObject::Bool(true)])),
                ]),
                &store,
                ColorSpace::device_gray(),
                Some(gray_ramp()),
            )
            .unwrap(),
        );
        let ctx = shading.paint_context((2.0, 0.0, 0.0, 2.0, 0.0, 0.0), false).unwrap();
        assert_ne!(ctx.sample(90.0, 10.0), 0);
        assert_eq!(ctx.sample(110.0, 10.0), 0);
        assert_eq!(ctx.device_bounds(), Some((0.0, 0.0, 100.0, 20.0)));
    }

    #[test]
    fn test_mesh_shadings_are_unsupported() {
        let store = ObjectStore::new();
        let dict = dict_from([("ShadingType", PDFObject::Int(6))]);
        let err = Shading::from_dict(&dict, &store, ColorSpace::device_rgb(), None).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedFeature(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_function_output_must_match_space() {
        let store = ObjectStore::new();
        let err = Shading::from_dict(
            &axial_dict(vec![]),
            &store,
            ColorSpace::device_rgb(),
            Some(gray_ramp()),
        )
        .unwrap_err();
        assert!(matches!(err, RenderError::InvalidShading(_)));
    }

    #[test]
    fn test_degenerate_radial_with_extends() {
        let store = ObjectStore::new();
        let dict = dict_from([
            ("ShadingType", PDFObject::Int(3)),
            ("Coords", nums(&[5.0, 5.0, 3.0, 5.0, 5.0, 3.0])),
            ("Background", nums(&[0.5])),
        ]);
        let mut both = dict.clone();
        both.insert(
            "Extend".into(),
            PDFObject::Array(vec![PDFObject::Bool(true), PDFObject::Bool(true)]),
        );
        let extended = Arc::new(
            Shading::from_dict(&both, &store, ColorSpace::device_gray(), Some(gray_ramp())).unwrap(),
        );
        // domain start: t0 = 0 -> black
        let ctx = extended.paint_context(MATRIX_IDENTITY, true).unwrap();
        assert_eq!(ctx.sample(40.0, 40.0), 0xFF00_0000);

        let plain = Arc::new(
            Shading::from_dict(&dict, &store, ColorSpace::device_gray(), Some(gray_ramp())).unwrap(),
        );
        let ctx = plain.paint_context(MATRIX_IDENTITY, true).unwrap();
        assert_eq!(ctx.sample(5.0, 5.0), Rgb::gray(0.5).to_argb(1.0));
    }
}
