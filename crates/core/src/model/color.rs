//! Color spaces and conversion to device RGB.
//!
//! The device spaces are process-wide singletons ([`ColorSpace::device_gray`]
//! and friends). Everything else is built by the resolver in
//! [`crate::interp::colorspace`] and shared through `Arc`.

use crate::error::{RenderError, Result};
use crate::model::function::{FunctionOutput, PDFFunction};
use smallvec::{SmallVec, smallvec};
use std::sync::{Arc, LazyLock};

/// Color components as stored in the graphics state.
pub type Components = SmallVec<[f64; 4]>;

/// A device RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    pub const fn gray(v: f64) -> Self {
        Self::new(v, v, v)
    }

    fn clamped(r: f64, g: f64, b: f64) -> Self {
        Self::new(unit(r), unit(g), unit(b))
    }

    /// Pack into a non-premultiplied `0xAARRGGBB` pixel.
    pub fn to_argb(self, alpha: f64) -> u32 {
        let channel = |v: f64| (unit(v) * 255.0).round() as u32;
        (channel(alpha) << 24) | (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }
}

#[inline]
fn unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

static DEVICE_GRAY: LazyLock<Arc<ColorSpace>> = LazyLock::new(|| Arc::new(ColorSpace::DeviceGray));
static DEVICE_RGB: LazyLock<Arc<ColorSpace>> = LazyLock::new(|| Arc::new(ColorSpace::DeviceRGB));
static DEVICE_CMYK: LazyLock<Arc<ColorSpace>> = LazyLock::new(|| Arc::new(ColorSpace::DeviceCMYK));
static PATTERN: LazyLock<Arc<ColorSpace>> = LazyLock::new(|| Arc::new(ColorSpace::Pattern(None)));

/// A resolved color space.
#[derive(Debug)]
pub enum ColorSpace {
    DeviceGray,
    DeviceRGB,
    DeviceCMYK,
    CalGray(CalGray),
    CalRGB(CalRGB),
    Lab(Lab),
    /// ICC profiles are not interpreted; colors go through the alternate.
    ICCBased {
        n: usize,
        alternate: Arc<ColorSpace>,
        range: Vec<f64>,
    },
    Indexed(Indexed),
    /// Separation (one colorant) and DeviceN (several).
    Separation(Separation),
    /// Pattern space, optionally with the space of uncolored pattern tints.
    Pattern(Option<Arc<ColorSpace>>),
}

impl ColorSpace {
    pub fn device_gray() -> Arc<ColorSpace> {
        Arc::clone(&DEVICE_GRAY)
    }

    pub fn device_rgb() -> Arc<ColorSpace> {
        Arc::clone(&DEVICE_RGB)
    }

    pub fn device_cmyk() -> Arc<ColorSpace> {
        Arc::clone(&DEVICE_CMYK)
    }

    /// The bare `/Pattern` space.
    pub fn pattern() -> Arc<ColorSpace> {
        Arc::clone(&PATTERN)
    }

    /// Device space with `n` components, as used for ICC fallbacks.
    pub fn device_for_components(n: usize) -> Option<Arc<ColorSpace>> {
        match n {
            1 => Some(Self::device_gray()),
            3 => Some(Self::device_rgb()),
            4 => Some(Self::device_cmyk()),
            _ => None,
        }
    }

    /// Family name as written in a descriptor.
    pub const fn family(&self) -> &'static str {
        match self {
            Self::DeviceGray => "DeviceGray",
            Self::DeviceRGB => "DeviceRGB",
            Self::DeviceCMYK => "DeviceCMYK",
            Self::CalGray(_) => "CalGray",
            Self::CalRGB(_) => "CalRGB",
            Self::Lab(_) => "Lab",
            Self::ICCBased { .. } => "ICCBased",
            Self::Indexed(_) => "Indexed",
            Self::Separation(s) if s.names.len() == 1 => "Separation",
            Self::Separation(_) => "DeviceN",
            Self::Pattern(_) => "Pattern",
        }
    }

    /// Number of color components an operator like `sc` takes.
    pub fn ncomponents(&self) -> usize {
        match self {
            Self::DeviceGray | Self::CalGray(_) | Self::Indexed(_) => 1,
            Self::DeviceRGB | Self::CalRGB(_) | Self::Lab(_) => 3,
            Self::DeviceCMYK => 4,
            Self::ICCBased { n, .. } => *n,
            Self::Separation(s) => s.names.len(),
            Self::Pattern(base) => base.as_ref().map_or(0, |b| b.ncomponents()),
        }
    }

    /// Valid range of component `i`.
    pub fn component_range(&self, i: usize) -> (f64, f64) {
        match self {
            Self::Lab(lab) => match i {
                0 => (0.0, 100.0),
                1 => (lab.range[0], lab.range[1]),
                _ => (lab.range[2], lab.range[3]),
            },
            Self::ICCBased { range, .. } => match range.get(2 * i..2 * i + 2) {
                Some(pair) => (pair[0], pair[1]),
                None => (0.0, 1.0),
            },
            Self::Indexed(idx) => (0.0, idx.hival as f64),
            Self::Pattern(Some(base)) => base.component_range(i),
            _ => (0.0, 1.0),
        }
    }

    /// Initial color after selecting this space with `cs`/`CS`.
    pub fn default_color(&self) -> Components {
        match self {
            Self::DeviceCMYK => smallvec![0.0, 0.0, 0.0, 1.0],
            Self::Separation(s) => SmallVec::from_elem(1.0, s.names.len()),
            Self::Pattern(_) => SmallVec::new(),
            Self::Lab(_) | Self::ICCBased { .. } => (0..self.ncomponents())
                .map(|i| {
                    let (lo, hi) = self.component_range(i);
                    0.0f64.max(lo).min(hi)
                })
                .collect(),
            _ => SmallVec::from_elem(0.0, self.ncomponents()),
        }
    }

    /// True for Separation/DeviceN spaces whose colorants are all `None`;
    /// painting in such a space has no visible effect.
    pub fn is_no_draw(&self) -> bool {
        matches!(self, Self::Separation(s) if s.all_none)
    }

    pub const fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern(_))
    }

    /// Convert components to device RGB.
    ///
    /// Missing components read as zero. Pattern spaces have no color of
    /// their own and always fail with `IllegalColorSpaceUsage`.
    pub fn to_rgb(&self, comps: &[f64]) -> Result<Rgb> {
        let c = |i: usize| comps.get(i).copied().unwrap_or(0.0);
        Ok(match self {
            Self::DeviceGray => Rgb::gray(unit(c(0))),
            Self::DeviceRGB => Rgb::clamped(c(0), c(1), c(2)),
            Self::DeviceCMYK => cmyk_to_rgb(c(0), c(1), c(2), c(3)),
            Self::CalGray(cal) => cal.to_rgb(c(0)),
            Self::CalRGB(cal) => cal.to_rgb(c(0), c(1), c(2)),
            Self::Lab(lab) => lab.to_rgb(c(0), c(1), c(2)),
            Self::ICCBased { alternate, .. } => alternate.to_rgb(comps)?,
            Self::Indexed(idx) => idx.lookup(c(0)),
            Self::Separation(sep) => sep.to_rgb(comps)?,
            Self::Pattern(_) => {
                return Err(RenderError::IllegalColorSpaceUsage(
                    "a Pattern color space has no color values".into(),
                ));
            }
        })
    }
}

fn cmyk_to_rgb(c: f64, m: f64, y: f64, k: f64) -> Rgb {
    let k = unit(k);
    Rgb::clamped(
        (1.0 - unit(c)) * (1.0 - k),
        (1.0 - unit(m)) * (1.0 - k),
        (1.0 - unit(y)) * (1.0 - k),
    )
}

// ============================================================================
// CIE-based spaces
// ============================================================================

/// D65 reference white used by sRGB.
const D65: [f64; 3] = [0.9505, 1.0, 1.089];

/// XYZ relative to `white` to gamma-encoded sRGB.
fn xyz_to_rgb(xyz: [f64; 3], white: [f64; 3]) -> Rgb {
    // von Kries scaling to D65
    let x = xyz[0] * D65[0] / white[0].max(1e-6);
    let y = xyz[1] * D65[1] / white[1].max(1e-6);
    let z = xyz[2] * D65[2] / white[2].max(1e-6);
    let r = 3.2406 * x - 1.5372 * y - 0.4986 * z;
    let g = -0.9689 * x + 1.8758 * y + 0.0415 * z;
    let b = 0.0557 * x - 0.2040 * y + 1.0570 * z;
    Rgb::clamped(srgb_encode(r), srgb_encode(g), srgb_encode(b))
}

fn srgb_encode(v: f64) -> f64 {
    let v = unit(v);
    if v <= 0.003_130_8 {
        12.92 * v
    } else {
        1.055 * v.powf(1.0 / 2.4) - 0.055
    }
}

#[derive(Debug, Clone)]
pub struct CalGray {
    pub white_point: [f64; 3],
    pub gamma: f64,
}

impl CalGray {
    fn to_rgb(&self, a: f64) -> Rgb {
        let l = unit(a).powf(self.gamma);
        let w = self.white_point;
        xyz_to_rgb([w[0] * l, w[1] * l, w[2] * l], w)
    }
}

#[derive(Debug, Clone)]
pub struct CalRGB {
    pub white_point: [f64; 3],
    pub gamma: [f64; 3],
    /// Column-major `[Xa Ya Za Xb Yb Zb Xc Yc Zc]`.
    pub matrix: [f64; 9],
}

impl CalRGB {
    fn to_rgb(&self, a: f64, b: f64, c: f64) -> Rgb {
        let ag = unit(a).powf(self.gamma[0]);
        let bg = unit(b).powf(self.gamma[1]);
        let cg = unit(c).powf(self.gamma[2]);
        let m = &self.matrix;
        let xyz = [
            m[0] * ag + m[3] * bg + m[6] * cg,
            m[1] * ag + m[4] * bg + m[7] * cg,
            m[2] * ag + m[5] * bg + m[8] * cg,
        ];
        xyz_to_rgb(xyz, self.white_point)
    }
}

#[derive(Debug, Clone)]
pub struct Lab {
    pub white_point: [f64; 3],
    /// `[amin amax bmin bmax]`
    pub range: [f64; 4],
}

impl Lab {
    fn to_rgb(&self, l: f64, a: f64, b: f64) -> Rgb {
        let l = l.clamp(0.0, 100.0);
        // a hand-built range may be reversed, which clamp rejects
        let a = a.max(self.range[0]).min(self.range[1]);
        let b = b.max(self.range[2]).min(self.range[3]);
        let m = (l + 16.0) / 116.0;
        let g = |x: f64| {
            if x >= 6.0 / 29.0 {
                x * x * x
            } else {
                108.0 / 841.0 * (x - 4.0 / 29.0)
            }
        };
        let w = self.white_point;
        let xyz = [w[0] * g(m + a / 500.0), w[1] * g(m), w[2] * g(m - b / 200.0)];
        xyz_to_rgb(xyz, w)
    }
}

// ============================================================================
// Indexed
// ============================================================================

/// Indexed space with its lookup table expanded to device RGB.
#[derive(Debug)]
pub struct Indexed {
    pub base: Arc<ColorSpace>,
    pub hival: usize,
    table: Vec<Rgb>,
}

impl Indexed {
    /// Build the space and expand every table entry through `base`.
    ///
    /// Each stored byte `v` of component `j` maps to
    /// `min_j + v * (max_j - min_j) / 255` before the base conversion.
    pub fn new(base: Arc<ColorSpace>, hival: i64, lookup: &[u8]) -> Result<Self> {
        if base.is_pattern() {
            return Err(RenderError::InvalidColorSpaceDefinition(
                "Indexed base cannot be a Pattern space".into(),
            ));
        }
        if hival < 0 {
            return Err(RenderError::InvalidColorSpaceDefinition(format!(
                "Indexed hival {hival}"
            )));
        }
        let hival = hival.min(255) as usize;
        let n = base.ncomponents();
        let needed = (hival + 1) * n;
        if lookup.len() < needed {
            return Err(RenderError::InvalidColorSpaceDefinition(format!(
                "Indexed lookup has {} bytes, need {needed}",
                lookup.len()
            )));
        }
        let ranges: SmallVec<[(f64, f64); 4]> = (0..n).map(|j| base.component_range(j)).collect();
        let mut comps: Components = SmallVec::from_elem(0.0, n);
        let table = lookup[..needed]
            .chunks_exact(n)
            .map(|entry| {
                for (j, &byte) in entry.iter().enumerate() {
                    let (lo, hi) = ranges[j];
                    comps[j] = lo + f64::from(byte) * (hi - lo) / 255.0;
                }
                base.to_rgb(&comps)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { base, hival, table })
    }

    fn lookup(&self, index: f64) -> Rgb {
        let i = if index.is_nan() { 0.0 } else { index.round() };
        let i = i.clamp(0.0, self.hival as f64) as usize;
        self.table[i]
    }

    /// The expanded table.
    pub fn table(&self) -> &[Rgb] {
        &self.table
    }
}

// ============================================================================
// Separation / DeviceN
// ============================================================================

#[derive(Debug)]
pub struct Separation {
    pub names: Vec<String>,
    pub alternate: Arc<ColorSpace>,
    pub tint_transform: Arc<PDFFunction>,
    all_none: bool,
}

impl Separation {
    pub fn new(
        names: Vec<String>,
        alternate: Arc<ColorSpace>,
        tint_transform: Arc<PDFFunction>,
    ) -> Result<Self> {
        if names.is_empty() {
            return Err(RenderError::InvalidColorSpaceDefinition(
                "DeviceN without colorants".into(),
            ));
        }
        if alternate.is_pattern() {
            return Err(RenderError::InvalidColorSpaceDefinition(
                "alternate space cannot be a Pattern space".into(),
            ));
        }
        if tint_transform.num_outputs() != alternate.ncomponents() {
            tracing::warn!(
                outputs = tint_transform.num_outputs(),
                alternate = alternate.family(),
                "tint transform output count does not match alternate space"
            );
        }
        let all_none = names.iter().all(|n| n == "None");
        Ok(Self {
            names,
            alternate,
            tint_transform,
            all_none,
        })
    }

    fn to_rgb(&self, comps: &[f64]) -> Result<Rgb> {
        let mut out = FunctionOutput::new();
        self.tint_transform.evaluate_into(comps, &mut out);
        self.alternate.to_rgb(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_singletons_are_shared() {
        assert!(Arc::ptr_eq(&ColorSpace::device_rgb(), &ColorSpace::device_rgb()));
        assert!(!Arc::ptr_eq(&ColorSpace::device_rgb(), &ColorSpace::device_gray()));
    }

    #[test]
    fn test_device_conversions() {
        let rgb = ColorSpace::device_rgb().to_rgb(&[1.0, 0.5, 2.0]).unwrap();
        assert_eq!(rgb, Rgb::new(1.0, 0.5, 1.0));
        let cmyk = ColorSpace::device_cmyk().to_rgb(&[0.0, 1.0, 1.0, 0.0]).unwrap();
        assert_eq!(cmyk, Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(
            ColorSpace::device_cmyk().default_color().as_slice(),
            &[0.0, 0.0, 0.0, 1.0]
        );
    }

    #[test]
    fn test_indexed_gray_table() {
        let idx = Indexed::new(ColorSpace::device_gray(), 1, &[0x00, 0xFF]).unwrap();
        let space = ColorSpace::Indexed(idx);
        assert_eq!(space.to_rgb(&[0.0]).unwrap(), Rgb::gray(0.0));
        assert_eq!(space.to_rgb(&[1.0]).unwrap(), Rgb::gray(1.0));
        // out of range indices clamp to hival
        assert_eq!(space.to_rgb(&[7.0]).unwrap(), Rgb::gray(1.0));
    }

    #[test]
    fn test_indexed_short_lookup_is_rejected() {
        let err = Indexed::new(ColorSpace::device_rgb(), 1, &[0, 0, 0, 255]).unwrap_err();
        assert!(matches!(err, RenderError::InvalidColorSpaceDefinition(_)));
    }

    #[test]
    fn test_pattern_conversion_is_illegal() {
        let err = ColorSpace::pattern().to_rgb(&[]).unwrap_err();
        assert!(matches!(err, RenderError::IllegalColorSpaceUsage(_)));
    }

    #[test]
    fn test_separation_tint_and_none() {
        let tint = PDFFunction::exponential(
            vec![0.0, 1.0],
            None,
            vec![1.0, 1.0, 1.0],
            vec![1.0, 0.0, 0.0],
            1.0,
        )
        .unwrap();
        let sep = Separation::new(
            vec!["Spot".into()],
            ColorSpace::device_rgb(),
            Arc::new(tint.clone()),
        )
        .unwrap();
        let space = ColorSpace::Separation(sep);
        assert_eq!(space.to_rgb(&[1.0]).unwrap(), Rgb::new(1.0, 0.0, 0.0));
        assert_eq!(space.default_color().as_slice(), &[1.0]);
        assert!(!space.is_no_draw());

        let none = Separation::new(vec!["None".into()], ColorSpace::device_rgb(), Arc::new(tint))
            .unwrap();
        assert!(ColorSpace::Separation(none).is_no_draw());
    }

    #[test]
    fn test_lab_white() {
        let lab = ColorSpace::Lab(Lab {
            white_point: [0.9505, 1.0, 1.089],
            range: [-100.0, 100.0, -100.0, 100.0],
        });
        let white = lab.to_rgb(&[100.0, 0.0, 0.0]).unwrap();
        assert!((white.r - 1.0).abs() < 1e-3);
        assert!((white.g - 1.0).abs() < 1e-3);
        assert!((white.b - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_lab_with_reversed_range_does_not_panic() {
        let lab = ColorSpace::Lab(Lab {
            white_point: [0.9505, 1.0, 1.089],
            range: [100.0, -100.0, -100.0, 100.0],
        });
        assert_eq!(lab.default_color().len(), 3);
        assert!(lab.to_rgb(&[50.0, 0.0, 0.0]).is_ok());
    }

    #[test]
    fn test_argb_packing() {
        assert_eq!(Rgb::new(1.0, 0.0, 0.0).to_argb(1.0), 0xFFFF_0000);
        assert_eq!(Rgb::gray(0.0).to_argb(0.0), 0);
    }
}
