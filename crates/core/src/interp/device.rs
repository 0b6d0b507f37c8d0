//! Drawing surface - output interface for content-stream interpretation.
//!
//! The interpreter never rasterizes. Everything it paints arrives at a
//! [`DrawingSurface`] as one of a handful of calls. Coordinates follow two
//! conventions:
//! - paths given to `fill_path`/`stroke_path` and glyph transforms are in
//!   user space; the surface receives the matching ctm via `set_transform`
//!   whenever it changes
//! - clip paths, shading/tile areas and raster placements are in device
//!   space
//!
//! [`RecordingSurface`] records every call as a [`SurfaceCall`] and is what
//! the CLI and the tests use.

use crate::model::color::Rgb;
use crate::model::objects::PDFDict;
use crate::model::path::{ClipPath, FillRule, Path, PathSegment};
use crate::model::state::{BlendMode, Dash, LineCap, LineJoin, TextRenderMode};
use crate::shading::{ShadingContext, TileSpec};
use crate::utils::{MATRIX_IDENTITY, Matrix, Rect, apply_matrix_rect};
use std::fmt;

/// An ARGB pixel buffer, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    /// Non-premultiplied `0xAARRGGBB`, `width * height` entries.
    pub pixels: Vec<u32>,
}

impl Raster {
    /// A fully transparent raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Fill the pixels whose centres fall inside `rect` (device units).
    pub fn fill_rect(&mut self, rect: Rect, argb: u32) {
        let (x0, y0, x1, y1) = rect;
        let clamp = |v: f64, max: u32| (v - 0.5).ceil().clamp(0.0, f64::from(max)) as u32;
        let (cx0, cx1) = (clamp(x0, self.width), clamp(x1, self.width));
        let (cy0, cy1) = (clamp(y0, self.height), clamp(y1, self.height));
        let width = self.width as usize;
        for y in cy0..cy1 {
            let row = y as usize * width;
            self.pixels[row + cx0 as usize..row + cx1 as usize].fill(argb);
        }
    }
}

/// Color, opacity and blend mode of a paint operation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Paint {
    pub color: Rgb,
    pub alpha: f64,
    pub blend: BlendMode,
}

impl Paint {
    pub fn argb(&self) -> u32 {
        self.color.to_argb(self.alpha)
    }
}

/// Stroke parameters, in user space units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StrokeStyle {
    pub width: f64,
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f64,
    pub dash: Dash,
}

/// One glyph of a shown string.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PositionedGlyph {
    pub code: u32,
    pub gid: u32,
    /// Glyph space (1 unit = 1 em) to user space.
    pub transform: Matrix,
}

/// Glyphs shown by one text operator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GlyphRun {
    /// Font resource name
    pub font: String,
    pub size: f64,
    pub render_mode: TextRenderMode,
    pub glyphs: Vec<PositionedGlyph>,
    pub fill: Option<Paint>,
    pub stroke: Option<Paint>,
}

/// Output interface of the interpreter.
///
/// Every method has a no-op default so surfaces implement only what they
/// use.
pub trait DrawingSurface {
    /// The ctm changed.
    fn set_transform(&mut self, _ctm: Matrix) {}

    /// The clip changed; `None` removes clipping.
    fn clip_changed(&mut self, _clip: Option<&ClipPath>) {}

    /// Fill a user-space path.
    fn fill_path(&mut self, _path: &Path, _rule: FillRule, _paint: &Paint) {}

    /// Stroke a user-space path.
    fn stroke_path(&mut self, _path: &Path, _style: &StrokeStyle, _paint: &Paint) {}

    /// Draw an image; `placement` maps the unit square to device space.
    fn draw_raster(&mut self, _raster: &Raster, _placement: Matrix, _alpha: f64) {}

    fn draw_glyph_run(&mut self, _run: &GlyphRun) {}

    /// Paint a shading over `area` (device space), or over the current
    /// clip when `area` is `None`.
    fn fill_shading(&mut self, _shading: &ShadingContext, _area: Option<&Path>, _alpha: f64) {}

    /// Fill the device-space `area` with copies of `tile`.
    fn fill_tiled(&mut self, _tile: &Raster, _spec: &TileSpec, _area: &Path) {}

    /// An offscreen target for rendering a pattern tile. Surfaces that
    /// return `None` do not receive tiling pattern fills.
    fn tile_surface(&mut self, _width: u32, _height: u32) -> Option<Box<dyn RasterSurface>> {
        None
    }

    fn begin_marked(&mut self, _tag: &str, _properties: Option<&PDFDict>) {}

    fn end_marked(&mut self) {}

    /// Device-space extent of the surface, if bounded.
    fn bounds(&self) -> Option<Rect> {
        None
    }
}

/// A drawing surface that produces a raster.
pub trait RasterSurface: DrawingSurface {
    fn into_raster(self: Box<Self>) -> Raster;
}

/// Coarse raster target: every fill or stroke paints the device-space
/// bounding box of its path, clipped to the clip bounds. Glyphs and images
/// are ignored.
#[derive(Debug)]
pub struct BoundsRaster {
    raster: Raster,
    ctm: Matrix,
    clip: Option<Rect>,
}

impl BoundsRaster {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            raster: Raster::new(width, height),
            ctm: MATRIX_IDENTITY,
            clip: None,
        }
    }

    fn paint_bounds(&mut self, bounds: Rect, paint: &Paint) {
        let (mut x0, mut y0, mut x1, mut y1) = bounds;
        if let Some((cx0, cy0, cx1, cy1)) = self.clip {
            x0 = x0.max(cx0);
            y0 = y0.max(cy0);
            x1 = x1.min(cx1);
            y1 = y1.min(cy1);
        }
        if x1 > x0 && y1 > y0 {
            self.raster.fill_rect((x0, y0, x1, y1), paint.argb());
        }
    }
}

impl DrawingSurface for BoundsRaster {
    fn set_transform(&mut self, ctm: Matrix) {
        self.ctm = ctm;
    }

    fn clip_changed(&mut self, clip: Option<&ClipPath>) {
        self.clip = clip.map(|c| c.bounds);
    }

    fn fill_path(&mut self, path: &Path, _rule: FillRule, paint: &Paint) {
        if let Some(bounds) = path.bounds() {
            self.paint_bounds(apply_matrix_rect(self.ctm, bounds), paint);
        }
    }

    fn stroke_path(&mut self, path: &Path, style: &StrokeStyle, paint: &Paint) {
        if let Some((x0, y0, x1, y1)) = path.bounds() {
            let half = style.width / 2.0;
            let bounds = (x0 - half, y0 - half, x1 + half, y1 + half);
            self.paint_bounds(apply_matrix_rect(self.ctm, bounds), paint);
        }
    }

    fn bounds(&self) -> Option<Rect> {
        Some((
            0.0,
            0.0,
            f64::from(self.raster.width),
            f64::from(self.raster.height),
        ))
    }
}

impl RasterSurface for BoundsRaster {
    fn into_raster(self: Box<Self>) -> Raster {
        self.raster
    }
}

/// A recorded drawing-surface call.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "call", rename_all = "snake_case"))]
pub enum SurfaceCall {
    SetTransform {
        ctm: Matrix,
    },
    ClipChanged {
        bounds: Option<Rect>,
        paths: usize,
    },
    FillPath {
        path: Path,
        rule: FillRule,
        paint: Paint,
    },
    StrokePath {
        path: Path,
        style: StrokeStyle,
        paint: Paint,
    },
    DrawRaster {
        width: u32,
        height: u32,
        placement: Matrix,
        alpha: f64,
    },
    DrawGlyphRun {
        run: GlyphRun,
    },
    FillShading {
        shading: &'static str,
        area: Option<Rect>,
        alpha: f64,
    },
    FillTiled {
        width: u32,
        height: u32,
        spec: TileSpec,
        area: Option<Rect>,
    },
    TileSurface {
        width: u32,
        height: u32,
    },
    BeginMarked {
        tag: String,
    },
    EndMarked,
}

fn fmt_path(f: &mut fmt::Formatter<'_>, path: &Path) -> fmt::Result {
    for (i, seg) in path.segments().iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        match seg {
            PathSegment::MoveTo((x, y)) => write!(f, "{x} {y} m")?,
            PathSegment::LineTo((x, y)) => write!(f, "{x} {y} l")?,
            PathSegment::CurveTo((x1, y1), (x2, y2), (x3, y3)) => {
                write!(f, "{x1} {y1} {x2} {y2} {x3} {y3} c")?
            }
            PathSegment::Close => f.write_str("h")?,
        }
    }
    Ok(())
}

fn fmt_paint(f: &mut fmt::Formatter<'_>, paint: &Paint) -> fmt::Result {
    write!(f, "#{:08x}", paint.argb())?;
    if paint.blend != BlendMode::Normal {
        write!(f, " {:?}", paint.blend)?;
    }
    Ok(())
}

impl fmt::Display for SurfaceCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetTransform { ctm } => write!(f, "set_transform {ctm:?}"),
            Self::ClipChanged { bounds: None, .. } => f.write_str("clip_changed none"),
            Self::ClipChanged {
                bounds: Some(b),
                paths,
            } => write!(f, "clip_changed {b:?} ({paths} paths)"),
            Self::FillPath { path, rule, paint } => {
                write!(f, "fill_path {rule:?} ")?;
                fmt_paint(f, paint)?;
                f.write_str(" [")?;
                fmt_path(f, path)?;
                f.write_str("]")
            }
            Self::StrokePath { path, style, paint } => {
                write!(f, "stroke_path w={} ", style.width)?;
                fmt_paint(f, paint)?;
                f.write_str(" [")?;
                fmt_path(f, path)?;
                f.write_str("]")
            }
            Self::DrawRaster {
                width,
                height,
                placement,
                alpha,
            } => write!(f, "draw_raster {width}x{height} {placement:?} alpha={alpha}"),
            Self::DrawGlyphRun { run } => {
                let codes: Vec<String> = run.glyphs.iter().map(|g| g.code.to_string()).collect();
                write!(
                    f,
                    "draw_glyph_run /{} {} {:?} [{}]",
                    run.font,
                    run.size,
                    run.render_mode,
                    codes.join(" ")
                )
            }
            Self::FillShading {
                shading,
                area,
                alpha,
            } => write!(f, "fill_shading {shading} area={area:?} alpha={alpha}"),
            Self::FillTiled {
                width,
                height,
                spec,
                area,
            } => write!(
                f,
                "fill_tiled {width}x{height} step={:?},{:?} area={area:?}",
                spec.step_x, spec.step_y
            ),
            Self::TileSurface { width, height } => write!(f, "tile_surface {width}x{height}"),
            Self::BeginMarked { tag } => write!(f, "begin_marked /{tag}"),
            Self::EndMarked => f.write_str("end_marked"),
        }
    }
}

/// A surface that records every call.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    calls: Vec<SurfaceCall>,
    bounds: Option<Rect>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A surface reporting `bounds` as its device extent.
    pub fn with_bounds(bounds: Rect) -> Self {
        Self {
            calls: Vec::new(),
            bounds: Some(bounds),
        }
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    pub fn into_calls(self) -> Vec<SurfaceCall> {
        self.calls
    }

    /// Number of recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }
}

impl DrawingSurface for RecordingSurface {
    fn set_transform(&mut self, ctm: Matrix) {
        self.calls.push(SurfaceCall::SetTransform { ctm });
    }

    fn clip_changed(&mut self, clip: Option<&ClipPath>) {
        self.calls.push(SurfaceCall::ClipChanged {
            bounds: clip.map(|c| c.bounds),
            paths: clip.map_or(0, |c| c.paths.len()),
        });
    }

    fn fill_path(&mut self, path: &Path, rule: FillRule, paint: &Paint) {
        self.calls.push(SurfaceCall::FillPath {
            path: path.clone(),
            rule,
            paint: *paint,
        });
    }

    fn stroke_path(&mut self, path: &Path, style: &StrokeStyle, paint: &Paint) {
        self.calls.push(SurfaceCall::StrokePath {
            path: path.clone(),
            style: style.clone(),
            paint: *paint,
        });
    }

    fn draw_raster(&mut self, raster: &Raster, placement: Matrix, alpha: f64) {
        self.calls.push(SurfaceCall::DrawRaster {
            width: raster.width,
            height: raster.height,
            placement,
            alpha,
        });
    }

    fn draw_glyph_run(&mut self, run: &GlyphRun) {
        self.calls.push(SurfaceCall::DrawGlyphRun { run: run.clone() });
    }

    fn fill_shading(&mut self, shading: &ShadingContext, area: Option<&Path>, alpha: f64) {
        self.calls.push(SurfaceCall::FillShading {
            shading: shading.shading().kind_name(),
            area: area.and_then(Path::bounds),
            alpha,
        });
    }

    fn fill_tiled(&mut self, tile: &Raster, spec: &TileSpec, area: &Path) {
        self.calls.push(SurfaceCall::FillTiled {
            width: tile.width,
            height: tile.height,
            spec: *spec,
            area: area.bounds(),
        });
    }

    fn tile_surface(&mut self, width: u32, height: u32) -> Option<Box<dyn RasterSurface>> {
        self.calls.push(SurfaceCall::TileSurface { width, height });
        Some(Box::new(BoundsRaster::new(width, height)))
    }

    fn begin_marked(&mut self, tag: &str, _properties: Option<&PDFDict>) {
        self.calls.push(SurfaceCall::BeginMarked {
            tag: tag.to_string(),
        });
    }

    fn end_marked(&mut self) {
        self.calls.push(SurfaceCall::EndMarked);
    }

    fn bounds(&self) -> Option<Rect> {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red() -> Paint {
        Paint {
            color: Rgb::new(1.0, 0.0, 0.0),
            alpha: 1.0,
            blend: BlendMode::Normal,
        }
    }

    #[test]
    fn test_raster_fill_rect_uses_pixel_centres() {
        let mut raster = Raster::new(4, 4);
        raster.fill_rect((0.6, 1.0, 3.4, 2.0), 0xFF00_00FF);
        assert_eq!(raster.pixel(0, 1), Some(0));
        assert_eq!(raster.pixel(1, 1), Some(0xFF00_00FF));
        assert_eq!(raster.pixel(2, 1), Some(0xFF00_00FF));
        assert_eq!(raster.pixel(3, 1), Some(0));
        assert_eq!(raster.pixel(1, 2), Some(0));
        assert_eq!(raster.pixel(9, 9), None);
    }

    #[test]
    fn test_bounds_raster_respects_transform_and_clip() {
        let mut surface = Box::new(BoundsRaster::new(10, 10));
        surface.set_transform((2.0, 0.0, 0.0, 2.0, 0.0, 0.0));
        surface.clip_changed(Some(&ClipPath::from_rect((0.0, 0.0, 4.0, 10.0))));
        surface.fill_path(&Path::from_rect((0.0, 0.0, 3.0, 3.0)), FillRule::NonZero, &red());
        let raster = surface.into_raster();
        assert_eq!(raster.pixel(3, 5), Some(0xFFFF_0000));
        assert_eq!(raster.pixel(4, 5), Some(0));
        assert_eq!(raster.pixel(3, 6), Some(0));
    }

    #[test]
    fn test_recording_surface_display() {
        let mut surface = RecordingSurface::new();
        let mut path = Path::new();
        path.move_to((1.0, 1.0));
        path.line_to((2.0, 2.0));
        surface.fill_path(&path, FillRule::EvenOdd, &red());
        surface.clip_changed(None);
        let lines: Vec<String> = surface.calls().iter().map(ToString::to_string).collect();
        assert_eq!(lines[0], "fill_path EvenOdd #ffff0000 [1 1 m 2 2 l]");
        assert_eq!(lines[1], "clip_changed none");
        assert_eq!(
            surface.count(|c| matches!(c, SurfaceCall::FillPath { .. })),
            1
        );
    }
}
