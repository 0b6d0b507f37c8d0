//! Tiling patterns (PatternType 1).
//!
//! The pattern cell is rendered once by a nested interpreter into a raster
//! tile; fills then repeat that tile at the pattern's step.

use crate::error::{RenderError, Result};
use crate::interp::resources::ResourceResolver;
use crate::model::objects::{PDFDict, PDFStream};
use crate::utils::{Matrix, Point, Rect, apply_matrix_norm, mult_matrix, normalize_rect};
use bytes::Bytes;

/// Whether the pattern cell carries its own colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PaintType {
    Colored,
    /// Painted with the fill color given to `scn`.
    Uncolored,
}

/// A parsed tiling pattern stream.
#[derive(Debug, Clone)]
pub struct TilingPattern {
    pub bbox: Rect,
    pub x_step: f64,
    pub y_step: f64,
    pub paint_type: PaintType,
    pub tiling_type: i64,
    /// Pattern space to the default space of the page.
    pub matrix: Matrix,
    /// Decoded content stream of the cell.
    pub content: Bytes,
    pub resources: PDFDict,
}

/// Placement of a rendered tile in device space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TileSpec {
    /// Maps tile pixel coordinates (y down) to device space.
    pub placement: Matrix,
    /// Device-space offset between horizontally adjacent tiles.
    pub step_x: Point,
    /// Device-space offset between vertically adjacent tiles.
    pub step_y: Point,
}

/// Raster size and transforms for rendering one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGeometry {
    pub width: u32,
    pub height: u32,
    /// Initial ctm of the nested interpreter: pattern space to tile pixels.
    pub cell_ctm: Matrix,
    pub spec: TileSpec,
}

impl TilingPattern {
    pub fn from_stream(stream: &PDFStream, resolver: &dyn ResourceResolver) -> Result<Self> {
        let attrs = &stream.attrs;
        let num = |key: &str| -> Result<f64> {
            let obj = attrs
                .get(key)
                .ok_or_else(|| RenderError::KeyError(format!("tiling pattern /{key}")))?;
            resolver.resolve(obj)?.as_num()
        };
        let bbox = match attrs.get("BBox") {
            Some(obj) => match resolver.resolve_num_array(obj)?[..] {
                [a, b, c, d] => normalize_rect((a, b, c, d)),
                _ => return Err(RenderError::KeyError("tiling pattern /BBox".into())),
            },
            None => return Err(RenderError::KeyError("tiling pattern /BBox".into())),
        };
        let paint_type = match num("PaintType")? as i64 {
            1 => PaintType::Colored,
            2 => PaintType::Uncolored,
            other => {
                return Err(RenderError::UnsupportedFeature(format!(
                    "tiling pattern PaintType {other}"
                )));
            }
        };
        let matrix = match attrs.get("Matrix") {
            Some(obj) => match resolver.resolve_num_array(obj)?[..] {
                [a, b, c, d, e, f] => (a, b, c, d, e, f),
                _ => return Err(RenderError::KeyError("tiling pattern /Matrix".into())),
            },
            None => crate::utils::MATRIX_IDENTITY,
        };
        let resources = match attrs.get("Resources") {
            Some(obj) => resolver.resolve_dict(obj)?,
            None => PDFDict::new(),
        };
        Ok(Self {
            bbox,
            x_step: num("XStep")?,
            y_step: num("YStep")?,
            paint_type,
            tiling_type: num("TilingType").map_or(1, |t| t as i64),
            matrix,
            content: Bytes::from(resolver.stream_data(stream)?),
            resources,
        })
    }

    /// Size and placement of the tile raster.
    ///
    /// `base_ctm` is the ctm of the page's default space. The raster covers
    /// `/BBox` at device resolution, scaled down to stay within
    /// `max_pixels`. Returns `None` for empty or degenerate cells.
    pub fn geometry(&self, base_ctm: Matrix, max_pixels: u64) -> Option<TileGeometry> {
        let to_device = mult_matrix(self.matrix, base_ctm);
        let (x0, y0, x1, y1) = self.bbox;
        let (w, h) = (x1 - x0, y1 - y0);
        let sx = to_device.0.hypot(to_device.1);
        let sy = to_device.2.hypot(to_device.3);
        if w <= 0.0 || h <= 0.0 || sx <= 0.0 || sy <= 0.0 || self.x_step == 0.0 || self.y_step == 0.0 {
            return None;
        }
        let mut width = (w * sx).ceil().max(1.0);
        let mut height = (h * sy).ceil().max(1.0);
        let max_pixels = max_pixels.max(1) as f64;
        if width * height > max_pixels {
            let k = (max_pixels / (width * height)).sqrt();
            width = (width * k).floor().max(1.0);
            height = (height * k).floor().max(1.0);
        }
        let kx = width / w;
        let ky = height / h;
        // pattern space -> pixels, y down, bbox top-left at the origin
        let cell_ctm = (kx, 0.0, 0.0, -ky, -x0 * kx, y1 * ky);
        let pixel_to_cell = (1.0 / kx, 0.0, 0.0, -1.0 / ky, x0, y1);
        Some(TileGeometry {
            width: width as u32,
            height: height as u32,
            cell_ctm,
            spec: TileSpec {
                placement: mult_matrix(pixel_to_cell, to_device),
                step_x: apply_matrix_norm(to_device, (self.x_step, 0.0)),
                step_y: apply_matrix_norm(to_device, (0.0, self.y_step)),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::resources::ObjectStore;
    use crate::model::objects::{PDFObject, dict_from};
    use crate::utils::{MATRIX_IDENTITY, apply_matrix_pt};

    fn pattern(paint_type: i64) -> PDFStream {
        let nums = |v: &[f64]| PDFObject::Array(v.iter().map(|&x| PDFObject::Real(x)).collect());
        PDFStream::new(
            dict_from([
                ("PatternType", PDFObject::Int(1)),
                ("PaintType", PDFObject::Int(paint_type)),
                ("TilingType", PDFObject::Int(1)),
                ("BBox", nums(&[0.0, 0.0, 10.0, 5.0])),
                ("XStep", PDFObject::Int(10)),
                ("YStep", PDFObject::Int(5)),
            ]),
            b"0 0 5 5 re f".to_vec(),
        )
    }

    #[test]
    fn test_parse_tiling_pattern() {
        let store = ObjectStore::new();
        let tiling = TilingPattern::from_stream(&pattern(2), &store).unwrap();
        assert_eq!(tiling.paint_type, PaintType::Uncolored);
        assert_eq!(tiling.bbox, (0.0, 0.0, 10.0, 5.0));
        assert_eq!(&tiling.content[..], b"0 0 5 5 re f");
        assert!(tiling.resources.is_empty());
    }

    #[test]
    fn test_geometry_at_double_scale() {
        let store = ObjectStore::new();
        let tiling = TilingPattern::from_stream(&pattern(1), &store).unwrap();
        let geo = tiling
            .geometry((2.0, 0.0, 0.0, 2.0, 0.0, 0.0), 1 << 22)
            .unwrap();
        assert_eq!((geo.width, geo.height), (20, 10));
        assert_eq!(geo.spec.step_x, (20.0, 0.0));
        assert_eq!(geo.spec.step_y, (0.0, 10.0));
        // top-left pixel corner lands on the top-left of the bbox
        assert_eq!(apply_matrix_pt(geo.spec.placement, (0.0, 0.0)), (0.0, 10.0));
        assert_eq!(apply_matrix_pt(geo.cell_ctm, (0.0, 5.0)), (0.0, 0.0));
    }

    #[test]
    fn test_geometry_is_capped() {
        let store = ObjectStore::new();
        let tiling = TilingPattern::from_stream(&pattern(1), &store).unwrap();
        let geo = tiling
            .geometry((100.0, 0.0, 0.0, 100.0, 0.0, 0.0), 5000)
            .unwrap();
        assert!(u64::from(geo.width) * u64::from(geo.height) <= 5000);
        assert!(tiling.geometry(MATRIX_IDENTITY, 1).is_some());
    }
}
