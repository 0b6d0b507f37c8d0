//! Shading operator and pattern fills.
//!
//! Handles: sh
//!
//! Also paints fills whose color is a pattern:
//! - PatternType 2: the pattern's shading, clipped to the filled path
//! - PatternType 1: a tile rendered by a nested interpreter, repeated
//!   across the filled path

use crate::error::{RenderError, Result};
use crate::interp::device::{DrawingSurface, Raster};
use crate::interp::interpreter::PageInterpreter;
use crate::interp::resources::category;
use crate::model::color::ColorSpace;
use crate::model::objects::{PDFDict, PDFObject, PDFStream};
use crate::model::path::Path;
use crate::model::state::ColorState;
use crate::shading::Shading;
use crate::shading::tiling::{PaintType, TileGeometry, TilingPattern};
use crate::utils::{MATRIX_IDENTITY, Matrix, mult_matrix};
use std::sync::Arc;

#[allow(non_snake_case)]
impl<'a, D: DrawingSurface + ?Sized> PageInterpreter<'a, D> {
    /// Paints a shading across the current clip.
    ///
    /// Without a clip the area is the shading's `/BBox`, or the surface
    /// bounds. `/Background` is not used.
    ///
    /// PDF operator: `sh`
    pub fn do_sh(&mut self, name: &str) -> Result<()> {
        let entry = self.require_resource(category::SHADING, name)?;
        let shading = self.load_shading(&entry)?;
        let Some(ctx) = shading.paint_context(self.gstate.ctm, false) else {
            tracing::debug!(name, "shading under a singular ctm");
            return Ok(());
        };
        let area = match self.gstate.clip {
            Some(_) => None,
            None => ctx
                .device_bounds()
                .or_else(|| self.device.bounds())
                .map(Path::from_rect),
        };
        self.device
            .fill_shading(&ctx, area.as_ref(), self.gstate.fill_alpha);
        Ok(())
    }

    /// Parse (or reuse) the shading behind a resource entry.
    pub(crate) fn load_shading(&mut self, entry: &PDFObject) -> Result<Arc<Shading>> {
        if let Some(shading) = self.resources.cached_shading(entry) {
            return Ok(shading);
        }
        let dict = self.resolver.resolve_dict(entry)?;
        let descriptor = dict
            .get("ColorSpace")
            .ok_or_else(|| RenderError::InvalidShading("missing /ColorSpace".into()))?;
        let colorspace = self.resolve_colorspace(descriptor)?;
        let function = match dict.get("Function") {
            Some(obj) => Some(self.resources.function(obj, self.resolver)?),
            None => None,
        };
        let shading = Arc::new(Shading::from_dict(
            &dict,
            self.resolver,
            colorspace,
            function,
        )?);
        self.resources
            .cache_shading(entry.clone(), Arc::clone(&shading));
        Ok(shading)
    }

    /// Fill a device-space area with the current fill pattern.
    pub(crate) fn fill_with_pattern(&mut self, area: &Path) -> Result<()> {
        let Some(entry) = self.gstate.fill.pattern.clone() else {
            return Err(RenderError::IllegalColorSpaceUsage(
                "fill in a Pattern space before scn selected a pattern".into(),
            ));
        };
        let resolved = self.resolver.resolve(&entry)?;
        let dict = match &resolved {
            PDFObject::Dict(d) => d,
            PDFObject::Stream(s) => &s.attrs,
            other => {
                return Err(RenderError::TypeError {
                    expected: "pattern dict",
                    got: other.type_name(),
                });
            }
        };
        let pattern_type = match dict.get("PatternType") {
            Some(t) => self.resolver.resolve(t)?.as_int()?,
            None => return Err(RenderError::KeyError("/PatternType".into())),
        };
        match pattern_type {
            1 => self.fill_tiling(&entry, resolved.as_stream()?, area),
            2 => self.fill_shading_pattern(dict, area),
            other => Err(RenderError::UnsupportedFeature(format!(
                "PatternType {other}"
            ))),
        }
    }

    fn fill_shading_pattern(&mut self, dict: &PDFDict, area: &Path) -> Result<()> {
        let entry = dict
            .get("Shading")
            .ok_or_else(|| RenderError::InvalidShading("shading pattern without /Shading".into()))?;
        let shading = self.load_shading(entry)?;
        let to_device = mult_matrix(self.pattern_matrix(dict)?, self.base_ctm);
        if dict.contains_key("ExtGState") {
            tracing::debug!("ignoring /ExtGState of a shading pattern");
        }
        let Some(ctx) = shading.paint_context(to_device, true) else {
            tracing::debug!("shading pattern under a singular matrix");
            return Ok(());
        };
        self.device
            .fill_shading(&ctx, Some(area), self.gstate.fill_alpha);
        Ok(())
    }

    fn pattern_matrix(&self, dict: &PDFDict) -> Result<Matrix> {
        let Some(obj) = dict.get("Matrix") else {
            return Ok(MATRIX_IDENTITY);
        };
        match self.resolver.resolve_num_array(obj)?[..] {
            [a, b, c, d, e, f] => Ok((a, b, c, d, e, f)),
            _ => Err(RenderError::KeyError("pattern /Matrix".into())),
        }
    }

    fn fill_tiling(&mut self, entry: &PDFObject, stream: &PDFStream, area: &Path) -> Result<()> {
        let pattern = TilingPattern::from_stream(stream, self.resolver)?;
        let Some(geometry) = pattern.geometry(self.base_ctm, self.options.max_tile_pixels) else {
            tracing::debug!("degenerate tiling pattern cell");
            return Ok(());
        };
        let cell_color = match pattern.paint_type {
            PaintType::Colored => None,
            PaintType::Uncolored => Some(self.underlying_color()?),
        };
        let key = tile_key(entry, &geometry, cell_color.as_ref())?;
        let tile = match self.resources.cached_tile(&key) {
            Some(tile) => tile,
            None => {
                let Some(raster) = self.render_tile(entry, &pattern, &geometry, cell_color)? else {
                    return Ok(());
                };
                let tile = Arc::new(raster);
                self.resources.cache_tile(key, Arc::clone(&tile));
                tile
            }
        };
        self.device.fill_tiled(&tile, &geometry.spec, area);
        Ok(())
    }

    /// Color of an uncolored pattern: the `scn` components in the
    /// underlying space.
    fn underlying_color(&self) -> Result<ColorState> {
        match self.gstate.fill.space.as_ref() {
            ColorSpace::Pattern(Some(base)) => Ok(ColorState {
                space: Arc::clone(base),
                components: self.gstate.fill.components.clone(),
                pattern: None,
            }),
            _ => Err(RenderError::IllegalColorSpaceUsage(
                "uncolored tiling pattern without an underlying color space".into(),
            )),
        }
    }

    /// Render one pattern cell into a raster of the device's choosing.
    fn render_tile(
        &mut self,
        entry: &PDFObject,
        pattern: &TilingPattern,
        geometry: &TileGeometry,
        cell_color: Option<ColorState>,
    ) -> Result<Option<Raster>> {
        if self.form_stack.contains(entry) || self.form_stack.len() >= self.options.max_form_depth {
            return Err(RenderError::RecursionLimit(format!(
                "tiling pattern nested {} deep",
                self.form_stack.len()
            )));
        }
        let Some(mut surface) = self.device.tile_surface(geometry.width, geometry.height) else {
            tracing::debug!("surface does not render pattern tiles");
            return Ok(None);
        };
        tracing::debug!(
            width = geometry.width,
            height = geometry.height,
            "rendering pattern tile"
        );
        {
            let mut cell = PageInterpreter::new(
                self.resolver,
                self.resources,
                surface.as_mut(),
                self.options,
            );
            cell.init_resources(pattern.resources.clone());
            cell.init_state(geometry.cell_ctm);
            cell.form_stack = self.form_stack.clone();
            cell.form_stack.push(entry.clone());
            if let Some(color) = cell_color {
                cell.gstate.stroke = color.clone();
                cell.gstate.fill = color;
                cell.lock_colors = true;
            }
            cell.execute(&pattern.content)?;
        }
        Ok(Some(surface.into_raster()))
    }
}

/// Tiles depend on the pattern, the device geometry of its cell and, for
/// uncolored patterns, the color they were painted with.
fn tile_key(
    entry: &PDFObject,
    geometry: &TileGeometry,
    color: Option<&ColorState>,
) -> Result<PDFObject> {
    let (a, b, c, d, e, f) = geometry.cell_ctm;
    let mut key = vec![
        entry.clone(),
        PDFObject::Int(i64::from(geometry.width)),
        PDFObject::Int(i64::from(geometry.height)),
    ];
    key.extend([a, b, c, d, e, f].map(PDFObject::Real));
    if let Some(color) = color {
        // keyed on the device color so equal components in different
        // spaces never share a tile
        let rgb = color.space.to_rgb(&color.components)?;
        key.extend([rgb.r, rgb.g, rgb.b].map(PDFObject::Real));
    }
    Ok(PDFObject::Array(key))
}
