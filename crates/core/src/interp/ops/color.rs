//! Color operators.
//!
//! Handles: CS, cs, G, g, RG, rg, K, k, SC, SCN, sc, scn
//!
//! - CS/cs: Select a color space (stroke/non-stroke), resetting the color
//! - G/g: DeviceGray (stroke/non-stroke)
//! - RG/rg: DeviceRGB (stroke/non-stroke)
//! - K/k: DeviceCMYK (stroke/non-stroke)
//! - SC/SCN/sc/scn: Set color in current color space
//!
//! The device operators go through the resource scopes as well, so a
//! `/DefaultRGB` entry replaces DeviceRGB for `rg`. Inside the cell of an
//! uncolored tiling pattern every color operator is ignored.

use crate::error::{RenderError, Result};
use crate::interp::colorspace::ColorSpaceResolver;
use crate::interp::device::{DrawingSurface, Paint};
use crate::interp::interpreter::PageInterpreter;
use crate::interp::ops::Args;
use crate::interp::resources::category;
use crate::model::color::{ColorSpace, Components};
use crate::model::objects::PDFObject;
use crate::model::state::ColorState;
use std::sync::Arc;

#[allow(non_snake_case)]
impl<'a, D: DrawingSurface + ?Sized> PageInterpreter<'a, D> {
    /// Sets the color space for stroking operations.
    ///
    /// PDF operator: `CS`
    pub fn do_CS(&mut self, name: &str) -> Result<()> {
        self.select_colorspace(true, name)
    }

    /// Sets the color space for non-stroking operations.
    ///
    /// PDF operator: `cs`
    pub fn do_cs(&mut self, name: &str) -> Result<()> {
        self.select_colorspace(false, name)
    }

    /// Sets the stroking color in the current color space.
    ///
    /// PDF operator: `SC`
    pub fn do_SC(&mut self, args: &Args<'_>) -> Result<()> {
        self.set_components(true, args)
    }

    /// Sets the non-stroking color in the current color space.
    ///
    /// PDF operator: `sc`
    pub fn do_sc(&mut self, args: &Args<'_>) -> Result<()> {
        self.set_components(false, args)
    }

    /// Like `SC`, but also accepts a pattern name for Pattern spaces.
    ///
    /// PDF operator: `SCN`
    pub fn do_SCN(&mut self, args: &Args<'_>) -> Result<()> {
        self.set_color_n(true, args)
    }

    /// Like `sc`, but also accepts a pattern name for Pattern spaces.
    ///
    /// PDF operator: `scn`
    pub fn do_scn(&mut self, args: &Args<'_>) -> Result<()> {
        self.set_color_n(false, args)
    }

    /// Sets the gray level for stroking operations.
    ///
    /// PDF operator: `G`
    pub fn do_G(&mut self, gray: f64) -> Result<()> {
        self.set_device_color(true, "DeviceGray", &[gray])
    }

    /// Sets the gray level for non-stroking operations.
    ///
    /// PDF operator: `g`
    pub fn do_g(&mut self, gray: f64) -> Result<()> {
        self.set_device_color(false, "DeviceGray", &[gray])
    }

    /// Sets the RGB color for stroking operations.
    ///
    /// PDF operator: `RG`
    pub fn do_RG(&mut self, r: f64, g: f64, b: f64) -> Result<()> {
        self.set_device_color(true, "DeviceRGB", &[r, g, b])
    }

    /// Sets the RGB color for non-stroking operations.
    ///
    /// PDF operator: `rg`
    pub fn do_rg(&mut self, r: f64, g: f64, b: f64) -> Result<()> {
        self.set_device_color(false, "DeviceRGB", &[r, g, b])
    }

    /// Sets the CMYK color for stroking operations.
    ///
    /// PDF operator: `K`
    pub fn do_K(&mut self, c: f64, m: f64, y: f64, k: f64) -> Result<()> {
        self.set_device_color(true, "DeviceCMYK", &[c, m, y, k])
    }

    /// Sets the CMYK color for non-stroking operations.
    ///
    /// PDF operator: `k`
    pub fn do_k(&mut self, c: f64, m: f64, y: f64, k: f64) -> Result<()> {
        self.set_device_color(false, "DeviceCMYK", &[c, m, y, k])
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Resolve a color space descriptor against the active scopes.
    pub(crate) fn resolve_colorspace(&mut self, descriptor: &PDFObject) -> Result<Arc<ColorSpace>> {
        ColorSpaceResolver::new(
            self.resolver,
            &self.scopes,
            self.resources,
            self.options.max_colorspace_depth,
        )
        .resolve(descriptor)
    }

    fn colorspace_named(&mut self, name: &str) -> Result<Arc<ColorSpace>> {
        ColorSpaceResolver::new(
            self.resolver,
            &self.scopes,
            self.resources,
            self.options.max_colorspace_depth,
        )
        .resolve_name(name)
    }

    fn color_mut(&mut self, stroke: bool) -> &mut ColorState {
        if stroke {
            &mut self.gstate.stroke
        } else {
            &mut self.gstate.fill
        }
    }

    fn select_colorspace(&mut self, stroke: bool, name: &str) -> Result<()> {
        if self.lock_colors {
            return Ok(());
        }
        let space = self.colorspace_named(name)?;
        *self.color_mut(stroke) = ColorState::new(space);
        Ok(())
    }

    fn set_device_color(&mut self, stroke: bool, family: &str, comps: &[f64]) -> Result<()> {
        if self.lock_colors {
            return Ok(());
        }
        let space = self.colorspace_named(family)?;
        let components = fit_components(&space, comps.iter().copied().collect(), family);
        *self.color_mut(stroke) = ColorState {
            space,
            components,
            pattern: None,
        };
        Ok(())
    }

    fn set_components(&mut self, stroke: bool, args: &Args<'_>) -> Result<()> {
        if self.lock_colors {
            return Ok(());
        }
        let comps: Components = args.nums()?.into_iter().collect();
        let state = self.color_mut(stroke);
        if state.space.is_pattern() {
            return Err(RenderError::IllegalColorSpaceUsage(
                "SC/sc cannot select a pattern; use SCN/scn".into(),
            ));
        }
        state.components = fit_components(&state.space, comps, state.space.family());
        Ok(())
    }

    fn set_color_n(&mut self, stroke: bool, args: &Args<'_>) -> Result<()> {
        if self.lock_colors {
            return Ok(());
        }
        let base = match self.color_mut(stroke).space.as_ref() {
            ColorSpace::Pattern(base) => base.clone(),
            _ => return self.set_components(stroke, args),
        };
        let Some(last) = args.len().checked_sub(1) else {
            return Err(RenderError::malformed("scn", "missing pattern name"));
        };
        let name = args.name(last)?;
        let comps: Components = (0..last).map(|i| args.num(i)).collect::<Result<_>>()?;
        let entry = self.require_resource(category::PATTERN, name)?;
        let components = match &base {
            Some(base) => fit_components(base, comps, base.family()),
            None if !comps.is_empty() => {
                tracing::warn!(name, "tint components for a colored pattern ignored");
                Components::new()
            }
            None => comps,
        };
        let state = self.color_mut(stroke);
        state.components = components;
        state.pattern = Some(entry);
        Ok(())
    }

    /// Paint for the current fill color.
    pub(crate) fn fill_paint(&self) -> Result<Paint> {
        Ok(Paint {
            color: self.gstate.fill.space.to_rgb(&self.gstate.fill.components)?,
            alpha: self.gstate.fill_alpha,
            blend: self.gstate.blend_mode,
        })
    }

    /// Paint for the current stroke color.
    pub(crate) fn stroke_paint(&self) -> Result<Paint> {
        Ok(Paint {
            color: self.gstate.stroke.space.to_rgb(&self.gstate.stroke.components)?,
            alpha: self.gstate.stroke_alpha,
            blend: self.gstate.blend_mode,
        })
    }
}

/// Match the component count of `space`, padding from its initial color.
fn fit_components(space: &ColorSpace, mut comps: Components, family: &str) -> Components {
    let n = space.ncomponents();
    if comps.len() != n {
        tracing::warn!(
            family,
            expected = n,
            found = comps.len(),
            "color component count mismatch"
        );
        let defaults = space.default_color();
        comps.truncate(n);
        while comps.len() < n {
            comps.push(defaults.get(comps.len()).copied().unwrap_or(0.0));
        }
    }
    comps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::cache::ResourceManager;
    use crate::interp::device::RecordingSurface;
    use crate::interp::options::RenderOptions;
    use crate::interp::resources::ObjectStore;
    use crate::model::color::Rgb;
    use crate::model::objects::{PDFDict, dict_from};
    use crate::model::state::GraphicsState;
    use crate::parser::lexer::Keyword;
    use crate::utils::MATRIX_IDENTITY;

    fn final_state(content: &[u8], resources: PDFDict) -> GraphicsState {
        let store = ObjectStore::new();
        let mut rm = ResourceManager::new();
        let mut surface = RecordingSurface::new();
        let options = RenderOptions::default();
        let mut interp = PageInterpreter::new(&store, &mut rm, &mut surface, &options);
        interp.init_resources(resources);
        interp.init_state(MATRIX_IDENTITY);
        interp.execute(content).unwrap();
        interp.gstate().clone()
    }

    #[test]
    fn test_device_operators() {
        let gs = final_state(b"0.5 g 1 0 0 RG", PDFDict::new());
        assert_eq!(gs.fill.space.family(), "DeviceGray");
        assert_eq!(gs.fill.space.to_rgb(&gs.fill.components).unwrap(), Rgb::gray(0.5));
        assert_eq!(gs.stroke.space.family(), "DeviceRGB");
        assert_eq!(gs.stroke.components.as_slice(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_cs_resets_to_initial_color() {
        let gs = final_state(b"1 0 0 rg /DeviceCMYK cs", PDFDict::new());
        assert_eq!(gs.fill.components.as_slice(), &[0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_short_sc_is_padded() {
        let gs = final_state(b"/DeviceRGB cs 0.25 sc", PDFDict::new());
        assert_eq!(gs.fill.components.as_slice(), &[0.25, 0.0, 0.0]);
    }

    #[test]
    fn test_scn_with_pattern_name() {
        let resources = dict_from([(
            "Pattern",
            PDFObject::Dict(dict_from([("P0", PDFObject::Dict(PDFDict::new()))])),
        )]);
        let gs = final_state(b"/Pattern cs /P0 scn", resources);
        assert!(gs.fill.space.is_pattern());
        assert!(gs.fill.pattern.is_some());
    }

    #[test]
    fn test_sc_in_pattern_space_is_illegal() {
        let store = ObjectStore::new();
        let mut rm = ResourceManager::new();
        let mut surface = RecordingSurface::new();
        let options = RenderOptions::default();
        let mut interp = PageInterpreter::new(&store, &mut rm, &mut surface, &options);
        interp.do_cs("Pattern").unwrap();
        let operands = [PDFObject::Int(1)];
        let result = interp.do_sc(&Args::new(&Keyword::Sc, &operands));
        assert!(matches!(result, Err(RenderError::IllegalColorSpaceUsage(_))));
    }

    #[test]
    fn test_default_rgb_substitution() {
        let calrgb = PDFObject::Array(vec![
            PDFObject::name("CalRGB"),
            PDFObject::Dict(dict_from([(
                "WhitePoint",
                PDFObject::Array(vec![
                    PDFObject::Real(0.9505),
                    PDFObject::Real(1.0),
                    PDFObject::Real(1.089),
                ]),
            )])),
        ]);
        let resources = dict_from([(
            "ColorSpace",
            PDFObject::Dict(dict_from([("DefaultRGB", calrgb)])),
        )]);
        let gs = final_state(b"1 0 0 rg", resources);
        assert_eq!(gs.fill.space.family(), "CalRGB");
        assert_eq!(gs.fill.components.as_slice(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_uncolored_cell_ignores_color_operators() {
        let store = ObjectStore::new();
        let mut rm = ResourceManager::new();
        let mut surface = RecordingSurface::new();
        let options = RenderOptions::default();
        let mut interp = PageInterpreter::new(&store, &mut rm, &mut surface, &options);
        interp.lock_colors = true;
        interp.execute(b"1 0 0 rg /DeviceCMYK CS").unwrap();
        assert_eq!(interp.gstate().fill.space.family(), "DeviceGray");
        assert_eq!(interp.gstate().stroke.space.family(), "DeviceGray");
    }
}
