//! XObject and inline image operators.
//!
//! Handles: Do, BI/ID/EI
//!
//! XObjects:
//! - Do: Invoke named XObject (Form or Image)
//!
//! Inline images:
//! - BI/ID/EI: parsed into one statement by the content parser, drawn here
//!
//! Forms run in the interpreter that invokes them: the state is saved, the
//! form matrix and `/BBox` clip applied, and the form's resources pushed
//! for the duration of its content.

use crate::error::{RenderError, Result};
use crate::image::ImageSpec;
use crate::interp::device::DrawingSurface;
use crate::interp::interpreter::PageInterpreter;
use crate::interp::resources::category;
use crate::model::objects::{PDFDict, PDFObject, PDFStream};
use crate::model::path::{FillRule, Path};
use crate::parser::content::InlineImage;
use crate::utils::{MATRIX_IDENTITY, Matrix, Rect, mult_matrix, normalize_rect};

#[allow(non_snake_case)]
impl<'a, D: DrawingSurface + ?Sized> PageInterpreter<'a, D> {
    /// Invokes a named XObject.
    ///
    /// PDF operator: `Do`
    pub fn do_Do(&mut self, name: &str) -> Result<()> {
        let entry = self.require_resource(category::XOBJECT, name)?;
        let resolved = self.resolver.resolve(&entry)?;
        let PDFObject::Stream(stream) = &resolved else {
            return Err(RenderError::InvalidXObject(format!(
                "/{name} is a {}, not a stream",
                resolved.type_name()
            )));
        };
        let subtype = match stream.get("Subtype") {
            Some(obj) => self.resolver.resolve(obj)?,
            None => PDFObject::Null,
        };
        match subtype.as_name().unwrap_or_default() {
            "Form" => self.render_form(&entry, stream),
            "Image" => self.draw_image(&stream.attrs, stream.get_rawdata()),
            "PS" => {
                tracing::warn!(name, "PostScript XObjects are not rendered");
                Ok(())
            }
            other => Err(RenderError::InvalidXObject(format!(
                "/{name} has unknown subtype {other:?}"
            ))),
        }
    }

    /// Draws an inline image (`BI ... ID ... EI`).
    pub fn do_inline_image(&mut self, image: &InlineImage) -> Result<()> {
        self.draw_image(&image.dict, &image.data)
    }

    fn render_form(&mut self, entry: &PDFObject, stream: &PDFStream) -> Result<()> {
        if self.form_stack.contains(entry) || self.form_stack.len() >= self.options.max_form_depth {
            return Err(RenderError::RecursionLimit(format!(
                "form XObject nested {} deep",
                self.form_stack.len()
            )));
        }
        let content = self.resolver.stream_data(stream)?;
        let matrix = self.form_matrix(stream)?;
        let bbox = self.form_bbox(stream)?;
        let resources = match stream.get("Resources") {
            Some(obj) => Some(self.resolver.resolve_dict(obj)?),
            None => None,
        };
        if stream.get("Group").is_some() {
            tracing::debug!("rendering transparency group as a plain form");
        }

        let depth = self.gstack.len();
        self.save_state();
        self.gstate.ctm = mult_matrix(matrix, self.gstate.ctm);
        match bbox {
            Some(bbox) => {
                let clip = Path::from_rect(bbox).transform(self.gstate.ctm);
                self.intersect_clip(clip, FillRule::NonZero);
            }
            None => tracing::debug!("form without /BBox"),
        }
        let saved_floor = std::mem::replace(&mut self.stack_floor, self.gstack.len());
        let saved_base = std::mem::replace(&mut self.base_ctm, self.gstate.ctm);
        let saved_path = self.path.take();
        let saved_clip = self.pending_clip.take();
        let pushed = resources.is_some();
        if let Some(resources) = resources {
            self.scopes.push(resources);
        }
        self.form_stack.push(entry.clone());

        let result = self.execute(&content);

        self.form_stack.pop();
        if pushed {
            self.scopes.pop();
        }
        self.path = saved_path;
        self.pending_clip = saved_clip;
        self.base_ctm = saved_base;
        self.stack_floor = saved_floor;
        self.restore_to(depth);
        result
    }

    fn form_matrix(&self, stream: &PDFStream) -> Result<Matrix> {
        let Some(obj) = stream.get("Matrix") else {
            return Ok(MATRIX_IDENTITY);
        };
        match self.resolver.resolve_num_array(obj)?[..] {
            [a, b, c, d, e, f] => Ok((a, b, c, d, e, f)),
            _ => Err(RenderError::InvalidXObject("form /Matrix needs 6 numbers".into())),
        }
    }

    fn form_bbox(&self, stream: &PDFStream) -> Result<Option<Rect>> {
        let Some(obj) = stream.get("BBox") else {
            return Ok(None);
        };
        match self.resolver.resolve_num_array(obj)?[..] {
            [a, b, c, d] => Ok(Some(normalize_rect((a, b, c, d)))),
            _ => Err(RenderError::InvalidXObject("form /BBox needs 4 numbers".into())),
        }
    }

    /// Decode an image and place it on the unit square of the ctm.
    fn draw_image(&mut self, dict: &PDFDict, data: &[u8]) -> Result<()> {
        let spec = ImageSpec::from_dict(dict, self.resolver)?;
        let (spec, colorspace) = if spec.image_mask {
            let fill = &self.gstate.fill;
            if fill.space.is_no_draw() {
                return Ok(());
            }
            if fill.space.is_pattern() {
                return Err(RenderError::UnsupportedFeature(
                    "stencil mask painted with a pattern".into(),
                ));
            }
            let color = self.fill_paint()?.color;
            (spec.with_mask_color(color), None)
        } else {
            let descriptor = dict
                .get("ColorSpace")
                .ok_or_else(|| RenderError::InvalidXObject("image without /ColorSpace".into()))?;
            (spec, Some(self.resolve_colorspace(descriptor)?))
        };
        let raster = self
            .resources
            .image_decoder()
            .decode(&spec, data, colorspace.as_deref())?;
        tracing::trace!(width = raster.width, height = raster.height, "draw image");
        self.device
            .draw_raster(&raster, self.gstate.ctm, self.gstate.fill_alpha);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{RenderError, Result};
    use crate::interp::cache::ResourceManager;
    use crate::interp::device::{RecordingSurface, SurfaceCall};
    use crate::interp::interpreter::PageInterpreter;
    use crate::interp::options::RenderOptions;
    use crate::interp::resources::ObjectStore;
    use crate::model::objects::{PDFDict, PDFObject, PDFStream, dict_from};
    use crate::utils::MATRIX_IDENTITY;

    fn nums(values: &[f64]) -> PDFObject {
        PDFObject::Array(values.iter().map(|v| PDFObject::Real(*v)).collect())
    }

    fn form(content: &[u8], extra: Vec<(&str, PDFObject)>) -> PDFStream {
        let mut attrs = dict_from([
            ("Subtype", PDFObject::name("Form")),
            ("BBox", nums(&[0.0, 0.0, 10.0, 10.0])),
        ]);
        attrs.extend(extra.into_iter().map(|(k, v)| (k.to_string(), v)));
        PDFStream::new(attrs, content.to_vec())
    }

    fn xobjects(entries: Vec<(&str, PDFObject)>) -> PDFDict {
        dict_from([("XObject", PDFObject::Dict(dict_from(entries)))])
    }

    fn run(
        content: &[u8],
        resources: PDFDict,
        store: &ObjectStore,
        options: &RenderOptions,
    ) -> (Result<()>, Vec<SurfaceCall>) {
        let mut rm = ResourceManager::new();
        let mut surface = RecordingSurface::new();
        let result = PageInterpreter::new(store, &mut rm, &mut surface, options).render_page(
            content,
            resources,
            MATRIX_IDENTITY,
        );
        (result, surface.into_calls())
    }

    #[test]
    fn test_form_matrix_and_bbox_clip() {
        let mut store = ObjectStore::new();
        let fm = store.insert(
            5,
            form(
                b"0 0 5 5 re f",
                vec![("Matrix", nums(&[2.0, 0.0, 0.0, 2.0, 100.0, 0.0]))],
            ),
        );
        let resources = xobjects(vec![("Fm0", fm)]);
        let (result, calls) = run(b"/Fm0 Do 0 0 1 1 re f", resources, &store, &RenderOptions::default());
        result.unwrap();
        let clip_bounds: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::ClipChanged { bounds, .. } => Some(*bounds),
                _ => None,
            })
            .collect();
        // clipped to the form bbox, then restored after the form
        assert_eq!(clip_bounds, vec![Some((100.0, 0.0, 120.0, 20.0)), None]);
        let transforms: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                SurfaceCall::SetTransform { ctm } => Some(*ctm),
                _ => None,
            })
            .collect();
        assert_eq!(
            transforms,
            vec![(2.0, 0.0, 0.0, 2.0, 100.0, 0.0), MATRIX_IDENTITY]
        );
    }

    #[test]
    fn test_form_state_does_not_leak() {
        let mut store = ObjectStore::new();
        let fm = store.insert(5, form(b"q 5 w 0 0 m Q 3 w 1 0 0 rg 0 0 m 1 1 l", vec![]));
        let resources = xobjects(vec![("Fm0", fm)]);
        let mut rm = ResourceManager::new();
        let mut surface = RecordingSurface::new();
        let options = RenderOptions::default();
        let mut interp = PageInterpreter::new(&store, &mut rm, &mut surface, &options);
        interp
            .render_page(b"0 0 m /Fm0 Do", resources, MATRIX_IDENTITY)
            .unwrap();
        assert_eq!(interp.gstate().line_width, 1.0);
        assert_eq!(interp.gstate().fill.space.family(), "DeviceGray");
        // the page's path survives the form
        assert!(!interp.current_path().is_empty());
    }

    #[test]
    fn test_recursive_form_is_fatal() {
        let mut store = ObjectStore::new();
        let self_ref = PDFObject::Ref(crate::model::objects::PDFObjRef::new(5, 0));
        let inner = dict_from([(
            "XObject",
            PDFObject::Dict(dict_from([("Fm0", self_ref.clone())])),
        )]);
        store.insert(
            5,
            form(b"/Fm0 Do", vec![("Resources", PDFObject::Dict(inner))]),
        );
        let resources = xobjects(vec![("Fm0", self_ref)]);
        let (result, _) = run(b"/Fm0 Do", resources, &store, &RenderOptions::default());
        assert!(matches!(result, Err(RenderError::RecursionLimit(_))));
    }

    #[test]
    fn test_form_depth_limit() {
        let mut store = ObjectStore::new();
        let b = store.insert(6, form(b"0 0 1 1 re f", vec![]));
        let a = store.insert(
            5,
            form(
                b"/B Do",
                vec![(
                    "Resources",
                    PDFObject::Dict(dict_from([(
                        "XObject",
                        PDFObject::Dict(dict_from([("B", b)])),
                    )])),
                )],
            ),
        );
        let resources = xobjects(vec![("A", a)]);
        let options = RenderOptions::default().with_max_form_depth(1);
        let (result, _) = run(b"/A Do", resources.clone(), &store, &options);
        assert!(matches!(result, Err(RenderError::RecursionLimit(_))));
        let (result, _) = run(b"/A Do", resources, &store, &RenderOptions::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_image_xobject() {
        let mut store = ObjectStore::new();
        let attrs = dict_from([
            ("Subtype", PDFObject::name("Image")),
            ("Width", PDFObject::Int(2)),
            ("Height", PDFObject::Int(1)),
            ("BitsPerComponent", PDFObject::Int(8)),
            ("ColorSpace", PDFObject::name("DeviceGray")),
        ]);
        let im = store.insert(7, PDFStream::new(attrs, vec![0u8, 255]));
        let resources = xobjects(vec![("Im0", im)]);
        let (result, calls) = run(
            b"q 20 0 0 10 5 5 cm /Im0 Do Q",
            resources,
            &store,
            &RenderOptions::default(),
        );
        result.unwrap();
        assert_eq!(
            calls,
            vec![SurfaceCall::DrawRaster {
                width: 2,
                height: 1,
                placement: (20.0, 0.0, 0.0, 10.0, 5.0, 5.0),
                alpha: 1.0,
            }]
        );
    }

    #[test]
    fn test_image_without_colorspace_is_fatal() {
        let mut store = ObjectStore::new();
        let attrs = dict_from([
            ("Subtype", PDFObject::name("Image")),
            ("Width", PDFObject::Int(1)),
            ("Height", PDFObject::Int(1)),
            ("BitsPerComponent", PDFObject::Int(8)),
        ]);
        let im = store.insert(7, PDFStream::new(attrs, vec![0u8]));
        let resources = xobjects(vec![("Im0", im)]);
        let (result, _) = run(b"/Im0 Do", resources, &store, &RenderOptions::default());
        assert!(matches!(result, Err(RenderError::InvalidXObject(_))));
    }

    #[test]
    fn test_missing_xobject_is_fatal() {
        let store = ObjectStore::new();
        let (result, _) = run(b"/Nope Do", PDFDict::new(), &store, &RenderOptions::default());
        assert!(matches!(
            result,
            Err(RenderError::UnresolvableResource { .. })
        ));
    }

    #[test]
    fn test_inline_stencil_mask() {
        let store = ObjectStore::new();
        let (result, calls) = run(
            b"1 0 0 rg BI /W 8 /H 1 /IM true ID \xF0 EI",
            PDFDict::new(),
            &store,
            &RenderOptions::default(),
        );
        result.unwrap();
        assert!(matches!(
            calls.as_slice(),
            [SurfaceCall::DrawRaster { width: 8, height: 1, .. }]
        ));
    }
}
