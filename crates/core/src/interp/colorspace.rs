//! Color space resolution.
//!
//! Turns a color space descriptor (a name, an array, or a reference to
//! one) into a shared [`ColorSpace`]. Resolved descriptors are memoized in
//! the [`ResourceManager`] together with the `/ColorSpace` bindings they
//! consulted; the device spaces are process-wide singletons.

use crate::error::{RenderError, Result};
use crate::interp::cache::{ResourceManager, ScopedColorSpace};
use crate::interp::resources::{ResourceResolver, ResourceScopes, category};
use crate::model::color::{CalGray, CalRGB, ColorSpace, Indexed, Lab, Separation};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject};
use rustc_hash::FxHashSet;
use std::sync::Arc;

fn invalid(msg: impl Into<String>) -> RenderError {
    RenderError::InvalidColorSpaceDefinition(msg.into())
}

/// Component ranges must be finite `min max` pairs with `min <= max`.
fn check_ranges(what: &str, values: &[f64]) -> Result<()> {
    let bad = values
        .chunks_exact(2)
        .any(|pair| !pair[0].is_finite() || !pair[1].is_finite() || pair[0] > pair[1]);
    if bad {
        return Err(invalid(format!("{what} /Range has an invalid interval")));
    }
    Ok(())
}

/// Resolves color space descriptors against the active resource scopes.
pub struct ColorSpaceResolver<'r> {
    resolver: &'r dyn ResourceResolver,
    scopes: &'r ResourceScopes,
    cache: &'r mut ResourceManager,
    max_depth: usize,
    in_flight: FxHashSet<PDFObjRef>,
    /// Every `/ColorSpace` lookup made so far, in order.
    bindings: Vec<(String, Option<PDFObject>)>,
}

impl<'r> ColorSpaceResolver<'r> {
    pub fn new(
        resolver: &'r dyn ResourceResolver,
        scopes: &'r ResourceScopes,
        cache: &'r mut ResourceManager,
        max_depth: usize,
    ) -> Self {
        Self {
            resolver,
            scopes,
            cache,
            max_depth,
            in_flight: FxHashSet::default(),
            bindings: Vec::new(),
        }
    }

    /// Resolve the operand of `cs`/`CS`.
    pub fn resolve_name(&mut self, name: &str) -> Result<Arc<ColorSpace>> {
        self.named(name, 0, true)
    }

    /// Resolve a descriptor found in a dictionary (`/ColorSpace` of an
    /// image or shading, an alternate space, ...).
    pub fn resolve(&mut self, descriptor: &PDFObject) -> Result<Arc<ColorSpace>> {
        self.resolve_at(descriptor, 0, true)
    }

    fn resolve_at(
        &mut self,
        obj: &PDFObject,
        depth: usize,
        allow_defaults: bool,
    ) -> Result<Arc<ColorSpace>> {
        if depth > self.max_depth {
            return Err(invalid("color space nested too deeply"));
        }
        match obj {
            PDFObject::Name(name) => self.named(name, depth, allow_defaults),
            PDFObject::Ref(objref) => {
                if allow_defaults && let Some(space) = self.cached(obj)? {
                    return Ok(space);
                }
                if !self.in_flight.insert(*objref) {
                    return Err(invalid(format!(
                        "color space {} {} R refers to itself",
                        objref.objid, objref.genno
                    )));
                }
                let mark = self.bindings.len();
                let target = self.resolver.resolve(obj);
                let result = target.and_then(|t| self.resolve_at(&t, depth + 1, allow_defaults));
                self.in_flight.remove(objref);
                let space = result?;
                if allow_defaults {
                    self.remember(obj, mark, &space);
                }
                Ok(space)
            }
            PDFObject::Array(items) => {
                if allow_defaults && let Some(space) = self.cached(obj)? {
                    return Ok(space);
                }
                let mark = self.bindings.len();
                let space = self.from_array(items, depth, allow_defaults)?;
                if allow_defaults {
                    self.remember(obj, mark, &space);
                }
                Ok(space)
            }
            other => Err(invalid(format!(
                "expected a name or array, got {}",
                other.type_name()
            ))),
        }
    }

    /// A cached space for `key` whose bindings match the current scopes.
    fn cached(&mut self, key: &PDFObject) -> Result<Option<Arc<ColorSpace>>> {
        'variants: for variant in self.cache.cached_colorspaces(key) {
            for (name, entry) in &variant.bindings {
                let current = self.scopes.lookup(self.resolver, category::COLOR_SPACE, name)?;
                if current != *entry {
                    continue 'variants;
                }
            }
            self.bindings.extend(variant.bindings);
            return Ok(Some(variant.space));
        }
        Ok(None)
    }

    /// Cache `space` under `key` with the bindings consulted since `mark`.
    /// Spaces resolved with `Default*` substitution disabled are not cached.
    fn remember(&mut self, key: &PDFObject, mark: usize, space: &Arc<ColorSpace>) {
        let mut bindings: Vec<(String, Option<PDFObject>)> = Vec::new();
        for binding in &self.bindings[mark..] {
            if !bindings.contains(binding) {
                bindings.push(binding.clone());
            }
        }
        self.cache.cache_colorspace(
            key.clone(),
            ScopedColorSpace {
                bindings,
                space: Arc::clone(space),
            },
        );
    }

    /// Look up a `/ColorSpace` entry, recording the binding.
    fn lookup(&mut self, name: &str) -> Result<Option<PDFObject>> {
        let entry = self.scopes.lookup(self.resolver, category::COLOR_SPACE, name)?;
        self.bindings.push((name.to_string(), entry.clone()));
        Ok(entry)
    }

    fn named(&mut self, name: &str, depth: usize, allow_defaults: bool) -> Result<Arc<ColorSpace>> {
        let (device, default_key) = match name {
            "DeviceGray" | "G" => (ColorSpace::device_gray(), "DefaultGray"),
            "DeviceRGB" | "RGB" => (ColorSpace::device_rgb(), "DefaultRGB"),
            "DeviceCMYK" | "CMYK" => (ColorSpace::device_cmyk(), "DefaultCMYK"),
            "Pattern" => return Ok(ColorSpace::pattern()),
            _ => {
                let entry = self.lookup(name)?.ok_or_else(|| RenderError::UnresolvableResource {
                    category: category::COLOR_SPACE,
                    name: name.to_string(),
                })?;
                return self.resolve_at(&entry, depth + 1, allow_defaults);
            }
        };
        if !allow_defaults {
            return Ok(device);
        }
        let Some(entry) = self.lookup(default_key)? else {
            return Ok(device);
        };
        let space = self.resolve_at(&entry, depth + 1, false)?;
        if space.ncomponents() != device.ncomponents() {
            tracing::warn!(
                key = default_key,
                family = space.family(),
                "default color space has the wrong number of components, ignored"
            );
            return Ok(device);
        }
        Ok(space)
    }

    fn from_array(
        &mut self,
        items: &[PDFObject],
        depth: usize,
        allow_defaults: bool,
    ) -> Result<Arc<ColorSpace>> {
        let Some(first) = items.first() else {
            return Err(invalid("empty color space array"));
        };
        let family = self.resolver.resolve(first)?;
        let family = family
            .as_name()
            .map_err(|_| invalid("color space family must be a name"))?;
        let arg = |i: usize| {
            items
                .get(i)
                .ok_or_else(|| invalid(format!("{family} needs {} operands", i)))
        };

        let space = match family {
            "DeviceGray" | "G" | "DeviceRGB" | "RGB" | "DeviceCMYK" | "CMYK" => {
                return self.named(family, depth, allow_defaults);
            }
            "Pattern" => {
                return match items.get(1) {
                    Some(base) => {
                        let base = self.resolve_at(base, depth + 1, allow_defaults)?;
                        if base.is_pattern() {
                            return Err(invalid("Pattern space cannot be its own base"));
                        }
                        Ok(Arc::new(ColorSpace::Pattern(Some(base))))
                    }
                    None => Ok(ColorSpace::pattern()),
                };
            }
            "CalGray" => {
                let dict = self.resolver.resolve_dict(arg(1)?)?;
                ColorSpace::CalGray(CalGray {
                    white_point: self.white_point(&dict)?,
                    gamma: self.number(&dict, "Gamma")?.unwrap_or(1.0),
                })
            }
            "CalRGB" => {
                let dict = self.resolver.resolve_dict(arg(1)?)?;
                let gamma = self.numbers::<3>(&dict, "Gamma")?.unwrap_or([1.0; 3]);
                let matrix = self
                    .numbers::<9>(&dict, "Matrix")?
                    .unwrap_or([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
                ColorSpace::CalRGB(CalRGB {
                    white_point: self.white_point(&dict)?,
                    gamma,
                    matrix,
                })
            }
            "Lab" => {
                let dict = self.resolver.resolve_dict(arg(1)?)?;
                let range = self
                    .numbers::<4>(&dict, "Range")?
                    .unwrap_or([-100.0, 100.0, -100.0, 100.0]);
                check_ranges("Lab", &range)?;
                ColorSpace::Lab(Lab {
                    white_point: self.white_point(&dict)?,
                    range,
                })
            }
            "ICCBased" => self.icc_based(arg(1)?, depth)?,
            "Indexed" | "I" => {
                let base = self.resolve_at(arg(1)?, depth + 1, allow_defaults)?;
                let hival = self.resolver.resolve(arg(2)?)?.as_int()?;
                let lookup = match self.resolver.resolve(arg(3)?)? {
                    PDFObject::String(bytes) => bytes,
                    PDFObject::Stream(stream) => self.resolver.stream_data(&stream)?,
                    other => {
                        return Err(invalid(format!(
                            "Indexed lookup must be a string or stream, got {}",
                            other.type_name()
                        )));
                    }
                };
                ColorSpace::Indexed(Indexed::new(base, hival, &lookup)?)
            }
            "Separation" => {
                let colorant = self.resolver.resolve(arg(1)?)?.as_name()?.to_string();
                let alternate = self.resolve_at(arg(2)?, depth + 1, allow_defaults)?;
                let tint = self.cache.function(arg(3)?, self.resolver)?;
                ColorSpace::Separation(Separation::new(vec![colorant], alternate, tint)?)
            }
            "DeviceN" => {
                let names = self
                    .resolver
                    .resolve(arg(1)?)?
                    .as_array()?
                    .iter()
                    .map(|n| Ok(self.resolver.resolve(n)?.as_name()?.to_string()))
                    .collect::<Result<Vec<_>>>()?;
                let alternate = self.resolve_at(arg(2)?, depth + 1, allow_defaults)?;
                let tint = self.cache.function(arg(3)?, self.resolver)?;
                if tint.num_inputs() != names.len() {
                    return Err(invalid(format!(
                        "DeviceN tint transform takes {} inputs for {} colorants",
                        tint.num_inputs(),
                        names.len()
                    )));
                }
                ColorSpace::Separation(Separation::new(names, alternate, tint)?)
            }
            other => return Err(invalid(format!("unknown color space family {other}"))),
        };
        Ok(Arc::new(space))
    }

    fn icc_based(&mut self, profile: &PDFObject, depth: usize) -> Result<ColorSpace> {
        let profile = self.resolver.resolve(profile)?;
        let dict = profile
            .as_dict()
            .map_err(|_| invalid("ICCBased needs a profile stream"))?;
        let n = match dict.get("N") {
            Some(n) => self.resolver.resolve(n)?.as_int()?,
            None => return Err(invalid("ICCBased profile without /N")),
        };
        if !matches!(n, 1 | 3 | 4) {
            return Err(invalid(format!("ICCBased /N {n}")));
        }
        let n = n as usize;
        let device = ColorSpace::device_for_components(n)
            .ok_or_else(|| invalid(format!("ICCBased /N {n}")))?;
        let alternate = match dict.get("Alternate") {
            Some(alt) => {
                let alt = self.resolve_at(alt, depth + 1, true)?;
                if alt.ncomponents() == n && !alt.is_pattern() {
                    alt
                } else {
                    tracing::warn!(
                        n,
                        alternate = alt.family(),
                        "ICCBased alternate does not match /N, using device space"
                    );
                    device
                }
            }
            None => device,
        };
        let range = match dict.get("Range") {
            Some(r) => {
                let range = self.resolver.resolve_num_array(r)?;
                if range.len() == 2 * n {
                    range
                } else {
                    tracing::warn!(
                        n,
                        len = range.len(),
                        "ICCBased /Range does not match /N, ignored"
                    );
                    [0.0, 1.0].repeat(n)
                }
            }
            None => [0.0, 1.0].repeat(n),
        };
        check_ranges("ICCBased", &range)?;
        Ok(ColorSpace::ICCBased {
            n,
            alternate,
            range,
        })
    }

    fn number(&self, dict: &PDFDict, key: &str) -> Result<Option<f64>> {
        match dict.get(key) {
            Some(v) => Ok(Some(self.resolver.resolve(v)?.as_num()?)),
            None => Ok(None),
        }
    }

    fn numbers<const N: usize>(&self, dict: &PDFDict, key: &str) -> Result<Option<[f64; N]>> {
        let Some(v) = dict.get(key) else {
            return Ok(None);
        };
        let values = self.resolver.resolve_num_array(v)?;
        values
            .try_into()
            .map(Some)
            .map_err(|v: Vec<f64>| invalid(format!("/{key} needs {N} numbers, got {}", v.len())))
    }

    fn white_point(&self, dict: &PDFDict) -> Result<[f64; 3]> {
        let wp = self
            .numbers::<3>(dict, "WhitePoint")?
            .ok_or_else(|| invalid("CIE color space without /WhitePoint"))?;
        if wp[0] <= 0.0 || wp[2] <= 0.0 || (wp[1] - 1.0).abs() > 1e-6 {
            return Err(invalid("WhitePoint must be positive with Y = 1"));
        }
        Ok(wp)
    }
}
