//! Resource lookup for the interpreter.
//!
//! - [`ResourceResolver`]: collaborator that dereferences indirect objects
//!   and decodes stream data. The document layer implements it.
//! - [`ResourceScopes`]: stack of `/Resources` dictionaries. Forms and
//!   patterns push their own scope; lookups fall back to enclosing scopes.
//! - [`ObjectStore`]: in-memory resolver for tests and tools.

use crate::codec;
use crate::error::{RenderError, Result};
use crate::model::objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
use rustc_hash::FxHashMap;

/// Object graph access needed while interpreting a page.
pub trait ResourceResolver {
    /// Dereference `obj` if it is an indirect reference. Other objects are
    /// returned as-is.
    fn resolve(&self, obj: &PDFObject) -> Result<PDFObject>;

    /// Return the stream payload with its non-image filters applied.
    fn stream_data(&self, stream: &PDFStream) -> Result<Vec<u8>> {
        let (data, rest) = codec::decode_filters(stream.get_rawdata(), &stream.attrs)?;
        if let Some(name) = rest.first() {
            return Err(RenderError::UnsupportedFeature(format!(
                "{name} on a non-image stream"
            )));
        }
        Ok(data)
    }

    /// Resolve `obj` and require a dictionary (or stream dictionary).
    fn resolve_dict(&self, obj: &PDFObject) -> Result<PDFDict> {
        match self.resolve(obj)? {
            PDFObject::Dict(d) => Ok(d),
            PDFObject::Stream(s) => Ok(s.attrs),
            other => Err(RenderError::TypeError {
                expected: "dict",
                got: other.type_name(),
            }),
        }
    }

    /// Resolve `obj` and read it as a number array.
    fn resolve_num_array(&self, obj: &PDFObject) -> Result<Vec<f64>> {
        let resolved = self.resolve(obj)?;
        resolved
            .as_array()?
            .iter()
            .map(|item| self.resolve(item)?.as_num())
            .collect()
    }
}

/// Resource categories of a `/Resources` dictionary.
pub mod category {
    pub const EXT_GSTATE: &str = "ExtGState";
    pub const COLOR_SPACE: &str = "ColorSpace";
    pub const PATTERN: &str = "Pattern";
    pub const SHADING: &str = "Shading";
    pub const XOBJECT: &str = "XObject";
    pub const FONT: &str = "Font";
    pub const PROPERTIES: &str = "Properties";
}

/// Stack of resource dictionaries, innermost last.
#[derive(Debug, Clone, Default)]
pub struct ResourceScopes {
    scopes: Vec<PDFDict>,
}

impl ResourceScopes {
    pub fn new(page_resources: PDFDict) -> Self {
        Self {
            scopes: vec![page_resources],
        }
    }

    /// Push a child scope.
    pub fn push(&mut self, resources: PDFDict) {
        self.scopes.push(resources);
    }

    /// Pop the innermost scope.
    pub fn pop(&mut self) -> Option<PDFDict> {
        self.scopes.pop()
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Look up `name` in `category`, innermost scope first.
    ///
    /// The entry is returned unresolved so callers can key caches on the
    /// indirect reference.
    pub fn lookup(
        &self,
        resolver: &dyn ResourceResolver,
        category: &str,
        name: &str,
    ) -> Result<Option<PDFObject>> {
        for scope in self.scopes.iter().rev() {
            let Some(entries) = scope.get(category) else {
                continue;
            };
            let entries = resolver.resolve(entries)?;
            if let Ok(dict) = entries.as_dict()
                && let Some(obj) = dict.get(name)
            {
                return Ok(Some(obj.clone()));
            }
        }
        Ok(None)
    }

    /// Like [`Self::lookup`] but a missing entry is an error.
    pub fn require(
        &self,
        resolver: &dyn ResourceResolver,
        category: &'static str,
        name: &str,
    ) -> Result<PDFObject> {
        self.lookup(resolver, category, name)?
            .ok_or_else(|| RenderError::UnresolvableResource {
                category,
                name: name.to_string(),
            })
    }
}

/// Limit on chained references (`1 0 R` pointing at `2 0 R` ...).
const MAX_REF_CHAIN: usize = 32;

/// In-memory object table implementing [`ResourceResolver`].
#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    objects: FxHashMap<PDFObjRef, PDFObject>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object and return a reference to it.
    pub fn insert(&mut self, objid: u32, obj: impl Into<PDFObject>) -> PDFObject {
        let objref = PDFObjRef::new(objid, 0);
        self.objects.insert(objref, obj.into());
        PDFObject::Ref(objref)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ResourceResolver for ObjectStore {
    fn resolve(&self, obj: &PDFObject) -> Result<PDFObject> {
        let mut current = obj;
        for _ in 0..MAX_REF_CHAIN {
            match current {
                PDFObject::Ref(r) => match self.objects.get(r) {
                    Some(obj) => current = obj,
                    None => return Ok(PDFObject::Null),
                },
                other => return Ok(other.clone()),
            }
        }
        Err(RenderError::RecursionLimit("indirect reference chain".into()))
    }
}
