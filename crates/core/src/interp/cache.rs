//! Per-document caches and collaborators.
//!
//! [`ResourceManager`] owns everything that outlives a single content
//! stream: resolved color spaces, functions, shadings, rendered pattern
//! tiles and loaded fonts. Entries are keyed by the descriptor object as it
//! appears in the resource dictionary (usually an indirect reference), so
//! resolving the same descriptor twice hands back the same `Arc`.
//!
//! Color spaces can depend on the resource scope they are resolved in
//! (`/DefaultRGB` overrides, named bases). Each cached color space records
//! the `/ColorSpace` bindings it consulted and is only reused where those
//! bindings are unchanged.

use crate::error::Result;
use crate::font::{FontLoader, GlyphSource, WidthTableLoader};
use crate::image::{BasicImageDecoder, ImageDecoder};
use crate::interp::device::Raster;
use crate::interp::resources::ResourceResolver;
use crate::model::color::ColorSpace;
use crate::model::function::PDFFunction;
use crate::model::objects::PDFObject;
use crate::shading::Shading;
use rustc_hash::{FxHashMap, FxHasher};
use smallvec::SmallVec;
use std::hash::Hasher;
use std::sync::Arc;

fn digest(obj: &PDFObject) -> u64 {
    let mut hasher = FxHasher::default();
    obj.hash_structure(&mut hasher);
    hasher.finish()
}

/// Map from descriptor objects to resolved values.
///
/// Lookups hash the descriptor structurally and confirm candidates with
/// `==`, so digest collisions never return the wrong value.
#[derive(Debug)]
pub struct MemoTable<V> {
    entries: FxHashMap<u64, SmallVec<[(PDFObject, V); 1]>>,
    len: usize,
}

impl<V> Default for MemoTable<V> {
    fn default() -> Self {
        Self {
            entries: FxHashMap::default(),
            len: 0,
        }
    }
}

impl<V: Clone> MemoTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &PDFObject) -> Option<V> {
        self.entries
            .get(&digest(key))?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Insert or replace the value for `key`.
    pub fn insert(&mut self, key: PDFObject, value: V) {
        let bucket = self.entries.entry(digest(&key)).or_default();
        if let Some(slot) = bucket.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            bucket.push((key, value));
            self.len += 1;
        }
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mutable access to the value for `key`, inserting a default first.
    pub fn get_or_default(&mut self, key: PDFObject) -> &mut V
    where
        V: Default,
    {
        let bucket = self.entries.entry(digest(&key)).or_default();
        let pos = match bucket.iter().position(|(k, _)| *k == key) {
            Some(pos) => pos,
            None => {
                bucket.push((key, V::default()));
                self.len += 1;
                bucket.len() - 1
            }
        };
        &mut bucket[pos].1
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.len = 0;
    }
}

/// A resolved color space together with the scope bindings it depends on.
#[derive(Debug, Clone)]
pub struct ScopedColorSpace {
    /// `/ColorSpace` names looked up during resolution and the entry each
    /// was bound to (`None` when absent).
    pub bindings: Vec<(String, Option<PDFObject>)>,
    pub space: Arc<ColorSpace>,
}

/// Resource manager facilitates reuse of shared resources such as color
/// spaces, functions and fonts across nested content streams and pages.
///
/// A cached value is returned only for an equal descriptor. Functions,
/// shadings and fonts depend on the descriptor alone; color spaces are
/// additionally matched on the scope bindings they were resolved under, and
/// pattern tiles on their device geometry and underlying color.
pub struct ResourceManager {
    colorspaces: MemoTable<Vec<ScopedColorSpace>>,
    functions: MemoTable<Arc<PDFFunction>>,
    shadings: MemoTable<Arc<Shading>>,
    tiles: MemoTable<Arc<Raster>>,
    fonts: MemoTable<Arc<dyn GlyphSource>>,
    font_loader: Box<dyn FontLoader>,
    image_decoder: Box<dyn ImageDecoder>,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("colorspaces", &self.colorspaces.len())
            .field("functions", &self.functions.len())
            .field("shadings", &self.shadings.len())
            .field("tiles", &self.tiles.len())
            .field("fonts", &self.fonts.len())
            .finish_non_exhaustive()
    }
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceManager {
    /// Create a resource manager with the built-in font loader and image
    /// decoder.
    pub fn new() -> Self {
        Self {
            colorspaces: MemoTable::new(),
            functions: MemoTable::new(),
            shadings: MemoTable::new(),
            tiles: MemoTable::new(),
            fonts: MemoTable::new(),
            font_loader: Box::new(WidthTableLoader),
            image_decoder: Box::new(BasicImageDecoder),
        }
    }

    pub fn with_font_loader(mut self, loader: impl FontLoader + 'static) -> Self {
        self.font_loader = Box::new(loader);
        self.fonts.clear();
        self
    }

    pub fn with_image_decoder(mut self, decoder: impl ImageDecoder + 'static) -> Self {
        self.image_decoder = Box::new(decoder);
        self
    }

    pub fn image_decoder(&self) -> &dyn ImageDecoder {
        self.image_decoder.as_ref()
    }

    /// Every cached resolution of `key`, one per distinct set of bindings.
    pub fn cached_colorspaces(&self, key: &PDFObject) -> Vec<ScopedColorSpace> {
        self.colorspaces.get(key).unwrap_or_default()
    }

    pub fn cache_colorspace(&mut self, key: PDFObject, entry: ScopedColorSpace) {
        let variants = self.colorspaces.get_or_default(key);
        variants.retain(|v| v.bindings != entry.bindings);
        variants.push(entry);
    }

    /// Parse (or reuse) the function described by `obj`.
    pub fn function(
        &mut self,
        obj: &PDFObject,
        resolver: &dyn ResourceResolver,
    ) -> Result<Arc<PDFFunction>> {
        if let Some(f) = self.functions.get(obj) {
            return Ok(f);
        }
        let f = Arc::new(PDFFunction::from_object(obj, resolver)?);
        self.functions.insert(obj.clone(), Arc::clone(&f));
        Ok(f)
    }

    pub fn cached_shading(&self, key: &PDFObject) -> Option<Arc<Shading>> {
        self.shadings.get(key)
    }

    pub fn cache_shading(&mut self, key: PDFObject, shading: Arc<Shading>) {
        self.shadings.insert(key, shading);
    }

    pub fn cached_tile(&self, key: &PDFObject) -> Option<Arc<Raster>> {
        self.tiles.get(key)
    }

    pub fn cache_tile(&mut self, key: PDFObject, tile: Arc<Raster>) {
        self.tiles.insert(key, tile);
    }

    /// Load (or reuse) the font for a `/Font` resource entry.
    pub fn font(
        &mut self,
        entry: &PDFObject,
        resolver: &dyn ResourceResolver,
    ) -> Result<Arc<dyn GlyphSource>> {
        if let Some(font) = self.fonts.get(entry) {
            return Ok(font);
        }
        let dict = resolver.resolve_dict(entry)?;
        let font = self.font_loader.load(&dict, resolver)?;
        self.fonts.insert(entry.clone(), Arc::clone(&font));
        Ok(font)
    }
}
