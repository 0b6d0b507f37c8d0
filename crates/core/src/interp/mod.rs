//! PDF content stream interpretation and device output.
//!
//! This module contains:
//! - `interpreter`: the page interpreter, dispatch and state stack
//! - `ops`: Operator implementations by category
//! - `device`: the `DrawingSurface` output trait and reference surfaces
//! - `colorspace`: color space descriptor resolution
//! - `resources`: resource scopes and the object resolver trait
//! - `cache`: `ResourceManager`, caches shared by nested interpreters
//! - `options`: limits and strictness

pub mod cache;
pub mod colorspace;
pub mod device;
pub mod interpreter;
pub mod ops;
pub mod options;
pub mod resources;

// Re-export main types for convenience
pub use cache::{MemoTable, ResourceManager};
pub use colorspace::ColorSpaceResolver;
pub use device::{
    BoundsRaster, DrawingSurface, GlyphRun, Paint, PositionedGlyph, Raster, RasterSurface,
    RecordingSurface, StrokeStyle, SurfaceCall,
};
pub use interpreter::{PageInterpreter, page_ctm};
pub use options::RenderOptions;
pub use resources::{ObjectStore, ResourceResolver, ResourceScopes, category};
