//! ductus - a PDF content-stream interpreter.
//!
//! Interprets page content streams against a resource dictionary and
//! reports what is drawn to a [`DrawingSurface`]: paths, clips, glyph runs,
//! images, shadings and tiled patterns. Color spaces are resolved to device
//! RGB, PDF functions are evaluated, and axial, radial and function-based
//! shadings are sampled per pixel.
//!
//! ```
//! use ductus_core::{ObjectStore, PageInterpreter, PDFDict, RecordingSurface,
//!     RenderOptions, ResourceManager, MATRIX_IDENTITY};
//!
//! let store = ObjectStore::new();
//! let mut resources = ResourceManager::new();
//! let mut surface = RecordingSurface::new();
//! let options = RenderOptions::default();
//! PageInterpreter::new(&store, &mut resources, &mut surface, &options)
//!     .render_page(b"1 0 0 rg 0 0 10 10 re f", PDFDict::new(), MATRIX_IDENTITY)
//!     .unwrap();
//! assert_eq!(surface.calls().len(), 2);
//! ```

pub mod codec;
pub mod error;
pub mod font;
pub mod image;
pub mod interp;
pub mod model;
pub mod parser;
pub mod shading;
pub mod utils;

pub use error::{RenderError, Result};
pub use image::{BasicImageDecoder, ImageDecoder, ImageSpec};
pub use interp::{
    DrawingSurface, ObjectStore, PageInterpreter, Raster, RasterSurface, RecordingSurface,
    RenderOptions, ResourceManager, ResourceResolver, SurfaceCall, page_ctm,
};
pub use model::{ColorSpace, PDFDict, PDFFunction, PDFObject, PDFStream, Rgb};
pub use shading::{Shading, ShadingContext};
pub use utils::{MATRIX_IDENTITY, Matrix, Rect};
