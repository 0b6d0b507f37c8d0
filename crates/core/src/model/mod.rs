//! Data model - objects, functions, color spaces, paths and state.
//!
//! - `objects` - PDF object types (PDFObject, PDFStream, PDFObjRef)
//! - `function` - PDF functions (PDFFunction)
//! - `color` - Color spaces and RGB conversion (ColorSpace, Rgb)
//! - `path` - Path construction and clip regions (Path, ClipPath)
//! - `state` - Graphics and text state (GraphicsState, TextState)

pub mod color;
pub mod function;
pub mod objects;
pub mod path;
pub mod state;

// Re-export main types for convenience
pub use color::{ColorSpace, Rgb};
pub use function::{FunctionOutput, PDFFunction};
pub use objects::{PDFDict, PDFObjRef, PDFObject, PDFStream};
pub use path::{ClipPath, FillRule, Path, PathSegment};
pub use state::{BlendMode, ColorState, GraphicsState, TextRenderMode, TextState};
