//! Rendering options.
//!
//! Contains RenderOptions for bounding recursion and resource use.

/// Limits and strictness of content-stream interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Maximum nesting of Form XObjects (and pattern cells) within a page.
    pub max_form_depth: usize,

    /// Maximum nesting of color space descriptors, e.g. an Indexed space
    /// over a Separation over an ICCBased space.
    pub max_colorspace_depth: usize,

    /// Upper bound on the pixel count of one rendered pattern tile. Larger
    /// tiles are rendered at reduced resolution.
    pub max_tile_pixels: u64,

    /// If an operand count mismatch aborts interpretation. When false the
    /// statement is skipped with a warning.
    pub strict_operands: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_form_depth: 32,
            max_colorspace_depth: 16,
            max_tile_pixels: 4 * 1024 * 1024,
            strict_operands: true,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_form_depth(mut self, depth: usize) -> Self {
        self.max_form_depth = depth;
        self
    }

    pub fn with_max_colorspace_depth(mut self, depth: usize) -> Self {
        self.max_colorspace_depth = depth;
        self
    }

    pub fn with_max_tile_pixels(mut self, pixels: u64) -> Self {
        self.max_tile_pixels = pixels.max(1);
        self
    }

    pub fn with_strict_operands(mut self, strict: bool) -> Self {
        self.strict_operands = strict;
        self
    }
}
