//! Font collaborator seam.
//!
//! The interpreter never loads glyph outlines. It only needs to split a
//! shown string into character codes, map each code to a glyph id, and know
//! its advance width. [`GlyphSource`] covers exactly that; [`WidthTableFont`]
//! implements it from the width tables of a font dictionary.

use crate::error::{RenderError, Result};
use crate::interp::resources::ResourceResolver;
use crate::model::objects::{PDFDict, PDFObject};
use std::fmt;
use std::sync::Arc;

/// One decoded character of a shown string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphCode {
    /// Character code as read from the string.
    pub code: u32,
    /// Glyph id in the font program.
    pub gid: u32,
    /// Horizontal advance in 1/1000 text space units.
    pub width: f64,
    /// Single-byte code 32; word spacing applies.
    pub is_space: bool,
}

/// Code-to-glyph mapping and metrics for a font resource.
pub trait GlyphSource: fmt::Debug {
    /// Split `bytes` into glyphs.
    fn decode(&self, bytes: &[u8]) -> Vec<GlyphCode>;

    /// PostScript name of the font, if known.
    fn base_font(&self) -> &str {
        ""
    }
}

/// Builds a [`GlyphSource`] for a `/Font` resource.
pub trait FontLoader {
    fn load(&self, font: &PDFDict, resolver: &dyn ResourceResolver)
    -> Result<Arc<dyn GlyphSource>>;
}

/// Loader producing [`WidthTableFont`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WidthTableLoader;

impl FontLoader for WidthTableLoader {
    fn load(
        &self,
        font: &PDFDict,
        resolver: &dyn ResourceResolver,
    ) -> Result<Arc<dyn GlyphSource>> {
        Ok(Arc::new(WidthTableFont::from_dict(font, resolver)?))
    }
}

#[derive(Debug, Clone)]
enum WidthTable {
    /// Simple fonts: `/FirstChar` + `/Widths`, one byte per code.
    Simple { first_char: u32, widths: Vec<f64> },
    /// Type0 fonts: two-byte codes with `/W` ranges.
    Composite { widths: CidWidths },
}

#[derive(Debug, Clone, Copy)]
struct CidRange {
    first: u32,
    last: u32,
    width: f64,
    /// Position in `/W`; later entries win where ranges overlap.
    order: usize,
}

/// `/W` entries kept as code ranges, sorted by first code.
#[derive(Debug, Clone, Default)]
struct CidWidths {
    ranges: Vec<CidRange>,
    /// `reach[i]` is the largest `last` in `ranges[..=i]`.
    reach: Vec<u32>,
}

impl CidWidths {
    fn new(mut ranges: Vec<CidRange>) -> Self {
        ranges.sort_by_key(|r| r.first);
        let reach = ranges
            .iter()
            .scan(0u32, |max, r| {
                *max = (*max).max(r.last);
                Some(*max)
            })
            .collect();
        Self { ranges, reach }
    }

    fn get(&self, code: u32) -> Option<f64> {
        let end = self.ranges.partition_point(|r| r.first <= code);
        let mut best: Option<&CidRange> = None;
        for i in (0..end).rev() {
            if self.reach[i] < code {
                break;
            }
            let range = &self.ranges[i];
            if range.last >= code && best.is_none_or(|b| range.order > b.order) {
                best = Some(range);
            }
        }
        best.map(|r| r.width)
    }
}

/// Font backed by the width tables of its dictionary.
///
/// Glyph ids equal character codes (identity encodings).
#[derive(Debug, Clone)]
pub struct WidthTableFont {
    base_font: String,
    table: WidthTable,
    missing_width: f64,
    /// Converts glyph-space widths to 1/1000 units (Type3 fonts).
    width_scale: f64,
}

impl WidthTableFont {
    /// Simple font with explicit widths.
    pub fn new(base_font: impl Into<String>, first_char: u32, widths: Vec<f64>) -> Self {
        Self {
            base_font: base_font.into(),
            table: WidthTable::Simple { first_char, widths },
            missing_width: 0.0,
            width_scale: 1.0,
        }
    }

    pub fn with_missing_width(mut self, width: f64) -> Self {
        self.missing_width = width;
        self
    }

    /// Read a font dictionary.
    ///
    /// Type0 fonts take widths from their first descendant (`/W`, `/DW`).
    /// Simple fonts use `/FirstChar`, `/Widths` and the descriptor's
    /// `/MissingWidth`.
    pub fn from_dict(font: &PDFDict, resolver: &dyn ResourceResolver) -> Result<Self> {
        let base_font = match font.get("BaseFont") {
            Some(obj) => resolver.resolve(obj)?.as_name().unwrap_or_default().to_string(),
            None => String::new(),
        };
        let subtype = match font.get("Subtype") {
            Some(obj) => resolver.resolve(obj)?.as_name().unwrap_or("Type1").to_string(),
            None => "Type1".to_string(),
        };

        if subtype == "Type0" {
            let descendants = font
                .get("DescendantFonts")
                .ok_or_else(|| RenderError::KeyError("DescendantFonts".into()))?;
            let descendants = resolver.resolve(descendants)?;
            let first = descendants
                .as_array()?
                .first()
                .ok_or_else(|| RenderError::KeyError("DescendantFonts[0]".into()))?;
            let cid_font = resolver.resolve_dict(first)?;
            let default_width = match cid_font.get("DW") {
                Some(obj) => resolver.resolve(obj)?.as_num()?,
                None => 1000.0,
            };
            let widths = match cid_font.get("W") {
                Some(obj) => parse_cid_widths(resolver.resolve(obj)?.as_array()?, resolver)?,
                None => CidWidths::default(),
            };
            return Ok(Self {
                base_font,
                table: WidthTable::Composite { widths },
                missing_width: default_width,
                width_scale: 1.0,
            });
        }

        let first_char = match font.get("FirstChar") {
            Some(obj) => resolver.resolve(obj)?.as_int()?.max(0) as u32,
            None => 0,
        };
        let widths = match font.get("Widths") {
            Some(obj) => resolver.resolve_num_array(obj)?,
            None => Vec::new(),
        };
        let missing_width = match font.get("FontDescriptor") {
            Some(obj) => match resolver.resolve_dict(obj)?.get("MissingWidth") {
                Some(w) => resolver.resolve(w)?.as_num()?,
                None => 0.0,
            },
            None => 0.0,
        };
        let width_scale = if subtype == "Type3" {
            match font.get("FontMatrix") {
                Some(obj) => resolver
                    .resolve_num_array(obj)?
                    .first()
                    .map_or(1.0, |a| a * 1000.0),
                None => 1.0,
            }
        } else {
            1.0
        };
        Ok(Self {
            base_font,
            table: WidthTable::Simple { first_char, widths },
            missing_width,
            width_scale,
        })
    }

    fn width(&self, code: u32) -> f64 {
        let w = match &self.table {
            WidthTable::Simple { first_char, widths } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize).copied()),
            WidthTable::Composite { widths } => widths.get(code),
        };
        w.unwrap_or(self.missing_width) * self.width_scale
    }
}

impl GlyphSource for WidthTableFont {
    fn decode(&self, bytes: &[u8]) -> Vec<GlyphCode> {
        match self.table {
            WidthTable::Simple { .. } => bytes
                .iter()
                .map(|&b| {
                    let code = u32::from(b);
                    GlyphCode {
                        code,
                        gid: code,
                        width: self.width(code),
                        is_space: b == b' ',
                    }
                })
                .collect(),
            WidthTable::Composite { .. } => bytes
                .chunks(2)
                .map(|pair| {
                    // an odd trailing byte is read as the high byte
                    let code = (u32::from(pair[0]) << 8) | pair.get(1).map_or(0, |&b| u32::from(b));
                    GlyphCode {
                        code,
                        gid: code,
                        width: self.width(code),
                        is_space: false,
                    }
                })
                .collect(),
        }
    }

    fn base_font(&self) -> &str {
        &self.base_font
    }
}

/// A character code: a non-negative integer that fits in 32 bits.
fn cid_code(value: f64) -> Option<u32> {
    (value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value)).then_some(value as u32)
}

/// Parse a CID `/W` array.
///
/// Two entry forms: `c [w1 w2 ...]` for consecutive codes and
/// `cfirst clast w` for a range. Entries with codes that are negative,
/// fractional or beyond 32 bits are skipped.
fn parse_cid_widths(items: &[PDFObject], resolver: &dyn ResourceResolver) -> Result<CidWidths> {
    let mut ranges = Vec::new();
    let mut pending: Vec<f64> = Vec::with_capacity(3);
    for item in items {
        match resolver.resolve(item)? {
            PDFObject::Array(run) => {
                let Some(start) = pending.pop() else {
                    tracing::debug!("width run without a starting code");
                    continue;
                };
                pending.clear();
                let Some(start) = cid_code(start) else {
                    tracing::debug!(start, "width run with an invalid starting code");
                    continue;
                };
                for (i, w) in run.iter().enumerate() {
                    let Some(code) = u32::try_from(i).ok().and_then(|i| start.checked_add(i))
                    else {
                        tracing::debug!(start, len = run.len(), "width run past the last code");
                        break;
                    };
                    ranges.push(CidRange {
                        first: code,
                        last: code,
                        width: resolver.resolve(w)?.as_num()?,
                        order: ranges.len(),
                    });
                }
            }
            other => {
                pending.push(other.as_num()?);
                if let [first, last, width] = pending[..] {
                    pending.clear();
                    match (cid_code(first), cid_code(last)) {
                        (Some(first), Some(last)) if first <= last => ranges.push(CidRange {
                            first,
                            last,
                            width,
                            order: ranges.len(),
                        }),
                        _ => tracing::debug!(first, last, "invalid width range skipped"),
                    }
                }
            }
        }
    }
    Ok(CidWidths::new(ranges))
}
