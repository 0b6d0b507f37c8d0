//! Content-stream statements.
//!
//! Groups the token sequence into statements: one operator plus the operand
//! buffer collected since the previous operator. Arrays and dictionaries
//! are assembled into nested [`PDFObject`] operands. `BI ... ID ... EI`
//! blocks become a single [`InlineImage`] with abbreviated keys and values
//! expanded to their full names.

use super::lexer::{ContentLexer, Keyword, Token, TokenKind};
use crate::error::{RenderError, Result};
use crate::model::objects::{PDFDict, PDFObject};
use bytes::Bytes;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

/// Operand buffer for a single operator.
pub type Operands = SmallVec<[PDFObject; 6]>;

/// One operator with the operands that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub operator: Keyword,
    pub operands: Operands,
    /// Byte range from the first operand to the end of the operator.
    pub range: Range<usize>,
}

/// An inline image (`BI ... ID <data> EI`).
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// Image dictionary with keys and values expanded.
    pub dict: PDFDict,
    /// Raw (possibly filtered) image bytes.
    pub data: Bytes,
    pub range: Range<usize>,
}

/// A content-stream statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Operation(Operation),
    InlineImage(InlineImage),
}

impl Statement {
    pub fn range(&self) -> &Range<usize> {
        match self {
            Self::Operation(op) => &op.range,
            Self::InlineImage(img) => &img.range,
        }
    }
}

/// Inline image key abbreviations.
pub static INLINE_KEY_ABBREV: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("BPC", "BitsPerComponent"),
            ("CS", "ColorSpace"),
            ("D", "Decode"),
            ("DP", "DecodeParms"),
            ("F", "Filter"),
            ("H", "Height"),
            ("IM", "ImageMask"),
            ("I", "Interpolate"),
            ("W", "Width"),
            ("L", "Length"),
        ])
    });

/// Inline image color space name abbreviations.
pub static INLINE_COLORSPACE_ABBREV: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("G", "DeviceGray"),
            ("RGB", "DeviceRGB"),
            ("CMYK", "DeviceCMYK"),
            ("I", "Indexed"),
        ])
    });

/// Inline image filter name abbreviations.
pub static INLINE_FILTER_ABBREV: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| {
        HashMap::from([
            ("AHx", "ASCIIHexDecode"),
            ("A85", "ASCII85Decode"),
            ("LZW", "LZWDecode"),
            ("Fl", "FlateDecode"),
            ("RL", "RunLengthDecode"),
            ("CCF", "CCITTFaxDecode"),
            ("DCT", "DCTDecode"),
        ])
    });

/// Container being assembled from `[`/`<<` tokens.
enum Frame {
    Array(Vec<PDFObject>),
    Dict(Vec<PDFObject>, usize),
}

/// Iterator over the statements of one content stream.
pub struct ContentParser<'a> {
    lexer: ContentLexer<'a>,
    operands: Operands,
    frames: Vec<Frame>,
    stmt_start: Option<usize>,
}

impl<'a> ContentParser<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: ContentLexer::new(data),
            operands: SmallVec::new(),
            frames: Vec::new(),
            stmt_start: None,
        }
    }

    fn next_statement(&mut self) -> Result<Option<Statement>> {
        loop {
            let Some(token) = self.lexer.next_token()? else {
                if !self.frames.is_empty() {
                    return Err(RenderError::Syntax {
                        pos: self.lexer.tell(),
                        msg: "unclosed array or dictionary".into(),
                    });
                }
                // trailing operands with no operator are dropped
                if !self.operands.is_empty() {
                    tracing::debug!(count = self.operands.len(), "dangling operands at end of stream");
                }
                return Ok(None);
            };
            self.stmt_start.get_or_insert(token.range.start);

            let value = match token.kind {
                TokenKind::Operator(Keyword::BI) if self.frames.is_empty() => {
                    let start = self.stmt_start.take().unwrap_or(token.range.start);
                    if !self.operands.is_empty() {
                        return Err(RenderError::malformed(
                            "BI",
                            format!("expected 0 operands, found {}", self.operands.len()),
                        ));
                    }
                    return self.read_inline_image(start).map(|img| Some(Statement::InlineImage(img)));
                }
                TokenKind::Operator(op) => {
                    if !self.frames.is_empty() {
                        return Err(RenderError::Syntax {
                            pos: token.range.start,
                            msg: format!("operator `{}` inside array or dictionary", op.as_str()),
                        });
                    }
                    let start = self.stmt_start.take().unwrap_or(token.range.start);
                    return Ok(Some(Statement::Operation(Operation {
                        operator: op,
                        operands: std::mem::take(&mut self.operands),
                        range: start..token.range.end,
                    })));
                }
                TokenKind::ArrayStart => {
                    self.frames.push(Frame::Array(Vec::new()));
                    continue;
                }
                TokenKind::DictStart => {
                    self.frames.push(Frame::Dict(Vec::new(), token.range.start));
                    continue;
                }
                TokenKind::ArrayEnd => match self.frames.pop() {
                    Some(Frame::Array(items)) => PDFObject::Array(items),
                    _ => {
                        return Err(RenderError::Syntax {
                            pos: token.range.start,
                            msg: "unbalanced ']'".into(),
                        });
                    }
                },
                TokenKind::DictEnd => match self.frames.pop() {
                    Some(Frame::Dict(items, pos)) => PDFObject::Dict(pairs_to_dict(items, pos)?),
                    _ => {
                        return Err(RenderError::Syntax {
                            pos: token.range.start,
                            msg: "unbalanced '>>'".into(),
                        });
                    }
                },
                TokenKind::InlineImageData => {
                    return Err(RenderError::Syntax {
                        pos: token.range.start,
                        msg: "image data outside BI/EI".into(),
                    });
                }
                other => scalar_object(other),
            };
            self.push_value(value);
        }
    }

    fn push_value(&mut self, value: PDFObject) {
        match self.frames.last_mut() {
            Some(Frame::Array(items)) | Some(Frame::Dict(items, _)) => items.push(value),
            None => self.operands.push(value),
        }
    }

    /// Read `key value ... ID <data> EI` after a `BI` operator.
    fn read_inline_image(&mut self, start: usize) -> Result<InlineImage> {
        let mut pairs: Vec<PDFObject> = Vec::new();
        let mut frames: Vec<Frame> = Vec::new();
        loop {
            let token = self.expect_token(start)?;
            let value = match token.kind {
                TokenKind::Operator(Keyword::ID) if frames.is_empty() => break,
                TokenKind::ArrayStart => {
                    frames.push(Frame::Array(Vec::new()));
                    continue;
                }
                TokenKind::DictStart => {
                    frames.push(Frame::Dict(Vec::new(), token.range.start));
                    continue;
                }
                TokenKind::ArrayEnd => match frames.pop() {
                    Some(Frame::Array(items)) => PDFObject::Array(items),
                    _ => return Err(inline_syntax(token.range.start, "unbalanced ']'")),
                },
                TokenKind::DictEnd => match frames.pop() {
                    Some(Frame::Dict(items, pos)) => PDFObject::Dict(pairs_to_dict(items, pos)?),
                    _ => return Err(inline_syntax(token.range.start, "unbalanced '>>'")),
                },
                TokenKind::Operator(op) => {
                    return Err(inline_syntax(
                        token.range.start,
                        &format!("unexpected operator `{}` in inline image dictionary", op.as_str()),
                    ));
                }
                TokenKind::InlineImageData => {
                    return Err(inline_syntax(token.range.start, "image data before ID"));
                }
                other => scalar_object(other),
            };
            match frames.last_mut() {
                Some(Frame::Array(items)) | Some(Frame::Dict(items, _)) => items.push(value),
                None => pairs.push(value),
            }
        }

        let data_token = self.expect_token(start)?;
        if data_token.kind != TokenKind::InlineImageData {
            return Err(inline_syntax(data_token.range.start, "missing inline image data"));
        }
        let data = Bytes::copy_from_slice(&self.lexer.source()[data_token.range.clone()]);

        let end_token = self.expect_token(start)?;
        if end_token.kind != TokenKind::Operator(Keyword::EI) {
            return Err(RenderError::UnterminatedInlineImage { pos: data_token.range.start });
        }

        let dict = pairs_to_dict(pairs, start)?
            .into_iter()
            .map(|(key, value)| expand_inline_entry(key, value))
            .collect();

        Ok(InlineImage {
            dict,
            data,
            range: start..end_token.range.end,
        })
    }

    fn expect_token(&mut self, start: usize) -> Result<Token> {
        self.lexer
            .next_token()?
            .ok_or(RenderError::UnterminatedInlineImage { pos: start })
    }
}

impl Iterator for ContentParser<'_> {
    type Item = Result<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_statement().transpose()
    }
}

/// Parse a whole content stream into statements.
pub fn parse_content(data: &[u8]) -> Result<Vec<Statement>> {
    ContentParser::new(data).collect()
}

fn scalar_object(kind: TokenKind) -> PDFObject {
    match kind {
        TokenKind::Integer(n) => PDFObject::Int(n),
        TokenKind::Real(n) => PDFObject::Real(n),
        TokenKind::Bool(b) => PDFObject::Bool(b),
        TokenKind::String(s) => PDFObject::String(s),
        TokenKind::Name(n) => PDFObject::Name(n),
        _ => PDFObject::Null,
    }
}

fn inline_syntax(pos: usize, msg: &str) -> RenderError {
    RenderError::Syntax {
        pos,
        msg: msg.to_string(),
    }
}

fn pairs_to_dict(items: Vec<PDFObject>, pos: usize) -> Result<PDFDict> {
    if items.len() % 2 != 0 {
        return Err(RenderError::Syntax {
            pos,
            msg: "dictionary has an odd number of entries".into(),
        });
    }
    let mut dict = PDFDict::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        let PDFObject::Name(key) = key else {
            return Err(RenderError::Syntax {
                pos,
                msg: format!("dictionary key must be a name, got {}", key.type_name()),
            });
        };
        dict.insert(key, value);
    }
    Ok(dict)
}

/// Expand one inline image dictionary entry.
fn expand_inline_entry(key: String, value: PDFObject) -> (String, PDFObject) {
    let key = INLINE_KEY_ABBREV
        .get(key.as_str())
        .map_or(key, |full| (*full).to_string());
    let value = match key.as_str() {
        "ColorSpace" => expand_names(value, &INLINE_COLORSPACE_ABBREV),
        "Filter" => expand_names(value, &INLINE_FILTER_ABBREV),
        _ => value,
    };
    (key, value)
}

fn expand_names(value: PDFObject, table: &HashMap<&'static str, &'static str>) -> PDFObject {
    match value {
        PDFObject::Name(name) => PDFObject::Name(
            table
                .get(name.as_str())
                .map_or(name, |full| (*full).to_string()),
        ),
        PDFObject::Array(items) => PDFObject::Array(
            items
                .into_iter()
                .map(|item| expand_names(item, table))
                .collect(),
        ),
        other => other,
    }
}
