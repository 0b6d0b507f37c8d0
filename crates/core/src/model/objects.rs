//! PDF object values as seen by the content-stream engine.
//!
//! Operands, resource dictionaries and the descriptors handed to the color
//! space, function and shading parsers all use [`PDFObject`].

use crate::error::{RenderError, Result};
use bytes::Bytes;
use ordered_float::OrderedFloat;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Dictionary type used throughout the engine.
pub type PDFDict = HashMap<String, PDFObject>;

/// PDF Object types - the fundamental value type in PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum PDFObject {
    /// Null object
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Real (floating point) value
    Real(f64),
    /// Name object (e.g., /Type, /Font)
    Name(String),
    /// String (byte array)
    String(Vec<u8>),
    /// Array of objects
    Array(Vec<Self>),
    /// Dictionary (name -> object mapping)
    Dict(PDFDict),
    /// Stream (dictionary + binary data)
    Stream(Box<PDFStream>),
    /// Indirect object reference
    Ref(PDFObjRef),
}

impl PDFObject {
    /// Shorthand for building a name object.
    pub fn name(s: impl Into<String>) -> Self {
        Self::Name(s.into())
    }

    /// Check if this is a null object
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get as boolean
    pub const fn as_bool(&self) -> Result<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            _ => Err(RenderError::TypeError {
                expected: "bool",
                got: self.type_name(),
            }),
        }
    }

    /// Get as integer. Reals with no fractional part are accepted.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Self::Int(n) => Ok(*n),
            Self::Real(n) if n.fract() == 0.0 => Ok(*n as i64),
            _ => Err(RenderError::TypeError {
                expected: "int",
                got: self.type_name(),
            }),
        }
    }

    /// Get numeric value (int or real coerced to f64)
    pub const fn as_num(&self) -> Result<f64> {
        match self {
            Self::Int(n) => Ok(*n as f64),
            Self::Real(n) => Ok(*n),
            _ => Err(RenderError::TypeError {
                expected: "number",
                got: self.type_name(),
            }),
        }
    }

    /// Get as name string
    pub fn as_name(&self) -> Result<&str> {
        match self {
            Self::Name(s) => Ok(s),
            _ => Err(RenderError::TypeError {
                expected: "name",
                got: self.type_name(),
            }),
        }
    }

    /// Get as byte string
    pub fn as_string(&self) -> Result<&[u8]> {
        match self {
            Self::String(s) => Ok(s),
            _ => Err(RenderError::TypeError {
                expected: "string",
                got: self.type_name(),
            }),
        }
    }

    /// Get as array
    pub const fn as_array(&self) -> Result<&Vec<Self>> {
        match self {
            Self::Array(arr) => Ok(arr),
            _ => Err(RenderError::TypeError {
                expected: "array",
                got: self.type_name(),
            }),
        }
    }

    /// Get as dictionary. Streams expose their attribute dictionary.
    pub fn as_dict(&self) -> Result<&PDFDict> {
        match self {
            Self::Dict(d) => Ok(d),
            Self::Stream(s) => Ok(&s.attrs),
            _ => Err(RenderError::TypeError {
                expected: "dict",
                got: self.type_name(),
            }),
        }
    }

    /// Get as stream
    pub fn as_stream(&self) -> Result<&PDFStream> {
        match self {
            Self::Stream(s) => Ok(s),
            _ => Err(RenderError::TypeError {
                expected: "stream",
                got: self.type_name(),
            }),
        }
    }

    /// Get as object reference
    pub const fn as_ref(&self) -> Result<&PDFObjRef> {
        match self {
            Self::Ref(r) => Ok(r),
            _ => Err(RenderError::TypeError {
                expected: "ref",
                got: self.type_name(),
            }),
        }
    }

    /// Get an array of numbers.
    pub fn as_num_array(&self) -> Result<Vec<f64>> {
        self.as_array()?.iter().map(Self::as_num).collect()
    }

    /// Get type name for error messages
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Name(_) => "name",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Dict(_) => "dict",
            Self::Stream(_) => "stream",
            Self::Ref(_) => "ref",
        }
    }

    /// Feed a structural digest of this object into `state`.
    ///
    /// Structurally equal objects produce equal digests. Dictionary keys are
    /// visited in sorted order. Stream payloads are hashed by length only;
    /// callers that cache on the digest must confirm hits with `==`.
    pub fn hash_structure<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(n) => n.hash(state),
            Self::Real(n) => OrderedFloat(*n).hash(state),
            Self::Name(s) => s.hash(state),
            Self::String(s) => s.hash(state),
            Self::Array(arr) => {
                arr.len().hash(state);
                for item in arr {
                    item.hash_structure(state);
                }
            }
            Self::Dict(d) => hash_dict(d, state),
            Self::Stream(s) => {
                hash_dict(&s.attrs, state);
                s.rawdata.len().hash(state);
            }
            Self::Ref(r) => r.hash(state),
        }
    }
}

fn hash_dict<H: Hasher>(dict: &PDFDict, state: &mut H) {
    let mut keys: Vec<&String> = dict.keys().collect();
    keys.sort_unstable();
    keys.len().hash(state);
    for key in keys {
        key.hash(state);
        dict[key].hash_structure(state);
    }
}

impl From<f64> for PDFObject {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<i64> for PDFObject {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<PDFDict> for PDFObject {
    fn from(value: PDFDict) -> Self {
        Self::Dict(value)
    }
}

impl From<PDFStream> for PDFObject {
    fn from(value: PDFStream) -> Self {
        Self::Stream(Box::new(value))
    }
}

/// PDF indirect object reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PDFObjRef {
    /// Object ID
    pub objid: u32,
    /// Generation number
    pub genno: u32,
}

impl PDFObjRef {
    /// Create a new object reference.
    pub const fn new(objid: u32, genno: u32) -> Self {
        Self { objid, genno }
    }
}

/// PDF Stream - dictionary attributes + raw (still encoded) data.
#[derive(Debug, Clone, PartialEq)]
pub struct PDFStream {
    /// Stream dictionary attributes
    pub attrs: PDFDict,
    /// Raw (possibly encoded) data
    rawdata: Bytes,
}

impl PDFStream {
    /// Create a new stream.
    pub fn new(attrs: PDFDict, rawdata: impl Into<Bytes>) -> Self {
        Self {
            attrs,
            rawdata: rawdata.into(),
        }
    }

    /// Get raw (undecoded) data.
    pub fn get_rawdata(&self) -> &[u8] {
        self.rawdata.as_ref()
    }

    /// Get raw data as shared bytes.
    pub fn rawdata_bytes(&self) -> Bytes {
        self.rawdata.clone()
    }

    /// Get attribute by name.
    pub fn get(&self, name: &str) -> Option<&PDFObject> {
        self.attrs.get(name)
    }

    /// Get attribute, trying multiple names.
    pub fn get_any(&self, names: &[&str]) -> Option<&PDFObject> {
        names.iter().find_map(|name| self.attrs.get(*name))
    }
}

/// Build a dictionary from `(key, value)` pairs.
pub fn dict_from<I, K>(pairs: I) -> PDFDict
where
    I: IntoIterator<Item = (K, PDFObject)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}
