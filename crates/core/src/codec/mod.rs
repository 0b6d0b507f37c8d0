//! Stream filters needed to read content, function and image streams.
//!
//! - `ascii85`: ASCII85 and ASCIIHex decoding
//! - `runlength`: RunLengthDecode
//! - `predictor`: PNG and TIFF predictors from `/DecodeParms`
//!
//! FlateDecode goes through `flate2`. Image codecs (DCT, CCITT, JBIG2, JPX)
//! and LZW are left to the image decoder collaborator.

pub mod ascii85;
pub mod predictor;
pub mod runlength;

pub use ascii85::{ascii85decode, asciihexdecode};
pub use predictor::PredictorParams;
pub use runlength::rldecode;

use crate::error::{RenderError, Result};
use crate::model::objects::{PDFDict, PDFObject};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Inflate zlib-wrapped data.
pub fn flatedecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut decoder = ZlibDecoder::new(data);
    match decoder.read_to_end(&mut out) {
        Ok(_) => Ok(out),
        // keep what inflated before a corrupt tail
        Err(e) if !out.is_empty() => {
            tracing::warn!(error = %e, "truncated flate stream");
            Ok(out)
        }
        Err(e) => Err(RenderError::DecodeError(format!("flate: {e}"))),
    }
}

/// Names of the filters declared by a stream dictionary, in application order.
pub fn filter_names(dict: &PDFDict) -> Vec<String> {
    match dict.get("Filter").or_else(|| dict.get("F")) {
        Some(PDFObject::Name(n)) => vec![n.clone()],
        Some(PDFObject::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_name().ok().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Apply the non-image filters declared by `dict` to `data`.
///
/// Stops before the first image codec and returns the remaining filter
/// names so an image decoder can take over.
pub fn decode_filters(data: &[u8], dict: &PDFDict) -> Result<(Vec<u8>, Vec<String>)> {
    let names = filter_names(dict);
    let mut buf = data.to_vec();
    for (i, name) in names.iter().enumerate() {
        buf = match name.as_str() {
            "FlateDecode" | "Fl" => {
                let inflated = flatedecode(&buf)?;
                match decode_parms(dict, i).and_then(PredictorParams::from_dict) {
                    Some(params) => params.apply(&inflated)?,
                    None => inflated,
                }
            }
            "ASCIIHexDecode" | "AHx" => asciihexdecode(&buf)?,
            "ASCII85Decode" | "A85" => ascii85decode(&buf)?,
            "RunLengthDecode" | "RL" => rldecode(&buf)?,
            _ => return Ok((buf, names[i..].to_vec())),
        };
    }
    Ok((buf, Vec::new()))
}

/// The `/DecodeParms` dictionary of the filter at `index`.
fn decode_parms(dict: &PDFDict, index: usize) -> Option<&PDFDict> {
    let parms = match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(PDFObject::Array(items)) => items.get(index),
        other => other,
    };
    parms.and_then(|p| p.as_dict().ok())
}
