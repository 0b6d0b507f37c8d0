//! RunLengthDecode filter.

use crate::error::Result;

/// Decode run-length encoded data.
///
/// A length byte `n` in 0..=127 copies the next `n + 1` bytes; 129..=255
/// repeats the next byte `257 - n` times; 128 ends the data.
pub fn rldecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            128 => break,
            0..=127 => {
                let end = (i + length as usize + 1).min(data.len());
                out.extend_from_slice(&data[i..end]);
                i = end;
            }
            129..=255 => {
                if let Some(&byte) = data.get(i) {
                    out.extend(std::iter::repeat_n(byte, 257 - length as usize));
                    i += 1;
                }
            }
        }
    }
    Ok(out)
}
