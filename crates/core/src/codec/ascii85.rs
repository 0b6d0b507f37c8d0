//! ASCII85 and ASCIIHex stream decoders.

use crate::error::{RenderError, Result};

/// Decode ASCII85-encoded data (PDF variant).
///
/// Accepts an optional `<~` prefix, `z` shorthand for four zero bytes,
/// embedded whitespace and a missing `~>` terminator.
pub fn ascii85decode(data: &[u8]) -> Result<Vec<u8>> {
    let data = data.strip_prefix(b"<~").unwrap_or(data);
    let data = match data.iter().position(|&b| b == b'~') {
        Some(pos) => &data[..pos],
        None => data,
    };

    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut filled = 0;
    for &byte in data {
        match byte {
            b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\x00' => {}
            b'z' if filled == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[filled] = byte - b'!';
                filled += 1;
                if filled == 5 {
                    out.extend_from_slice(&group_value(&group).to_be_bytes());
                    filled = 0;
                }
            }
            _ => {
                return Err(RenderError::DecodeError(format!(
                    "invalid ASCII85 byte 0x{byte:02x}"
                )));
            }
        }
    }
    if filled > 1 {
        // pad a partial group with 'u' and keep filled-1 bytes
        group[filled..].fill(b'u' - b'!');
        out.extend_from_slice(&group_value(&group).to_be_bytes()[..filled - 1]);
    }
    Ok(out)
}

fn group_value(group: &[u8; 5]) -> u32 {
    group
        .iter()
        .fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(u32::from(d)))
}

/// Decode ASCIIHex-encoded data. Stops at `>`; an odd trailing nibble is
/// padded with zero.
pub fn asciihexdecode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2);
    let mut pending: Option<u8> = None;
    for &byte in data {
        if byte == b'>' {
            break;
        }
        let nibble = match byte {
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\x00' => continue,
            _ => {
                return Err(RenderError::DecodeError(format!(
                    "invalid ASCIIHex byte 0x{byte:02x}"
                )));
            }
        };
        match pending.take() {
            Some(high) => out.push((high << 4) | nibble),
            None => pending = Some(nibble),
        }
    }
    if let Some(high) = pending {
        out.push(high << 4);
    }
    Ok(out)
}
