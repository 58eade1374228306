//! Varint32 coding used by the length-prefixed key and batch layouts.
//!
//! Seven payload bits per byte, little-endian group order, high bit set on
//! every byte except the last. A `u32` therefore occupies at most 5 bytes.

use crate::FormatError;

/// Maximum encoded width of a varint32.
pub const MAX_VARINT32_BYTES: usize = 5;

/// Appends the varint32 encoding of `v` to `dst`.
pub fn encode_varint32(dst: &mut Vec<u8>, mut v: u32) {
    while v >= 0x80 {
        dst.push((v as u8) | 0x80);
        v >>= 7;
    }
    dst.push(v as u8);
}

/// Writes the varint32 encoding of `v` into the front of `buf`, returning
/// the number of bytes written.
///
/// Precondition: `buf` holds at least [`MAX_VARINT32_BYTES`].
pub fn write_varint32(buf: &mut [u8], mut v: u32) -> usize {
    let mut i = 0;
    while v >= 0x80 {
        buf[i] = (v as u8) | 0x80;
        v >>= 7;
        i += 1;
    }
    buf[i] = v as u8;
    i + 1
}

/// Encoded width of `v` without actually encoding it.
pub fn varint32_length(v: u32) -> usize {
    match v {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0xfff_ffff => 4,
        _ => 5,
    }
}

/// Decodes a varint32 from the front of `src`, returning the value and the
/// number of bytes consumed. Truncated and overlong inputs are explicit
/// errors.
pub fn decode_varint32(src: &[u8]) -> Result<(u32, usize), FormatError> {
    let mut result: u32 = 0;
    for (i, &byte) in src.iter().enumerate().take(MAX_VARINT32_BYTES) {
        if byte < 0x80 {
            // Terminating byte. The fifth byte may only carry the top 4 bits.
            if i == MAX_VARINT32_BYTES - 1 && byte > 0x0f {
                return Err(FormatError::VarintOverflow);
            }
            return Ok((result | ((byte as u32) << (7 * i)), i + 1));
        }
        result |= ((byte & 0x7f) as u32) << (7 * i);
    }
    if src.len() >= MAX_VARINT32_BYTES {
        Err(FormatError::VarintOverflow)
    } else {
        Err(FormatError::TruncatedVarint)
    }
}
