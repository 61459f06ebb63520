//! # Bit Field Extraction
//!
//! Reads MSB-first bit fields out of a byte buffer. Bit 0 is the most
//! significant bit of byte 0, bit 8 the most significant bit of byte 1, and so
//! on. The first bit of a field becomes the most significant bit of the result.

use crate::error::{GsatError, Result};

/// Widest field that fits the returned integer
pub const MAX_FIELD_WIDTH: u32 = 32;

/// Extract an unsigned field of `width` bits starting at bit `offset`
///
/// # Arguments
///
/// * `offset` - Index of the field's first bit, counted MSB-first across the buffer
/// * `width` - Field width in bits (1-32)
/// * `buffer` - Bytes to read from
///
/// # Errors
///
/// Returns `OutOfRange` if the width is not 1-32 or the field runs past the
/// end of the buffer.
///
/// # Examples
///
/// ```
/// use gsat_codec::gsat::bits::extract_bits;
///
/// let value = extract_bits(4, 8, &[0xAB, 0xCD]).unwrap();
/// assert_eq!(value, 0xBC);
/// ```
pub fn extract_bits(offset: usize, width: u32, buffer: &[u8]) -> Result<u32> {
    let available = buffer.len() * 8;
    let out_of_range = GsatError::OutOfRange {
        offset,
        width,
        available,
    };

    if width == 0 || width > MAX_FIELD_WIDTH {
        return Err(out_of_range);
    }
    let end = match offset.checked_add(width as usize) {
        Some(end) if end <= available => end,
        _ => return Err(out_of_range),
    };

    // A 32-bit field spans at most 5 bytes, which fits a u64 accumulator
    let first_byte = offset / 8;
    let last_byte = (end - 1) / 8;
    let mut acc: u64 = 0;
    for &byte in &buffer[first_byte..=last_byte] {
        acc = (acc << 8) | byte as u64;
    }

    let trailing = (last_byte + 1) * 8 - end;
    let mask = (1u64 << width) - 1;
    Ok(((acc >> trailing) & mask) as u32)
}

/// Extract a single bit as a flag
pub fn extract_flag(offset: usize, buffer: &[u8]) -> Result<bool> {
    Ok(extract_bits(offset, 1, buffer)? == 1)
}
