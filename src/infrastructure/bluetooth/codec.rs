//! Byte Codec
//!
//! Pure reinterpretation of raw characteristic payloads as fixed-width
//! integers and floats. Width checks are exact: extracting a 16-bit field
//! out of a larger buffer requires an explicit sub-slice first.

use thiserror::Error;

/// A slice whose length does not match the requested width.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse `{found}` as a {expected}-byte value")]
pub struct ParseError {
    /// The width the caller asked for, in bytes.
    pub expected: usize,
    /// Hex dump of the offending payload.
    pub found: String,
}

/// Hex dump in `18:4B` form, matching how the device payloads are logged.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

fn exact<const N: usize>(bytes: &[u8]) -> Result<[u8; N], ParseError> {
    bytes.try_into().map_err(|_| ParseError {
        expected: N,
        found: hex(bytes),
    })
}

pub fn uint8(bytes: &[u8]) -> Result<u8, ParseError> {
    Ok(u8::from_be_bytes(exact(bytes)?))
}

pub fn uint16_be(bytes: &[u8]) -> Result<u16, ParseError> {
    Ok(u16::from_be_bytes(exact(bytes)?))
}

pub fn uint16_le(bytes: &[u8]) -> Result<u16, ParseError> {
    Ok(u16::from_le_bytes(exact(bytes)?))
}

pub fn int16_be(bytes: &[u8]) -> Result<i16, ParseError> {
    Ok(i16::from_be_bytes(exact(bytes)?))
}

pub fn int16_le(bytes: &[u8]) -> Result<i16, ParseError> {
    Ok(i16::from_le_bytes(exact(bytes)?))
}

pub fn uint32_be(bytes: &[u8]) -> Result<u32, ParseError> {
    Ok(u32::from_be_bytes(exact(bytes)?))
}

pub fn uint32_le(bytes: &[u8]) -> Result<u32, ParseError> {
    Ok(u32::from_le_bytes(exact(bytes)?))
}

pub fn float_be(bytes: &[u8]) -> Result<f32, ParseError> {
    Ok(f32::from_be_bytes(exact(bytes)?))
}

/// Extract a bit field from a 16-bit word: shift right, then mask.
pub const fn field(word: u16, shift: u32, mask: u16) -> u16 {
    (word >> shift) & mask
}
