//! Measurement Decoders
//!
//! Pure functions turning raw characteristic payloads into physical
//! values. Each decoder checks its own length contract; what a failure
//! means for a live stream (NaN sentinel vs skipped sample) is decided by
//! the session, not here.

use thiserror::Error;

use crate::domain::measurement::{BatteryStatus, ButtonLayout, DeviceButtons, Vector3};
use crate::infrastructure::bluetooth::codec::{self, ParseError};

/// A payload that does not match its decoder's wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Payload shorter than the fixed minimum for this characteristic.
    #[error("payload `{found}` is {len} bytes, need at least {min}")]
    Truncated {
        found: String,
        len: usize,
        min: usize,
    },
}

fn at_least(bytes: &[u8], min: usize) -> Result<(), DecodeError> {
    if bytes.len() < min {
        return Err(DecodeError::Truncated {
            found: codec::hex(bytes),
            len: bytes.len(),
            min,
        });
    }
    Ok(())
}

/// `m * 0.01 * 2^e` for a word packing a 4-bit exponent over a 12-bit
/// mantissa.
fn exponent_mantissa(word: u16) -> f64 {
    let exponent = codec::field(word, 12, 0x0F);
    let mantissa = codec::field(word, 0, 0x0FFF);
    f64::from(mantissa) * 0.01 * 2f64.powi(i32::from(exponent))
}

/// Illuminance in lux from the 2-byte big-endian optical word.
pub fn lux(bytes: &[u8]) -> Result<f64, DecodeError> {
    Ok(exponent_mantissa(codec::uint16_be(bytes)?))
}

/// Relative humidity from the first two bytes of the humidity payload.
///
/// The device applies the same exponent/mantissa scaling as the optical
/// sensor; the result is treated as a relative-humidity fraction.
pub fn humidity(bytes: &[u8]) -> Result<f64, DecodeError> {
    at_least(bytes, 2)?;
    Ok(exponent_mantissa(codec::uint16_be(&bytes[..2])?))
}

/// Barometric pressure in hPa. Bytes 3..6 hold a 24-bit little-endian
/// register scaled by 1/100.
pub fn barometric(bytes: &[u8]) -> Result<f64, DecodeError> {
    at_least(bytes, 6)?;
    let raw = u32::from(bytes[3]) | u32::from(bytes[4]) << 8 | u32::from(bytes[5]) << 16;
    Ok(f64::from(raw) / 100.0)
}

/// Battery level as a 0..1 fraction. Charge detection is not available
/// from this characteristic alone.
pub fn battery(bytes: &[u8]) -> Result<BatteryStatus, DecodeError> {
    let level = codec::uint8(bytes)?;
    Ok(BatteryStatus::NotCharging(f64::from(level) / 100.0))
}

/// Pressed buttons from the simple-key state byte.
pub fn buttons(bytes: &[u8], layout: ButtonLayout) -> Result<DeviceButtons, DecodeError> {
    Ok(DeviceButtons::from_bits(codec::uint8(bytes)?, layout))
}

/// Angular rate from the movement payload, in raw device units; the
/// device does not encode a scale in-band for this characteristic.
///
/// x/y/z are signed 16-bit little-endian at byte offsets 9, 11 and 13.
pub fn gyroscope(bytes: &[u8]) -> Result<Vector3, DecodeError> {
    at_least(bytes, 18)?;
    let x = codec::int16_le(&bytes[9..11])?;
    let y = codec::int16_le(&bytes[11..13])?;
    let z = codec::int16_le(&bytes[13..15])?;
    Ok(Vector3 {
        x: f64::from(x),
        y: f64::from(y),
        z: f64::from(z),
    })
}

/// Device-information string: UTF-8, falling back to a hex dump for
/// payloads that are not valid text. Never fails.
pub fn info_string(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_end_matches('\0').to_string(),
        Err(_) => codec::hex(bytes),
    }
}
