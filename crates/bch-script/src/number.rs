//! Minimal script-number encoding.
//!
//! Numbers on the script stack are little-endian byte arrays with a sign
//! bit in the most significant bit of the last byte. The minimal encoding
//! of zero is the empty array. The template compiler uses this encoding
//! for decimal literals and block-height values.

/// Encode an i64 as a minimally-encoded script number.
///
/// # Arguments
/// * `value` - The number to encode.
///
/// # Returns
/// The little-endian, sign-bit encoded bytes. Zero encodes as empty.
pub fn encode_script_number(value: i64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }

    let negative = value < 0;
    let mut abs = value.unsigned_abs();
    let mut result = Vec::new();
    while abs > 0 {
        result.push((abs & 0xff) as u8);
        abs >>= 8;
    }

    // If the most significant bit is set, an extra byte carries the sign;
    // otherwise the sign bit lands in the existing top byte.
    let top = *result.last().unwrap();
    if top & 0x80 != 0 {
        result.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        *result.last_mut().unwrap() = top | 0x80;
    }
    result
}
