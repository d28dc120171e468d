//! Base58Check encoding and decoding.
//!
//! Used for serialized HD keys (xprv/xpub). The checksum is the first four
//! bytes of the double-SHA-256 of the payload.

use crate::hash::sha256d;
use crate::PrimitivesError;

/// Number of checksum bytes appended to the payload.
const CHECKSUM_LEN: usize = 4;

/// Encode a payload as a Base58Check string.
///
/// # Arguments
/// * `payload` - The raw bytes to encode (version bytes included).
///
/// # Returns
/// The Base58Check-encoded string.
pub fn encode_check(payload: &[u8]) -> String {
    let checksum = sha256d(payload);
    let mut data = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    bs58::encode(data).into_string()
}

/// Decode a Base58Check string, validating its checksum.
///
/// # Arguments
/// * `encoded` - The Base58Check string to decode.
///
/// # Returns
/// The payload bytes with the checksum stripped, or an error if the
/// encoding is invalid or the checksum does not match.
pub fn decode_check(encoded: &str) -> Result<Vec<u8>, PrimitivesError> {
    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| PrimitivesError::InvalidBase58(e.to_string()))?;
    if decoded.len() < CHECKSUM_LEN + 1 {
        return Err(PrimitivesError::Base58PayloadTooShort);
    }
    let (payload, checksum) = decoded.split_at(decoded.len() - CHECKSUM_LEN);
    let expected = sha256d(payload);
    if expected[..CHECKSUM_LEN] != *checksum {
        return Err(PrimitivesError::ChecksumMismatch);
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let payload = b"base58check payload";
        let encoded = encode_check(payload);
        assert_eq!(decode_check(&encoded).unwrap(), payload);
    }

    #[test]
    fn test_detects_corruption() {
        let mut encoded = encode_check(b"payload");
        // Swap the last character for a different valid base58 character.
        let last = encoded.pop().unwrap();
        encoded.push(if last == '1' { '2' } else { '1' });
        assert!(decode_check(&encoded).is_err());
    }

    #[test]
    fn test_rejects_short_input() {
        assert!(decode_check("1").is_err());
    }

    #[test]
    fn test_rejects_invalid_characters() {
        assert!(decode_check("0OIl").is_err());
    }
}
