//! Push-data prefix encoding.
//!
//! A data push is encoded with the smallest sufficient prefix: the length
//! byte itself for 1-75 bytes, or OP_PUSHDATA1/2/4 with a little-endian
//! length. An empty push is OP_0.

use crate::opcodes::{OP_0, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4};
use crate::ScriptError;

/// Compute the push prefix bytes for a data payload of the given length.
///
/// # Arguments
/// * `data_len` - The length of the data to be pushed.
///
/// # Returns
/// The prefix bytes, or an error if the data exceeds the OP_PUSHDATA4
/// limit.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    if data_len == 0 {
        Ok(vec![OP_0])
    } else if data_len <= 75 {
        Ok(vec![data_len as u8])
    } else if data_len <= 0xff {
        Ok(vec![OP_PUSHDATA1, data_len as u8])
    } else if data_len <= 0xffff {
        let mut buf = vec![OP_PUSHDATA2];
        buf.extend_from_slice(&(data_len as u16).to_le_bytes());
        Ok(buf)
    } else if data_len <= 0xffff_ffff {
        let mut buf = vec![OP_PUSHDATA4];
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        Ok(buf)
    } else {
        Err(ScriptError::DataTooBig(data_len))
    }
}

/// Encode a data payload as a complete push operation.
///
/// An empty payload encodes as the single byte OP_0.
///
/// # Arguments
/// * `data` - The bytes to push.
///
/// # Returns
/// Prefix plus payload, or an error if the payload is too large.
pub fn encode_data_push(data: &[u8]) -> Result<Vec<u8>, ScriptError> {
    let mut encoded = push_data_prefix(data.len())?;
    encoded.extend_from_slice(data);
    Ok(encoded)
}
