//! secp256k1 private key with signing and derivation support.
//!
//! Wraps a k256 signing key and adds DER ECDSA signing, 64-byte Schnorr
//! signing, and the additive scalar tweak used by BIP32 child derivation.

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::{Field, PrimeField};
use k256::Scalar;
use rand::rngs::OsRng;

use crate::ec::public_key::PublicKey;
use crate::ec::schnorr;
use crate::PrimitivesError;

/// Length of a serialized private key in bytes.
const PRIVATE_KEY_BYTES_LEN: usize = 32;

/// Length of a message digest accepted for signing.
const MESSAGE_HASH_LEN: usize = 32;

/// A secp256k1 private key for signing and key derivation.
#[derive(Clone, Debug)]
pub struct PrivateKey {
    /// The underlying k256 signing key.
    inner: SigningKey,
}

impl PrivateKey {
    /// Generate a new random private key using the OS random number generator.
    ///
    /// # Returns
    /// A new randomly generated `PrivateKey`.
    pub fn generate() -> Self {
        PrivateKey {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    /// Create a private key from a raw 32-byte scalar.
    ///
    /// # Arguments
    /// * `bytes` - A 32-byte slice representing the private key scalar.
    ///
    /// # Returns
    /// `Ok(PrivateKey)` if the bytes represent a valid scalar on secp256k1,
    /// or an error if the scalar is zero or out of range.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.len() != PRIVATE_KEY_BYTES_LEN {
            return Err(PrimitivesError::InvalidKeyLength {
                expected: PRIVATE_KEY_BYTES_LEN,
                got: bytes.len(),
            });
        }
        let signing_key = SigningKey::from_bytes(bytes.into())
            .map_err(|e| PrimitivesError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey { inner: signing_key })
    }

    /// Create a private key from a hexadecimal string.
    ///
    /// # Arguments
    /// * `hex_str` - A 64-character hex string representing the 32-byte scalar.
    ///
    /// # Returns
    /// `Ok(PrivateKey)` on success, or an error if the hex or scalar is invalid.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Serialize the private key as a 32-byte big-endian array.
    ///
    /// # Returns
    /// A 32-byte array containing the private key scalar.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.inner.to_bytes());
        out
    }

    /// Derive the corresponding public key for this private key.
    ///
    /// # Returns
    /// The `PublicKey` corresponding to this private key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(*self.inner.verifying_key())
    }

    /// Sign a 32-byte message digest, producing a DER-encoded ECDSA signature.
    ///
    /// Uses deterministic RFC6979 nonces and low-S normalization per
    /// BIP-0062, so identical inputs always produce identical signatures.
    ///
    /// # Arguments
    /// * `message_hash` - The 32-byte digest to sign.
    ///
    /// # Returns
    /// The DER-encoded signature bytes (70-72 bytes), or an error if the
    /// digest has the wrong length or signing fails.
    pub fn sign_ecdsa_der(&self, message_hash: &[u8]) -> Result<Vec<u8>, PrimitivesError> {
        check_message_hash(message_hash)?;
        let signature: k256::ecdsa::Signature = self
            .inner
            .sign_prehash(message_hash)
            .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;
        let signature = signature.normalize_s().unwrap_or(signature);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    /// Sign a 32-byte message digest, producing a 64-byte Schnorr signature.
    ///
    /// Deterministic: the nonce is derived from the key and digest, so
    /// identical inputs always produce identical signatures.
    ///
    /// # Arguments
    /// * `message_hash` - The 32-byte digest to sign.
    ///
    /// # Returns
    /// The 64-byte `r || s` signature, or an error if the digest has the
    /// wrong length or signing fails.
    pub fn sign_schnorr(&self, message_hash: &[u8]) -> Result<[u8; 64], PrimitivesError> {
        check_message_hash(message_hash)?;
        let mut digest = [0u8; 32];
        digest.copy_from_slice(message_hash);
        schnorr::sign(self, &digest)
    }

    /// Add a scalar tweak to this private key (BIP32 CKDpriv).
    ///
    /// Computes `(self + tweak) mod n`. The tweak must be a canonical scalar
    /// below the curve order and the result must be non-zero.
    ///
    /// # Arguments
    /// * `tweak` - A 32-byte big-endian scalar to add.
    ///
    /// # Returns
    /// The tweaked `PrivateKey`, or an error if the tweak is out of range or
    /// the result is the zero scalar.
    pub fn tweak_add(&self, tweak: &[u8; 32]) -> Result<PrivateKey, PrimitivesError> {
        let tweak_scalar = Option::<Scalar>::from(Scalar::from_repr((*tweak).into())).ok_or_else(
            || PrimitivesError::InvalidPrivateKey("tweak exceeds the curve order".to_string()),
        )?;
        let child = self.to_scalar() + tweak_scalar;
        if bool::from(child.is_zero()) {
            return Err(PrimitivesError::InvalidPrivateKey(
                "tweaked key is the zero scalar".to_string(),
            ));
        }
        let signing_key = SigningKey::from_bytes(&child.to_bytes())
            .map_err(|e| PrimitivesError::InvalidPrivateKey(e.to_string()))?;
        Ok(PrivateKey { inner: signing_key })
    }

    /// Convert the private key to a k256 `Scalar` for arithmetic operations.
    pub(crate) fn to_scalar(&self) -> Scalar {
        *self.inner.as_nonzero_scalar().as_ref()
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        let mut bytes = self.inner.to_bytes();
        bytes.zeroize();
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PrivateKey {}

/// Reject message digests that are not exactly 32 bytes.
fn check_message_hash(message_hash: &[u8]) -> Result<(), PrimitivesError> {
    if message_hash.len() != MESSAGE_HASH_LEN {
        return Err(PrimitivesError::InvalidSignature(format!(
            "message hash must be {} bytes, got {}",
            MESSAGE_HASH_LEN,
            message_hash.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256d;

    #[test]
    fn test_from_bytes_rejects_bad_lengths() {
        assert!(PrivateKey::from_bytes(&[1u8; 31]).is_err());
        assert!(PrivateKey::from_bytes(&[1u8; 33]).is_err());
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_hex_roundtrip() {
        let key = PrivateKey::from_bytes(&[0x01u8; 32]).unwrap();
        let restored = PrivateKey::from_hex(&hex::encode(key.to_bytes())).unwrap();
        assert_eq!(key, restored);
    }

    #[test]
    fn test_sign_ecdsa_is_deterministic() {
        let key = PrivateKey::from_bytes(&[0x01u8; 32]).unwrap();
        let digest = sha256d(b"determinism");
        let a = key.sign_ecdsa_der(&digest).unwrap();
        let b = key.sign_ecdsa_der(&digest).unwrap();
        assert_eq!(a, b);
        assert!(a.len() >= 70 && a.len() <= 72, "unexpected DER length {}", a.len());
    }

    #[test]
    fn test_sign_rejects_short_hash() {
        let key = PrivateKey::from_bytes(&[0x01u8; 32]).unwrap();
        assert!(key.sign_ecdsa_der(&[0u8; 20]).is_err());
        assert!(key.sign_schnorr(&[0u8; 20]).is_err());
    }

    #[test]
    fn test_ecdsa_signature_verifies() {
        let key = PrivateKey::from_bytes(&[0x42u8; 32]).unwrap();
        let digest = sha256d(b"verify me");
        let der = key.sign_ecdsa_der(&digest).unwrap();
        assert!(key.public_key().verify_ecdsa_der(&digest, &der));
    }

    #[test]
    fn test_tweak_add_matches_scalar_arithmetic() {
        let key = PrivateKey::from_bytes(&[0x02u8; 32]).unwrap();
        let mut tweak = [0u8; 32];
        tweak[31] = 5;
        let tweaked = key.tweak_add(&tweak).unwrap();
        assert_ne!(key.to_bytes(), tweaked.to_bytes());
        // Tweaking the public key by the same scalar lands on the same point.
        let expected = key.public_key().tweak_add(&tweak).unwrap();
        assert_eq!(tweaked.public_key().to_compressed(), expected.to_compressed());
    }
}
