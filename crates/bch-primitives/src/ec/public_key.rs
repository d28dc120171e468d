//! secp256k1 public key with verification and derivation support.
//!
//! Supports compressed/uncompressed SEC1 serialization, ECDSA (DER) and
//! Schnorr verification, and the additive point tweak used by BIP32 public
//! child derivation.

use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{ProjectivePoint, Scalar};
use std::fmt;

use crate::ec::schnorr;
use crate::PrimitivesError;

/// Length of a compressed public key in bytes (prefix + 32-byte x-coordinate).
const COMPRESSED_LEN: usize = 33;

/// A secp256k1 public key for signature verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    /// The underlying k256 verifying key.
    inner: VerifyingKey,
}

impl PublicKey {
    /// Create a public key from raw SEC1-encoded bytes.
    ///
    /// Accepts both compressed (33-byte) and uncompressed (65-byte) formats.
    ///
    /// # Arguments
    /// * `bytes` - SEC1-encoded public key bytes.
    ///
    /// # Returns
    /// `Ok(PublicKey)` on success, or an error if the bytes are not a valid
    /// curve point.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        if bytes.is_empty() {
            return Err(PrimitivesError::InvalidPublicKey(
                "public key bytes are empty".to_string(),
            ));
        }
        let inner = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|e| PrimitivesError::InvalidPublicKey(e.to_string()))?;
        Ok(PublicKey { inner })
    }

    /// Create a public key from a hex-encoded SEC1 string.
    ///
    /// # Arguments
    /// * `hex_str` - A hex string of a compressed (66 chars) or uncompressed
    ///   (130 chars) key.
    ///
    /// # Returns
    /// `Ok(PublicKey)` on success, or an error if the hex or point is invalid.
    pub fn from_hex(hex_str: &str) -> Result<Self, PrimitivesError> {
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }

    /// Serialize the public key in compressed SEC1 format (33 bytes).
    ///
    /// # Returns
    /// A 33-byte array: 0x02/0x03 parity prefix plus the x-coordinate.
    pub fn to_compressed(&self) -> [u8; COMPRESSED_LEN] {
        let point = self.inner.to_encoded_point(true);
        let mut out = [0u8; COMPRESSED_LEN];
        out.copy_from_slice(point.as_bytes());
        out
    }

    /// Serialize the public key as a lowercase hex string (compressed format).
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_compressed())
    }

    /// Verify a DER-encoded ECDSA signature over a 32-byte digest.
    ///
    /// # Arguments
    /// * `message_hash` - The 32-byte digest that was signed.
    /// * `der` - The DER-encoded signature (without any sighash suffix).
    ///
    /// # Returns
    /// `true` if the signature is valid, `false` otherwise.
    pub fn verify_ecdsa_der(&self, message_hash: &[u8], der: &[u8]) -> bool {
        let signature = match k256::ecdsa::Signature::from_der(der) {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        self.inner.verify_prehash(message_hash, &signature).is_ok()
    }

    /// Verify a 64-byte Schnorr signature over a 32-byte digest.
    ///
    /// # Arguments
    /// * `message_hash` - The 32-byte digest that was signed.
    /// * `signature` - The 64-byte `r || s` signature (without any sighash
    ///   suffix).
    ///
    /// # Returns
    /// `true` if the signature is valid, `false` otherwise.
    pub fn verify_schnorr(&self, message_hash: &[u8], signature: &[u8]) -> bool {
        if message_hash.len() != 32 || signature.len() != 64 {
            return false;
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(message_hash);
        let mut sig = [0u8; 64];
        sig.copy_from_slice(signature);
        schnorr::verify(self, &digest, &sig)
    }

    /// Add a scalar-times-generator tweak to this public key (BIP32 CKDpub).
    ///
    /// Computes `self + tweak * G`. The tweak must be a canonical scalar
    /// below the curve order and the result must not be the point at
    /// infinity.
    ///
    /// # Arguments
    /// * `tweak` - A 32-byte big-endian scalar.
    ///
    /// # Returns
    /// The tweaked `PublicKey`, or an error if the tweak is out of range or
    /// the result is the identity point.
    pub fn tweak_add(&self, tweak: &[u8; 32]) -> Result<PublicKey, PrimitivesError> {
        let tweak_scalar = Option::<Scalar>::from(Scalar::from_repr((*tweak).into())).ok_or_else(
            || PrimitivesError::InvalidPublicKey("tweak exceeds the curve order".to_string()),
        )?;
        let child = self.to_projective() + ProjectivePoint::GENERATOR * tweak_scalar;
        if child == ProjectivePoint::IDENTITY {
            return Err(PrimitivesError::InvalidPublicKey(
                "tweaked key is the point at infinity".to_string(),
            ));
        }
        let encoded = child.to_affine().to_encoded_point(true);
        PublicKey::from_bytes(encoded.as_bytes())
    }

    /// Wrap a k256 verifying key.
    pub(crate) fn from_verifying_key(inner: VerifyingKey) -> Self {
        PublicKey { inner }
    }

    /// Convert to a projective point for curve arithmetic.
    pub(crate) fn to_projective(&self) -> ProjectivePoint {
        ProjectivePoint::from(*self.inner.as_affine())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec::PrivateKey;

    #[test]
    fn test_from_bytes_rejects_garbage() {
        assert!(PublicKey::from_bytes(&[]).is_err());
        assert!(PublicKey::from_bytes(&[0x02u8; 33]).is_err());
        assert!(PublicKey::from_bytes(&[0x05u8; 33]).is_err());
    }

    #[test]
    fn test_compressed_roundtrip() {
        let key = PrivateKey::from_bytes(&[0x07u8; 32]).unwrap().public_key();
        let restored = PublicKey::from_bytes(&key.to_compressed()).unwrap();
        assert_eq!(key, restored);
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let signer = PrivateKey::from_bytes(&[0x11u8; 32]).unwrap();
        let other = PrivateKey::from_bytes(&[0x22u8; 32]).unwrap().public_key();
        let digest = crate::hash::sha256d(b"message");
        let der = signer.sign_ecdsa_der(&digest).unwrap();
        assert!(signer.public_key().verify_ecdsa_der(&digest, &der));
        assert!(!other.verify_ecdsa_der(&digest, &der));
    }
}
