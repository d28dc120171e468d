//! Capability interfaces for cryptographic back-ends.
//!
//! The compilation environment carries optional handles to hash and curve
//! implementations. Operations declare which capabilities they need and the
//! dispatcher checks presence before invoking them; the traits here are the
//! narrow contracts those handles satisfy. All implementations must be pure
//! and safe to call concurrently from independent compilations.

use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use ripemd::Ripemd160;

use crate::ec::PrivateKey;
use crate::hash;
use crate::PrimitivesError;

/// Incremental hashing state produced by [`HashFunction::begin`].
pub trait HashState: Send {
    /// Absorb more input bytes.
    fn update(&mut self, data: &[u8]);

    /// Finish hashing and produce the digest.
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// A single-algorithm hash back-end.
///
/// One implementation exists per digest algorithm (SHA-1, SHA-256, SHA-512,
/// RIPEMD-160). Both one-shot and incremental interfaces are provided;
/// digests have the fixed width reported by [`HashFunction::digest_len`].
pub trait HashFunction: Send + Sync {
    /// Width of the produced digest in bytes.
    fn digest_len(&self) -> usize;

    /// One-shot hash of `data`.
    fn hash(&self, data: &[u8]) -> Vec<u8>;

    /// Start an incremental hashing session.
    fn begin(&self) -> Box<dyn HashState>;
}

/// A secp256k1 curve back-end.
///
/// All operations take 32-byte private keys and 32-byte message digests.
/// Failures from the curve implementation are fatal to the calling
/// operation; there is no recoverable path through a broken key.
pub trait Secp256k1: Send + Sync {
    /// Derive the 33-byte compressed public key for a 32-byte private key.
    fn derive_public_key_compressed(
        &self,
        private_key: &[u8],
    ) -> Result<[u8; 33], PrimitivesError>;

    /// Produce a DER-encoded, low-S ECDSA signature over a 32-byte digest.
    fn sign_message_hash_der(
        &self,
        private_key: &[u8],
        message_hash: &[u8],
    ) -> Result<Vec<u8>, PrimitivesError>;

    /// Produce a 64-byte Schnorr signature over a 32-byte digest.
    fn sign_message_hash_schnorr(
        &self,
        private_key: &[u8],
        message_hash: &[u8],
    ) -> Result<[u8; 64], PrimitivesError>;
}

// ---------------------------------------------------------------------------
// Native implementations
// ---------------------------------------------------------------------------

struct DigestState<D: Digest + Send>(D);

impl<D: Digest + Send> HashState for DigestState<D> {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().to_vec()
    }
}

/// Native SHA-1 back-end (20-byte digests).
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeSha1;

impl HashFunction for NativeSha1 {
    fn digest_len(&self) -> usize {
        20
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        hash::sha1(data).to_vec()
    }

    fn begin(&self) -> Box<dyn HashState> {
        Box::new(DigestState(Sha1::new()))
    }
}

/// Native SHA-256 back-end (32-byte digests).
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeSha256;

impl HashFunction for NativeSha256 {
    fn digest_len(&self) -> usize {
        32
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        hash::sha256(data).to_vec()
    }

    fn begin(&self) -> Box<dyn HashState> {
        Box::new(DigestState(Sha256::new()))
    }
}

/// Native SHA-512 back-end (64-byte digests).
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeSha512;

impl HashFunction for NativeSha512 {
    fn digest_len(&self) -> usize {
        64
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        hash::sha512(data).to_vec()
    }

    fn begin(&self) -> Box<dyn HashState> {
        Box::new(DigestState(Sha512::new()))
    }
}

/// Native RIPEMD-160 back-end (20-byte digests).
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeRipemd160;

impl HashFunction for NativeRipemd160 {
    fn digest_len(&self) -> usize {
        20
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        hash::ripemd160(data).to_vec()
    }

    fn begin(&self) -> Box<dyn HashState> {
        Box::new(DigestState(Ripemd160::new()))
    }
}

/// Native secp256k1 back-end built on the `k256` pure-Rust implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeSecp256k1;

impl Secp256k1 for NativeSecp256k1 {
    fn derive_public_key_compressed(
        &self,
        private_key: &[u8],
    ) -> Result<[u8; 33], PrimitivesError> {
        let key = PrivateKey::from_bytes(private_key)?;
        Ok(key.public_key().to_compressed())
    }

    fn sign_message_hash_der(
        &self,
        private_key: &[u8],
        message_hash: &[u8],
    ) -> Result<Vec<u8>, PrimitivesError> {
        let key = PrivateKey::from_bytes(private_key)?;
        key.sign_ecdsa_der(message_hash)
    }

    fn sign_message_hash_schnorr(
        &self,
        private_key: &[u8],
        message_hash: &[u8],
    ) -> Result<[u8; 64], PrimitivesError> {
        let key = PrivateKey::from_bytes(private_key)?;
        key.sign_schnorr(message_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_matches_one_shot() {
        let backends: Vec<Box<dyn HashFunction>> = vec![
            Box::new(NativeSha1),
            Box::new(NativeSha256),
            Box::new(NativeSha512),
            Box::new(NativeRipemd160),
        ];
        for backend in backends {
            let mut state = backend.begin();
            state.update(b"hello ");
            state.update(b"world");
            let incremental = state.finalize();
            let one_shot = backend.hash(b"hello world");
            assert_eq!(incremental, one_shot);
            assert_eq!(one_shot.len(), backend.digest_len());
        }
    }

    #[test]
    fn test_native_secp256k1_derives_compressed_keys() {
        let secp = NativeSecp256k1;
        let private_key = [0x01u8; 32];
        let public_key = secp.derive_public_key_compressed(&private_key).unwrap();
        assert!(public_key[0] == 0x02 || public_key[0] == 0x03);
    }

    #[test]
    fn test_native_secp256k1_rejects_invalid_keys() {
        let secp = NativeSecp256k1;
        assert!(secp.derive_public_key_compressed(&[0u8; 32]).is_err());
        assert!(secp.derive_public_key_compressed(&[0u8; 31]).is_err());
    }
}
