//! Digest helpers used across the template compiler.
//!
//! One-shot, fixed-width wrappers over the RustCrypto implementations.
//! Compiler operations reach these algorithms through the pluggable
//! capability handles in [`crate::capability`]; the helpers here back
//! those handles and the places where an algorithm is structural rather
//! than pluggable: signature preimage digests, Base58Check checksums,
//! BIP32 child derivation, and address hashing.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Run `D` over `data`, returning the digest as a `WIDTH`-byte array.
///
/// `WIDTH` must equal the algorithm's output size.
fn digest_array<D: Digest, const WIDTH: usize>(data: &[u8]) -> [u8; WIDTH] {
    let mut digest = [0u8; WIDTH];
    digest.copy_from_slice(&D::digest(data));
    digest
}

/// Authenticate `data` under `key` with `M`, returning a `WIDTH`-byte tag.
fn mac_array<M: Mac + KeyInit, const WIDTH: usize>(key: &[u8], data: &[u8]) -> [u8; WIDTH] {
    let mut mac = <M as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    let mut tag = [0u8; WIDTH];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

/// SHA-256 (32 bytes).
pub fn sha256(data: &[u8]) -> [u8; 32] {
    digest_array::<Sha256, 32>(data)
}

/// Double SHA-256 (32 bytes).
///
/// The digest signed by transaction signatures and the basis of
/// Base58Check checksums.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// SHA-1 (20 bytes). Backs the environment's `sha1` capability.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    digest_array::<Sha1, 20>(data)
}

/// RIPEMD-160 (20 bytes).
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    digest_array::<Ripemd160, 20>(data)
}

/// RIPEMD-160 of SHA-256 (20 bytes).
///
/// Used for BIP32 parent fingerprints and public-key hashing.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// SHA-512 (64 bytes).
pub fn sha512(data: &[u8]) -> [u8; 64] {
    digest_array::<Sha512, 64>(data)
}

/// HMAC-SHA256 (32-byte tag).
pub fn sha256_hmac(key: &[u8], data: &[u8]) -> [u8; 32] {
    mac_array::<Hmac<Sha256>, 32>(key, data)
}

/// HMAC-SHA512 (64-byte tag). Used by BIP32 child key derivation.
pub fn sha512_hmac(key: &[u8], data: &[u8]) -> [u8; 64] {
    mac_array::<Hmac<Sha512>, 64>(key, data)
}
