//! Deterministic Schnorr signatures over secp256k1.
//!
//! Produces the fixed-width 64-byte `r || s` signatures used by the
//! OP_CHECKSIG Schnorr mode. The nonce is derived from the private key and
//! message digest with HMAC-SHA256, and the nonce point is normalized to an
//! even y-coordinate so that signatures are canonical: identical inputs
//! always produce identical signatures.

use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::{Field, PrimeField};
use k256::{ProjectivePoint, Scalar, U256};

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::hash::{sha256, sha256_hmac};
use crate::PrimitivesError;

/// Sign a 32-byte message digest, producing a 64-byte `r || s` signature.
///
/// # Arguments
/// * `private_key` - The signing key.
/// * `message_hash` - The 32-byte digest to sign.
///
/// # Returns
/// The 64-byte signature, or an error in the (cryptographically negligible)
/// case that the derived nonce or challenge degenerates.
pub fn sign(private_key: &PrivateKey, message_hash: &[u8; 32]) -> Result<[u8; 64], PrimitivesError> {
    let secret = private_key.to_scalar();
    let public_key = private_key.public_key();

    // Deterministic nonce: HMAC-SHA256(key = private key, data = digest),
    // reduced into the scalar field.
    let nonce_bytes = sha256_hmac(&private_key.to_bytes(), message_hash);
    let mut nonce = <Scalar as Reduce<U256>>::reduce(U256::from_be_slice(&nonce_bytes));
    if bool::from(nonce.is_zero()) {
        return Err(PrimitivesError::InvalidSignature(
            "derived nonce is zero".to_string(),
        ));
    }

    // Normalize the nonce point to an even y-coordinate.
    let nonce_point = (ProjectivePoint::GENERATOR * nonce).to_affine();
    if y_is_odd(&nonce_point) {
        nonce = -nonce;
    }
    let r = x_coordinate(&nonce_point);

    let challenge = challenge_scalar(&r, &public_key, message_hash);
    let s = nonce + challenge * secret;
    if bool::from(s.is_zero()) {
        return Err(PrimitivesError::InvalidSignature(
            "degenerate signature scalar".to_string(),
        ));
    }

    let mut signature = [0u8; 64];
    signature[..32].copy_from_slice(&r);
    signature[32..].copy_from_slice(&s.to_bytes());
    Ok(signature)
}

/// Verify a 64-byte `r || s` signature over a 32-byte message digest.
///
/// # Arguments
/// * `public_key` - The signer's public key.
/// * `message_hash` - The 32-byte digest that was signed.
/// * `signature` - The 64-byte signature.
///
/// # Returns
/// `true` if the signature is valid.
pub fn verify(public_key: &PublicKey, message_hash: &[u8; 32], signature: &[u8; 64]) -> bool {
    let mut r = [0u8; 32];
    r.copy_from_slice(&signature[..32]);
    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&signature[32..]);

    // s must be a canonical scalar.
    let s = match Option::<Scalar>::from(Scalar::from_repr(s_bytes.into())) {
        Some(s) => s,
        None => return false,
    };

    let challenge = challenge_scalar(&r, public_key, message_hash);

    // R = s*G - e*P must be a non-identity point with even y and x == r.
    let nonce_point =
        ProjectivePoint::GENERATOR * s - public_key.to_projective() * challenge;
    if nonce_point == ProjectivePoint::IDENTITY {
        return false;
    }
    let affine = nonce_point.to_affine();
    !y_is_odd(&affine) && x_coordinate(&affine) == r
}

/// Compute the challenge scalar `e = SHA-256(r || pubkey || digest) mod n`.
fn challenge_scalar(r: &[u8; 32], public_key: &PublicKey, message_hash: &[u8; 32]) -> Scalar {
    let mut preimage = Vec::with_capacity(32 + 33 + 32);
    preimage.extend_from_slice(r);
    preimage.extend_from_slice(&public_key.to_compressed());
    preimage.extend_from_slice(message_hash);
    <Scalar as Reduce<U256>>::reduce(U256::from_be_slice(&sha256(&preimage)))
}

/// Whether the affine point's y-coordinate is odd.
fn y_is_odd(point: &k256::AffinePoint) -> bool {
    point.to_encoded_point(true).as_bytes()[0] == 0x03
}

/// The big-endian x-coordinate of an affine point.
fn x_coordinate(point: &k256::AffinePoint) -> [u8; 32] {
    let encoded = point.to_encoded_point(true);
    let mut out = [0u8; 32];
    out.copy_from_slice(&encoded.as_bytes()[1..33]);
    out
}
