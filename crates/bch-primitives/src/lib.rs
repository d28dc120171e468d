//! BCH template compiler - Cryptographic primitives, hashing, and utilities.
//!
//! This crate provides the foundational building blocks for the template
//! compiler:
//! - Hash functions (SHA-1, SHA-256, SHA-256d, SHA-512, RIPEMD-160, HMAC)
//! - Capability interfaces for hash and secp256k1 back-ends, with native
//!   implementations
//! - Elliptic curve cryptography (secp256k1 keys, ECDSA and Schnorr
//!   signatures, scalar/point tweaks)
//! - Variable-length integer encoding and binary writers/readers
//! - Base58Check encoding/decoding

pub mod base58;
pub mod capability;
pub mod ec;
pub mod hash;
pub mod util;

mod error;
pub use error::PrimitivesError;
