//! Elliptic curve cryptography on secp256k1.
//!
//! Provides private keys, public keys, ECDSA (DER) and Schnorr signing,
//! and the scalar/point tweaks required by BIP32 child derivation.

pub mod private_key;
pub mod public_key;
pub mod schnorr;

pub use private_key::PrivateKey;
pub use public_key::PublicKey;
