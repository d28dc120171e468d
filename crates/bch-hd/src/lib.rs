//! BCH template compiler - BIP32 hierarchical-deterministic keys.
//!
//! Provides decoding and encoding of serialized HD keys (xprv/xpub),
//! hardened and non-hardened child derivation, and derivation-path parsing
//! with the `i` address-index placeholder used by template HD variables.

pub mod node;
pub mod path;

mod error;
pub use error::HdError;
pub use node::{HdPrivateNode, HdPublicNode, HARDENED_OFFSET};
pub use path::{DerivationPath, PathStep};
