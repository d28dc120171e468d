#![deny(missing_docs)]

//! BCH authentication-template compiler - complete SDK.
//!
//! Re-exports all component crates for convenient single-crate usage.

pub use bch_compiler as compiler;
pub use bch_hd as hd;
pub use bch_primitives as primitives;
pub use bch_script as script;
