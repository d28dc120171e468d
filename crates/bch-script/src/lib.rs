//! BCH template compiler - Script building blocks.
//!
//! Provides the Bitcoin Cash opcode constants and name map, push-data
//! prefix encoding, and minimal script-number encoding. The template
//! compiler resolves `OP_*` tokens through the name map and wraps literal
//! and resolved bytes in push encodings from this crate.

pub mod number;
pub mod opcodes;
pub mod push;

mod error;
pub use error::ScriptError;
