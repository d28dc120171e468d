//! BCH template compiler - Authentication-template compilation.
//!
//! Compiles authentication templates - declarative specifications of
//! Bitcoin-Cash-style locking and unlocking scripts - into executable
//! bytecode. A template names entities, variables (keys, HD keys, wallet
//! data, address data), and named script fragments containing literals,
//! pushes, opcodes, and dotted identifier references.
//!
//! The compiler resolves each identifier against compilation data provided
//! by the caller (private keys, HD keys, transaction context), dispatches
//! pluggable compiler operations to produce the raw bytes for each
//! identifier, and assembles the final bytecode:
//!
//! - [`environment`]: the static [`CompilationEnvironment`] shared across
//!   compilations and the per-invocation [`CompilationData`].
//! - [`operations`]: the compiler-operation protocol ([`Requires`],
//!   [`AttemptChain`]) and the standard BCH operation set.
//! - [`signing`]: the BCH signing-serialization algorithm.
//! - [`parser`]: the template script tokenizer.
//! - [`compiler`]: the identifier resolver and compiler facade.
//! - [`template`]: the template-to-environment adapter.

pub mod compiler;
pub mod environment;
pub mod identifier;
pub mod operations;
pub mod parser;
pub mod signing;
pub mod template;

pub use compiler::{
    CompilationError, CompilationErrorType, CompilationResult, Compiler, ResolvedSegment,
    ScriptCompilationTrace,
};
pub use environment::{
    CompilationData, CompilationEnvironment, HdKeyParameters, HdKeys, Keys, OperationData,
    Variable,
};
pub use operations::{AttemptChain, CompilerOperation, OperationRegistry, OperationResult, Requires};
pub use signing::SigningSerializationAlgorithm;
pub use template::AuthenticationTemplate;
