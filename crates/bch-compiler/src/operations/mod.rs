//! The compiler-operation protocol.
//!
//! A compiler operation produces the bytecode for one identifier given the
//! compilation data and environment. Two combinators build every concrete
//! operation: [`Requires`] validates declared prerequisites before
//! dispatching to an inner function, and [`AttemptChain`] tries operations
//! in order, letting pre-computed values short-circuit cleanly while a
//! derivation path serves as the authoritative fallback.

pub mod bch;
pub mod common;

use std::collections::HashMap;
use std::sync::Arc;

use crate::environment::{
    CompilationData, CompilationEnvironment, DataProperty, EnvironmentProperty,
};
use crate::signing::{SigningSerializationAlgorithm, SigningSerializationComponent};

/// The result of one compiler operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// The operation produced bytecode.
    Success(Vec<u8>),
    /// The operation declined; the next operation in the chain may try.
    /// Emitted only by `can_be_skipped` operations inside a chain.
    Skip,
    /// The operation failed.
    Error {
        /// The user-visible message, quoting the identifier and naming the
        /// missing or unknown piece.
        message: String,
        /// Whether a later operation in an [`AttemptChain`] may still
        /// produce a result.
        recoverable: bool,
    },
}

impl OperationResult {
    /// A non-recoverable error.
    pub fn fatal(message: impl Into<String>) -> Self {
        OperationResult::Error {
            message: message.into(),
            recoverable: false,
        }
    }

    /// A recoverable error: a later chained operation may still succeed.
    pub fn recoverable(message: impl Into<String>) -> Self {
        OperationResult::Error {
            message: message.into(),
            recoverable: true,
        }
    }
}

/// A compiler operation: resolves one identifier to bytecode, a skip, or a
/// classified error.
pub trait CompilerOperation: Send + Sync {
    /// Resolve `identifier` against the given data and environment.
    fn resolve(
        &self,
        identifier: &str,
        data: &CompilationData,
        environment: &CompilationEnvironment,
    ) -> OperationResult;
}

/// The function type wrapped by [`Requires`].
pub type OperationFn =
    dyn Fn(&str, &CompilationData, &CompilationEnvironment) -> OperationResult + Send + Sync;

/// Wraps an operation function with prerequisite validation.
///
/// Before the inner function runs, every listed data and environment
/// property is checked for presence. When one is missing, the result is
/// [`OperationResult::Skip`] if `can_be_skipped`, otherwise a
/// non-recoverable error naming the missing property. The inner function
/// runs only once all prerequisites are satisfied, and its result is
/// returned verbatim.
pub struct Requires {
    can_be_skipped: bool,
    data_properties: Vec<DataProperty>,
    environment_properties: Vec<EnvironmentProperty>,
    operation: Box<OperationFn>,
}

impl Requires {
    /// Build an operation with the given prerequisites.
    pub fn new(
        can_be_skipped: bool,
        data_properties: Vec<DataProperty>,
        environment_properties: Vec<EnvironmentProperty>,
        operation: impl Fn(&str, &CompilationData, &CompilationEnvironment) -> OperationResult
            + Send
            + Sync
            + 'static,
    ) -> Arc<dyn CompilerOperation> {
        Arc::new(Requires {
            can_be_skipped,
            data_properties,
            environment_properties,
            operation: Box::new(operation),
        })
    }
}

impl CompilerOperation for Requires {
    fn resolve(
        &self,
        identifier: &str,
        data: &CompilationData,
        environment: &CompilationEnvironment,
    ) -> OperationResult {
        for property in &self.data_properties {
            if !property.is_present(data) {
                if self.can_be_skipped {
                    return OperationResult::Skip;
                }
                return OperationResult::fatal(format!(
                    "Invalid compilation data for \"{}\" - missing property: {}.",
                    identifier,
                    property.name()
                ));
            }
        }
        for property in &self.environment_properties {
            if !property.is_present(environment) {
                if self.can_be_skipped {
                    return OperationResult::Skip;
                }
                return OperationResult::fatal(format!(
                    "Invalid compilation environment for \"{}\" - missing property: {}.",
                    identifier,
                    property.name()
                ));
            }
        }
        (self.operation)(identifier, data, environment)
    }
}

/// Invokes operations in declared order, committing to the first decisive
/// result.
///
/// A `Success` is returned immediately; a `Skip` or recoverable error
/// advances to the next operation; a non-recoverable error aborts the
/// chain. If every operation skips or recoverably errors, the result is
/// the last error, or a synthesized error when nothing errored at all.
pub struct AttemptChain {
    operations: Vec<Arc<dyn CompilerOperation>>,
}

impl AttemptChain {
    /// Build a chain over the given operations.
    pub fn new(operations: Vec<Arc<dyn CompilerOperation>>) -> Arc<dyn CompilerOperation> {
        Arc::new(AttemptChain { operations })
    }
}

impl CompilerOperation for AttemptChain {
    fn resolve(
        &self,
        identifier: &str,
        data: &CompilationData,
        environment: &CompilationEnvironment,
    ) -> OperationResult {
        let mut last_error = None;
        for operation in &self.operations {
            match operation.resolve(identifier, data, environment) {
                OperationResult::Success(bytecode) => {
                    return OperationResult::Success(bytecode)
                }
                OperationResult::Skip => continue,
                error @ OperationResult::Error { recoverable: true, .. } => {
                    last_error = Some(error);
                }
                error @ OperationResult::Error { recoverable: false, .. } => return error,
            }
        }
        last_error.unwrap_or_else(|| {
            OperationResult::fatal(format!(
                "Cannot resolve \"{identifier}\" - no operation in the chain produced a result."
            ))
        })
    }
}

/// The nested operation dispatch table attached to an environment.
///
/// Keyed by variable category, then by the second identifier segment for
/// `Key`/`HdKey` operations and by component name for
/// `signing_serialization.*`.
#[derive(Clone)]
pub struct OperationRegistry {
    /// Operations on `Key` variables, by operation name.
    pub key: HashMap<&'static str, Arc<dyn CompilerOperation>>,
    /// Operations on `HdKey` variables, by operation name.
    pub hd_key: HashMap<&'static str, Arc<dyn CompilerOperation>>,
    /// The operation resolving `AddressData` variables.
    pub address_data: Arc<dyn CompilerOperation>,
    /// The operation resolving `WalletData` variables.
    pub wallet_data: Arc<dyn CompilerOperation>,
    /// `signing_serialization.*` operations, by component or
    /// `full_<algorithm>` name.
    pub signing_serialization: HashMap<&'static str, Arc<dyn CompilerOperation>>,
    /// The `current_block_height` operation.
    pub current_block_height: Arc<dyn CompilerOperation>,
    /// The `current_block_time` operation.
    pub current_block_time: Arc<dyn CompilerOperation>,
}

impl OperationRegistry {
    /// Build the standard BCH operation set.
    pub fn bch() -> Self {
        let mut key: HashMap<&'static str, Arc<dyn CompilerOperation>> = HashMap::new();
        key.insert("public_key", common::key_public_key());
        key.insert("signature", bch::key_signature(false));
        key.insert("schnorr_signature", bch::key_signature(true));
        key.insert("data_signature", bch::key_data_signature(false));
        key.insert("schnorr_data_signature", bch::key_data_signature(true));

        let mut hd_key: HashMap<&'static str, Arc<dyn CompilerOperation>> = HashMap::new();
        hd_key.insert("public_key", common::hd_key_public_key());
        hd_key.insert("signature", bch::hd_key_signature(false));
        hd_key.insert("schnorr_signature", bch::hd_key_signature(true));
        hd_key.insert("data_signature", bch::hd_key_data_signature(false));
        hd_key.insert("schnorr_data_signature", bch::hd_key_data_signature(true));

        let mut signing_serialization: HashMap<&'static str, Arc<dyn CompilerOperation>> =
            HashMap::new();
        for &(name, component) in SigningSerializationComponent::ALL {
            signing_serialization.insert(name, common::signing_serialization_component(component));
        }
        signing_serialization.insert(
            "full_all_outputs",
            bch::full_signing_serialization(SigningSerializationAlgorithm::AllOutputs),
        );
        signing_serialization.insert(
            "full_all_outputs_single_input",
            bch::full_signing_serialization(SigningSerializationAlgorithm::AllOutputsSingleInput),
        );
        signing_serialization.insert(
            "full_corresponding_output",
            bch::full_signing_serialization(SigningSerializationAlgorithm::CorrespondingOutput),
        );
        signing_serialization.insert(
            "full_corresponding_output_single_input",
            bch::full_signing_serialization(
                SigningSerializationAlgorithm::CorrespondingOutputSingleInput,
            ),
        );
        signing_serialization.insert(
            "full_no_outputs",
            bch::full_signing_serialization(SigningSerializationAlgorithm::NoOutputs),
        );
        signing_serialization.insert(
            "full_no_outputs_single_input",
            bch::full_signing_serialization(SigningSerializationAlgorithm::NoOutputsSingleInput),
        );

        OperationRegistry {
            key,
            hd_key,
            address_data: common::address_data(),
            wallet_data: common::wallet_data(),
            signing_serialization,
            current_block_height: common::current_block_height(),
            current_block_time: common::current_block_time(),
        }
    }
}
