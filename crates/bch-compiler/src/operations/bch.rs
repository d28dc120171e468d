//! BCH signing operations.
//!
//! Computes transaction signatures (ECDSA and Schnorr) over the BCH
//! signing serialization, data signatures over compiled target scripts,
//! and the raw `full_<algorithm>` preimages used for in-script
//! signing-serialization inspection.
//!
//! Every signature operation is an [`AttemptChain`]: a pre-computed
//! signature supplied in the compilation data (keyed by the full
//! identifier) short-circuits the chain, and on-the-fly computation from a
//! private key is the authoritative fallback.

use std::sync::Arc;

use crate::compiler::compile_script_for_operations;
use crate::environment::{
    CompilationData, CompilationEnvironment, DataProperty, EnvironmentProperty,
};
use crate::identifier::{unknown_component_error, Identifier};
use crate::operations::common::{
    hd_context, hd_private_key_bytes, keys_of, operation_data_of, secp256k1_of, sha256_of,
};
use crate::operations::{AttemptChain, CompilerOperation, OperationResult, Requires};
use crate::signing::{generate_signing_serialization, SigningSerializationAlgorithm};

/// Whether a signature operation signs with Schnorr or ECDSA (DER), and
/// which identifier category supplies the private key.
#[derive(Clone, Copy)]
struct SignatureVariant {
    schnorr: bool,
    hd: bool,
}

/// Resolve the private key for a signature operation.
///
/// Missing key material is recoverable; everything else is fatal.
fn signing_key_bytes(
    identifier: &str,
    variant: SignatureVariant,
    data: &CompilationData,
    environment: &CompilationEnvironment,
) -> Result<Vec<u8>, OperationResult> {
    let variable_id = Identifier::parse(identifier).variable_id;
    if variant.hd {
        let context = hd_context(identifier, data, environment)?;
        hd_private_key_bytes(identifier, &context)
    } else {
        keys_of(identifier, data)?
            .private_keys
            .as_ref()
            .and_then(|map| map.get(variable_id))
            .cloned()
            .ok_or_else(|| {
                OperationResult::recoverable(format!(
                    "Identifier \"{identifier}\" refers to a signature, but no private keys for \"{variable_id}\" were provided in the compilation data."
                ))
            })
    }
}

/// Sign a 32-byte digest with the selected method, appending nothing.
fn sign_digest(
    identifier: &str,
    variant: SignatureVariant,
    environment: &CompilationEnvironment,
    private_key: &[u8],
    digest: &[u8],
) -> Result<Vec<u8>, OperationResult> {
    let secp256k1 = secp256k1_of(identifier, environment)?;
    let result = if variant.schnorr {
        secp256k1
            .sign_message_hash_schnorr(private_key, digest)
            .map(|signature| signature.to_vec())
    } else {
        secp256k1.sign_message_hash_der(private_key, digest)
    };
    result.map_err(|e| {
        OperationResult::fatal(format!(
            "Could not generate \"{identifier}\" - the signing operation failed: {e}"
        ))
    })
}

/// The pre-computed signature lookup, keyed by the full identifier.
fn precomputed_signature(hd: bool) -> Arc<dyn CompilerOperation> {
    let property = if hd {
        DataProperty::HdKeys
    } else {
        DataProperty::Keys
    };
    Requires::new(true, vec![property], vec![], move |identifier, data, _| {
        let stored = if hd {
            data.hd_keys
                .as_ref()
                .and_then(|hd_keys| hd_keys.signatures.as_ref())
                .and_then(|map| map.get(identifier))
        } else {
            data.keys
                .as_ref()
                .and_then(|keys| keys.signatures.as_ref())
                .and_then(|map| map.get(identifier))
        };
        match stored {
            Some(bytes) => OperationResult::Success(bytes.clone()),
            None => OperationResult::Skip,
        }
    })
}

/// Compute a transaction signature: double-SHA-256 of the signing
/// serialization, signed, with the SIGHASH byte appended.
fn compute_transaction_signature(
    identifier: &str,
    variant: SignatureVariant,
    data: &CompilationData,
    environment: &CompilationEnvironment,
) -> OperationResult {
    let parsed = Identifier::parse(identifier);
    let operation_name = parsed.operation.unwrap_or("signature");
    let algorithm_id = match parsed.parameter {
        Some(algorithm_id) => algorithm_id,
        None => {
            return OperationResult::fatal(format!(
                "Invalid signature identifier. Signatures must be of the form: \"[variable_id].{operation_name}.[signing_serialization_type]\"."
            ))
        }
    };
    if let Some(fragment) = parsed.unknown {
        return OperationResult::fatal(unknown_component_error(identifier, fragment));
    }
    let algorithm = match SigningSerializationAlgorithm::from_identifier(algorithm_id) {
        Some(algorithm) => algorithm,
        None => {
            return OperationResult::fatal(format!(
                "Unknown signing serialization algorithm, \"{algorithm_id}\"."
            ))
        }
    };
    let private_key = match signing_key_bytes(identifier, variant, data, environment) {
        Ok(private_key) => private_key,
        Err(error) => return error,
    };
    let operation_data = match operation_data_of(identifier, data) {
        Ok(operation_data) => operation_data,
        Err(error) => return error,
    };
    let sha256 = match sha256_of(identifier, environment) {
        Ok(sha256) => sha256,
        Err(error) => return error,
    };
    let preimage = generate_signing_serialization(sha256.as_ref(), operation_data, algorithm);
    let digest = sha256.hash(&sha256.hash(&preimage));
    let mut signature = match sign_digest(identifier, variant, environment, &private_key, &digest)
    {
        Ok(signature) => signature,
        Err(error) => return error,
    };
    signature.push(algorithm.to_sighash_byte());
    OperationResult::Success(signature)
}

/// Compute a data signature: single SHA-256 of the target script's
/// compiled bytecode, signed, with no suffix.
fn compute_data_signature(
    identifier: &str,
    variant: SignatureVariant,
    data: &CompilationData,
    environment: &CompilationEnvironment,
) -> OperationResult {
    let parsed = Identifier::parse(identifier);
    let operation_name = parsed.operation.unwrap_or("data_signature");
    let target_script_id = match parsed.parameter {
        Some(target_script_id) => target_script_id,
        None => {
            return OperationResult::fatal(format!(
                "Invalid data signature identifier. Data signatures must be of the form: \"[variable_id].{operation_name}.[target_script_id]\"."
            ))
        }
    };
    if let Some(fragment) = parsed.unknown {
        return OperationResult::fatal(unknown_component_error(identifier, fragment));
    }
    if !environment.scripts.contains_key(target_script_id) {
        return OperationResult::fatal(format!(
            "Data signature tried to sign an unknown target script, \"{target_script_id}\"."
        ));
    }
    let private_key = match signing_key_bytes(identifier, variant, data, environment) {
        Ok(private_key) => private_key,
        Err(error) => return error,
    };
    let target_bytecode =
        match compile_script_for_operations(target_script_id, data, environment) {
            Ok(bytecode) => bytecode,
            Err(message) => {
                return OperationResult::fatal(format!(
                    "Data signature could not be generated - the target script \"{target_script_id}\" could not be compiled: {message}"
                ))
            }
        };
    let sha256 = match sha256_of(identifier, environment) {
        Ok(sha256) => sha256,
        Err(error) => return error,
    };
    let digest = sha256.hash(&target_bytecode);
    match sign_digest(identifier, variant, environment, &private_key, &digest) {
        Ok(signature) => OperationResult::Success(signature),
        Err(error) => error,
    }
}

/// Environment prerequisites for HD-key signing.
fn hd_environment_properties() -> Vec<EnvironmentProperty> {
    vec![
        EnvironmentProperty::EntityOwnership,
        EnvironmentProperty::Variables,
        EnvironmentProperty::Secp256k1,
        EnvironmentProperty::Sha256,
        EnvironmentProperty::Sha512,
        EnvironmentProperty::Ripemd160,
    ]
}

/// Resolve `<key>.signature.<algorithm>` or
/// `<key>.schnorr_signature.<algorithm>`.
pub fn key_signature(schnorr: bool) -> Arc<dyn CompilerOperation> {
    let variant = SignatureVariant { schnorr, hd: false };
    AttemptChain::new(vec![
        precomputed_signature(false),
        Requires::new(
            false,
            vec![DataProperty::Keys, DataProperty::OperationData],
            vec![EnvironmentProperty::Sha256, EnvironmentProperty::Secp256k1],
            move |identifier, data, environment| {
                compute_transaction_signature(identifier, variant, data, environment)
            },
        ),
    ])
}

/// Resolve `<hd_key>.signature.<algorithm>` or
/// `<hd_key>.schnorr_signature.<algorithm>`.
pub fn hd_key_signature(schnorr: bool) -> Arc<dyn CompilerOperation> {
    let variant = SignatureVariant { schnorr, hd: true };
    AttemptChain::new(vec![
        precomputed_signature(true),
        Requires::new(
            false,
            vec![DataProperty::HdKeys, DataProperty::OperationData],
            hd_environment_properties(),
            move |identifier, data, environment| {
                compute_transaction_signature(identifier, variant, data, environment)
            },
        ),
    ])
}

/// Resolve `<key>.data_signature.<target>` or
/// `<key>.schnorr_data_signature.<target>`.
pub fn key_data_signature(schnorr: bool) -> Arc<dyn CompilerOperation> {
    let variant = SignatureVariant { schnorr, hd: false };
    AttemptChain::new(vec![
        precomputed_signature(false),
        Requires::new(
            false,
            vec![DataProperty::Keys],
            vec![EnvironmentProperty::Sha256, EnvironmentProperty::Secp256k1],
            move |identifier, data, environment| {
                compute_data_signature(identifier, variant, data, environment)
            },
        ),
    ])
}

/// Resolve `<hd_key>.data_signature.<target>` or
/// `<hd_key>.schnorr_data_signature.<target>`.
pub fn hd_key_data_signature(schnorr: bool) -> Arc<dyn CompilerOperation> {
    let variant = SignatureVariant { schnorr, hd: true };
    AttemptChain::new(vec![
        precomputed_signature(true),
        Requires::new(
            false,
            vec![DataProperty::HdKeys],
            hd_environment_properties(),
            move |identifier, data, environment| {
                compute_data_signature(identifier, variant, data, environment)
            },
        ),
    ])
}

/// Resolve `signing_serialization.full_<algorithm>` to the raw preimage.
pub fn full_signing_serialization(
    algorithm: SigningSerializationAlgorithm,
) -> Arc<dyn CompilerOperation> {
    Requires::new(
        false,
        vec![DataProperty::OperationData],
        vec![EnvironmentProperty::Sha256],
        move |identifier, data, environment| {
            let parsed = Identifier::parse(identifier);
            if let Some(fragment) = parsed.parameter {
                return OperationResult::fatal(unknown_component_error(identifier, fragment));
            }
            let operation_data = match operation_data_of(identifier, data) {
                Ok(operation_data) => operation_data,
                Err(error) => return error,
            };
            let sha256 = match sha256_of(identifier, environment) {
                Ok(sha256) => sha256,
                Err(error) => return error,
            };
            OperationResult::Success(generate_signing_serialization(
                sha256.as_ref(),
                operation_data,
                algorithm,
            ))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Keys, OperationData};
    use std::collections::HashMap;

    fn signing_environment() -> CompilationEnvironment {
        CompilationEnvironment::new().with_native_crypto()
    }

    fn signing_data() -> CompilationData {
        let mut data = CompilationData::default();
        data.keys = Some(Keys {
            private_keys: Some(HashMap::from([("alice".to_string(), vec![0x01; 32])])),
            ..Default::default()
        });
        data.operation_data = Some(OperationData {
            version: 2,
            locktime: 0,
            outpoint_transaction_hash: vec![0x01; 32],
            outpoint_index: 0,
            output_value: 10_000,
            sequence_number: 0,
            covered_bytecode: vec![0x51],
            corresponding_output: Some(vec![0x0a]),
            transaction_outpoints: vec![0x02; 36],
            transaction_outputs: vec![0x03; 9],
            transaction_sequence_numbers: vec![0x04; 4],
        });
        data
    }

    #[test]
    fn test_ecdsa_signature_has_sighash_suffix() {
        let op = key_signature(false);
        let data = signing_data();
        let environment = signing_environment();
        match op.resolve("alice.signature.all_outputs", &data, &environment) {
            OperationResult::Success(signature) => {
                // DER signature (70-72 bytes) plus the 0x41 suffix.
                assert!(signature.len() >= 71 && signature.len() <= 73, "{}", signature.len());
                assert_eq!(*signature.last().unwrap(), 0x41);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_schnorr_signature_is_65_bytes() {
        let op = key_signature(true);
        let data = signing_data();
        let environment = signing_environment();
        match op.resolve("alice.schnorr_signature.no_outputs", &data, &environment) {
            OperationResult::Success(signature) => {
                assert_eq!(signature.len(), 65);
                assert_eq!(*signature.last().unwrap(), 0x42);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_algorithm_segment() {
        let op = key_signature(false);
        let data = signing_data();
        let environment = signing_environment();
        match op.resolve("alice.signature", &data, &environment) {
            OperationResult::Error { message, recoverable } => {
                assert!(!recoverable);
                assert!(message.contains("Invalid signature identifier"), "{message}");
                assert!(message.contains("[signing_serialization_type]"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_algorithm() {
        let op = key_signature(false);
        let data = signing_data();
        let environment = signing_environment();
        match op.resolve("alice.signature.unknown_algo", &data, &environment) {
            OperationResult::Error { message, recoverable } => {
                assert!(!recoverable);
                assert_eq!(
                    message,
                    "Unknown signing serialization algorithm, \"unknown_algo\"."
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_trailing_segment_is_unknown_component() {
        let op = key_signature(false);
        let data = signing_data();
        let environment = signing_environment();
        match op.resolve("alice.signature.all_outputs.extra", &data, &environment) {
            OperationResult::Error { message, recoverable } => {
                assert!(!recoverable);
                assert!(message.contains("Unknown component"), "{message}");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_precomputed_signature_short_circuits() {
        let op = key_signature(false);
        let environment = CompilationEnvironment::new(); // no crypto at all
        let mut data = CompilationData::default();
        data.keys = Some(Keys {
            signatures: Some(HashMap::from([(
                "alice.signature.all_outputs".to_string(),
                vec![0x30, 0x44, 0x41],
            )])),
            ..Default::default()
        });
        assert_eq!(
            op.resolve("alice.signature.all_outputs", &data, &environment),
            OperationResult::Success(vec![0x30, 0x44, 0x41])
        );
    }

    #[test]
    fn test_missing_private_key_is_recoverable() {
        let op = key_signature(false);
        let mut data = signing_data();
        data.keys = Some(Keys::default());
        let environment = signing_environment();
        match op.resolve("alice.signature.all_outputs", &data, &environment) {
            OperationResult::Error { recoverable, .. } => assert!(recoverable),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_data_signature_unknown_target_script() {
        let op = key_data_signature(false);
        let data = signing_data();
        let environment = signing_environment();
        match op.resolve("bob.data_signature.missing_script", &data, &environment) {
            OperationResult::Error { message, recoverable } => {
                assert!(!recoverable);
                assert_eq!(
                    message,
                    "Data signature tried to sign an unknown target script, \"missing_script\"."
                );
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_full_serialization_returns_raw_preimage() {
        let op = full_signing_serialization(SigningSerializationAlgorithm::AllOutputs);
        let data = signing_data();
        let environment = signing_environment();
        match op.resolve("signing_serialization.full_all_outputs", &data, &environment) {
            OperationResult::Success(preimage) => {
                assert_eq!(*preimage.last().unwrap(), 0x41);
                // version + 2 hashes + outpoint + index + varint + bytecode
                // + value + sequence + outputs hash + locktime + sighash
                assert_eq!(preimage.len(), 4 + 32 + 32 + 32 + 4 + 1 + 1 + 8 + 4 + 32 + 4 + 1);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
