//! Common compiler operations.
//!
//! Resolves `AddressData` and `WalletData` variables, the
//! `current_block_height` and `current_block_time` built-ins, the
//! individual signing-serialization components, and public keys for both
//! `Key` and `HdKey` variables (pre-computed or derived on the fly).

use std::sync::Arc;

use bch_hd::{HdPrivateNode, HdPublicNode};
use bch_primitives::capability::{HashFunction, Secp256k1};
use bch_script::number::encode_script_number;

use crate::environment::{
    CompilationData, CompilationEnvironment, DataProperty, EnvironmentProperty, HdKeyParameters,
    HdKeys, Keys, OperationData, Variable,
};
use crate::identifier::{unknown_component_error, Identifier};
use crate::operations::{AttemptChain, CompilerOperation, OperationResult, Requires};
use crate::signing::SigningSerializationComponent;

/// Earliest Unix time interpretable as a locktime date.
const LOCKTIME_MINIMUM_DATE: i64 = 500_000_000;

/// Latest Unix time representable in a u32 locktime.
const LOCKTIME_MAXIMUM_DATE: i64 = u32::MAX as i64;

// ---------------------------------------------------------------------------
// Gated property accessors
// ---------------------------------------------------------------------------
//
// The `Requires` wrapper checks presence before the inner function runs;
// these accessors produce the same missing-property error, so inner
// functions never panic.

pub(crate) fn keys_of<'a>(
    identifier: &str,
    data: &'a CompilationData,
) -> Result<&'a Keys, OperationResult> {
    data.keys.as_ref().ok_or_else(|| {
        OperationResult::fatal(format!(
            "Invalid compilation data for \"{identifier}\" - missing property: keys."
        ))
    })
}

pub(crate) fn hd_keys_of<'a>(
    identifier: &str,
    data: &'a CompilationData,
) -> Result<&'a HdKeys, OperationResult> {
    data.hd_keys.as_ref().ok_or_else(|| {
        OperationResult::fatal(format!(
            "Invalid compilation data for \"{identifier}\" - missing property: hd_keys."
        ))
    })
}

pub(crate) fn operation_data_of<'a>(
    identifier: &str,
    data: &'a CompilationData,
) -> Result<&'a OperationData, OperationResult> {
    data.operation_data.as_ref().ok_or_else(|| {
        OperationResult::fatal(format!(
            "Invalid compilation data for \"{identifier}\" - missing property: operation_data."
        ))
    })
}

pub(crate) fn sha256_of<'a>(
    identifier: &str,
    environment: &'a CompilationEnvironment,
) -> Result<&'a Arc<dyn HashFunction>, OperationResult> {
    environment.sha256.as_ref().ok_or_else(|| {
        OperationResult::fatal(format!(
            "Invalid compilation environment for \"{identifier}\" - missing property: sha256."
        ))
    })
}

pub(crate) fn secp256k1_of<'a>(
    identifier: &str,
    environment: &'a CompilationEnvironment,
) -> Result<&'a Arc<dyn Secp256k1>, OperationResult> {
    environment.secp256k1.as_ref().ok_or_else(|| {
        OperationResult::fatal(format!(
            "Invalid compilation environment for \"{identifier}\" - missing property: secp256k1."
        ))
    })
}

// ---------------------------------------------------------------------------
// HD key resolution
// ---------------------------------------------------------------------------

/// The resolved context of an `HdKey` identifier: the owning entity, the
/// variable's derivation parameters, and the instance index (`address_index
/// + address_offset`).
pub(crate) struct HdContext<'a> {
    pub entity_id: &'a str,
    pub params: &'a HdKeyParameters,
    pub instance_index: u32,
    pub hd_keys: &'a HdKeys,
}

pub(crate) fn hd_context<'a>(
    identifier: &str,
    data: &'a CompilationData,
    environment: &'a CompilationEnvironment,
) -> Result<HdContext<'a>, OperationResult> {
    let variable_id = Identifier::parse(identifier).variable_id;
    let hd_keys = hd_keys_of(identifier, data)?;
    let address_index = hd_keys.address_index.ok_or_else(|| {
        OperationResult::fatal(format!(
            "Invalid compilation data for \"{identifier}\" - missing property: hd_keys.address_index."
        ))
    })?;
    let variables = environment.variables.as_ref().ok_or_else(|| {
        OperationResult::fatal(format!(
            "Invalid compilation environment for \"{identifier}\" - missing property: variables."
        ))
    })?;
    let params = match variables.get(variable_id) {
        Some(Variable::HdKey(params)) => params,
        Some(_) => {
            return Err(OperationResult::fatal(format!(
                "Identifier \"{identifier}\" was dispatched as an HdKey, but \"{variable_id}\" is not an HdKey variable."
            )))
        }
        None => {
            return Err(OperationResult::fatal(format!(
                "Identifier \"{identifier}\" refers to an unknown variable, \"{variable_id}\"."
            )))
        }
    };
    let entity_id = environment
        .entity_ownership
        .as_ref()
        .and_then(|ownership| ownership.get(variable_id))
        .ok_or_else(|| {
            OperationResult::fatal(format!(
                "Identifier \"{identifier}\" refers to an HdKey, but no owning entity for \"{variable_id}\" was provided in the compilation environment."
            ))
        })?;
    let instance_index = address_index
        .checked_add(params.address_offset)
        .ok_or_else(|| {
            OperationResult::fatal(format!(
                "Could not generate \"{identifier}\" - the address index and offset overflow the derivation index."
            ))
        })?;
    Ok(HdContext {
        entity_id,
        params,
        instance_index,
        hd_keys,
    })
}

/// Derive the 32-byte private key for an `HdKey` identifier.
///
/// Missing HD private keys are recoverable (a pre-computed value at a
/// higher level may still satisfy the request); decoding and derivation
/// failures are fatal.
pub(crate) fn hd_private_key_bytes(
    identifier: &str,
    context: &HdContext<'_>,
) -> Result<Vec<u8>, OperationResult> {
    let serialized = context
        .hd_keys
        .hd_private_keys
        .as_ref()
        .and_then(|keys| keys.get(context.entity_id))
        .ok_or_else(|| {
            OperationResult::recoverable(format!(
                "Identifier \"{identifier}\" refers to an HdKey, but no HD private key for entity \"{}\" was provided in the compilation data.",
                context.entity_id
            ))
        })?;
    let node = HdPrivateNode::decode(serialized).map_err(|e| {
        OperationResult::fatal(format!(
            "Could not generate \"{identifier}\" - the HD private key provided for entity \"{}\" could not be decoded: {e}",
            context.entity_id
        ))
    })?;
    let path = context.params.private_path().map_err(|e| {
        OperationResult::fatal(format!(
            "Could not generate \"{identifier}\" - invalid private derivation path: {e}"
        ))
    })?;
    let derived = node
        .derive_path(&path, context.instance_index)
        .map_err(|e| {
            OperationResult::fatal(format!(
                "Could not generate \"{identifier}\" - the path \"{path}\" could not be derived: {e}"
            ))
        })?;
    Ok(derived.private_key().to_bytes().to_vec())
}

// ---------------------------------------------------------------------------
// Data variable operations
// ---------------------------------------------------------------------------

/// Resolve an `AddressData` variable to its caller-supplied bytes.
pub fn address_data() -> Arc<dyn CompilerOperation> {
    Requires::new(
        false,
        vec![DataProperty::AddressData],
        vec![],
        |identifier, data, _| {
            let parsed = Identifier::parse(identifier);
            if let Some(fragment) = parsed.operation {
                return OperationResult::fatal(unknown_component_error(identifier, fragment));
            }
            match data
                .address_data
                .as_ref()
                .and_then(|map| map.get(parsed.variable_id))
            {
                Some(bytes) => OperationResult::Success(bytes.clone()),
                None => OperationResult::fatal(format!(
                    "Identifier \"{identifier}\" refers to an AddressData, but no bytes for \"{}\" were provided in the compilation data.",
                    parsed.variable_id
                )),
            }
        },
    )
}

/// Resolve a `WalletData` variable to its caller-supplied bytes.
pub fn wallet_data() -> Arc<dyn CompilerOperation> {
    Requires::new(
        false,
        vec![DataProperty::WalletData],
        vec![],
        |identifier, data, _| {
            let parsed = Identifier::parse(identifier);
            if let Some(fragment) = parsed.operation {
                return OperationResult::fatal(unknown_component_error(identifier, fragment));
            }
            match data
                .wallet_data
                .as_ref()
                .and_then(|map| map.get(parsed.variable_id))
            {
                Some(bytes) => OperationResult::Success(bytes.clone()),
                None => OperationResult::fatal(format!(
                    "Identifier \"{identifier}\" refers to a WalletData, but no bytes for \"{}\" were provided in the compilation data.",
                    parsed.variable_id
                )),
            }
        },
    )
}

// ---------------------------------------------------------------------------
// Built-in operations
// ---------------------------------------------------------------------------

/// Resolve `current_block_height` to a minimally-encoded script number.
pub fn current_block_height() -> Arc<dyn CompilerOperation> {
    Requires::new(
        false,
        vec![DataProperty::CurrentBlockHeight],
        vec![],
        |identifier, data, _| {
            let parsed = Identifier::parse(identifier);
            if let Some(fragment) = parsed.operation {
                return OperationResult::fatal(unknown_component_error(identifier, fragment));
            }
            match data.current_block_height {
                Some(height) => {
                    OperationResult::Success(encode_script_number(i64::from(height)))
                }
                None => OperationResult::fatal(format!(
                    "Invalid compilation data for \"{identifier}\" - missing property: current_block_height."
                )),
            }
        },
    )
}

/// Resolve `current_block_time` to a 4-byte little-endian locktime.
pub fn current_block_time() -> Arc<dyn CompilerOperation> {
    Requires::new(
        false,
        vec![DataProperty::CurrentBlockTime],
        vec![],
        |identifier, data, _| {
            let parsed = Identifier::parse(identifier);
            if let Some(fragment) = parsed.operation {
                return OperationResult::fatal(unknown_component_error(identifier, fragment));
            }
            let time = match data.current_block_time {
                Some(time) => time,
                None => {
                    return OperationResult::fatal(format!(
                        "Invalid compilation data for \"{identifier}\" - missing property: current_block_time."
                    ))
                }
            };
            if !(LOCKTIME_MINIMUM_DATE..=LOCKTIME_MAXIMUM_DATE).contains(&time) {
                return OperationResult::fatal(format!(
                    "Invalid locktime date: current_block_time must be between {LOCKTIME_MINIMUM_DATE} and {LOCKTIME_MAXIMUM_DATE} (got {time})."
                ));
            }
            OperationResult::Success((time as u32).to_le_bytes().to_vec())
        },
    )
}

/// Resolve one `signing_serialization.<component>` identifier.
pub fn signing_serialization_component(
    component: SigningSerializationComponent,
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
            OperationResult::Success(component.resolve(sha256.as_ref(), operation_data))
        },
    )
}

// ---------------------------------------------------------------------------
// Public key operations
// ---------------------------------------------------------------------------

/// Resolve `<key>.public_key`: the pre-computed value when provided, or
/// compressed derivation from the private key.
pub fn key_public_key() -> Arc<dyn CompilerOperation> {
    AttemptChain::new(vec![
        // Pre-computed public key.
        Requires::new(
            true,
            vec![DataProperty::Keys],
            vec![],
            |identifier, data, _| {
                let parsed = Identifier::parse(identifier);
                if let Some(fragment) = parsed.parameter {
                    return OperationResult::fatal(unknown_component_error(identifier, fragment));
                }
                let keys = match keys_of(identifier, data) {
                    Ok(keys) => keys,
                    Err(error) => return error,
                };
                match keys
                    .public_keys
                    .as_ref()
                    .and_then(|map| map.get(parsed.variable_id))
                {
                    Some(bytes) => OperationResult::Success(bytes.clone()),
                    None => OperationResult::Skip,
                }
            },
        ),
        // Derivation from the private key.
        Requires::new(
            false,
            vec![DataProperty::Keys],
            vec![EnvironmentProperty::Secp256k1],
            |identifier, data, environment| {
                let parsed = Identifier::parse(identifier);
                if let Some(fragment) = parsed.parameter {
                    return OperationResult::fatal(unknown_component_error(identifier, fragment));
                }
                let keys = match keys_of(identifier, data) {
                    Ok(keys) => keys,
                    Err(error) => return error,
                };
                let secp256k1 = match secp256k1_of(identifier, environment) {
                    Ok(secp256k1) => secp256k1,
                    Err(error) => return error,
                };
                let private_key = match keys
                    .private_keys
                    .as_ref()
                    .and_then(|map| map.get(parsed.variable_id))
                {
                    Some(bytes) => bytes,
                    None => {
                        return OperationResult::recoverable(format!(
                            "Identifier \"{identifier}\" refers to a public key, but no public or private keys for \"{}\" were provided in the compilation data.",
                            parsed.variable_id
                        ))
                    }
                };
                match secp256k1.derive_public_key_compressed(private_key) {
                    Ok(public_key) => OperationResult::Success(public_key.to_vec()),
                    Err(e) => OperationResult::fatal(format!(
                        "Could not generate \"{identifier}\" - the secp256k1 back-end rejected the private key: {e}"
                    )),
                }
            },
        ),
    ])
}

/// Resolve `<hd_key>.public_key`: the pre-derived value when provided,
/// derivation through the entity's HD private key, or derivation through
/// the entity's HD public key and the variable's public derivation path.
pub fn hd_key_public_key() -> Arc<dyn CompilerOperation> {
    AttemptChain::new(vec![
        // Pre-derived public key.
        Requires::new(
            true,
            vec![DataProperty::HdKeys],
            vec![],
            |identifier, data, _| {
                let parsed = Identifier::parse(identifier);
                if let Some(fragment) = parsed.parameter {
                    return OperationResult::fatal(unknown_component_error(identifier, fragment));
                }
                let hd_keys = match hd_keys_of(identifier, data) {
                    Ok(hd_keys) => hd_keys,
                    Err(error) => return error,
                };
                match hd_keys
                    .derived_public_keys
                    .as_ref()
                    .and_then(|map| map.get(parsed.variable_id))
                {
                    Some(bytes) => OperationResult::Success(bytes.clone()),
                    None => OperationResult::Skip,
                }
            },
        ),
        // Derivation through the entity's HD keys.
        Requires::new(
            false,
            vec![DataProperty::HdKeys],
            vec![
                EnvironmentProperty::EntityOwnership,
                EnvironmentProperty::Variables,
                EnvironmentProperty::Secp256k1,
                EnvironmentProperty::Sha256,
                EnvironmentProperty::Sha512,
                EnvironmentProperty::Ripemd160,
            ],
            |identifier, data, environment| {
                let parsed = Identifier::parse(identifier);
                if let Some(fragment) = parsed.parameter {
                    return OperationResult::fatal(unknown_component_error(identifier, fragment));
                }
                let context = match hd_context(identifier, data, environment) {
                    Ok(context) => context,
                    Err(error) => return error,
                };
                let secp256k1 = match secp256k1_of(identifier, environment) {
                    Ok(secp256k1) => secp256k1,
                    Err(error) => return error,
                };

                // Prefer the entity's HD private key.
                let has_private = context
                    .hd_keys
                    .hd_private_keys
                    .as_ref()
                    .map(|keys| keys.contains_key(context.entity_id))
                    .unwrap_or(false);
                if has_private {
                    let private_key = match hd_private_key_bytes(identifier, &context) {
                        Ok(private_key) => private_key,
                        Err(error) => return error,
                    };
                    return match secp256k1.derive_public_key_compressed(&private_key) {
                        Ok(public_key) => OperationResult::Success(public_key.to_vec()),
                        Err(e) => OperationResult::fatal(format!(
                            "Could not generate \"{identifier}\" - the secp256k1 back-end rejected the derived private key: {e}"
                        )),
                    };
                }

                // Fall back to the entity's HD public key.
                let serialized = match context
                    .hd_keys
                    .hd_public_keys
                    .as_ref()
                    .and_then(|keys| keys.get(context.entity_id))
                {
                    Some(serialized) => serialized,
                    None => {
                        return OperationResult::recoverable(format!(
                            "Identifier \"{identifier}\" refers to an HdKey, but no HD keys for entity \"{}\" were provided in the compilation data.",
                            context.entity_id
                        ))
                    }
                };
                let node = match HdPublicNode::decode(serialized) {
                    Ok(node) => node,
                    Err(e) => {
                        return OperationResult::fatal(format!(
                            "Could not generate \"{identifier}\" - the HD public key provided for entity \"{}\" could not be decoded: {e}",
                            context.entity_id
                        ))
                    }
                };
                let path = match context.params.public_path() {
                    Ok(path) => path,
                    Err(e) => {
                        return OperationResult::fatal(format!(
                            "Could not generate \"{identifier}\" - invalid public derivation path: {e}"
                        ))
                    }
                };
                match node.derive_path(&path, context.instance_index) {
                    Ok(derived) => {
                        OperationResult::Success(derived.public_key().to_compressed().to_vec())
                    }
                    Err(e) => OperationResult::fatal(format!(
                        "Could not generate \"{identifier}\" - the path \"{path}\" could not be derived: {e}"
                    )),
                }
            },
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn environment_with_crypto() -> CompilationEnvironment {
        CompilationEnvironment::new().with_native_crypto()
    }

    #[test]
    fn test_address_data_resolves_bytes() {
        let op = address_data();
        let mut data = CompilationData::default();
        data.address_data = Some(HashMap::from([("nonce".to_string(), vec![0xab, 0xcd])]));
        let environment = CompilationEnvironment::new();
        assert_eq!(
            op.resolve("nonce", &data, &environment),
            OperationResult::Success(vec![0xab, 0xcd])
        );
    }

    #[test]
    fn test_address_data_rejects_trailing_segment() {
        let op = address_data();
        let mut data = CompilationData::default();
        data.address_data = Some(HashMap::from([("nonce".to_string(), vec![1])]));
        let environment = CompilationEnvironment::new();
        match op.resolve("nonce.extra", &data, &environment) {
            OperationResult::Error { message, recoverable } => {
                assert!(!recoverable);
                assert!(message.contains("Unknown component"));
                assert!(message.contains("\"extra\""));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_current_block_height_encodes_script_number() {
        let op = current_block_height();
        let mut data = CompilationData::default();
        data.current_block_height = Some(500_000);
        let environment = CompilationEnvironment::new();
        assert_eq!(
            op.resolve("current_block_height", &data, &environment),
            OperationResult::Success(vec![0x20, 0xa1, 0x07])
        );
    }

    #[test]
    fn test_current_block_time_validates_range() {
        let op = current_block_time();
        let environment = CompilationEnvironment::new();
        let mut data = CompilationData::default();
        data.current_block_time = Some(400);
        match op.resolve("current_block_time", &data, &environment) {
            OperationResult::Error { message, recoverable } => {
                assert!(!recoverable);
                assert!(message.contains("Invalid locktime date"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        data.current_block_time = Some(600_000_000);
        assert_eq!(
            op.resolve("current_block_time", &data, &environment),
            OperationResult::Success(600_000_000u32.to_le_bytes().to_vec())
        );
    }

    #[test]
    fn test_key_public_key_precomputed_needs_no_secp256k1() {
        // Scenario: no secp256k1 capability, pre-computed public key in data.
        let op = key_public_key();
        let environment = CompilationEnvironment::new();
        let mut data = CompilationData::default();
        data.keys = Some(Keys {
            public_keys: Some(HashMap::from([(
                "alice".to_string(),
                vec![0x02, 0xaa, 0xbb],
            )])),
            ..Default::default()
        });
        assert_eq!(
            op.resolve("alice.public_key", &data, &environment),
            OperationResult::Success(vec![0x02, 0xaa, 0xbb])
        );
    }

    #[test]
    fn test_key_public_key_missing_secp256k1_is_fatal() {
        // Scenario: empty public keys and no secp256k1 capability.
        let op = key_public_key();
        let environment = CompilationEnvironment::new();
        let mut data = CompilationData::default();
        data.keys = Some(Keys::default());
        match op.resolve("alice.public_key", &data, &environment) {
            OperationResult::Error { message, recoverable } => {
                assert!(!recoverable);
                assert!(message.contains("missing property: secp256k1"), "{message}");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_key_public_key_derives_from_private_key() {
        let op = key_public_key();
        let environment = environment_with_crypto();
        let mut data = CompilationData::default();
        data.keys = Some(Keys {
            private_keys: Some(HashMap::from([("alice".to_string(), vec![0x01; 32])])),
            ..Default::default()
        });
        match op.resolve("alice.public_key", &data, &environment) {
            OperationResult::Success(bytes) => {
                assert_eq!(bytes.len(), 33);
                assert!(bytes[0] == 0x02 || bytes[0] == 0x03);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_key_public_key_missing_keys_is_recoverable() {
        let op = key_public_key();
        let environment = environment_with_crypto();
        let mut data = CompilationData::default();
        data.keys = Some(Keys::default());
        match op.resolve("alice.public_key", &data, &environment) {
            OperationResult::Error { recoverable, .. } => assert!(recoverable),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
