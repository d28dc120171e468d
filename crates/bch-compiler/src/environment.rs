//! Compilation environment and compilation data.
//!
//! The environment holds the static inputs shared across many compilations:
//! scripts, variables, the opcode map, the operation registry, and optional
//! capability handles for the hash and curve back-ends. The data holds the
//! per-invocation inputs: keys, HD keys, literal bytes, and the transaction
//! context required for signing. Both are immutable during a compilation.

use std::any::Any;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use bch_primitives::capability::{
    HashFunction, NativeRipemd160, NativeSecp256k1, NativeSha1, NativeSha256, NativeSha512,
    Secp256k1,
};
use bch_hd::{DerivationPath, HdError};
use bch_script::opcodes::opcode_map;
use serde::{Deserialize, Serialize};

use crate::operations::OperationRegistry;
use crate::template::AuthenticationTemplate;

/// Factory producing an opaque initial VM program state from bytecode.
///
/// Consumed only by external callers assembling finished programs; the
/// compiler itself never invokes it.
pub type CreateState = Arc<dyn Fn(Vec<u8>) -> Box<dyn Any + Send + Sync> + Send + Sync>;

/// Derivation parameters of an `HdKey` variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HdKeyParameters {
    /// Offset added to the address index when substituting `i` in the
    /// instance derivation path.
    #[serde(default)]
    pub address_offset: u32,
    /// Private derivation path (`m/...`). Defaults to `m/i`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_derivation_path: Option<String>,
    /// Public derivation path (`M/...`). Defaults to the private path with
    /// the `m` prefix replaced by `M`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_derivation_path: Option<String>,
}

impl HdKeyParameters {
    /// The parsed private derivation path (default `m/i`).
    pub fn private_path(&self) -> Result<DerivationPath, HdError> {
        let raw = self.private_derivation_path.as_deref().unwrap_or("m/i");
        let path = DerivationPath::from_str(raw)?;
        if path.public {
            return Err(HdError::PathTypeMismatch(format!(
                "private derivation path must begin with \"m\": {raw}"
            )));
        }
        Ok(path)
    }

    /// The parsed public derivation path (default: private path, `m` -> `M`).
    pub fn public_path(&self) -> Result<DerivationPath, HdError> {
        match self.public_derivation_path.as_deref() {
            Some(raw) => {
                let path = DerivationPath::from_str(raw)?;
                if !path.public {
                    return Err(HdError::PathTypeMismatch(format!(
                        "public derivation path must begin with \"M\": {raw}"
                    )));
                }
                Ok(path)
            }
            None => Ok(self.private_path()?.to_public_form()),
        }
    }
}

/// A template variable, owned by an entity.
///
/// The variant selects the identifier category and thereby the set of
/// operations available on the variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Variable {
    /// A private key holder capable of ECDSA and Schnorr signing.
    Key,
    /// A BIP32-style hierarchical key with derivation paths and an address
    /// offset.
    HdKey(HdKeyParameters),
    /// Per-invocation bytes supplied by the caller.
    AddressData,
    /// Cross-invocation bytes supplied by the caller.
    WalletData,
}

/// The static environment shared across compilations.
///
/// Must not be mutated during a compilation. Capability handles are
/// optional; operations that need one declare it and the dispatcher checks
/// presence before the operation runs.
#[derive(Clone)]
pub struct CompilationEnvironment {
    /// Named script sources. Scripts may reference other scripts by id;
    /// the reference graph is assumed acyclic (callers validate upstream).
    pub scripts: HashMap<String, String>,
    /// Variables by id.
    pub variables: Option<HashMap<String, Variable>>,
    /// Owning entity id per variable id.
    pub entity_ownership: Option<HashMap<String, String>>,
    /// Opcode name to byte value.
    pub opcodes: HashMap<String, u8>,
    /// The operation dispatch table.
    pub operations: OperationRegistry,
    /// SHA-1 capability.
    pub sha1: Option<Arc<dyn HashFunction>>,
    /// SHA-256 capability.
    pub sha256: Option<Arc<dyn HashFunction>>,
    /// SHA-512 capability.
    pub sha512: Option<Arc<dyn HashFunction>>,
    /// RIPEMD-160 capability.
    pub ripemd160: Option<Arc<dyn HashFunction>>,
    /// secp256k1 capability.
    pub secp256k1: Option<Arc<dyn Secp256k1>>,
    /// Opaque virtual machine handle, passed through to external callers.
    pub vm: Option<Arc<dyn Any + Send + Sync>>,
    /// Opaque program-state factory, passed through to external callers.
    pub create_state: Option<CreateState>,
}

impl CompilationEnvironment {
    /// Create an empty environment with the standard operation registry
    /// and no capabilities, scripts, or variables.
    pub fn new() -> Self {
        CompilationEnvironment {
            scripts: HashMap::new(),
            variables: None,
            entity_ownership: None,
            opcodes: HashMap::new(),
            operations: OperationRegistry::bch(),
            sha1: None,
            sha256: None,
            sha512: None,
            ripemd160: None,
            secp256k1: None,
            vm: None,
            create_state: None,
        }
    }

    /// Attach the native crypto capabilities (all five back-ends).
    pub fn with_native_crypto(mut self) -> Self {
        self.sha1 = Some(Arc::new(NativeSha1));
        self.sha256 = Some(Arc::new(NativeSha256));
        self.sha512 = Some(Arc::new(NativeSha512));
        self.ripemd160 = Some(Arc::new(NativeRipemd160));
        self.secp256k1 = Some(Arc::new(NativeSecp256k1));
        self
    }

    /// Build a complete environment from an authentication template.
    ///
    /// Flattens the template's entities, variables, and scripts, attaches
    /// the BCH opcode map, the standard operation registry, and the native
    /// crypto capabilities.
    pub fn from_template(template: &AuthenticationTemplate) -> Self {
        let parts = crate::template::flatten_template(template);
        let mut environment = CompilationEnvironment::new().with_native_crypto();
        environment.scripts = parts.scripts;
        environment.variables = Some(parts.variables);
        environment.entity_ownership = Some(parts.entity_ownership);
        environment.opcodes = opcode_map();
        environment
    }
}

impl Default for CompilationEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-computed and raw key material for `Key` variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keys {
    /// 32-byte private keys by variable id.
    pub private_keys: Option<HashMap<String, Vec<u8>>>,
    /// Compressed public keys by variable id.
    pub public_keys: Option<HashMap<String, Vec<u8>>>,
    /// Pre-computed signatures by full identifier
    /// (e.g. `owner.signature.all_outputs`).
    pub signatures: Option<HashMap<String, Vec<u8>>>,
}

/// Key material for `HdKey` variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HdKeys {
    /// The per-address index substituted for `i` in derivation paths.
    pub address_index: Option<u32>,
    /// Serialized HD private keys (`xprv...`) by entity id.
    pub hd_private_keys: Option<HashMap<String, String>>,
    /// Serialized HD public keys (`xpub...`) by entity id.
    pub hd_public_keys: Option<HashMap<String, String>>,
    /// Pre-derived compressed public keys by variable id.
    pub derived_public_keys: Option<HashMap<String, Vec<u8>>>,
    /// Pre-computed signatures by full identifier.
    pub signatures: Option<HashMap<String, Vec<u8>>>,
}

/// The transaction context required to generate signing serializations.
///
/// All numeric fields are unsigned with fixed widths; byte fields are
/// pre-serialized by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationData {
    /// Transaction version.
    pub version: u32,
    /// Transaction locktime.
    pub locktime: u32,
    /// Hash of the outpoint transaction (32 bytes).
    pub outpoint_transaction_hash: Vec<u8>,
    /// Index of the outpoint being spent.
    pub outpoint_index: u32,
    /// Value of the output being spent, in satoshis.
    pub output_value: u64,
    /// Sequence number of the input being signed.
    pub sequence_number: u32,
    /// The locking bytecode covered by the signature.
    pub covered_bytecode: Vec<u8>,
    /// The serialized output at the same index as the signed input, if any.
    pub corresponding_output: Option<Vec<u8>>,
    /// All outpoints, serialized.
    pub transaction_outpoints: Vec<u8>,
    /// All outputs, serialized.
    pub transaction_outputs: Vec<u8>,
    /// All input sequence numbers, serialized.
    pub transaction_sequence_numbers: Vec<u8>,
}

/// The per-invocation inputs to a compilation.
///
/// Must not be mutated during a compilation.
#[derive(Debug, Clone, Default)]
pub struct CompilationData {
    /// Material for `Key` variables.
    pub keys: Option<Keys>,
    /// Material for `HdKey` variables.
    pub hd_keys: Option<HdKeys>,
    /// Literal bytes for `AddressData` variables, by variable id.
    pub address_data: Option<HashMap<String, Vec<u8>>>,
    /// Literal bytes for `WalletData` variables, by variable id.
    pub wallet_data: Option<HashMap<String, Vec<u8>>>,
    /// Transaction context for signing operations.
    pub operation_data: Option<OperationData>,
    /// The current block height, for `current_block_height`.
    pub current_block_height: Option<u32>,
    /// The current block time in Unix seconds, for `current_block_time`.
    /// Valid locktime dates are between 500,000,000 and 4,294,967,295.
    pub current_block_time: Option<i64>,
}

/// A data property an operation may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataProperty {
    /// `keys` is present.
    Keys,
    /// `hd_keys` is present.
    HdKeys,
    /// `operation_data` is present.
    OperationData,
    /// `address_data` is present.
    AddressData,
    /// `wallet_data` is present.
    WalletData,
    /// `current_block_height` is present.
    CurrentBlockHeight,
    /// `current_block_time` is present.
    CurrentBlockTime,
}

impl DataProperty {
    /// The property name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            DataProperty::Keys => "keys",
            DataProperty::HdKeys => "hd_keys",
            DataProperty::OperationData => "operation_data",
            DataProperty::AddressData => "address_data",
            DataProperty::WalletData => "wallet_data",
            DataProperty::CurrentBlockHeight => "current_block_height",
            DataProperty::CurrentBlockTime => "current_block_time",
        }
    }

    /// Whether the property is present on the given data.
    pub fn is_present(&self, data: &CompilationData) -> bool {
        match self {
            DataProperty::Keys => data.keys.is_some(),
            DataProperty::HdKeys => data.hd_keys.is_some(),
            DataProperty::OperationData => data.operation_data.is_some(),
            DataProperty::AddressData => data.address_data.is_some(),
            DataProperty::WalletData => data.wallet_data.is_some(),
            DataProperty::CurrentBlockHeight => data.current_block_height.is_some(),
            DataProperty::CurrentBlockTime => data.current_block_time.is_some(),
        }
    }
}

/// An environment property an operation may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentProperty {
    /// The SHA-1 capability is present.
    Sha1,
    /// The SHA-256 capability is present.
    Sha256,
    /// The SHA-512 capability is present.
    Sha512,
    /// The RIPEMD-160 capability is present.
    Ripemd160,
    /// The secp256k1 capability is present.
    Secp256k1,
    /// The virtual machine handle is present.
    Vm,
    /// The entity ownership map is present.
    EntityOwnership,
    /// The variables map is present.
    Variables,
}

impl EnvironmentProperty {
    /// The property name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            EnvironmentProperty::Sha1 => "sha1",
            EnvironmentProperty::Sha256 => "sha256",
            EnvironmentProperty::Sha512 => "sha512",
            EnvironmentProperty::Ripemd160 => "ripemd160",
            EnvironmentProperty::Secp256k1 => "secp256k1",
            EnvironmentProperty::Vm => "vm",
            EnvironmentProperty::EntityOwnership => "entity_ownership",
            EnvironmentProperty::Variables => "variables",
        }
    }

    /// Whether the property is present on the given environment.
    pub fn is_present(&self, environment: &CompilationEnvironment) -> bool {
        match self {
            EnvironmentProperty::Sha1 => environment.sha1.is_some(),
            EnvironmentProperty::Sha256 => environment.sha256.is_some(),
            EnvironmentProperty::Sha512 => environment.sha512.is_some(),
            EnvironmentProperty::Ripemd160 => environment.ripemd160.is_some(),
            EnvironmentProperty::Secp256k1 => environment.secp256k1.is_some(),
            EnvironmentProperty::Vm => environment.vm.is_some(),
            EnvironmentProperty::EntityOwnership => environment.entity_ownership.is_some(),
            EnvironmentProperty::Variables => environment.variables.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hd_key_parameters_default_paths() {
        let params = HdKeyParameters::default();
        assert_eq!(params.private_path().unwrap().to_string(), "m/i");
        assert_eq!(params.public_path().unwrap().to_string(), "M/i");
    }

    #[test]
    fn test_hd_key_parameters_public_path_from_private() {
        let params = HdKeyParameters {
            address_offset: 0,
            private_derivation_path: Some("m/0/i".to_string()),
            public_derivation_path: None,
        };
        assert_eq!(params.public_path().unwrap().to_string(), "M/0/i");
    }

    #[test]
    fn test_hd_key_parameters_reject_mismatched_prefix() {
        let params = HdKeyParameters {
            address_offset: 0,
            private_derivation_path: Some("M/0".to_string()),
            public_derivation_path: None,
        };
        assert!(params.private_path().is_err());
        let params = HdKeyParameters {
            address_offset: 0,
            private_derivation_path: None,
            public_derivation_path: Some("m/0".to_string()),
        };
        assert!(params.public_path().is_err());
    }

    #[test]
    fn test_property_presence() {
        let mut data = CompilationData::default();
        assert!(!DataProperty::Keys.is_present(&data));
        data.keys = Some(Keys::default());
        assert!(DataProperty::Keys.is_present(&data));

        let environment = CompilationEnvironment::new();
        assert!(!EnvironmentProperty::Secp256k1.is_present(&environment));
        let environment = environment.with_native_crypto();
        assert!(EnvironmentProperty::Secp256k1.is_present(&environment));
    }

    #[test]
    fn test_variable_serde_tagging() {
        let json = r#"{"type":"HdKey","addressOffset":2,"privateDerivationPath":"m/0/i"}"#;
        let variable: Variable = serde_json::from_str(json).unwrap();
        match variable {
            Variable::HdKey(params) => {
                assert_eq!(params.address_offset, 2);
                assert_eq!(params.private_derivation_path.as_deref(), Some("m/0/i"));
            }
            other => panic!("unexpected variable: {:?}", other),
        }
        let key: Variable = serde_json::from_str(r#"{"type":"Key"}"#).unwrap();
        assert_eq!(key, Variable::Key);
    }
}
