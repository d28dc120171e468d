//! BCH signing serialization.
//!
//! A transaction signature commits to a serialization of the transaction
//! context selected by a SIGHASH byte. This module encodes the closed set
//! of signing-serialization algorithms, the preimage layout, and the
//! individual components exposed to scripts through the
//! `signing_serialization.*` identifiers.

use bch_primitives::capability::HashFunction;
use bch_primitives::util::{ByteWriter, VarInt};

use crate::environment::OperationData;

/// Sign all outputs (the default).
pub const SIGHASH_ALL: u8 = 0x01;
/// Sign no outputs, allowing them to be modified.
pub const SIGHASH_NONE: u8 = 0x02;
/// Sign only the output with the same index as the signed input.
pub const SIGHASH_SINGLE: u8 = 0x03;
/// Replay-protection flag required on all BCH signatures.
pub const SIGHASH_FORK_ID: u8 = 0x40;
/// Sign only the current input, allowing other inputs to be added.
pub const SIGHASH_SINGLE_INPUT: u8 = 0x80;
/// Mask extracting the base sighash type (ALL, NONE, SINGLE).
pub const SIGHASH_MASK: u8 = 0x1f;

/// The closed set of signing-serialization algorithms.
///
/// Each algorithm selects a SIGHASH byte; the `full_<algorithm>` identifier
/// family maps onto the same variants but returns the raw preimage instead
/// of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningSerializationAlgorithm {
    /// `ALL | FORK_ID` (0x41).
    AllOutputs,
    /// `ALL | SINGLE_INPUT | FORK_ID` (0xc1).
    AllOutputsSingleInput,
    /// `SINGLE | FORK_ID` (0x43).
    CorrespondingOutput,
    /// `SINGLE | SINGLE_INPUT | FORK_ID` (0xc3).
    CorrespondingOutputSingleInput,
    /// `NONE | FORK_ID` (0x42).
    NoOutputs,
    /// `NONE | SINGLE_INPUT | FORK_ID` (0xc2).
    NoOutputsSingleInput,
}

impl SigningSerializationAlgorithm {
    /// Resolve an algorithm identifier segment (e.g. `all_outputs`).
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "all_outputs" => Some(Self::AllOutputs),
            "all_outputs_single_input" => Some(Self::AllOutputsSingleInput),
            "corresponding_output" => Some(Self::CorrespondingOutput),
            "corresponding_output_single_input" => Some(Self::CorrespondingOutputSingleInput),
            "no_outputs" => Some(Self::NoOutputs),
            "no_outputs_single_input" => Some(Self::NoOutputsSingleInput),
            _ => None,
        }
    }

    /// The identifier segment naming this algorithm.
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::AllOutputs => "all_outputs",
            Self::AllOutputsSingleInput => "all_outputs_single_input",
            Self::CorrespondingOutput => "corresponding_output",
            Self::CorrespondingOutputSingleInput => "corresponding_output_single_input",
            Self::NoOutputs => "no_outputs",
            Self::NoOutputsSingleInput => "no_outputs_single_input",
        }
    }

    /// The SIGHASH byte: the bitwise OR of the selected flags.
    pub fn to_sighash_byte(&self) -> u8 {
        match self {
            Self::AllOutputs => SIGHASH_ALL | SIGHASH_FORK_ID,
            Self::AllOutputsSingleInput => SIGHASH_ALL | SIGHASH_SINGLE_INPUT | SIGHASH_FORK_ID,
            Self::CorrespondingOutput => SIGHASH_SINGLE | SIGHASH_FORK_ID,
            Self::CorrespondingOutputSingleInput => {
                SIGHASH_SINGLE | SIGHASH_SINGLE_INPUT | SIGHASH_FORK_ID
            }
            Self::NoOutputs => SIGHASH_NONE | SIGHASH_FORK_ID,
            Self::NoOutputsSingleInput => SIGHASH_NONE | SIGHASH_SINGLE_INPUT | SIGHASH_FORK_ID,
        }
    }
}

/// Double-SHA-256 through the environment's SHA-256 capability.
fn hash256(sha256: &dyn HashFunction, data: &[u8]) -> Vec<u8> {
    sha256.hash(&sha256.hash(data))
}

/// Hash of all outpoints, or zeros when only the current input is signed.
pub fn transaction_outpoints_hash(
    sha256: &dyn HashFunction,
    data: &OperationData,
    sighash: u8,
) -> Vec<u8> {
    if sighash & SIGHASH_SINGLE_INPUT != 0 {
        vec![0u8; 32]
    } else {
        hash256(sha256, &data.transaction_outpoints)
    }
}

/// Hash of all sequence numbers, or zeros per the SIGHASH rules.
pub fn transaction_sequence_numbers_hash(
    sha256: &dyn HashFunction,
    data: &OperationData,
    sighash: u8,
) -> Vec<u8> {
    let base = sighash & SIGHASH_MASK;
    if sighash & SIGHASH_SINGLE_INPUT != 0 || base != SIGHASH_ALL {
        vec![0u8; 32]
    } else {
        hash256(sha256, &data.transaction_sequence_numbers)
    }
}

/// Hash of the covered outputs: all outputs, the corresponding output, or
/// zeros per the SIGHASH rules.
pub fn transaction_outputs_hash(
    sha256: &dyn HashFunction,
    data: &OperationData,
    sighash: u8,
) -> Vec<u8> {
    let base = sighash & SIGHASH_MASK;
    if base == SIGHASH_ALL {
        hash256(sha256, &data.transaction_outputs)
    } else if base == SIGHASH_SINGLE {
        match &data.corresponding_output {
            Some(output) => hash256(sha256, output),
            None => vec![0u8; 32],
        }
    } else {
        vec![0u8; 32]
    }
}

/// Generate the complete signing-serialization preimage.
///
/// The layout, in order: version (u32 LE), outpoints hash, sequence-numbers
/// hash, outpoint transaction hash, outpoint index (u32 LE), varint length
/// of the covered bytecode, the covered bytecode, output value (u64 LE),
/// sequence number (u32 LE), outputs hash, locktime (u32 LE), and the
/// SIGHASH byte.
///
/// # Arguments
/// * `sha256` - The environment's SHA-256 capability.
/// * `data` - The transaction context.
/// * `algorithm` - The signing-serialization algorithm.
///
/// # Returns
/// The raw preimage bytes (not yet hashed).
pub fn generate_signing_serialization(
    sha256: &dyn HashFunction,
    data: &OperationData,
    algorithm: SigningSerializationAlgorithm,
) -> Vec<u8> {
    let sighash = algorithm.to_sighash_byte();
    let mut writer = ByteWriter::with_capacity(160 + data.covered_bytecode.len());
    writer.write_u32_le(data.version);
    writer.write_bytes(&transaction_outpoints_hash(sha256, data, sighash));
    writer.write_bytes(&transaction_sequence_numbers_hash(sha256, data, sighash));
    writer.write_bytes(&data.outpoint_transaction_hash);
    writer.write_u32_le(data.outpoint_index);
    writer.write_varint(VarInt::from(data.covered_bytecode.len()));
    writer.write_bytes(&data.covered_bytecode);
    writer.write_u64_le(data.output_value);
    writer.write_u32_le(data.sequence_number);
    writer.write_bytes(&transaction_outputs_hash(sha256, data, sighash));
    writer.write_u32_le(data.locktime);
    writer.write_u8(sighash);
    writer.into_bytes()
}

/// An individual component of the signing serialization, exposed to
/// scripts as `signing_serialization.<component>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningSerializationComponent {
    /// Transaction version (u32 LE).
    Version,
    /// All outpoints, serialized.
    TransactionOutpoints,
    /// Double-SHA-256 of all outpoints.
    TransactionOutpointsHash,
    /// All sequence numbers, serialized.
    TransactionSequenceNumbers,
    /// Double-SHA-256 of all sequence numbers.
    TransactionSequenceNumbersHash,
    /// Hash of the outpoint transaction (32 bytes).
    OutpointTransactionHash,
    /// Outpoint index (u32 LE).
    OutpointIndex,
    /// VarInt length of the covered bytecode.
    CoveredBytecodeLength,
    /// The covered bytecode.
    CoveredBytecode,
    /// Output value (u64 LE).
    OutputValue,
    /// Sequence number (u32 LE).
    SequenceNumber,
    /// The corresponding output, or empty bytes when absent.
    CorrespondingOutput,
    /// Double-SHA-256 of the corresponding output, or zeros when absent.
    CorrespondingOutputHash,
    /// All outputs, serialized.
    TransactionOutputs,
    /// Double-SHA-256 of all outputs.
    TransactionOutputsHash,
    /// Transaction locktime (u32 LE).
    Locktime,
}

impl SigningSerializationComponent {
    /// Every component with its identifier segment.
    pub const ALL: &[(&str, SigningSerializationComponent)] = &[
        ("version", Self::Version),
        ("transaction_outpoints", Self::TransactionOutpoints),
        ("transaction_outpoints_hash", Self::TransactionOutpointsHash),
        ("transaction_sequence_numbers", Self::TransactionSequenceNumbers),
        (
            "transaction_sequence_numbers_hash",
            Self::TransactionSequenceNumbersHash,
        ),
        ("outpoint_transaction_hash", Self::OutpointTransactionHash),
        ("outpoint_index", Self::OutpointIndex),
        ("covered_bytecode_length", Self::CoveredBytecodeLength),
        ("covered_bytecode", Self::CoveredBytecode),
        ("output_value", Self::OutputValue),
        ("sequence_number", Self::SequenceNumber),
        ("corresponding_output", Self::CorrespondingOutput),
        ("corresponding_output_hash", Self::CorrespondingOutputHash),
        ("transaction_outputs", Self::TransactionOutputs),
        ("transaction_outputs_hash", Self::TransactionOutputsHash),
        ("locktime", Self::Locktime),
    ];

    /// Resolve this component against the transaction context.
    ///
    /// # Arguments
    /// * `sha256` - The environment's SHA-256 capability.
    /// * `data` - The transaction context.
    ///
    /// # Returns
    /// The component's bytes.
    pub fn resolve(&self, sha256: &dyn HashFunction, data: &OperationData) -> Vec<u8> {
        match self {
            Self::Version => data.version.to_le_bytes().to_vec(),
            Self::TransactionOutpoints => data.transaction_outpoints.clone(),
            Self::TransactionOutpointsHash => hash256(sha256, &data.transaction_outpoints),
            Self::TransactionSequenceNumbers => data.transaction_sequence_numbers.clone(),
            Self::TransactionSequenceNumbersHash => {
                hash256(sha256, &data.transaction_sequence_numbers)
            }
            Self::OutpointTransactionHash => data.outpoint_transaction_hash.clone(),
            Self::OutpointIndex => data.outpoint_index.to_le_bytes().to_vec(),
            Self::CoveredBytecodeLength => {
                VarInt::from(data.covered_bytecode.len()).to_bytes()
            }
            Self::CoveredBytecode => data.covered_bytecode.clone(),
            Self::OutputValue => data.output_value.to_le_bytes().to_vec(),
            Self::SequenceNumber => data.sequence_number.to_le_bytes().to_vec(),
            Self::CorrespondingOutput => {
                data.corresponding_output.clone().unwrap_or_default()
            }
            Self::CorrespondingOutputHash => match &data.corresponding_output {
                Some(output) => hash256(sha256, output),
                None => vec![0u8; 32],
            },
            Self::TransactionOutputs => data.transaction_outputs.clone(),
            Self::TransactionOutputsHash => hash256(sha256, &data.transaction_outputs),
            Self::Locktime => data.locktime.to_le_bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bch_primitives::capability::NativeSha256;
    use bch_primitives::hash::sha256d;

    fn sample_data() -> OperationData {
        OperationData {
            version: 2,
            locktime: 0,
            outpoint_transaction_hash: vec![0x05; 32],
            outpoint_index: 1,
            output_value: 1_000_000,
            sequence_number: 0xffff_ffff,
            covered_bytecode: vec![0x51, 0x52, 0x53],
            corresponding_output: Some(vec![0x0a, 0x0b]),
            transaction_outpoints: vec![0x01; 36],
            transaction_outputs: vec![0x02; 11],
            transaction_sequence_numbers: vec![0x03; 4],
        }
    }

    #[test]
    fn test_sighash_bytes() {
        use SigningSerializationAlgorithm::*;
        assert_eq!(AllOutputs.to_sighash_byte(), 0x41);
        assert_eq!(AllOutputsSingleInput.to_sighash_byte(), 0xc1);
        assert_eq!(CorrespondingOutput.to_sighash_byte(), 0x43);
        assert_eq!(CorrespondingOutputSingleInput.to_sighash_byte(), 0xc3);
        assert_eq!(NoOutputs.to_sighash_byte(), 0x42);
        assert_eq!(NoOutputsSingleInput.to_sighash_byte(), 0xc2);
    }

    #[test]
    fn test_identifier_roundtrip() {
        use SigningSerializationAlgorithm::*;
        for algorithm in [
            AllOutputs,
            AllOutputsSingleInput,
            CorrespondingOutput,
            CorrespondingOutputSingleInput,
            NoOutputs,
            NoOutputsSingleInput,
        ] {
            assert_eq!(
                SigningSerializationAlgorithm::from_identifier(algorithm.identifier()),
                Some(algorithm)
            );
        }
        assert_eq!(SigningSerializationAlgorithm::from_identifier("bogus"), None);
    }

    #[test]
    fn test_preimage_layout_all_outputs() {
        let sha256 = NativeSha256;
        let data = sample_data();
        let preimage = generate_signing_serialization(
            &sha256,
            &data,
            SigningSerializationAlgorithm::AllOutputs,
        );

        let mut expected = Vec::new();
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(&sha256d(&data.transaction_outpoints));
        expected.extend_from_slice(&sha256d(&data.transaction_sequence_numbers));
        expected.extend_from_slice(&data.outpoint_transaction_hash);
        expected.extend_from_slice(&1u32.to_le_bytes());
        expected.push(3); // varint length of covered bytecode
        expected.extend_from_slice(&data.covered_bytecode);
        expected.extend_from_slice(&1_000_000u64.to_le_bytes());
        expected.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
        expected.extend_from_slice(&sha256d(&data.transaction_outputs));
        expected.extend_from_slice(&0u32.to_le_bytes());
        expected.push(0x41);
        assert_eq!(preimage, expected);
    }

    #[test]
    fn test_sighash_rules_zero_hash_fields() {
        let sha256 = NativeSha256;
        let data = sample_data();
        let all = generate_signing_serialization(
            &sha256,
            &data,
            SigningSerializationAlgorithm::AllOutputs,
        );
        let single_input = generate_signing_serialization(
            &sha256,
            &data,
            SigningSerializationAlgorithm::AllOutputsSingleInput,
        );
        // Outpoints hash is zeroed when only the current input is signed.
        assert_eq!(&single_input[4..36], &[0u8; 32]);
        assert_ne!(&all[4..36], &[0u8; 32]);
        // The two preimages differ only in the hash fields and SIGHASH byte.
        assert_eq!(all.len(), single_input.len());
        assert_eq!(*all.last().unwrap(), 0x41);
        assert_eq!(*single_input.last().unwrap(), 0xc1);
    }

    #[test]
    fn test_no_outputs_zeroes_outputs_hash() {
        let sha256 = NativeSha256;
        let data = sample_data();
        let preimage = generate_signing_serialization(
            &sha256,
            &data,
            SigningSerializationAlgorithm::NoOutputs,
        );
        let outputs_hash_offset = preimage.len() - 1 - 4 - 32;
        assert_eq!(
            &preimage[outputs_hash_offset..outputs_hash_offset + 32],
            &[0u8; 32]
        );
    }

    #[test]
    fn test_corresponding_output_component_absent_is_empty() {
        let sha256 = NativeSha256;
        let mut data = sample_data();
        data.corresponding_output = None;
        assert!(SigningSerializationComponent::CorrespondingOutput
            .resolve(&sha256, &data)
            .is_empty());
        assert_eq!(
            SigningSerializationComponent::CorrespondingOutputHash.resolve(&sha256, &data),
            vec![0u8; 32]
        );
    }

    #[test]
    fn test_double_hash_discipline() {
        let sha256 = NativeSha256;
        let data = sample_data();
        assert_eq!(
            SigningSerializationComponent::TransactionOutpointsHash.resolve(&sha256, &data),
            sha256d(&data.transaction_outpoints).to_vec()
        );
    }
}
