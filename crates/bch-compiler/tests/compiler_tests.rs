//! End-to-end compiler tests: template flattening, identifier resolution,
//! signing, HD derivation, and the error taxonomy.

use std::collections::HashMap;

use bch_compiler::compiler::{compile_script, CompilationErrorType, CompilationResult};
use bch_compiler::environment::{
    CompilationData, CompilationEnvironment, HdKeys, Keys, OperationData, Variable,
};
use bch_compiler::signing::{
    generate_signing_serialization, SigningSerializationAlgorithm,
};
use bch_compiler::template::AuthenticationTemplate;
use bch_compiler::Compiler;
use bch_hd::HdPrivateNode;
use bch_primitives::capability::NativeSha256;
use bch_primitives::ec::{PrivateKey, PublicKey};
use bch_primitives::hash::sha256d;

const ALICE_KEY: [u8; 32] = [0x01; 32];

fn p2pkh_template() -> AuthenticationTemplate {
    serde_json::from_str(
        r#"{
            "entities": {
                "owner": {
                    "variables": { "alice": { "type": "Key" } }
                }
            },
            "scripts": {
                "unlock": { "script": "<alice.signature.all_outputs> <alice.public_key>" },
                "unlock_schnorr": {
                    "script": "<alice.schnorr_signature.all_outputs> <alice.public_key>"
                },
                "celebrate": { "script": "OP_RETURN <'hello'>" }
            }
        }"#,
    )
    .unwrap()
}

fn transaction_context() -> OperationData {
    OperationData {
        version: 2,
        locktime: 0,
        outpoint_transaction_hash: vec![0x05; 32],
        outpoint_index: 0,
        output_value: 100_000,
        sequence_number: 0,
        covered_bytecode: vec![0x76, 0xa9, 0x14],
        corresponding_output: Some(vec![0x0a, 0x0b, 0x0c]),
        transaction_outpoints: vec![0x01; 36],
        transaction_outputs: vec![0x02; 20],
        transaction_sequence_numbers: vec![0x03; 4],
    }
}

fn signing_data() -> CompilationData {
    let mut data = CompilationData::default();
    data.keys = Some(Keys {
        private_keys: Some(HashMap::from([("alice".to_string(), ALICE_KEY.to_vec())])),
        ..Default::default()
    });
    data.operation_data = Some(transaction_context());
    data
}

/// Split `<sig> <pubkey>` bytecode back into its two pushed items.
fn parse_two_pushes(bytecode: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let first_len = bytecode[0] as usize;
    let first = bytecode[1..1 + first_len].to_vec();
    let rest = &bytecode[1 + first_len..];
    let second_len = rest[0] as usize;
    let second = rest[1..1 + second_len].to_vec();
    assert_eq!(rest.len(), 1 + second_len, "unexpected trailing bytes");
    (first, second)
}

#[test]
fn p2pkh_round_trip_ecdsa() {
    let compiler = Compiler::from_template(&p2pkh_template());
    let data = signing_data();
    let bytecode = match compiler.generate_bytecode("unlock", &data) {
        CompilationResult::Success { bytecode } => bytecode,
        CompilationResult::Failure { errors, .. } => panic!("compile failed: {:?}", errors),
    };

    let (signature, public_key_bytes) = parse_two_pushes(&bytecode);

    // The public key is the compressed derivation of the private key.
    let expected_public_key = PrivateKey::from_bytes(&ALICE_KEY)
        .unwrap()
        .public_key()
        .to_compressed();
    assert_eq!(public_key_bytes, expected_public_key.to_vec());

    // The signature carries the ALL|FORK_ID suffix and verifies against
    // the double-SHA-256 of the signing serialization.
    assert_eq!(*signature.last().unwrap(), 0x41);
    let der = &signature[..signature.len() - 1];
    let preimage = generate_signing_serialization(
        &NativeSha256,
        &transaction_context(),
        SigningSerializationAlgorithm::AllOutputs,
    );
    let digest = sha256d(&preimage);
    let public_key = PublicKey::from_bytes(&public_key_bytes).unwrap();
    assert!(public_key.verify_ecdsa_der(&digest, der));
}

#[test]
fn p2pkh_round_trip_schnorr() {
    let compiler = Compiler::from_template(&p2pkh_template());
    let data = signing_data();
    let bytecode = match compiler.generate_bytecode("unlock_schnorr", &data) {
        CompilationResult::Success { bytecode } => bytecode,
        CompilationResult::Failure { errors, .. } => panic!("compile failed: {:?}", errors),
    };

    let (signature, public_key_bytes) = parse_two_pushes(&bytecode);
    assert_eq!(signature.len(), 65);
    assert_eq!(*signature.last().unwrap(), 0x41);

    let preimage = generate_signing_serialization(
        &NativeSha256,
        &transaction_context(),
        SigningSerializationAlgorithm::AllOutputs,
    );
    let digest = sha256d(&preimage);
    let public_key = PublicKey::from_bytes(&public_key_bytes).unwrap();
    assert!(public_key.verify_schnorr(&digest, &signature[..64]));
}

#[test]
fn compilation_is_deterministic() {
    let compiler = Compiler::from_template(&p2pkh_template());
    let data = signing_data();
    let first = compiler.generate_bytecode("unlock", &data);
    let second = compiler.generate_bytecode("unlock", &data);
    assert_eq!(first, second);
    match first {
        CompilationResult::Success { .. } => {}
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn sighash_suffix_follows_algorithm() {
    let cases = [
        ("all_outputs", 0x41u8),
        ("all_outputs_single_input", 0xc1),
        ("corresponding_output", 0x43),
        ("corresponding_output_single_input", 0xc3),
        ("no_outputs", 0x42),
        ("no_outputs_single_input", 0xc2),
    ];
    for (algorithm, sighash) in cases {
        let mut template = p2pkh_template();
        template.scripts.insert(
            "sig_only".to_string(),
            bch_compiler::template::AuthenticationTemplateScript {
                name: None,
                script: format!("<alice.signature.{algorithm}>"),
            },
        );
        let compiler = Compiler::from_template(&template);
        match compiler.generate_bytecode("sig_only", &signing_data()) {
            CompilationResult::Success { bytecode } => {
                assert_eq!(
                    *bytecode.last().unwrap(),
                    sighash,
                    "wrong suffix for {algorithm}"
                );
            }
            other => panic!("{algorithm} failed: {:?}", other),
        }
    }
}

#[test]
fn full_serialization_changes_only_hashes_and_sighash_byte() {
    // Preimages for different algorithms share layout; only the three hash
    // fields and the trailing SIGHASH byte may differ.
    let context = transaction_context();
    let all = generate_signing_serialization(
        &NativeSha256,
        &context,
        SigningSerializationAlgorithm::AllOutputs,
    );
    let none = generate_signing_serialization(
        &NativeSha256,
        &context,
        SigningSerializationAlgorithm::NoOutputs,
    );
    assert_eq!(all.len(), none.len());
    // version
    assert_eq!(all[..4], none[..4]);
    // outpoint, index, bytecode, value, sequence (between the hash fields)
    assert_eq!(all[68..all.len() - 37], none[68..none.len() - 37]);
    // locktime
    assert_eq!(all[all.len() - 5..all.len() - 1], none[none.len() - 5..none.len() - 1]);
    // sighash byte
    assert_eq!(*all.last().unwrap(), 0x41);
    assert_eq!(*none.last().unwrap(), 0x42);
}

#[test]
fn covered_bytecode_length_varint() {
    // Scenario S4: a 260-byte covered bytecode yields the varint fd 04 01.
    let mut environment = CompilationEnvironment::from_template(&p2pkh_template());
    environment.scripts.insert(
        "length".to_string(),
        "signing_serialization.covered_bytecode_length".to_string(),
    );
    let mut data = CompilationData::default();
    let mut context = transaction_context();
    context.covered_bytecode = vec![0x00; 260];
    data.operation_data = Some(context);
    assert_eq!(
        compile_script("length", &data, &environment),
        CompilationResult::Success {
            bytecode: vec![0xfd, 0x04, 0x01]
        }
    );
}

#[test]
fn missing_secp256k1_is_reported() {
    // Scenario S2: no pre-computed key and no secp256k1 capability.
    let mut environment = CompilationEnvironment::from_template(&p2pkh_template());
    environment.secp256k1 = None;
    let mut data = CompilationData::default();
    data.keys = Some(Keys::default());
    environment.scripts.insert(
        "key_only".to_string(),
        "<alice.public_key>".to_string(),
    );
    match compile_script("key_only", &data, &environment) {
        CompilationResult::Failure { error_type, errors } => {
            assert_eq!(error_type, CompilationErrorType::Resolve);
            assert!(
                errors[0].error.contains("missing property: secp256k1"),
                "{}",
                errors[0].error
            );
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn precomputed_public_key_bypasses_secp256k1() {
    // Scenario S1: the pre-computed path succeeds without the capability.
    let mut environment = CompilationEnvironment::from_template(&p2pkh_template());
    environment.secp256k1 = None;
    environment.scripts.insert(
        "key_only".to_string(),
        "<alice.public_key>".to_string(),
    );
    let precomputed = PrivateKey::from_bytes(&[0x2a; 32])
        .unwrap()
        .public_key()
        .to_compressed();
    let mut data = CompilationData::default();
    data.keys = Some(Keys {
        public_keys: Some(HashMap::from([(
            "alice".to_string(),
            precomputed.to_vec(),
        )])),
        ..Default::default()
    });
    let mut expected = vec![33u8];
    expected.extend_from_slice(&precomputed);
    assert_eq!(
        compile_script("key_only", &data, &environment),
        CompilationResult::Success { bytecode: expected }
    );
}

#[test]
fn identifier_grammar_errors() {
    let compiler = Compiler::from_template(&p2pkh_template());
    let mut environment = compiler.environment.clone();
    let data = signing_data();

    let cases = [
        ("<alice.signature>", "Invalid signature identifier"),
        ("<alice.signature.all_outputs.extra>", "Unknown component"),
        ("<alice.signature.unknown_algo>", "Unknown signing serialization algorithm, \"unknown_algo\"."),
        ("<alice.bogus_operation>", "Unknown component"),
        ("<bob.data_signature.missing>", "Unknown identifier"),
    ];
    for (script, expected) in cases {
        environment
            .scripts
            .insert("case".to_string(), script.to_string());
        match compile_script("case", &data, &environment) {
            CompilationResult::Failure { errors, .. } => {
                assert!(
                    errors[0].error.contains(expected),
                    "script {script:?}: expected {expected:?} in {:?}",
                    errors[0].error
                );
            }
            other => panic!("script {script:?} unexpectedly produced {:?}", other),
        }
    }
}

#[test]
fn data_signature_unknown_target_script() {
    // Scenario S5, through the full compiler.
    let mut template = p2pkh_template();
    template
        .entities
        .get_mut("owner")
        .unwrap()
        .variables
        .insert("bob".to_string(), Variable::Key);
    let compiler = Compiler::from_template(&template);
    let mut environment = compiler.environment.clone();
    environment.scripts.insert(
        "case".to_string(),
        "<bob.data_signature.missing_script>".to_string(),
    );
    let mut data = CompilationData::default();
    data.keys = Some(Keys {
        private_keys: Some(HashMap::from([("bob".to_string(), vec![0x03; 32])])),
        ..Default::default()
    });
    match compile_script("case", &data, &environment) {
        CompilationResult::Failure { errors, .. } => {
            assert_eq!(
                errors[0].error,
                "Data signature tried to sign an unknown target script, \"missing_script\"."
            );
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn data_signature_signs_target_script_bytes() {
    let mut template = p2pkh_template();
    template.scripts.insert(
        "message".to_string(),
        bch_compiler::template::AuthenticationTemplateScript {
            name: None,
            script: "<'signed data'>".to_string(),
        },
    );
    template.scripts.insert(
        "prove".to_string(),
        bch_compiler::template::AuthenticationTemplateScript {
            name: None,
            script: "<alice.data_signature.message>".to_string(),
        },
    );
    let compiler = Compiler::from_template(&template);
    let mut data = CompilationData::default();
    data.keys = Some(Keys {
        private_keys: Some(HashMap::from([("alice".to_string(), ALICE_KEY.to_vec())])),
        ..Default::default()
    });
    let bytecode = match compiler.generate_bytecode("prove", &data) {
        CompilationResult::Success { bytecode } => bytecode,
        other => panic!("unexpected result: {:?}", other),
    };
    // Data signatures have no SIGHASH suffix and sign the single SHA-256
    // of the target script's compiled bytecode.
    let signature_len = bytecode[0] as usize;
    let signature = &bytecode[1..1 + signature_len];
    let target_bytecode = match compiler.generate_bytecode("message", &data) {
        CompilationResult::Success { bytecode } => bytecode,
        other => panic!("unexpected result: {:?}", other),
    };
    let digest = bch_primitives::hash::sha256(&target_bytecode);
    let public_key = PrivateKey::from_bytes(&ALICE_KEY).unwrap().public_key();
    assert!(public_key.verify_ecdsa_der(&digest, signature));
}

#[test]
fn hd_key_path_substitution() {
    // privateDerivationPath m/0/i with addressIndex 3 and addressOffset 2
    // derives the instance path m/0/5 (public form M/0/5).
    let template: AuthenticationTemplate = serde_json::from_str(
        r#"{
            "entities": {
                "owner": {
                    "variables": {
                        "watch": {
                            "type": "HdKey",
                            "addressOffset": 2,
                            "privateDerivationPath": "m/0/i"
                        }
                    }
                }
            },
            "scripts": {
                "reveal": { "script": "<watch.public_key>" }
            }
        }"#,
    )
    .unwrap();
    let compiler = Compiler::from_template(&template);

    let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
    let master = HdPrivateNode::from_seed(&seed).unwrap();
    let expected = master
        .derive_child(0)
        .unwrap()
        .derive_child(5)
        .unwrap()
        .private_key()
        .public_key()
        .to_compressed();

    // Through the entity's HD private key.
    let mut data = CompilationData::default();
    data.hd_keys = Some(HdKeys {
        address_index: Some(3),
        hd_private_keys: Some(HashMap::from([("owner".to_string(), master.encode())])),
        ..Default::default()
    });
    let mut expected_bytecode = vec![33u8];
    expected_bytecode.extend_from_slice(&expected);
    assert_eq!(
        compiler.generate_bytecode("reveal", &data),
        CompilationResult::Success {
            bytecode: expected_bytecode.clone()
        }
    );

    // Through the entity's HD public key (path M/0/5).
    let mut data = CompilationData::default();
    data.hd_keys = Some(HdKeys {
        address_index: Some(3),
        hd_public_keys: Some(HashMap::from([(
            "owner".to_string(),
            master.public_node().encode(),
        )])),
        ..Default::default()
    });
    assert_eq!(
        compiler.generate_bytecode("reveal", &data),
        CompilationResult::Success {
            bytecode: expected_bytecode
        }
    );
}

#[test]
fn hd_key_missing_address_index_is_fatal() {
    let template: AuthenticationTemplate = serde_json::from_str(
        r#"{
            "entities": {
                "owner": { "variables": { "watch": { "type": "HdKey" } } }
            },
            "scripts": { "reveal": { "script": "<watch.public_key>" } }
        }"#,
    )
    .unwrap();
    let compiler = Compiler::from_template(&template);
    let mut data = CompilationData::default();
    data.hd_keys = Some(HdKeys {
        hd_private_keys: Some(HashMap::from([(
            "owner".to_string(),
            "xprv-is-never-decoded".to_string(),
        )])),
        ..Default::default()
    });
    match compiler.generate_bytecode("reveal", &data) {
        CompilationResult::Failure { errors, .. } => {
            assert!(
                errors[0]
                    .error
                    .contains("missing property: hd_keys.address_index"),
                "{}",
                errors[0].error
            );
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn current_block_height_and_time() {
    let mut environment = CompilationEnvironment::from_template(&p2pkh_template());
    environment.scripts.insert(
        "locktime".to_string(),
        "<current_block_height> <current_block_time>".to_string(),
    );
    let mut data = CompilationData::default();
    data.current_block_height = Some(600_000);
    data.current_block_time = Some(1_600_000_000);
    let mut expected = Vec::new();
    expected.push(3u8);
    expected.extend_from_slice(&[0xc0, 0x27, 0x09]); // 600000 as a script number
    expected.push(4u8);
    expected.extend_from_slice(&1_600_000_000u32.to_le_bytes());
    assert_eq!(
        compile_script("locktime", &data, &environment),
        CompilationResult::Success { bytecode: expected }
    );
}

#[test]
fn template_scripts_compose() {
    let mut template = p2pkh_template();
    template.scripts.insert(
        "combined".to_string(),
        bch_compiler::template::AuthenticationTemplateScript {
            name: None,
            script: "celebrate OP_1".to_string(),
        },
    );
    let compiler = Compiler::from_template(&template);
    match compiler.generate_bytecode("combined", &CompilationData::default()) {
        CompilationResult::Success { bytecode } => {
            // OP_RETURN, push of "hello", then OP_1 from the outer script.
            assert_eq!(bytecode[0], 0x6a);
            assert_eq!(bytecode[1], 5);
            assert_eq!(&bytecode[2..7], b"hello");
            assert_eq!(bytecode[7], 0x51);
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[test]
fn debug_trace_reports_ranges() {
    let compiler = Compiler::from_template(&p2pkh_template());
    let trace = compiler.generate_bytecode_debug("unlock", &signing_data());
    assert!(trace.success);
    assert!(!trace.segments.is_empty());
    let first = &trace.segments[0];
    assert_eq!(first.kind, "identifier");
    assert_eq!(first.text, "alice.signature.all_outputs");
    assert_eq!(first.range.start.line, 1);
    assert_eq!(first.range.start.column, 2);
}
