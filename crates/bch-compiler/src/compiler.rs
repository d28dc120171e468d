//! The identifier resolver and compiler facade.
//!
//! `compile_script` tokenizes a named script, resolves each identifier
//! token through the environment's operation registry, inlines referenced
//! scripts, wraps push groups in minimal push encodings, and either
//! produces bytecode or aggregates structured errors with source ranges.
//! A single failing identifier does not abort resolution of unrelated
//! identifiers within the same script.

use std::fmt;

use bch_script::number::encode_script_number;
use bch_script::push::encode_data_push;

use crate::environment::{CompilationData, CompilationEnvironment, Variable};
use crate::identifier::Identifier;
use crate::operations::OperationResult;
use crate::parser::{tokenize, SourceRange, Token, TokenKind};

/// The stage at which a compilation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilationErrorType {
    /// Tokenization failed.
    Parse,
    /// One or more identifiers could not be resolved.
    Resolve,
    /// The resolved segments could not be assembled into bytecode.
    Reduce,
}

impl fmt::Display for CompilationErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompilationErrorType::Parse => write!(f, "parse"),
            CompilationErrorType::Resolve => write!(f, "resolve"),
            CompilationErrorType::Reduce => write!(f, "reduce"),
        }
    }
}

/// A compilation failure with its source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationError {
    /// The error message.
    pub error: String,
    /// The source range the error refers to.
    pub range: SourceRange,
}

/// The outcome of a compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilationResult {
    /// The script compiled to bytecode.
    Success {
        /// The assembled bytecode.
        bytecode: Vec<u8>,
    },
    /// The script failed to compile.
    Failure {
        /// The stage at which compilation failed.
        error_type: CompilationErrorType,
        /// Every error encountered, with source ranges.
        errors: Vec<CompilationError>,
    },
}

/// One resolved source segment in a debug trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSegment {
    /// The source range of the segment.
    pub range: SourceRange,
    /// The original source text.
    pub text: String,
    /// What the segment was resolved as.
    pub kind: &'static str,
    /// The bytes the segment contributed.
    pub bytecode: Vec<u8>,
}

/// The full trace produced in debug mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCompilationTrace {
    /// Whether compilation succeeded.
    pub success: bool,
    /// The assembled bytecode (partial when compilation failed).
    pub bytecode: Vec<u8>,
    /// Every leaf segment that resolved to bytes, in source order.
    pub segments: Vec<ResolvedSegment>,
    /// The failing stage, when compilation failed.
    pub error_type: Option<CompilationErrorType>,
    /// Every error encountered, with source ranges.
    pub errors: Vec<CompilationError>,
}

/// The compiler: an environment plus the `generate_bytecode` entry point.
pub struct Compiler {
    /// The environment shared across compilations.
    pub environment: CompilationEnvironment,
}

impl Compiler {
    /// Wrap an environment.
    pub fn new(environment: CompilationEnvironment) -> Self {
        Compiler { environment }
    }

    /// Build a compiler from an authentication template (standard BCH
    /// operations, opcodes, and native crypto).
    pub fn from_template(template: &crate::template::AuthenticationTemplate) -> Self {
        Compiler {
            environment: CompilationEnvironment::from_template(template),
        }
    }

    /// Compile the named script against the given data.
    pub fn generate_bytecode(
        &self,
        script_id: &str,
        data: &CompilationData,
    ) -> CompilationResult {
        compile_script(script_id, data, &self.environment)
    }

    /// Compile the named script, returning the full debug trace.
    pub fn generate_bytecode_debug(
        &self,
        script_id: &str,
        data: &CompilationData,
    ) -> ScriptCompilationTrace {
        compile_script_debug(script_id, data, &self.environment)
    }
}

/// Compile the named script against the given data and environment.
pub fn compile_script(
    script_id: &str,
    data: &CompilationData,
    environment: &CompilationEnvironment,
) -> CompilationResult {
    let trace = compile_script_debug(script_id, data, environment);
    if trace.success {
        CompilationResult::Success {
            bytecode: trace.bytecode,
        }
    } else {
        CompilationResult::Failure {
            error_type: trace.error_type.unwrap_or(CompilationErrorType::Resolve),
            errors: trace.errors,
        }
    }
}

/// Compile the named script, returning the full debug trace.
pub fn compile_script_debug(
    script_id: &str,
    data: &CompilationData,
    environment: &CompilationEnvironment,
) -> ScriptCompilationTrace {
    let source = match environment.scripts.get(script_id) {
        Some(source) => source,
        None => {
            return ScriptCompilationTrace {
                success: false,
                bytecode: Vec::new(),
                segments: Vec::new(),
                error_type: Some(CompilationErrorType::Resolve),
                errors: vec![CompilationError {
                    error: format!("Unknown script, \"{script_id}\"."),
                    range: SourceRange::default(),
                }],
            }
        }
    };

    let tokens = match tokenize(source) {
        Ok(tokens) => tokens,
        Err(parse_error) => {
            return ScriptCompilationTrace {
                success: false,
                bytecode: Vec::new(),
                segments: Vec::new(),
                error_type: Some(CompilationErrorType::Parse),
                errors: vec![CompilationError {
                    error: parse_error.error,
                    range: parse_error.range,
                }],
            }
        }
    };

    let mut assembler = Assembler {
        tokens: &tokens,
        index: 0,
        data,
        environment,
        segments: Vec::new(),
        errors: Vec::new(),
        saw_resolve_error: false,
        saw_reduce_error: false,
    };
    let bytecode = assembler.assemble_group(None);

    let error_type = if assembler.saw_resolve_error {
        Some(CompilationErrorType::Resolve)
    } else if assembler.saw_reduce_error {
        Some(CompilationErrorType::Reduce)
    } else {
        None
    };
    ScriptCompilationTrace {
        success: assembler.errors.is_empty(),
        bytecode,
        segments: assembler.segments,
        error_type,
        errors: assembler.errors,
    }
}

/// Compile a script on behalf of an operation (data signatures), reducing
/// any failure to a single message.
pub(crate) fn compile_script_for_operations(
    script_id: &str,
    data: &CompilationData,
    environment: &CompilationEnvironment,
) -> Result<Vec<u8>, String> {
    match compile_script(script_id, data, environment) {
        CompilationResult::Success { bytecode } => Ok(bytecode),
        CompilationResult::Failure { errors, .. } => Err(errors
            .iter()
            .map(|e| e.error.clone())
            .collect::<Vec<_>>()
            .join("; ")),
    }
}

/// Resolve an identifier that names a built-in or a variable.
///
/// Returns `None` when the first segment is neither a built-in identifier
/// nor a known variable (the caller may then try script inlining).
pub fn resolve_variable_or_builtin(
    identifier: &str,
    data: &CompilationData,
    environment: &CompilationEnvironment,
) -> Option<OperationResult> {
    let parsed = Identifier::parse(identifier);
    let registry = &environment.operations;
    match parsed.variable_id {
        "current_block_height" => {
            return Some(registry.current_block_height.resolve(identifier, data, environment))
        }
        "current_block_time" => {
            return Some(registry.current_block_time.resolve(identifier, data, environment))
        }
        "signing_serialization" => {
            let component = match parsed.operation {
                Some(component) => component,
                None => {
                    return Some(OperationResult::fatal(
                        "Invalid signing serialization identifier. Signing serializations must be of the form: \"signing_serialization.[component]\".",
                    ))
                }
            };
            return Some(match registry.signing_serialization.get(component) {
                Some(operation) => operation.resolve(identifier, data, environment),
                None => OperationResult::fatal(format!(
                    "Unknown signing serialization component, \"{component}\"."
                )),
            });
        }
        _ => {}
    }

    let variable = environment
        .variables
        .as_ref()
        .and_then(|variables| variables.get(parsed.variable_id))?;
    Some(match variable {
        Variable::AddressData => registry.address_data.resolve(identifier, data, environment),
        Variable::WalletData => registry.wallet_data.resolve(identifier, data, environment),
        Variable::Key => {
            dispatch_key_operation(&registry.key, "Key", identifier, parsed, data, environment)
        }
        Variable::HdKey(_) => dispatch_key_operation(
            &registry.hd_key,
            "HdKey",
            identifier,
            parsed,
            data,
            environment,
        ),
    })
}

fn dispatch_key_operation(
    operations: &std::collections::HashMap<
        &'static str,
        std::sync::Arc<dyn crate::operations::CompilerOperation>,
    >,
    category: &str,
    identifier: &str,
    parsed: Identifier<'_>,
    data: &CompilationData,
    environment: &CompilationEnvironment,
) -> OperationResult {
    let operation_name = match parsed.operation {
        Some(operation_name) => operation_name,
        None => {
            return OperationResult::fatal(format!(
                "Identifier \"{identifier}\" refers to a {category}, but does not specify an operation (e.g. \"{identifier}.public_key\")."
            ))
        }
    };
    match operations.get(operation_name) {
        Some(operation) => operation.resolve(identifier, data, environment),
        None => OperationResult::fatal(crate::identifier::unknown_component_error(
            identifier,
            operation_name,
        )),
    }
}

struct Assembler<'a> {
    tokens: &'a [Token],
    index: usize,
    data: &'a CompilationData,
    environment: &'a CompilationEnvironment,
    segments: Vec<ResolvedSegment>,
    errors: Vec<CompilationError>,
    saw_resolve_error: bool,
    saw_reduce_error: bool,
}

impl Assembler<'_> {
    fn resolve_error(&mut self, error: String, range: SourceRange) {
        self.saw_resolve_error = true;
        self.errors.push(CompilationError { error, range });
    }

    fn reduce_error(&mut self, error: String, range: SourceRange) {
        self.saw_reduce_error = true;
        self.errors.push(CompilationError { error, range });
    }

    fn record(&mut self, token: &Token, kind: &'static str, bytecode: &[u8]) {
        self.segments.push(ResolvedSegment {
            range: token.range,
            text: token.text.clone(),
            kind,
            bytecode: bytecode.to_vec(),
        });
    }

    /// Assemble until the end of input, or until the matching `>` when
    /// `open` is the push-group opener.
    fn assemble_group(&mut self, open: Option<&Token>) -> Vec<u8> {
        let mut bytecode = Vec::new();
        while self.index < self.tokens.len() {
            let token = self.tokens[self.index].clone();
            self.index += 1;
            match &token.kind {
                TokenKind::PushOpen => {
                    let inner = self.assemble_group(Some(&token));
                    match encode_data_push(&inner) {
                        Ok(push) => bytecode.extend_from_slice(&push),
                        Err(e) => self.reduce_error(e.to_string(), token.range),
                    }
                }
                TokenKind::PushClose => {
                    if open.is_some() {
                        return bytecode;
                    }
                    self.resolve_error(
                        "Unexpected \">\" without a matching \"<\".".to_string(),
                        token.range,
                    );
                }
                TokenKind::Opcode(name) => match self.environment.opcodes.get(name).copied() {
                    Some(byte) => {
                        bytecode.push(byte);
                        self.record(&token, "opcode", &[byte]);
                    }
                    None => {
                        self.resolve_error(format!("Unknown opcode \"{name}\"."), token.range)
                    }
                },
                TokenKind::HexLiteral(bytes) => {
                    bytecode.extend_from_slice(bytes);
                    self.record(&token, "hex_literal", bytes);
                }
                TokenKind::DecimalLiteral(value) => {
                    let encoded = encode_script_number(*value);
                    bytecode.extend_from_slice(&encoded);
                    self.record(&token, "decimal_literal", &encoded);
                }
                TokenKind::StringLiteral(content) => {
                    let encoded = content.as_bytes().to_vec();
                    bytecode.extend_from_slice(&encoded);
                    self.record(&token, "string_literal", &encoded);
                }
                TokenKind::Identifier(identifier) => {
                    if let Some(bytes) = self.resolve_identifier_token(identifier, &token) {
                        bytecode.extend_from_slice(&bytes);
                    }
                }
            }
        }
        if let Some(open_token) = open {
            self.resolve_error(
                "Unterminated push: missing \">\".".to_string(),
                open_token.range,
            );
        }
        bytecode
    }

    /// Resolve one identifier token: built-ins, variables, then inlined
    /// scripts. Errors are recorded and `None` is returned so assembly can
    /// continue with the remaining tokens.
    fn resolve_identifier_token(&mut self, identifier: &str, token: &Token) -> Option<Vec<u8>> {
        if let Some(result) =
            resolve_variable_or_builtin(identifier, self.data, self.environment)
        {
            return match result {
                OperationResult::Success(bytes) => {
                    self.record(token, "identifier", &bytes);
                    Some(bytes)
                }
                OperationResult::Error { message, .. } => {
                    self.resolve_error(message, token.range);
                    None
                }
                OperationResult::Skip => {
                    self.resolve_error(
                        format!(
                            "Cannot resolve \"{identifier}\" - the operation was skipped outside of a chain."
                        ),
                        token.range,
                    );
                    None
                }
            };
        }

        let parsed = Identifier::parse(identifier);
        if parsed.operation.is_none() && self.environment.scripts.contains_key(identifier) {
            return match compile_script_for_operations(identifier, self.data, self.environment)
            {
                Ok(bytes) => {
                    self.record(token, "script", &bytes);
                    Some(bytes)
                }
                Err(message) => {
                    self.resolve_error(
                        format!(
                            "Compilation error in resolved script \"{identifier}\": {message}"
                        ),
                        token.range,
                    );
                    None
                }
            };
        }

        self.resolve_error(format!("Unknown identifier \"{identifier}\"."), token.range);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Keys;
    use bch_script::opcodes::opcode_map;
    use std::collections::HashMap;

    fn environment_with_script(script: &str) -> CompilationEnvironment {
        let mut environment = CompilationEnvironment::new().with_native_crypto();
        environment.opcodes = opcode_map();
        environment
            .scripts
            .insert("test".to_string(), script.to_string());
        environment
    }

    #[test]
    fn test_compiles_opcodes_and_literals() {
        let environment = environment_with_script("OP_DUP OP_HASH160 0x1234");
        let result = compile_script("test", &CompilationData::default(), &environment);
        assert_eq!(
            result,
            CompilationResult::Success {
                bytecode: vec![0x76, 0xa9, 0x12, 0x34]
            }
        );
    }

    #[test]
    fn test_push_wraps_inner_bytes() {
        let environment = environment_with_script("<0xabcd> <''> <1>");
        let result = compile_script("test", &CompilationData::default(), &environment);
        // 2-byte push, OP_0 for the empty push, 1-byte push of 0x01.
        assert_eq!(
            result,
            CompilationResult::Success {
                bytecode: vec![0x02, 0xab, 0xcd, 0x00, 0x01, 0x01]
            }
        );
    }

    #[test]
    fn test_unknown_script_fails() {
        let environment = CompilationEnvironment::new();
        match compile_script("missing", &CompilationData::default(), &environment) {
            CompilationResult::Failure { error_type, errors } => {
                assert_eq!(error_type, CompilationErrorType::Resolve);
                assert!(errors[0].error.contains("Unknown script"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors_are_typed() {
        let environment = environment_with_script("0xabc");
        match compile_script("test", &CompilationData::default(), &environment) {
            CompilationResult::Failure { error_type, .. } => {
                assert_eq!(error_type, CompilationErrorType::Parse);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_identifiers_still_resolve() {
        // The failing identifier does not abort resolution of the second.
        let mut environment = environment_with_script("<unknown_thing> <nonce>");
        environment.variables = Some(HashMap::from([(
            "nonce".to_string(),
            Variable::AddressData,
        )]));
        let mut data = CompilationData::default();
        data.address_data = Some(HashMap::from([("nonce".to_string(), vec![0x2a])]));
        match compile_script("test", &data, &environment) {
            CompilationResult::Failure { error_type, errors } => {
                assert_eq!(error_type, CompilationErrorType::Resolve);
                assert_eq!(errors.len(), 1);
                assert!(errors[0].error.contains("Unknown identifier"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_script_inlining_splices_raw_bytes() {
        let mut environment = environment_with_script("OP_1 inner OP_2");
        environment
            .scripts
            .insert("inner".to_string(), "0xdead".to_string());
        let result = compile_script("test", &CompilationData::default(), &environment);
        assert_eq!(
            result,
            CompilationResult::Success {
                bytecode: vec![0x51, 0xde, 0xad, 0x52]
            }
        );
    }

    #[test]
    fn test_precomputed_public_key_scenario() {
        // Scenario S1: no secp256k1 capability; pre-computed key resolves.
        let mut environment = CompilationEnvironment::new();
        environment.opcodes = opcode_map();
        environment
            .scripts
            .insert("test".to_string(), "<alice.public_key>".to_string());
        environment.variables = Some(HashMap::from([("alice".to_string(), Variable::Key)]));
        let mut data = CompilationData::default();
        let public_key = vec![0x02; 33];
        data.keys = Some(Keys {
            public_keys: Some(HashMap::from([("alice".to_string(), public_key.clone())])),
            ..Default::default()
        });
        let mut expected = vec![33u8];
        expected.extend_from_slice(&public_key);
        assert_eq!(
            compile_script("test", &data, &environment),
            CompilationResult::Success { bytecode: expected }
        );
    }

    #[test]
    fn test_debug_trace_records_segments() {
        let environment = environment_with_script("OP_1 0xff");
        let trace =
            compile_script_debug("test", &CompilationData::default(), &environment);
        assert!(trace.success);
        assert_eq!(trace.bytecode, vec![0x51, 0xff]);
        assert_eq!(trace.segments.len(), 2);
        assert_eq!(trace.segments[0].kind, "opcode");
        assert_eq!(trace.segments[0].text, "OP_1");
        assert_eq!(trace.segments[1].kind, "hex_literal");
        assert_eq!(trace.segments[1].range.start.column, 6);
    }

    #[test]
    fn test_unbalanced_push_fails() {
        let environment = environment_with_script("<OP_1");
        match compile_script("test", &CompilationData::default(), &environment) {
            CompilationResult::Failure { errors, .. } => {
                assert!(errors[0].error.contains("Unterminated push"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
