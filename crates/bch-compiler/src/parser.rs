//! Template script tokenizer.
//!
//! The template script language consists of comments (`//` and `/* */`),
//! hex literals (`0x...`), decimal literals, UTF-8 string literals
//! (`'...'` or `"..."`), push groups (`<` ... `>`, nestable), opcode names
//! (`OP_*`), and dotted identifiers. Every token carries its source range
//! for error reporting and debug traces.

use std::fmt;

/// A position in a script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
    /// 0-based byte offset.
    pub offset: usize,
}

/// A half-open range in a script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceRange {
    /// The range start (inclusive).
    pub start: SourcePosition,
    /// The range end (exclusive).
    pub end: SourcePosition,
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

/// The kind of a script token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// A dotted identifier reference, resolved by the compiler.
    Identifier(String),
    /// An `OP_*` name, resolved through the environment's opcode map.
    Opcode(String),
    /// A hex literal (`0x...`), already decoded.
    HexLiteral(Vec<u8>),
    /// A decimal literal, encoded as a script number at assembly.
    DecimalLiteral(i64),
    /// A UTF-8 string literal, emitted as its raw bytes.
    StringLiteral(String),
    /// The opening `<` of a push group.
    PushOpen,
    /// The closing `>` of a push group.
    PushClose,
}

/// A token with its source range and original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// Where the token came from.
    pub range: SourceRange,
    /// The original source text of the token.
    pub text: String,
}

/// A tokenization failure with its source range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The error message.
    pub error: String,
    /// Where the failure occurred.
    pub range: SourceRange,
}

struct Cursor<'a> {
    source: &'a str,
    bytes: &'a [u8],
    offset: usize,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Cursor {
            source,
            bytes: source.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    fn position(&self) -> SourcePosition {
        SourcePosition {
            line: self.line,
            column: self.column,
            offset: self.offset,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.offset + ahead).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.offset += 1;
        if byte == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(byte)
    }

    fn range_from(&self, start: SourcePosition) -> SourceRange {
        SourceRange {
            start,
            end: self.position(),
        }
    }

    fn text_from(&self, start: SourcePosition) -> String {
        self.source[start.offset..self.offset].to_string()
    }
}

fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_identifier_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.'
}

/// Tokenize a script source.
///
/// # Arguments
/// * `source` - The script source text.
///
/// # Returns
/// The token list, or the first tokenization failure.
pub fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    while let Some(byte) = cursor.peek() {
        let start = cursor.position();
        match byte {
            b' ' | b'\t' | b'\r' | b'\n' => {
                cursor.advance();
            }
            b'/' if cursor.peek_at(1) == Some(b'/') => {
                while let Some(next) = cursor.peek() {
                    if next == b'\n' {
                        break;
                    }
                    cursor.advance();
                }
            }
            b'/' if cursor.peek_at(1) == Some(b'*') => {
                cursor.advance();
                cursor.advance();
                let mut terminated = false;
                while let Some(next) = cursor.advance() {
                    if next == b'*' && cursor.peek() == Some(b'/') {
                        cursor.advance();
                        terminated = true;
                        break;
                    }
                }
                if !terminated {
                    return Err(ParseError {
                        error: "Unterminated block comment.".to_string(),
                        range: cursor.range_from(start),
                    });
                }
            }
            b'<' => {
                cursor.advance();
                tokens.push(Token {
                    kind: TokenKind::PushOpen,
                    range: cursor.range_from(start),
                    text: "<".to_string(),
                });
            }
            b'>' => {
                cursor.advance();
                tokens.push(Token {
                    kind: TokenKind::PushClose,
                    range: cursor.range_from(start),
                    text: ">".to_string(),
                });
            }
            b'\'' | b'"' => {
                let quote = byte;
                cursor.advance();
                let content_start = cursor.offset;
                let mut terminated = false;
                while let Some(next) = cursor.peek() {
                    if next == quote {
                        terminated = true;
                        break;
                    }
                    cursor.advance();
                }
                if !terminated {
                    return Err(ParseError {
                        error: "Unterminated string literal.".to_string(),
                        range: cursor.range_from(start),
                    });
                }
                let content = cursor.source[content_start..cursor.offset].to_string();
                cursor.advance(); // closing quote
                tokens.push(Token {
                    kind: TokenKind::StringLiteral(content),
                    range: cursor.range_from(start),
                    text: cursor.text_from(start),
                });
            }
            b'0' if cursor.peek_at(1) == Some(b'x') => {
                cursor.advance();
                cursor.advance();
                let digits_start = cursor.offset;
                while let Some(next) = cursor.peek() {
                    if next.is_ascii_hexdigit() {
                        cursor.advance();
                    } else {
                        break;
                    }
                }
                let digits = &cursor.source[digits_start..cursor.offset];
                if digits.is_empty() || digits.len() % 2 != 0 {
                    return Err(ParseError {
                        error: format!(
                            "Invalid hex literal \"{}\" - an even number of hex digits is required.",
                            cursor.text_from(start)
                        ),
                        range: cursor.range_from(start),
                    });
                }
                let bytes = hex::decode(digits).map_err(|e| ParseError {
                    error: format!("Invalid hex literal: {e}"),
                    range: cursor.range_from(start),
                })?;
                tokens.push(Token {
                    kind: TokenKind::HexLiteral(bytes),
                    range: cursor.range_from(start),
                    text: cursor.text_from(start),
                });
            }
            b'-' | b'0'..=b'9' => {
                cursor.advance();
                while let Some(next) = cursor.peek() {
                    if next.is_ascii_digit() {
                        cursor.advance();
                    } else {
                        break;
                    }
                }
                let text = cursor.text_from(start);
                let value: i64 = text.parse().map_err(|_| ParseError {
                    error: format!("Invalid decimal literal \"{text}\"."),
                    range: cursor.range_from(start),
                })?;
                tokens.push(Token {
                    kind: TokenKind::DecimalLiteral(value),
                    range: cursor.range_from(start),
                    text,
                });
            }
            _ if is_identifier_start(byte) => {
                cursor.advance();
                while let Some(next) = cursor.peek() {
                    if is_identifier_continue(next) {
                        cursor.advance();
                    } else {
                        break;
                    }
                }
                let text = cursor.text_from(start);
                let kind = if text.starts_with("OP_") {
                    TokenKind::Opcode(text.clone())
                } else {
                    TokenKind::Identifier(text.clone())
                };
                tokens.push(Token {
                    kind,
                    range: cursor.range_from(start),
                    text,
                });
            }
            _ => {
                // Advance past the full character so that non-ASCII input
                // never splits a UTF-8 sequence.
                let character = cursor.source[cursor.offset..]
                    .chars()
                    .next()
                    .unwrap_or('\u{fffd}');
                for _ in 0..character.len_utf8() {
                    cursor.advance();
                }
                return Err(ParseError {
                    error: format!("Unexpected character \"{character}\"."),
                    range: cursor.range_from(start),
                });
            }
        }
    }

    Ok(tokens)
}
