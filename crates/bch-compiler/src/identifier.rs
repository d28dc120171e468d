//! Dotted-identifier parsing.
//!
//! Identifiers are dot-separated segments inspected positionally:
//! `variable_id.operation[.parameter[.unknown]]`. The parse produces a
//! typed view so that "unknown component" checks reduce to inspecting the
//! trailing segments.

/// A parsed view over a dotted identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identifier<'a> {
    /// The full identifier as written in the script.
    pub full: &'a str,
    /// Segment 0: the variable id (or a built-in identifier name).
    pub variable_id: &'a str,
    /// Segment 1: the operation name, if present.
    pub operation: Option<&'a str>,
    /// Segment 2: the operation parameter (signing-serialization algorithm
    /// or target script id), if present.
    pub parameter: Option<&'a str>,
    /// Segment 3, if present. Always an error to provide.
    pub unknown: Option<&'a str>,
}

impl<'a> Identifier<'a> {
    /// Parse an identifier by splitting on `.`.
    pub fn parse(full: &'a str) -> Self {
        let mut segments = full.splitn(4, '.');
        let variable_id = segments.next().unwrap_or("");
        Identifier {
            full,
            variable_id,
            operation: segments.next(),
            parameter: segments.next(),
            unknown: segments.next(),
        }
    }
}

/// The error message for an unrecognized trailing fragment.
pub fn unknown_component_error(full: &str, fragment: &str) -> String {
    format!(
        "Unknown component in \"{full}\" - the fragment \"{fragment}\" is not recognized."
    )
}
