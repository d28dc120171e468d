/// Error types for HD key decoding and derivation.
#[derive(Debug, thiserror::Error)]
pub enum HdError {
    /// The serialized key could not be decoded.
    #[error("invalid serialized HD key: {0}")]
    InvalidSerialization(String),

    /// The version bytes do not match the expected key type.
    #[error("unexpected HD key version: {0:#010x}")]
    UnexpectedVersion(u32),

    /// A derivation path string is malformed.
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    /// A child index is out of range for its hardening.
    #[error("invalid child index: {0}")]
    InvalidChildIndex(u32),

    /// Hardened derivation was requested from a public node.
    #[error("cannot derive hardened child of a public key")]
    HardenedFromPublic,

    /// A private-key path was applied to a public node or vice versa.
    #[error("derivation path type mismatch: {0}")]
    PathTypeMismatch(String),

    /// An underlying primitives error (forwarded from `bch-primitives`).
    #[error("primitives error: {0}")]
    Primitives(#[from] bch_primitives::PrimitivesError),
}
