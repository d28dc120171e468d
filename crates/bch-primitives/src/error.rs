/// Unified error type for all primitives operations.
///
/// Covers errors from hashing, EC operations, encoding, and key handling.
#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    /// Invalid private key data.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Invalid public key data.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Invalid signature data.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Base58Check checksum did not match.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Key length does not match the expected size.
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength {
        /// Expected length in bytes.
        expected: usize,
        /// Actual length in bytes.
        got: usize,
    },

    /// Invalid Base58 encoding.
    #[error("invalid base58: {0}")]
    InvalidBase58(String),

    /// Base58Check payload is too short to carry a checksum.
    #[error("base58check payload too short")]
    Base58PayloadTooShort,

    /// Unexpected end of input data.
    #[error("unexpected end of data")]
    UnexpectedEof,

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Elliptic curve error (from k256).
    #[error("elliptic curve error: {0}")]
    EllipticCurve(#[from] k256::elliptic_curve::Error),

    /// ECDSA signature error (from k256/signature).
    #[error("ecdsa error: {0}")]
    Ecdsa(#[from] k256::ecdsa::signature::Error),
}
