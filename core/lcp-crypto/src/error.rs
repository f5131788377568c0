//! Error types for the cryptography layer.

use lcp_types::{Status, StatusCode};
use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A key had the wrong number of bytes.
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Base64 or hex input could not be decoded.
    #[error("invalid encoding: {0}")]
    Encoding(String),

    /// Ciphertext is not a whole number of blocks or has no IV.
    #[error("invalid ciphertext length: {0} bytes")]
    InvalidCiphertextLength(usize),

    /// Decryption failed (wrong key or corrupted data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// The output buffer cannot hold the plaintext.
    #[error("output buffer too small: need {needed}, got {available}")]
    BufferTooSmall { needed: usize, available: usize },

    /// Public key could not be parsed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature did not verify.
    #[error("signature verification failed: {0}")]
    Signature(String),

    /// No algorithm is registered under this URI.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No encryption profile is registered under this name.
    #[error("unknown encryption profile: {0}")]
    UnknownProfile(String),

    /// Reading from a stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CryptoError {
    /// Maps the error to a [`Status`], keeping the message as detail.
    ///
    /// Unknown algorithms and profiles always map to
    /// `EncryptionProfileNotFound`; everything else takes `code`.
    #[must_use]
    pub fn into_status(self, code: StatusCode) -> Status {
        match self {
            Self::UnsupportedAlgorithm(_) | Self::UnknownProfile(_) => {
                Status::with_context(StatusCode::EncryptionProfileNotFound, self)
            }
            other => Status::with_context(code, other),
        }
    }
}

impl From<CryptoError> for Status {
    fn from(err: CryptoError) -> Self {
        err.into_status(StatusCode::CommonError)
    }
}
