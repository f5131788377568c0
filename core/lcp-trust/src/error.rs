//! Error types for certificate and revocation handling.

use lcp_types::{Status, StatusCode};
use thiserror::Error;

/// Result type for trust operations.
pub type TrustResult<T> = Result<T, TrustError>;

/// Errors raised while decoding or checking certificates and CRLs.
#[derive(Debug, Error)]
pub enum TrustError {
    /// Base64 wrapper of a certificate could not be decoded.
    #[error("invalid base64: {0}")]
    Base64(String),

    /// DER structure could not be decoded.
    #[error("invalid DER: {0}")]
    Der(#[from] der::Error),

    /// Certificate is signed with an algorithm other than sha256WithRSAEncryption.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Signature did not verify under the issuer key.
    #[error("signature check failed: {0}")]
    Signature(String),

    /// The CRL could not be parsed.
    #[error("invalid CRL: {0}")]
    Crl(String),
}

impl TrustError {
    /// Maps the error to a [`Status`] with `code`, keeping the detail.
    #[must_use]
    pub fn into_status(self, code: StatusCode) -> Status {
        Status::with_context(code, self)
    }
}

impl From<lcp_crypto::CryptoError> for TrustError {
    fn from(err: lcp_crypto::CryptoError) -> Self {
        Self::Signature(err.to_string())
    }
}
