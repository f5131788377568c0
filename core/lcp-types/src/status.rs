//! Uniform operation result for the LCP client.
//!
//! Every public operation returns `LcpResult<T>`; the error side is a
//! [`Status`] carrying a code from the closed [`StatusCode`] taxonomy and an
//! optional diagnostic message. Nothing in the core is process-fatal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type used across the public surface of the LCP crates.
pub type LcpResult<T> = Result<T, Status>;

/// Closed taxonomy of operation outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusCode {
    // ── Common ───────────────────────────────────────────────────
    /// The operation succeeded.
    Success,
    /// The license names an encryption profile or algorithm that is not registered.
    EncryptionProfileNotFound,
    /// Unclassified failure (hashing, encoding helpers).
    CommonError,

    // ── Opening ──────────────────────────────────────────────────
    /// No root certificate was configured.
    NoRootCertificate,
    /// The root certificate could not be decoded.
    RootCertificateNotValid,
    /// The provider certificate could not be decoded.
    ProviderCertificateNotValid,
    /// The provider certificate is not signed by the root.
    ProviderCertificateNotVerified,
    /// The license date precedes the provider certificate validity window.
    ProviderCertificateNotStarted,
    /// The license date follows the provider certificate validity window.
    ProviderCertificateExpired,
    /// The provider certificate serial is listed in the revocation list.
    ProviderCertificateRevoked,
    /// The license signature does not match its canonical form.
    LicenseSignatureNotValid,
    /// The license document is not valid JSON or misses required fields.
    LicenseMalformed,
    /// The license uses an encryption profile this client does not support.
    LicenseProfileNotSupported,

    // ── Decryption ───────────────────────────────────────────────
    /// The passphrase (or stored user key) does not unlock the license.
    UserPassphraseNotValid,
    /// The content key could not be decrypted.
    LicenseEncrypted,
    /// Publication data could not be decrypted.
    PublicationEncrypted,
    /// The operation requires a verified license.
    LicenseNotVerified,
    /// The operation requires a decrypted license.
    LicenseNotDecrypted,
    /// The license status document forbids use of the license.
    LicenseStatusRejected,

    // ── Networking ───────────────────────────────────────────────
    /// A download failed or no candidate URL succeeded.
    RequestFailed,
    /// A download was canceled by the caller.
    RequestCanceled,

    // ── Status document ──────────────────────────────────────────
    /// Status document processing has started and not finished yet.
    StatusDocumentProcessing,
    /// The downloaded status document is malformed or fails its hash check.
    StatusDocumentNotValid,
}

impl StatusCode {
    /// Returns the stable diagnostic name of the code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "ErrorCommonSuccess",
            Self::EncryptionProfileNotFound => "ErrorCommonEncryptionProfileNotFound",
            Self::CommonError => "ErrorCommonError",
            Self::NoRootCertificate => "ErrorOpeningNoRootCertificate",
            Self::RootCertificateNotValid => "ErrorOpeningRootCertificateNotValid",
            Self::ProviderCertificateNotValid => "ErrorOpeningContentProviderCertificateNotValid",
            Self::ProviderCertificateNotVerified => {
                "ErrorOpeningContentProviderCertificateNotVerified"
            }
            Self::ProviderCertificateNotStarted => {
                "ErrorOpeningContentProviderCertificateNotStarted"
            }
            Self::ProviderCertificateExpired => "ErrorOpeningContentProviderCertificateExpired",
            Self::ProviderCertificateRevoked => "ErrorOpeningContentProviderCertificateRevoked",
            Self::LicenseSignatureNotValid => "ErrorOpeningLicenseSignatureNotValid",
            Self::LicenseMalformed => "ErrorOpeningLicenseMalformed",
            Self::LicenseProfileNotSupported => "ErrorOpeningLicenseProfileNotSupported",
            Self::UserPassphraseNotValid => "ErrorDecryptionUserPassphraseNotValid",
            Self::LicenseEncrypted => "ErrorDecryptionLicenseEncrypted",
            Self::PublicationEncrypted => "ErrorDecryptionPublicationEncrypted",
            Self::LicenseNotVerified => "ErrorDecryptionLicenseNotVerified",
            Self::LicenseNotDecrypted => "ErrorDecryptionLicenseNotDecrypted",
            Self::LicenseStatusRejected => "ErrorDecryptionLicenseStatusRejected",
            Self::RequestFailed => "ErrorNetworkingRequestFailed",
            Self::RequestCanceled => "ErrorNetworkingRequestCanceled",
            Self::StatusDocumentProcessing => "LicenseStatusDocumentStartProcessing",
            Self::StatusDocumentNotValid => "LicenseStatusDocumentNotValid",
        }
    }

    /// Returns true for the codes raised while opening and verifying a license.
    #[must_use]
    pub fn is_opening_error(&self) -> bool {
        matches!(
            self,
            Self::NoRootCertificate
                | Self::RootCertificateNotValid
                | Self::ProviderCertificateNotValid
                | Self::ProviderCertificateNotVerified
                | Self::ProviderCertificateNotStarted
                | Self::ProviderCertificateExpired
                | Self::ProviderCertificateRevoked
                | Self::LicenseSignatureNotValid
                | Self::LicenseMalformed
                | Self::LicenseProfileNotSupported
        )
    }

    /// Returns true for transport outcomes.
    #[must_use]
    pub fn is_network_error(&self) -> bool {
        matches!(self, Self::RequestFailed | Self::RequestCanceled)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome record: a code plus optional diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub struct Status {
    /// The taxonomy code.
    pub code: StatusCode,
    /// Diagnostic text, usually the underlying library message.
    pub message: Option<String>,
}

impl Status {
    /// Creates a status with a code and diagnostic text.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    /// Creates a status carrying only a code.
    #[must_use]
    pub const fn from_code(code: StatusCode) -> Self {
        Self {
            code,
            message: None,
        }
    }

    /// The success status.
    #[must_use]
    pub const fn success() -> Self {
        Self::from_code(StatusCode::Success)
    }

    /// Creates a status whose message is `"<CodeName>: <detail>"`.
    pub fn with_context(code: StatusCode, detail: impl fmt::Display) -> Self {
        Self::new(code, format!("{}: {}", code.as_str(), detail))
    }

    /// Returns true if the code is `Success`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) if message.starts_with(self.code.as_str()) => f.write_str(message),
            Some(message) => write!(f, "{}: {}", self.code, message),
            None => write!(f, "{}", self.code),
        }
    }
}

impl From<StatusCode> for Status {
    fn from(code: StatusCode) -> Self {
        Self::from_code(code)
    }
}

impl From<LcpResult<()>> for Status {
    fn from(result: LcpResult<()>) -> Self {
        match result {
            Ok(()) => Self::success(),
            Err(status) => status,
        }
    }
}
