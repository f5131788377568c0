//! License trust checks: certificate chain, revocation, license signature
//! and the provider certificate validity window.

use crate::certificate::Certificate;
use crate::manager::RevocationManager;
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use lcp_crypto::EncryptionProfile;
use lcp_types::{LcpResult, Status, StatusCode};
use tracing::{debug, warn};

/// The parts of a license the trust checks read.
#[derive(Debug, Clone, Copy)]
pub struct LicenseView<'a> {
    pub profile: &'a EncryptionProfile,
    /// Base64 DER provider certificate from the signature block.
    pub certificate: &'a str,
    pub signature_algorithm: &'a str,
    /// Base64 signature value.
    pub signature_value: &'a str,
    pub issued: DateTime<Utc>,
    pub updated: Option<DateTime<Utc>>,
}

impl LicenseView<'_> {
    /// Date checked against the provider certificate: `updated`, else `issued`.
    #[must_use]
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.updated.unwrap_or(self.issued)
    }
}

/// Verifies licenses against one root certificate.
#[derive(Debug, Clone)]
pub struct TrustVerifier {
    root: Certificate,
}

impl TrustVerifier {
    /// Decodes the configured root certificate.
    pub fn new(root_certificate: &str) -> LcpResult<Self> {
        if root_certificate.trim().is_empty() {
            return Err(Status::from_code(StatusCode::NoRootCertificate));
        }
        let root = Certificate::from_base64(root_certificate)
            .map_err(|e| e.into_status(StatusCode::RootCertificateNotValid))?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Certificate {
        &self.root
    }

    /// Runs every check in order and stops at the first failure.
    pub fn verify(
        &self,
        license: &LicenseView<'_>,
        canonical: &[u8],
        revocation: Option<&RevocationManager>,
    ) -> LcpResult<Certificate> {
        let provider = Certificate::from_base64(license.certificate)
            .map_err(|e| e.into_status(StatusCode::ProviderCertificateNotValid))?;

        provider.verify_signed_by(&self.root).map_err(|e| {
            warn!(
                serial = %provider.serial_number(),
                error = %e,
                "provider certificate not signed by root"
            );
            e.into_status(StatusCode::ProviderCertificateNotVerified)
        })?;

        if let Some(revocation) = revocation {
            revocation.process_revocation(&self.root, &provider)?;
        }

        verify_signature(license, &provider, canonical)?;
        check_validity_window(&provider, license.effective_date())?;

        debug!(serial = %provider.serial_number(), "license trusted");
        Ok(provider)
    }
}

/// One-shot form of [`TrustVerifier::verify`].
pub fn verify_license(
    root_certificate: &str,
    license: &LicenseView<'_>,
    canonical: &[u8],
    revocation: Option<&RevocationManager>,
) -> LcpResult<Certificate> {
    TrustVerifier::new(root_certificate)?.verify(license, canonical, revocation)
}

fn verify_signature(
    license: &LicenseView<'_>,
    provider: &Certificate,
    canonical: &[u8],
) -> LcpResult<()> {
    let verifier = license
        .profile
        .signature_algorithm(provider.public_key_der(), license.signature_algorithm)
        .map_err(|e| e.into_status(StatusCode::LicenseSignatureNotValid))?;
    let signature = STANDARD
        .decode(license.signature_value.trim())
        .map_err(|e| Status::with_context(StatusCode::LicenseSignatureNotValid, e))?;
    verifier.verify(canonical, &signature).map_err(|e| {
        warn!(error = %e, "license signature rejected");
        e.into_status(StatusCode::LicenseSignatureNotValid)
    })
}

/// Checks that `date` lies in the provider certificate validity window.
pub fn check_validity_window(provider: &Certificate, date: DateTime<Utc>) -> LcpResult<()> {
    if date < provider.not_before() {
        return Err(Status::new(
            StatusCode::ProviderCertificateNotStarted,
            format!("license date {date} precedes {}", provider.not_before()),
        ));
    }
    if date > provider.not_after() {
        return Err(Status::new(
            StatusCode::ProviderCertificateExpired,
            format!("license date {date} follows {}", provider.not_after()),
        ));
    }
    Ok(())
}
