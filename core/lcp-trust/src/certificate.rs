//! X.509 certificates as used by LCP: the root CA and the content
//! provider certificate embedded in each license.

use crate::distribution::CrlDistributionPoints;
use crate::error::{TrustError, TrustResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use der::{Decode, Encode};
use lcp_crypto::{RsaSha256, SignatureAlgorithm};
use spki::ObjectIdentifier;
use x509_cert::time::Time;

/// sha256WithRSAEncryption.
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

/// id-ce-cRLDistributionPoints.
pub(crate) const CRL_DISTRIBUTION_POINTS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("2.5.29.31");

/// A decoded certificate with the fields the trust checks need.
#[derive(Debug, Clone)]
pub struct Certificate {
    inner: x509_cert::Certificate,
    serial_number: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    public_key_der: Vec<u8>,
    distribution_points: Vec<String>,
}

impl Certificate {
    /// Decodes a base64-wrapped DER certificate, as carried in licenses.
    pub fn from_base64(encoded: &str) -> TrustResult<Self> {
        let der = STANDARD
            .decode(encoded.trim())
            .map_err(|e| TrustError::Base64(e.to_string()))?;
        Self::from_der(&der)
    }

    pub fn from_der(der: &[u8]) -> TrustResult<Self> {
        let inner = x509_cert::Certificate::from_der(der)?;
        let tbs = &inner.tbs_certificate;

        let distribution_points = tbs
            .extensions
            .iter()
            .flatten()
            .find(|ext| ext.extn_id == CRL_DISTRIBUTION_POINTS)
            .map(|ext| CrlDistributionPoints::from_extension(ext.extn_value.as_bytes()).into_urls())
            .unwrap_or_default();

        Ok(Self {
            serial_number: serial_hex(tbs.serial_number.as_bytes()),
            not_before: to_utc(&tbs.validity.not_before),
            not_after: to_utc(&tbs.validity.not_after),
            public_key_der: tbs.subject_public_key_info.to_der()?,
            distribution_points,
            inner,
        })
    }

    /// Serial number as upper-case hex without sign padding.
    #[must_use]
    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    #[must_use]
    pub fn issuer(&self) -> String {
        self.inner.tbs_certificate.issuer.to_string()
    }

    #[must_use]
    pub fn subject(&self) -> String {
        self.inner.tbs_certificate.subject.to_string()
    }

    #[must_use]
    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    #[must_use]
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// DER `SubjectPublicKeyInfo`.
    #[must_use]
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key_der
    }

    /// CRL URLs from the distribution points extension, in certificate order.
    #[must_use]
    pub fn distribution_points(&self) -> &[String] {
        &self.distribution_points
    }

    /// Verifies this certificate's signature under `issuer`'s public key.
    pub fn verify_signed_by(&self, issuer: &Certificate) -> TrustResult<()> {
        let algorithm = &self.inner.signature_algorithm.oid;
        if *algorithm != SHA256_WITH_RSA {
            return Err(TrustError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        let signature = self
            .inner
            .signature
            .as_bytes()
            .ok_or_else(|| TrustError::Signature("signature has unused bits".to_string()))?;
        let tbs = self.inner.tbs_certificate.to_der()?;

        RsaSha256::from_public_key_der(issuer.public_key_der())?.verify(&tbs, signature)?;
        Ok(())
    }

    /// Returns true if `at` lies inside `[not_before, not_after]`.
    #[must_use]
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.not_before && at <= self.not_after
    }
}

/// Upper-case hex of a DER integer, leading zero bytes removed.
pub(crate) fn serial_hex(bytes: &[u8]) -> String {
    let first = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    hex::encode_upper(&bytes[first..])
}

pub(crate) fn to_utc(time: &Time) -> DateTime<Utc> {
    DateTime::<Utc>::from(time.to_system_time())
}
