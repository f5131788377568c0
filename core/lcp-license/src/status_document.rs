//! License Status Document (LSD) model and helpers.

use crate::error::{LicenseError, LicenseResult};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use lcp_crypto::sha256;
use lcp_types::{Links, parse_timestamp};
use serde::{Deserialize, Serialize};

/// Link relation of the status document in a license.
pub const STATUS_LINK: &str = "status";
/// Link relation of the fresh license in a status document.
pub const LICENSE_LINK: &str = "license";

/// Server-side status of a license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    Ready,
    Active,
    Revoked,
    Returned,
    Cancelled,
    Expired,
}

impl LicenseStatus {
    /// True for statuses that still allow decryption.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self, Self::Ready | Self::Active)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Revoked => "revoked",
            Self::Returned => "returned",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of status document processing for one license.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum StatusDocumentState {
    #[default]
    NotChecked,
    ProcessingStarted,
    Updated,
    CheckFailed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdated {
    pub license: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialRights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// A downloaded status document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    /// Id of the license this document describes.
    pub id: String,
    pub status: LicenseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated: StatusUpdated,
    #[serde(default)]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_rights: Option<PotentialRights>,
}

impl StatusDocument {
    pub fn from_json(body: &[u8]) -> LicenseResult<Self> {
        serde_json::from_slice(body).map_err(|e| LicenseError::InvalidStatusDocument(e.to_string()))
    }

    /// When the server last changed the license itself.
    pub fn license_updated_at(&self) -> LicenseResult<DateTime<Utc>> {
        parse_timestamp(&self.updated.license).ok_or_else(|| LicenseError::InvalidTimestamp {
            field: "updated.license",
            value: self.updated.license.clone(),
        })
    }
}

/// Expands an RFC 6570 template with `{var}`, `{?a,b}` and `{&a,b}`
/// expressions. Variables without a value are dropped.
#[must_use]
pub fn expand_template(template: &str, vars: &[(&str, &str)]) -> String {
    let lookup = |name: &str| {
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| *value)
    };

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        out.push_str(&rest[..open]);
        let expression = &rest[open + 1..close];

        match expression.chars().next() {
            Some(op @ ('?' | '&')) => {
                let mut first = op == '?';
                for name in expression[1..].split(',').map(str::trim) {
                    if let Some(value) = lookup(name) {
                        out.push(if first { '?' } else { '&' });
                        first = false;
                        out.push_str(name);
                        out.push('=');
                        out.push_str(&percent_encode(value));
                    }
                }
            }
            _ => {
                if let Some(value) = lookup(expression.trim()) {
                    out.push_str(&percent_encode(value));
                }
            }
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Checks a body against a link `hash`, given as hex or base64 SHA-256.
#[must_use]
pub fn hash_matches(body: &[u8], expected: &str) -> bool {
    let expected = expected.trim();
    let digest = sha256(body);
    let decoded = if expected.len() == 64 {
        hex::decode(expected).ok()
    } else {
        None
    }
    .or_else(|| STANDARD.decode(expected).ok());
    decoded.is_some_and(|bytes| bytes == digest)
}
