//! Serde model of the license document.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use lcp_types::{Links, parse_timestamp};
use serde::{Deserialize, Serialize};

/// A parsed `.lcpl` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseDocument {
    pub id: String,
    pub issued: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub encryption: Encryption,
    #[serde(default)]
    pub links: Links,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rights: Option<Rights>,
    /// Top-level signature block (LCP 1.0 layout).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encryption {
    pub profile: String,
    pub content_key: ContentKeyInfo,
    pub user_key: UserKeyInfo,
    /// Signature block nested under `encryption`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignatureInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentKeyInfo {
    pub algorithm: String,
    /// Base64 `IV || ciphertext` of the content key.
    pub encrypted_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserKeyInfo {
    pub algorithm: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_hint: Option<String>,
    /// Base64 ciphertext of the license id under the user key.
    pub key_check: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub algorithm: String,
    /// Base64 DER provider certificate.
    pub certificate: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Names of the fields above that are encrypted with the user key.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encrypted: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rights {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl LicenseDocument {
    /// The signature block, wherever it lives.
    #[must_use]
    pub fn signature(&self) -> Option<&SignatureInfo> {
        self.encryption
            .signature
            .as_ref()
            .or(self.signature.as_ref())
    }

    pub fn issued_at(&self) -> LicenseResult<DateTime<Utc>> {
        timestamp("issued", &self.issued)
    }

    pub fn updated_at(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        self.updated
            .as_deref()
            .map(|value| timestamp("updated", value))
            .transpose()
    }
}

impl Rights {
    pub fn start_at(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        self.start
            .as_deref()
            .map(|value| timestamp("rights.start", value))
            .transpose()
    }

    pub fn end_at(&self) -> LicenseResult<Option<DateTime<Utc>>> {
        self.end
            .as_deref()
            .map(|value| timestamp("rights.end", value))
            .transpose()
    }
}

fn timestamp(field: &'static str, value: &str) -> LicenseResult<DateTime<Utc>> {
    parse_timestamp(value).ok_or_else(|| LicenseError::InvalidTimestamp {
        field,
        value: value.to_string(),
    })
}
