//! Shared pieces of the `lcp-tool` binary: configuration assembly, license
//! summaries and the open → verify → unlock → decrypt flow.

use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use lcp_crypto::UserKey;
use lcp_license::{License, LicenseService, STATUS_LINK, ServiceConfig};
use lcp_types::LcpResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// What `inspect` prints for a license.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LicenseSummary {
    pub id: String,
    pub provider: Option<String>,
    pub profile: String,
    pub issued: String,
    pub updated: Option<String>,
    pub user_id: Option<String>,
    pub text_hint: Option<String>,
    pub print: Option<u64>,
    pub copy: Option<u64>,
    pub rights_start: Option<String>,
    pub rights_end: Option<String>,
    pub links: Vec<String>,
    pub has_status_document: bool,
    pub state: String,
}

impl LicenseSummary {
    #[must_use]
    pub fn from_license(license: &License) -> Self {
        let rights = license.rights();
        Self {
            id: license.id().to_string(),
            provider: license.provider().map(str::to_string),
            profile: license.profile().name().to_string(),
            issued: license.issued().to_rfc3339(),
            updated: license.updated().map(|updated| updated.to_rfc3339()),
            user_id: license.user_id().map(str::to_string),
            text_hint: license.text_hint().map(str::to_string),
            print: rights.and_then(|r| r.print),
            copy: rights.and_then(|r| r.copy),
            rights_start: rights.and_then(|r| r.start.clone()),
            rights_end: rights.and_then(|r| r.end.clone()),
            links: license
                .links()
                .iter()
                .map(|link| format!("{} {}", link.rel, link.href))
                .collect(),
            has_status_document: license.links().has(STATUS_LINK),
            state: format!("{:?}", license.state()),
        }
    }
}

/// How the user key is supplied.
#[derive(Debug, Clone)]
pub enum Unlock {
    Passphrase(String),
    /// Hex SHA-256 of the passphrase.
    UserKey(String),
    /// Whatever the storage remembers.
    Stored,
}

/// Loads the configuration file when given, then applies command-line
/// overrides.
pub fn load_config(
    path: Option<&Path>,
    root_certificate: Option<&Path>,
    crl_url: Option<&str>,
) -> Result<ServiceConfig> {
    let mut config = match path {
        Some(path) => ServiceConfig::load_from(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(path) = root_certificate {
        config = config.with_root_certificate(read_root_certificate(path)?);
    }
    if let Some(url) = crl_url {
        config = config.with_default_crl_url(url);
    }
    Ok(config)
}

/// Reads a root certificate stored as DER or as base64 text.
pub fn read_root_certificate(path: &Path) -> Result<String> {
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read root certificate {}", path.display()))?;
    if let Ok(text) = std::str::from_utf8(&bytes) {
        let text: String = text.split_whitespace().collect();
        if STANDARD.decode(&text).is_ok() {
            return Ok(text);
        }
    }
    Ok(STANDARD.encode(bytes))
}

pub fn read_license(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read license {}", path.display()))
}

/// Opens and verifies a license. With `check_status` the status document
/// is processed too; a newer license from the server is verified and
/// returned in place of the opened one. Network trouble with the status
/// server is logged and ignored.
pub fn open_verified(
    service: &LicenseService,
    raw: &str,
    check_status: bool,
) -> LcpResult<Arc<License>> {
    let mut license = service.open_license(raw)?;
    service.verify_license(&license)?;
    info!(license_id = %license.id(), "license verified");

    if check_status {
        match service.process_status_document(&license) {
            Ok(Some(fresh)) => {
                service.verify_license(&fresh)?;
                license = fresh;
            }
            Ok(None) => {}
            Err(status) if status.code.is_network_error() => {
                warn!(error = %status, "status document unavailable");
            }
            Err(status) => return Err(status),
        }
    }
    Ok(license)
}

pub fn unlock(service: &LicenseService, license: &License, unlock: &Unlock) -> Result<()> {
    match unlock {
        Unlock::Passphrase(passphrase) => service.decrypt_license(license, passphrase)?,
        Unlock::UserKey(hex) => {
            let key = UserKey::from_hex(hex).context("User key must be 64 hex characters")?;
            service.add_user_key(license, &key)?;
        }
        Unlock::Stored => service.decrypt_license_from_storage(license)?,
    }
    Ok(())
}

/// Decrypts a whole resource from `input` into `output`, returning the
/// number of plaintext bytes written.
pub fn decrypt_stream<R: Read, W: Write>(
    service: &LicenseService,
    license: &License,
    input: R,
    output: &mut W,
    algorithm: &str,
) -> Result<u64> {
    let mut reader = service.create_encrypted_data_stream(license, input, algorithm)?;
    let written = std::io::copy(&mut reader, output).context("Failed to decrypt resource")?;
    output.flush()?;
    Ok(written)
}

/// Hex SHA-256 of a file.
pub fn file_hash(service: &LicenseService, path: &Path) -> Result<String> {
    let mut file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let digest = service.calculate_file_hash(&mut file)?;
    Ok(lcp_crypto::to_hex(&digest))
}
