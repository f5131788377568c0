//! Revocation list state shared by all verifications of a service.

use crate::certificate::{serial_hex, to_utc};
use crate::error::{TrustError, TrustResult};
use chrono::{DateTime, Utc};
use der::Decode;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};
use tracing::info;
use x509_cert::crl::CertificateList;

#[derive(Debug, Clone, Default)]
struct RevocationState {
    this_update: Option<DateTime<Utc>>,
    next_update: Option<DateTime<Utc>>,
    revoked: HashSet<String>,
}

/// Revoked provider serials plus the validity window of the CRL they came from.
///
/// Readers take a shared lock; [`update`](Self::update) parses the whole CRL
/// before taking the write lock, so a malformed CRL never touches the
/// current state.
#[derive(Debug, Default)]
pub struct RevocationList {
    state: RwLock<RevocationState>,
}

impl RevocationList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from a DER CRL.
    pub fn from_der(der: &[u8]) -> TrustResult<Self> {
        Ok(Self {
            state: RwLock::new(parse_crl(der)?),
        })
    }

    /// Replaces the state with the contents of a DER CRL.
    pub fn update(&self, der: &[u8]) -> TrustResult<()> {
        let parsed = parse_crl(der)?;
        info!(
            revoked = parsed.revoked.len(),
            this_update = ?parsed.this_update,
            next_update = ?parsed.next_update,
            "revocation list updated"
        );
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = parsed;
        Ok(())
    }

    #[must_use]
    pub fn has_this_update(&self) -> bool {
        self.read(|state| state.this_update.is_some())
    }

    #[must_use]
    pub fn this_update(&self) -> Option<DateTime<Utc>> {
        self.read(|state| state.this_update)
    }

    #[must_use]
    pub fn has_next_update(&self) -> bool {
        self.read(|state| state.next_update.is_some())
    }

    #[must_use]
    pub fn next_update(&self) -> Option<DateTime<Utc>> {
        self.read(|state| state.next_update)
    }

    /// Looks up a serial in the upper-case hex form of
    /// [`Certificate::serial_number`](crate::Certificate::serial_number).
    #[must_use]
    pub fn is_revoked(&self, serial: &str) -> bool {
        let serial = serial.to_ascii_uppercase();
        self.read(|state| state.revoked.contains(&serial))
    }

    /// Revoked serials, sorted.
    #[must_use]
    pub fn revoked_serials(&self) -> Vec<String> {
        let mut serials: Vec<String> = self.read(|state| state.revoked.iter().cloned().collect());
        serials.sort();
        serials
    }

    fn read<T>(&self, f: impl FnOnce(&RevocationState) -> T) -> T {
        f(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn parse_crl(der: &[u8]) -> TrustResult<RevocationState> {
    let crl = CertificateList::from_der(der).map_err(|e| TrustError::Crl(e.to_string()))?;
    let tbs = crl.tbs_cert_list;

    let revoked = tbs
        .revoked_certificates
        .iter()
        .flatten()
        .map(|entry| serial_hex(entry.serial_number.as_bytes()))
        .collect();

    Ok(RevocationState {
        this_update: Some(to_utc(&tbs.this_update)),
        next_update: tbs.next_update.as_ref().map(to_utc),
        revoked,
    })
}
