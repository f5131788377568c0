//! An opened license and its lifecycle state.
//!
//! A [`License`] is immutable apart from its state block: the lifecycle
//! step, the keys unlocked so far and the status document outcome. The
//! state block sits behind one mutex so a cached license can be shared by
//! every caller that opens the same document.

use crate::canonical::canonical_license;
use crate::document::{LicenseDocument, Rights, SignatureInfo};
use crate::error::LicenseError;
use crate::status_document::{StatusDocument, StatusDocumentState};
use chrono::{DateTime, Utc};
use lcp_crypto::{ContentKey, EncryptionProfile, ProfileRegistry, UserKey, decrypt_license_data};
use lcp_trust::LicenseView;
use lcp_types::{LcpResult, Links, Status, StatusCode, StorageKey};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lifecycle step of a license. Steps only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LicenseState {
    /// Parsed and canonicalized.
    #[default]
    Opened,
    /// Certificate chain, revocation, signature and dates checked.
    Verified,
    /// User key confirmed against the key check.
    Unlocked,
    /// Content key available.
    Decrypted,
}

#[derive(Default)]
struct LicenseInner {
    state: LicenseState,
    user_key: Option<UserKey>,
    content_key: Option<ContentKey>,
    status_state: StatusDocumentState,
    status_document: Option<StatusDocument>,
}

pub struct License {
    id: String,
    document: LicenseDocument,
    raw_json: String,
    canonical: String,
    profile: EncryptionProfile,
    issued: DateTime<Utc>,
    updated: Option<DateTime<Utc>>,
    inner: Mutex<LicenseInner>,
}

impl License {
    /// Parses and canonicalizes a raw license.
    ///
    /// Fails with `LicenseMalformed` for invalid JSON, missing fields or a
    /// missing signature, and with `LicenseProfileNotSupported` when the
    /// encryption profile is not registered.
    pub fn parse(raw_json: &str, profiles: &ProfileRegistry) -> LcpResult<Self> {
        let (value, canonical) = canonical_license(raw_json).map_err(LicenseError::into_status)?;
        let document: LicenseDocument = serde_json::from_value(value)
            .map_err(|e| LicenseError::InvalidDocument(e.to_string()).into_status())?;

        if document.signature().is_none() {
            return Err(Status::new(
                StatusCode::LicenseMalformed,
                "license carries no signature",
            ));
        }
        let profile = profiles
            .find(&document.encryption.profile)
            .cloned()
            .ok_or_else(|| {
                Status::with_context(
                    StatusCode::LicenseProfileNotSupported,
                    &document.encryption.profile,
                )
            })?;
        let issued = document.issued_at().map_err(LicenseError::into_status)?;
        let updated = document.updated_at().map_err(LicenseError::into_status)?;

        Ok(Self {
            id: document.id.clone(),
            document,
            raw_json: raw_json.to_string(),
            canonical,
            profile,
            issued,
            updated,
            inner: Mutex::new(LicenseInner::default()),
        })
    }

    // ── Document ─────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn document(&self) -> &LicenseDocument {
        &self.document
    }

    #[must_use]
    pub fn raw_json(&self) -> &str {
        &self.raw_json
    }

    /// Bytes covered by the signature.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    #[must_use]
    pub fn profile(&self) -> &EncryptionProfile {
        &self.profile
    }

    #[must_use]
    pub fn issued(&self) -> DateTime<Utc> {
        self.issued
    }

    #[must_use]
    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.updated
    }

    /// `updated` when present, else `issued`.
    #[must_use]
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.updated.unwrap_or(self.issued)
    }

    #[must_use]
    pub fn links(&self) -> &Links {
        &self.document.links
    }

    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        self.document.provider.as_deref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.document.user.as_ref().and_then(|user| user.id.as_deref())
    }

    #[must_use]
    pub fn text_hint(&self) -> Option<&str> {
        self.document.encryption.user_key.text_hint.as_deref()
    }

    #[must_use]
    pub fn rights(&self) -> Option<&Rights> {
        self.document.rights.as_ref()
    }

    #[must_use]
    pub fn signature(&self) -> Option<&SignatureInfo> {
        self.document.signature()
    }

    /// Fields read by the trust checks.
    pub fn trust_view(&self) -> LcpResult<LicenseView<'_>> {
        let signature = self.signature().ok_or_else(|| {
            Status::new(StatusCode::LicenseMalformed, "license carries no signature")
        })?;
        Ok(LicenseView {
            profile: &self.profile,
            certificate: &signature.certificate,
            signature_algorithm: &signature.algorithm,
            signature_value: &signature.value,
            issued: self.issued,
            updated: self.updated,
        })
    }

    /// Storage key of the user key, with fallbacks for missing ids.
    #[must_use]
    pub fn storage_key(&self, provider_fallback: &str, user_fallback: &str) -> StorageKey {
        StorageKey::new(
            self.provider().unwrap_or(provider_fallback),
            self.user_id().unwrap_or(user_fallback),
            self.id.as_str(),
        )
    }

    // ── State ────────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self) -> LicenseState {
        self.lock().state
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.state() >= LicenseState::Verified
    }

    /// The `decrypted` flag: a content key is available.
    #[must_use]
    pub fn is_decrypted(&self) -> bool {
        self.state() == LicenseState::Decrypted
    }

    #[must_use]
    pub fn status_document_state(&self) -> StatusDocumentState {
        self.lock().status_state
    }

    /// Last status document accepted for this license.
    #[must_use]
    pub fn status_document(&self) -> Option<StatusDocument> {
        self.lock().status_document.clone()
    }

    /// Decrypts a user field listed as encrypted (`name`, `email`). Returns
    /// plain fields as they are. Requires an unlocked license.
    pub fn user_field(&self, field: &str) -> LcpResult<Option<String>> {
        let Some(user) = self.document.user.as_ref() else {
            return Ok(None);
        };
        let value = match field {
            "id" => user.id.as_deref(),
            "email" => user.email.as_deref(),
            "name" => user.name.as_deref(),
            _ => None,
        };
        let Some(value) = value else {
            return Ok(None);
        };
        if !user.encrypted.iter().any(|name| name == field) {
            return Ok(Some(value.to_string()));
        }

        let user_key = self
            .lock()
            .user_key
            .clone()
            .ok_or_else(|| Status::from_code(StatusCode::LicenseNotDecrypted))?;
        decrypt_license_data(
            &self.profile,
            &user_key,
            value,
            &self.document.encryption.content_key.algorithm,
        )
        .map(Some)
    }

    pub(crate) fn mark_verified(&self) {
        let mut inner = self.lock();
        if inner.state < LicenseState::Verified {
            inner.state = LicenseState::Verified;
        }
    }

    /// Records a confirmed user key and moves to `Unlocked`.
    pub(crate) fn set_user_key(&self, user_key: UserKey) {
        let mut inner = self.lock();
        inner.user_key = Some(user_key);
        if inner.state < LicenseState::Unlocked {
            inner.state = LicenseState::Unlocked;
        }
    }

    /// Records the content key and moves to `Decrypted`.
    pub(crate) fn set_content_key(&self, content_key: ContentKey) {
        let mut inner = self.lock();
        inner.content_key = Some(content_key);
        inner.state = LicenseState::Decrypted;
    }

    pub(crate) fn content_key(&self) -> Option<ContentKey> {
        self.lock().content_key.clone()
    }

    pub(crate) fn set_status_state(&self, state: StatusDocumentState) {
        self.lock().status_state = state;
    }

    /// Moves to `ProcessingStarted` unless a run is already going.
    pub(crate) fn begin_status_processing(&self) -> bool {
        let mut inner = self.lock();
        if inner.status_state == StatusDocumentState::ProcessingStarted {
            return false;
        }
        inner.status_state = StatusDocumentState::ProcessingStarted;
        true
    }

    pub(crate) fn accept_status_document(&self, document: StatusDocument) {
        let mut inner = self.lock();
        inner.status_document = Some(document);
        inner.status_state = StatusDocumentState::Updated;
    }

    fn lock(&self) -> MutexGuard<'_, LicenseInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("License")
            .field("id", &self.id)
            .field("profile", &self.profile.name())
            .field("state", &self.state())
            .field("status_document_state", &self.status_document_state())
            .finish_non_exhaustive()
    }
}
