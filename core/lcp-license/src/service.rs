//! License orchestration.
//!
//! [`LicenseService`] drives each license through
//! `Opened → Verified → Unlocked → Decrypted`, keeps the registry of opened
//! licenses and owns the revocation manager shared by every verification.
//! Collaborators come in through [`ServiceContext`]; nothing is global.

use crate::config::ServiceConfig;
use crate::device::DeviceIdentity;
use crate::error::LicenseError;
use crate::license::License;
use crate::status_document::{
    LICENSE_LINK, STATUS_LINK, StatusDocument, StatusDocumentState, expand_template, hash_matches,
};
use lcp_crypto::{
    ContentKey, DecryptingStream, ProfileRegistry, UserKey, decrypt_content_key, decrypt_data,
    decrypt_data_vec, decrypt_user_key, hash_stream, plain_text_size, verify_user_key,
};
use lcp_trust::{RevocationManager, TrustVerifier};
use lcp_types::{
    LcpResult, NetProvider, PendingDownload, Status, StatusCode, StorageKey, StorageProvider,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Collaborators and settings handed to a [`LicenseService`].
pub struct ServiceContext {
    pub config: ServiceConfig,
    pub net: Arc<dyn NetProvider>,
    pub storage: Arc<dyn StorageProvider>,
}

impl ServiceContext {
    pub fn new(
        config: ServiceConfig,
        net: Arc<dyn NetProvider>,
        storage: Arc<dyn StorageProvider>,
    ) -> Self {
        Self {
            config,
            net,
            storage,
        }
    }
}

/// One status document run: the download in flight and whether a cancel
/// arrived for it.
#[derive(Default)]
struct StatusRequest {
    current: Option<Arc<PendingDownload>>,
    canceled: bool,
}

pub struct LicenseService {
    config: ServiceConfig,
    net: Arc<dyn NetProvider>,
    storage: Arc<dyn StorageProvider>,
    profiles: ProfileRegistry,
    trust: LcpResult<TrustVerifier>,
    revocation: RevocationManager,
    device: DeviceIdentity,
    licenses: Mutex<HashMap<String, Arc<License>>>,
    status_requests: Mutex<HashMap<u64, StatusRequest>>,
    next_status_request: AtomicU64,
}

#[derive(Deserialize)]
struct LicenseId {
    id: String,
}

impl LicenseService {
    pub fn new(context: ServiceContext) -> Self {
        let ServiceContext {
            config,
            net,
            storage,
        } = context;

        let trust = TrustVerifier::new(config.root_certificate.as_deref().unwrap_or_default());
        if let Err(status) = &trust {
            warn!(error = %status, "root certificate unusable, licenses will not verify");
        }
        let revocation = RevocationManager::new(
            Arc::clone(&net),
            config.default_crl_url.as_deref(),
            config.crl_fallback_interval(),
        );
        let device = DeviceIdentity::current(config.device_name.as_deref());

        Self {
            config,
            net,
            storage,
            profiles: ProfileRegistry::new(),
            trust,
            revocation,
            device,
            licenses: Mutex::new(HashMap::new()),
            status_requests: Mutex::new(HashMap::new()),
            next_status_request: AtomicU64::new(0),
        }
    }

    /// Replaces the device identity reported to status document servers.
    #[must_use]
    pub fn with_device(mut self, device: DeviceIdentity) -> Self {
        self.device = device;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    #[must_use]
    pub fn root_certificate(&self) -> Option<&str> {
        self.config.root_certificate.as_deref()
    }

    #[must_use]
    pub fn net(&self) -> &Arc<dyn NetProvider> {
        &self.net
    }

    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageProvider> {
        &self.storage
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileRegistry {
        &self.profiles
    }

    #[must_use]
    pub fn revocation(&self) -> &RevocationManager {
        &self.revocation
    }

    #[must_use]
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    // ── Registry ─────────────────────────────────────────────────

    /// Opens a license, returning the cached instance when one with the
    /// same id is already registered.
    pub fn open_license(&self, raw_json: &str) -> LcpResult<Arc<License>> {
        let LicenseId { id } = serde_json::from_str(raw_json)
            .map_err(|e| LicenseError::InvalidDocument(e.to_string()).into_status())?;
        if let Some(found) = self.find_license(&id) {
            debug!(license_id = %id, "license already open");
            return Ok(found);
        }

        let parsed = Arc::new(License::parse(raw_json, &self.profiles)?);
        let mut licenses = self.lock_licenses();
        let license = licenses.entry(id).or_insert_with(|| {
            info!(license_id = %parsed.id(), profile = %parsed.profile().name(), "license opened");
            Arc::clone(&parsed)
        });
        Ok(Arc::clone(license))
    }

    #[must_use]
    pub fn find_license(&self, id: &str) -> Option<Arc<License>> {
        self.lock_licenses().get(id).cloned()
    }

    /// Drops a license from the registry. Returns false if it was not open.
    pub fn discard_license(&self, id: &str) -> bool {
        let removed = self.lock_licenses().remove(id).is_some();
        if removed {
            debug!(license_id = %id, "license discarded");
        }
        removed
    }

    #[must_use]
    pub fn licenses(&self) -> Vec<Arc<License>> {
        self.lock_licenses().values().cloned().collect()
    }

    // ── Verification ─────────────────────────────────────────────

    /// Checks chain, revocation, signature and dates. Failure leaves the
    /// license `Opened`.
    pub fn verify_license(&self, license: &License) -> LcpResult<()> {
        if license.is_verified() {
            return Ok(());
        }
        let trust = self.trust.as_ref().map_err(Clone::clone)?;
        let view = license.trust_view()?;

        match trust.verify(&view, license.canonical().as_bytes(), Some(&self.revocation)) {
            Ok(provider) => {
                info!(
                    license_id = %license.id(),
                    provider_serial = %provider.serial_number(),
                    "license verified"
                );
                license.mark_verified();
                Ok(())
            }
            Err(status) => {
                warn!(
                    license_id = %license.id(),
                    code = status.code.as_str(),
                    "license verification failed"
                );
                Err(status)
            }
        }
    }

    // ── Unlocking ────────────────────────────────────────────────

    /// Unlocks a verified license with the user passphrase and remembers
    /// the passphrase hash in storage.
    pub fn decrypt_license(&self, license: &License, passphrase: &str) -> LcpResult<()> {
        if !self.ready_to_unlock(license)? {
            return Ok(());
        }
        let (key_check, algorithm) = key_check(license)?;
        let (passphrase_hash, user_key) =
            decrypt_user_key(license.profile(), passphrase, license.id(), key_check, algorithm)?;
        self.unlock(license, user_key)?;
        self.store_user_key(&self.storage_key(license), &passphrase_hash);
        Ok(())
    }

    /// Unlocks a verified license with a passphrase hash obtained elsewhere.
    /// The key check still has to pass.
    pub fn add_user_key(&self, license: &License, passphrase_hash: &UserKey) -> LcpResult<()> {
        if !self.ready_to_unlock(license)? {
            return Ok(());
        }
        let user_key = self.confirm_user_key(license, passphrase_hash)?;
        self.unlock(license, user_key)?;
        self.store_user_key(&self.storage_key(license), passphrase_hash);
        Ok(())
    }

    /// Remembers a passphrase hash for every license of one user.
    pub fn add_user_key_for_user(
        &self,
        provider_id: &str,
        user_id: &str,
        passphrase_hash: &UserKey,
    ) {
        self.store_user_key(&StorageKey::new(provider_id, user_id, ""), passphrase_hash);
    }

    /// Unlocks a verified license with a passphrase hash remembered in
    /// storage, first for this license, then for its user.
    pub fn decrypt_license_from_storage(&self, license: &License) -> LcpResult<()> {
        if !self.ready_to_unlock(license)? {
            return Ok(());
        }
        let exact = self.storage_key(license);
        let per_user = StorageKey::new(exact.provider_id.as_str(), exact.user_id.as_str(), "");

        for key in [exact, per_user] {
            let Some(stored) = self.storage.get(&key) else {
                continue;
            };
            let passphrase_hash = match UserKey::from_hex(&stored) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(storage_key = %key, error = %e, "stored user key unreadable");
                    continue;
                }
            };
            match self.confirm_user_key(license, &passphrase_hash) {
                Ok(user_key) => {
                    debug!(storage_key = %key, "stored user key accepted");
                    return self.unlock(license, user_key);
                }
                Err(status) => debug!(
                    storage_key = %key,
                    code = status.code.as_str(),
                    "stored user key rejected"
                ),
            }
        }
        Err(Status::new(
            StatusCode::UserPassphraseNotValid,
            "no stored user key unlocks the license",
        ))
    }

    /// Common preconditions; `Ok(false)` means already decrypted.
    fn ready_to_unlock(&self, license: &License) -> LcpResult<bool> {
        check_status_gate(license)?;
        if !license.is_verified() {
            return Err(Status::from_code(StatusCode::LicenseNotVerified));
        }
        Ok(!license.is_decrypted())
    }

    fn confirm_user_key(&self, license: &License, passphrase_hash: &UserKey) -> LcpResult<UserKey> {
        let (key_check, algorithm) = key_check(license)?;
        verify_user_key(license.profile(), passphrase_hash, license.id(), key_check, algorithm)
    }

    fn unlock(&self, license: &License, user_key: UserKey) -> LcpResult<()> {
        let content_key_info = &license.document().encryption.content_key;
        let content_key = decrypt_content_key(
            license.profile(),
            &user_key,
            &content_key_info.encrypted_value,
            &content_key_info.algorithm,
        );
        license.set_user_key(user_key);
        license.set_content_key(content_key?);
        info!(license_id = %license.id(), "license decrypted");
        Ok(())
    }

    fn storage_key(&self, license: &License) -> StorageKey {
        license.storage_key(&self.config.provider_id_fallback, &self.config.user_id_fallback)
    }

    fn store_user_key(&self, key: &StorageKey, passphrase_hash: &UserKey) {
        self.storage.put(key, &passphrase_hash.to_hex());
        debug!(storage_key = %key, "user key stored");
    }

    // ── Publication data ─────────────────────────────────────────

    /// Decrypts one resource into a fresh buffer.
    pub fn decrypt_data(
        &self,
        license: &License,
        data: &[u8],
        algorithm: &str,
    ) -> LcpResult<Vec<u8>> {
        let content_key = self.content_key(license)?;
        decrypt_data_vec(license.profile(), &content_key, algorithm, data)
    }

    /// Decrypts one resource into `out`, returning the plaintext length.
    pub fn decrypt_data_into(
        &self,
        license: &License,
        data: &[u8],
        out: &mut [u8],
        algorithm: &str,
    ) -> LcpResult<usize> {
        let content_key = self.content_key(license)?;
        decrypt_data(license.profile(), &content_key, algorithm, data, out)
    }

    /// Wraps an encrypted resource in a sequential decrypting reader.
    pub fn create_encrypted_data_stream<R: Read>(
        &self,
        license: &License,
        stream: R,
        algorithm: &str,
    ) -> LcpResult<DecryptingStream<R>> {
        let content_key = self.content_key(license)?;
        DecryptingStream::new(&content_key, algorithm, stream)
            .map_err(|e| e.into_status(StatusCode::PublicationEncrypted))
    }

    /// Exact plaintext length of a seekable encrypted resource. The source
    /// position is left where it was.
    pub fn plain_text_size<S: Read + Seek + ?Sized>(
        &self,
        license: &License,
        source: &mut S,
    ) -> LcpResult<u64> {
        let content_key = self.content_key(license)?;
        plain_text_size(&content_key, source)
            .map_err(|e| e.into_status(StatusCode::PublicationEncrypted))
    }

    /// SHA-256 of a whole stream.
    pub fn calculate_file_hash<R: Read + ?Sized>(&self, stream: &mut R) -> LcpResult<[u8; 32]> {
        hash_stream(stream).map_err(|e| e.into_status(StatusCode::CommonError))
    }

    fn content_key(&self, license: &License) -> LcpResult<ContentKey> {
        check_status_gate(license)?;
        license
            .content_key()
            .ok_or_else(|| Status::from_code(StatusCode::LicenseNotDecrypted))
    }

    // ── Status document ──────────────────────────────────────────

    /// Fetches and applies the license status document.
    ///
    /// Returns the fresh license when the server holds a newer one; it
    /// replaces the old one in the registry and must be verified again.
    /// Licenses without a status link are left `NotChecked`.
    pub fn process_status_document(
        &self,
        license: &Arc<License>,
    ) -> LcpResult<Option<Arc<License>>> {
        let Some(link) = license.links().get(STATUS_LINK).cloned() else {
            debug!(license_id = %license.id(), "license has no status document");
            return Ok(None);
        };
        if !license.begin_status_processing() {
            return Err(Status::from_code(StatusCode::StatusDocumentProcessing));
        }

        let token = self.next_status_request.fetch_add(1, Ordering::Relaxed);
        self.lock_status_requests().insert(token, StatusRequest::default());
        let url = if link.templated {
            expand_template(&link.href, &self.device.template_vars())
        } else {
            link.href.clone()
        };
        info!(license_id = %license.id(), url = %url, "status document processing started");

        let result = self.apply_status_document(token, license, &url, link.hash.as_deref());
        self.lock_status_requests().remove(&token);
        result.inspect_err(|status| {
            let state = if status.code == StatusCode::RequestCanceled {
                StatusDocumentState::Cancelled
            } else {
                StatusDocumentState::CheckFailed
            };
            warn!(
                license_id = %license.id(),
                error = %status,
                ?state,
                "status document processing stopped"
            );
            license.set_status_state(state);
        })
    }

    /// Cancels every status document run in flight.
    pub fn cancel_status_document_processing(&self) {
        let mut requests = self.lock_status_requests();
        for request in requests.values_mut() {
            request.canceled = true;
            if let Some(pending) = request.current.take() {
                info!(url = %pending.request().url(), "canceling status document request");
                pending.cancel();
            }
        }
    }

    fn apply_status_document(
        &self,
        token: u64,
        license: &Arc<License>,
        url: &str,
        expected_hash: Option<&str>,
    ) -> LcpResult<Option<Arc<License>>> {
        let body = self.download(token, url)?;
        if let Some(expected) = expected_hash {
            if !hash_matches(&body, expected) {
                return Err(Status::new(
                    StatusCode::StatusDocumentNotValid,
                    "status document hash mismatch",
                ));
            }
        }
        let document = StatusDocument::from_json(&body).map_err(LicenseError::into_status)?;
        if document.id != license.id() {
            return Err(Status::new(
                StatusCode::StatusDocumentNotValid,
                format!("status document describes license {}", document.id),
            ));
        }
        if !document.status.is_usable() {
            warn!(
                license_id = %license.id(),
                status = %document.status,
                "license no longer usable"
            );
        }

        let license_updated = document
            .license_updated_at()
            .map_err(|e| Status::with_context(StatusCode::StatusDocumentNotValid, e))?;
        let fresh_link = document.links.get(LICENSE_LINK).cloned();

        let fresh = match fresh_link {
            Some(link) if license_updated > license.effective_date() => {
                Some(self.fetch_fresh_license(token, license, &link.href, &document)?)
            }
            _ => None,
        };
        license.accept_status_document(document);
        info!(license_id = %license.id(), updated = fresh.is_some(), "status document applied");
        Ok(fresh)
    }

    fn fetch_fresh_license(
        &self,
        token: u64,
        license: &License,
        url: &str,
        document: &StatusDocument,
    ) -> LcpResult<Arc<License>> {
        info!(license_id = %license.id(), url = %url, "fetching updated license");
        let raw = String::from_utf8(self.download(token, url)?)
            .map_err(|e| Status::with_context(StatusCode::LicenseMalformed, e))?;
        let fresh = License::parse(&raw, &self.profiles)?;
        if fresh.id() != license.id() {
            return Err(Status::new(
                StatusCode::StatusDocumentNotValid,
                format!("updated license has id {}", fresh.id()),
            ));
        }
        fresh.accept_status_document(document.clone());

        let fresh = Arc::new(fresh);
        self.lock_licenses()
            .insert(fresh.id().to_string(), Arc::clone(&fresh));
        Ok(fresh)
    }

    /// Runs one download on behalf of status run `token`.
    fn download(&self, token: u64, url: &str) -> LcpResult<Vec<u8>> {
        let pending = PendingDownload::new(url);
        {
            let mut requests = self.lock_status_requests();
            let request = requests.entry(token).or_default();
            if request.canceled {
                return Err(Status::from_code(StatusCode::RequestCanceled));
            }
            request.current = Some(Arc::clone(&pending));
        }
        pending.start(self.net.as_ref());
        let result = pending.wait();

        if let Some(request) = self.lock_status_requests().get_mut(&token) {
            if request
                .current
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &pending))
            {
                request.current = None;
            }
        }

        result?;
        Ok(pending.take_body())
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Stops background revocation polling and cancels pending requests.
    pub fn shutdown(&self) {
        self.cancel_status_document_processing();
        self.revocation.shutdown();
        info!("license service shut down");
    }

    fn lock_licenses(&self) -> MutexGuard<'_, HashMap<String, Arc<License>>> {
        self.licenses.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_status_requests(&self) -> MutexGuard<'_, HashMap<u64, StatusRequest>> {
        self.status_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LicenseService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseService")
            .field("config", &self.config)
            .field("device", &self.device)
            .field("licenses", &self.lock_licenses().len())
            .finish_non_exhaustive()
    }
}

/// Key check ciphertext and the cipher that opens it. The user key
/// algorithm must be the profile's passphrase hash.
fn key_check(license: &License) -> LcpResult<(&str, &str)> {
    let encryption = &license.document().encryption;
    let hash = license.profile().user_key_hash();
    if encryption.user_key.algorithm != hash.name() {
        return Err(Status::with_context(
            StatusCode::EncryptionProfileNotFound,
            format!("user key algorithm {}", encryption.user_key.algorithm),
        ));
    }
    Ok((
        encryption.user_key.key_check.as_str(),
        encryption.content_key.algorithm.as_str(),
    ))
}

/// Refuses use of a license while its status document is being processed
/// or after the server reported it unusable.
fn check_status_gate(license: &License) -> LcpResult<()> {
    if license.status_document_state() == StatusDocumentState::ProcessingStarted {
        return Err(Status::from_code(StatusCode::StatusDocumentProcessing));
    }
    if let Some(document) = license.status_document() {
        if !document.status.is_usable() {
            return Err(Status::with_context(
                StatusCode::LicenseStatusRejected,
                document.status,
            ));
        }
    }
    Ok(())
}
