//! User key derivation and license-level decryption.
//!
//! The passphrase hash (`SHA256(passphrase)`) is what applications store
//! and hand back through `add_user_key`. The profile transform of that hash
//! is the key that opens the key check and the content key.

use crate::cipher::SymmetricAlgorithm;
use crate::error::CryptoError;
use crate::key::{ContentKey, KEY_SIZE, UserKey};
use crate::profile::EncryptionProfile;
use lcp_types::{LcpResult, Status, StatusCode};
use tracing::debug;
use zeroize::Zeroizing;

/// Hashes a passphrase with the profile's user key hash.
pub fn hash_passphrase(profile: &EncryptionProfile, passphrase: &str) -> LcpResult<UserKey> {
    let mut hasher = profile.user_key_hash();
    hasher.update(passphrase.as_bytes());
    let digest = Zeroizing::new(hasher.finalize());
    UserKey::from_slice(&digest).map_err(|e| e.into_status(StatusCode::UserPassphraseNotValid))
}

/// Derives the user key from a passphrase and checks it against the license.
///
/// Returns `(passphrase_hash, user_key)`: the first is what gets stored,
/// the second unlocks the content key.
pub fn decrypt_user_key(
    profile: &EncryptionProfile,
    passphrase: &str,
    license_id: &str,
    key_check: &str,
    algorithm: &str,
) -> LcpResult<(UserKey, UserKey)> {
    let hash = hash_passphrase(profile, passphrase)?;
    let user_key = verify_user_key(profile, &hash, license_id, key_check, algorithm)?;
    Ok((hash, user_key))
}

/// Applies the profile transform to a passphrase hash and verifies that the
/// result decrypts `key_check` to `license_id`.
pub fn verify_user_key(
    profile: &EncryptionProfile,
    passphrase_hash: &UserKey,
    license_id: &str,
    key_check: &str,
    algorithm: &str,
) -> LcpResult<UserKey> {
    let user_key = UserKey::from_bytes(profile.transform_user_key(passphrase_hash.as_bytes()));
    let cipher = profile
        .content_key_algorithm(user_key.as_bytes(), algorithm)
        .map_err(|e| e.into_status(StatusCode::UserPassphraseNotValid))?;

    let decoded = cipher
        .decrypt_base64(key_check)
        .map_err(|e| e.into_status(StatusCode::UserPassphraseNotValid))?;

    if decoded != license_id.as_bytes() {
        debug!(license_id, "key check mismatch");
        return Err(Status::from_code(StatusCode::UserPassphraseNotValid));
    }
    Ok(user_key)
}

/// Decrypts the license content key with the (transformed) user key.
pub fn decrypt_content_key(
    profile: &EncryptionProfile,
    user_key: &UserKey,
    encrypted_content_key: &str,
    algorithm: &str,
) -> LcpResult<ContentKey> {
    let cipher = profile
        .content_key_algorithm(user_key.as_bytes(), algorithm)
        .map_err(|e| e.into_status(StatusCode::LicenseEncrypted))?;
    let raw = Zeroizing::new(
        cipher
            .decrypt_base64(encrypted_content_key)
            .map_err(|e| e.into_status(StatusCode::LicenseEncrypted))?,
    );
    if raw.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: raw.len(),
        }
        .into_status(StatusCode::LicenseEncrypted));
    }
    ContentKey::from_slice(&raw).map_err(|e| e.into_status(StatusCode::LicenseEncrypted))
}

/// Decrypts a base64 license field (user name, email) with the user key.
pub fn decrypt_license_data(
    profile: &EncryptionProfile,
    user_key: &UserKey,
    data: &str,
    algorithm: &str,
) -> LcpResult<String> {
    let cipher = profile
        .content_key_algorithm(user_key.as_bytes(), algorithm)
        .map_err(|e| e.into_status(StatusCode::LicenseEncrypted))?;
    let plain = cipher
        .decrypt_base64(data)
        .map_err(|e| e.into_status(StatusCode::LicenseEncrypted))?;
    String::from_utf8(plain).map_err(|e| Status::with_context(StatusCode::LicenseEncrypted, e))
}

/// Decrypts one publication resource into `out`, returning the plaintext length.
pub fn decrypt_data(
    profile: &EncryptionProfile,
    content_key: &ContentKey,
    algorithm: &str,
    data: &[u8],
    out: &mut [u8],
) -> LcpResult<usize> {
    publication_cipher(profile, content_key, algorithm)?
        .decrypt_into(data, out)
        .map_err(|e| e.into_status(StatusCode::PublicationEncrypted))
}

/// Decrypts one publication resource into a fresh buffer.
pub fn decrypt_data_vec(
    profile: &EncryptionProfile,
    content_key: &ContentKey,
    algorithm: &str,
    data: &[u8],
) -> LcpResult<Vec<u8>> {
    publication_cipher(profile, content_key, algorithm)?
        .decrypt(data)
        .map_err(|e| e.into_status(StatusCode::PublicationEncrypted))
}

fn publication_cipher(
    profile: &EncryptionProfile,
    content_key: &ContentKey,
    algorithm: &str,
) -> LcpResult<Box<dyn SymmetricAlgorithm>> {
    profile
        .publication_algorithm(content_key.as_bytes(), algorithm)
        .map_err(|e| e.into_status(StatusCode::PublicationEncrypted))
}
