//! Encryption profiles.
//!
//! A profile names the algorithm set a license was issued with and the
//! transform applied to the passphrase hash before it is used as a key.
//! Profiles are looked up by the `encryption.profile` URI of the license.

use crate::cipher::{Aes256Cbc, SymmetricAlgorithm};
use crate::error::{CryptoError, CryptoResult};
use crate::hash::{HashAlgorithm, Sha256Hash, sha256};
use crate::key::KEY_SIZE;
use crate::signature::{RsaSha256, SignatureAlgorithm};
use std::collections::HashMap;

// ── Identifiers ──────────────────────────────────────────────────

pub const BASIC_PROFILE: &str = "http://readium.org/lcp/basic-profile";
pub const LEGACY_PROFILE: &str = "http://readium.org/lcp/profile-1.0";

pub const SHA256_URI: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const AES256_CBC_URI: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";
pub const RSA_SHA256_URI: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

// ── User key transforms ──────────────────────────────────────────

/// Transform from the passphrase hash to the key that opens the key check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserKeyTransform {
    Identity,
    /// Profile 1.0: 64 rounds of `SHA256(state || byte)`.
    Legacy,
}

impl UserKeyTransform {
    #[must_use]
    pub fn apply(&self, hash: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
        match self {
            Self::Identity => *hash,
            Self::Legacy => legacy_transform(hash),
        }
    }
}

/// Salt byte mixed in at round `n` of the profile 1.0 transform.
fn legacy_round_byte(n: u32) -> u8 {
    let n = f64::from(n);
    let wobble = ((n * 1000.0).cos() * (n * 2000.0).sqrt()).trunc() as i64;
    ((n as i64 * 500 + wobble).rem_euclid(255)) as u8
}

/// Profile 1.0 user key transform.
#[must_use]
pub fn legacy_transform(hash: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut state = *hash;
    let mut input = [0u8; KEY_SIZE + 1];
    for n in (1..=64).rev() {
        input[..KEY_SIZE].copy_from_slice(&state);
        input[KEY_SIZE] = legacy_round_byte(n);
        state = sha256(&input);
    }
    state
}

// ── Profiles ─────────────────────────────────────────────────────

/// Named algorithm set plus user key transform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionProfile {
    name: String,
    transform: UserKeyTransform,
}

impl EncryptionProfile {
    pub fn new(name: impl Into<String>, transform: UserKeyTransform) -> Self {
        Self {
            name: name.into(),
            transform,
        }
    }

    #[must_use]
    pub fn basic() -> Self {
        Self::new(BASIC_PROFILE, UserKeyTransform::Identity)
    }

    #[must_use]
    pub fn legacy() -> Self {
        Self::new(LEGACY_PROFILE, UserKeyTransform::Legacy)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn transform(&self) -> UserKeyTransform {
        self.transform
    }

    /// Hash applied to the passphrase.
    #[must_use]
    pub fn user_key_hash(&self) -> Box<dyn HashAlgorithm> {
        Box::new(Sha256Hash::new())
    }

    /// Applies the profile transform to a passphrase hash.
    #[must_use]
    pub fn transform_user_key(&self, hash: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
        self.transform.apply(hash)
    }

    /// Cipher for license-level values, keyed with the user key.
    pub fn content_key_algorithm(
        &self,
        key: &[u8],
        algorithm: &str,
    ) -> CryptoResult<Box<dyn SymmetricAlgorithm>> {
        symmetric(key, algorithm)
    }

    /// Cipher for publication resources, keyed with the content key.
    pub fn publication_algorithm(
        &self,
        key: &[u8],
        algorithm: &str,
    ) -> CryptoResult<Box<dyn SymmetricAlgorithm>> {
        symmetric(key, algorithm)
    }

    /// Verifier for the license signature.
    pub fn signature_algorithm(
        &self,
        spki_der: &[u8],
        algorithm: &str,
    ) -> CryptoResult<Box<dyn SignatureAlgorithm>> {
        match algorithm {
            RSA_SHA256_URI => Ok(Box::new(RsaSha256::from_public_key_der(spki_der)?)),
            other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

fn symmetric(key: &[u8], algorithm: &str) -> CryptoResult<Box<dyn SymmetricAlgorithm>> {
    match algorithm {
        AES256_CBC_URI => Ok(Box::new(Aes256Cbc::new(key)?)),
        other => Err(CryptoError::UnsupportedAlgorithm(other.to_string())),
    }
}

/// Profile lookup by name or short alias.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, EncryptionProfile>,
    aliases: HashMap<String, String>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(EncryptionProfile::basic());
        registry.register(EncryptionProfile::legacy());
        registry.alias("basic", BASIC_PROFILE);
        registry.alias("1.0", LEGACY_PROFILE);
        registry
    }
}

impl ProfileRegistry {
    /// Registry with the basic and 1.0 profiles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            profiles: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn register(&mut self, profile: EncryptionProfile) {
        self.profiles.insert(profile.name().to_string(), profile);
    }

    pub fn alias(&mut self, alias: impl Into<String>, name: impl Into<String>) {
        self.aliases.insert(alias.into(), name.into());
    }

    #[must_use]
    pub fn find(&self, name: &str) -> Option<&EncryptionProfile> {
        let name = self.aliases.get(name).map_or(name, String::as_str);
        self.profiles.get(name)
    }

    /// Like [`find`](Self::find) but fails with `UnknownProfile`.
    pub fn get(&self, name: &str) -> CryptoResult<&EncryptionProfile> {
        self.find(name)
            .ok_or_else(|| CryptoError::UnknownProfile(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_round_bytes() {
        let bytes: Vec<u8> = (1..=64).rev().map(legacy_round_byte).collect();
        assert_eq!(&bytes[..8], &[179, 160, 124, 77, 66, 136, 14, 105]);
        assert_eq!(&bytes[56..], &[183, 31, 39, 220, 150, 150, 212, 15]);
    }
}
