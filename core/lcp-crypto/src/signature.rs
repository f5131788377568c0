//! RSA PKCS#1 v1.5 signatures over SHA-256.

use crate::error::{CryptoError, CryptoResult};
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use sha2::Sha256;

/// Signature verification keyed by a public key.
pub trait SignatureAlgorithm: Send + Sync {
    /// Algorithm URI.
    fn name(&self) -> &'static str;

    /// Verifies `signature` over `data`.
    fn verify(&self, data: &[u8], signature: &[u8]) -> CryptoResult<()>;
}

/// RSA-SHA256 (`http://www.w3.org/2001/04/xmldsig-more#rsa-sha256`).
#[derive(Debug, Clone)]
pub struct RsaSha256 {
    key: VerifyingKey<Sha256>,
}

impl RsaSha256 {
    /// Builds a verifier from a DER `SubjectPublicKeyInfo`.
    pub fn from_public_key_der(spki_der: &[u8]) -> CryptoResult<Self> {
        let key = RsaPublicKey::from_public_key_der(spki_der)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
        Ok(Self::from_public_key(key))
    }

    #[must_use]
    pub fn from_public_key(key: RsaPublicKey) -> Self {
        Self {
            key: VerifyingKey::<Sha256>::new(key),
        }
    }
}

impl SignatureAlgorithm for RsaSha256 {
    fn name(&self) -> &'static str {
        crate::profile::RSA_SHA256_URI
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let signature =
            Signature::try_from(signature).map_err(|e| CryptoError::Signature(e.to_string()))?;
        self.key
            .verify(data, &signature)
            .map_err(|e| CryptoError::Signature(e.to_string()))
    }
}
