//! Key material.
//!
//! Both key kinds are 32-byte AES-256 keys that zeroize on drop and never
//! print their bytes.

use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of user and content keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

macro_rules! secret_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
        pub struct $name {
            bytes: [u8; KEY_SIZE],
        }

        impl $name {
            /// Wraps raw key bytes.
            #[must_use]
            pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
                Self { bytes }
            }

            /// Copies key bytes from a slice of exactly [`KEY_SIZE`] bytes.
            pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
                let bytes: [u8; KEY_SIZE] =
                    bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                        expected: KEY_SIZE,
                        actual: bytes.len(),
                    })?;
                Ok(Self { bytes })
            }

            /// Parses a lowercase or uppercase hex string.
            pub fn from_hex(encoded: &str) -> CryptoResult<Self> {
                let mut raw = hex::decode(encoded.trim())
                    .map_err(|e| CryptoError::Encoding(e.to_string()))?;
                let key = Self::from_slice(&raw);
                raw.zeroize();
                key
            }

            /// Lowercase hex encoding, as persisted by the storage provider.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.bytes)
            }

            #[must_use]
            pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
                &self.bytes
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("bytes", &"[REDACTED]")
                    .finish()
            }
        }
    };
}

secret_key!(
    /// Key derived from the user passphrase; unlocks the content key.
    UserKey
);

secret_key!(
    /// Key protecting publication resources.
    ContentKey
);

/// Generates a random content key (used when packaging test publications).
#[must_use]
pub fn generate_content_key() -> ContentKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    ContentKey::from_bytes(bytes)
}
