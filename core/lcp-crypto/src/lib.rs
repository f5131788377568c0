//! Cryptography for LCP licenses.
//!
//! - Algorithm families: SHA-256 hashing, AES-256-CBC decryption
//!   (IV-prefixed, PKCS#7) and RSA-SHA256 signature verification
//! - Encryption profiles (basic and 1.0) and their user key transforms
//! - User key derivation, key check verification, content key decryption
//! - Buffer and streaming decryption of publication resources
//!
//! Failures inside this crate are [`CryptoError`]s; the functions in
//! [`derivation`] map them to the `Status` taxonomy at the public boundary.

mod cipher;
pub mod derivation;
mod error;
mod hash;
mod key;
mod profile;
mod signature;
mod stream;

pub use cipher::{Aes256Cbc, BLOCK_SIZE, SymmetricAlgorithm};
pub use derivation::{
    decrypt_content_key, decrypt_data, decrypt_data_vec, decrypt_license_data, decrypt_user_key,
    hash_passphrase, verify_user_key,
};
pub use error::{CryptoError, CryptoResult};
pub use hash::{HASH_CHUNK_SIZE, HashAlgorithm, Sha256Hash, from_hex, hash_stream, sha256, to_hex};
pub use key::{ContentKey, KEY_SIZE, UserKey, generate_content_key};
pub use profile::{
    AES256_CBC_URI, BASIC_PROFILE, EncryptionProfile, LEGACY_PROFILE, ProfileRegistry,
    RSA_SHA256_URI, SHA256_URI, UserKeyTransform, legacy_transform,
};
pub use signature::{RsaSha256, SignatureAlgorithm};
pub use stream::{DecryptingStream, max_plain_text_size, plain_text_size};
