//! Hash algorithms and whole-stream hashing.

use crate::error::{CryptoError, CryptoResult};
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read};

/// Chunk size used when hashing streams.
pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;

/// Incremental hash.
pub trait HashAlgorithm: Send {
    /// Algorithm URI.
    fn name(&self) -> &'static str;
    fn digest_size(&self) -> usize;
    fn update(&mut self, data: &[u8]);
    /// Returns the digest and resets the state.
    fn finalize(&mut self) -> Vec<u8>;
}

/// SHA-256 (`http://www.w3.org/2001/04/xmlenc#sha256`).
#[derive(Default, Clone)]
pub struct Sha256Hash {
    inner: Sha256,
}

impl Sha256Hash {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HashAlgorithm for Sha256Hash {
    fn name(&self) -> &'static str {
        crate::profile::SHA256_URI
    }

    fn digest_size(&self) -> usize {
        32
    }

    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    fn finalize(&mut self) -> Vec<u8> {
        self.inner.finalize_reset().to_vec()
    }
}

/// One-shot SHA-256.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// SHA-256 of everything `stream` yields, read in [`HASH_CHUNK_SIZE`] chunks
/// into a single reused buffer.
pub fn hash_stream<R: Read + ?Sized>(stream: &mut R) -> CryptoResult<[u8; 32]> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let read = match stream.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().into())
}

/// Lowercase hex encoding of raw bytes.
#[must_use]
pub fn to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Decodes a hex string to raw bytes.
pub fn from_hex(encoded: &str) -> CryptoResult<Vec<u8>> {
    hex::decode(encoded.trim()).map_err(|e| CryptoError::Encoding(e.to_string()))
}
