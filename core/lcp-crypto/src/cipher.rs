//! AES-256-CBC decryption.
//!
//! LCP ciphertexts carry their IV as the first block and use PKCS#7 padding,
//! for both the license-level values (content key, key check, user fields)
//! and publication resources.

use crate::error::{CryptoError, CryptoResult};
use crate::key::KEY_SIZE;
use aes::Aes256;
use base64::{Engine, engine::general_purpose::STANDARD};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use zeroize::Zeroizing;

/// AES block size; also the IV size.
pub const BLOCK_SIZE: usize = 16;

pub(crate) type CbcDecryptor = cbc::Decryptor<Aes256>;
type CbcEncryptor = cbc::Encryptor<Aes256>;

/// Symmetric decryption keyed at construction.
pub trait SymmetricAlgorithm: Send + Sync {
    /// Algorithm URI.
    fn name(&self) -> &'static str;

    /// Decrypts `IV || ciphertext` and strips the padding.
    fn decrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>>;

    /// Decodes base64 then decrypts.
    fn decrypt_base64(&self, encoded: &str) -> CryptoResult<Vec<u8>> {
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        self.decrypt(&data)
    }

    /// Decrypts into `out`, returning the plaintext length.
    fn decrypt_into(&self, data: &[u8], out: &mut [u8]) -> CryptoResult<usize>;

    /// Plaintext length of `data`, decrypting only the final block.
    fn plain_text_size(&self, data: &[u8]) -> CryptoResult<usize>;
}

/// AES-256-CBC (`http://www.w3.org/2001/04/xmlenc#aes256-cbc`).
#[derive(Clone)]
pub struct Aes256Cbc {
    key: Zeroizing<[u8; KEY_SIZE]>,
}

impl std::fmt::Debug for Aes256Cbc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aes256Cbc")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl Aes256Cbc {
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        let key: [u8; KEY_SIZE] = key.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: key.len(),
        })?;
        Ok(Self {
            key: Zeroizing::new(key),
        })
    }

    /// Checks that `data` holds an IV plus at least one whole block.
    pub fn check_length(len: usize) -> CryptoResult<()> {
        if len < 2 * BLOCK_SIZE || len % BLOCK_SIZE != 0 {
            return Err(CryptoError::InvalidCiphertextLength(len));
        }
        Ok(())
    }

    pub(crate) fn decryptor(&self, iv: &[u8]) -> CryptoResult<CbcDecryptor> {
        CbcDecryptor::new_from_slices(self.key.as_slice(), iv)
            .map_err(|e| CryptoError::Decryption(e.to_string()))
    }

    /// Number of padding bytes, given the last two ciphertext blocks.
    ///
    /// In CBC the penultimate block is the IV of the last one, so the final
    /// plaintext block can be recovered without touching the rest.
    pub fn padding_len(&self, tail: &[u8; 2 * BLOCK_SIZE]) -> CryptoResult<usize> {
        let (iv, last) = tail.split_at(BLOCK_SIZE);
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(last);
        self.decryptor(iv)?
            .decrypt_block_mut(GenericArray::from_mut_slice(&mut block));
        pkcs7_padding_len(&block)
    }

    /// Encrypts under a random IV, producing `IV || ciphertext`.
    #[must_use]
    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut iv = [0u8; BLOCK_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut iv);
        self.encrypt_with_iv(&iv, plaintext)
    }

    /// Encrypts under a caller-chosen IV, producing `IV || ciphertext`.
    #[must_use]
    pub fn encrypt_with_iv(&self, iv: &[u8; BLOCK_SIZE], plaintext: &[u8]) -> Vec<u8> {
        let encryptor = CbcEncryptor::new(
            GenericArray::from_slice(self.key.as_slice()),
            GenericArray::from_slice(iv),
        );
        let mut out = Vec::with_capacity(BLOCK_SIZE + plaintext.len() + BLOCK_SIZE);
        out.extend_from_slice(iv);
        out.extend_from_slice(&encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext));
        out
    }

    /// Encrypts and base64-encodes, as license fields are stored.
    #[must_use]
    pub fn encrypt_base64(&self, plaintext: &[u8]) -> String {
        STANDARD.encode(self.encrypt(plaintext))
    }
}

impl SymmetricAlgorithm for Aes256Cbc {
    fn name(&self) -> &'static str {
        crate::profile::AES256_CBC_URI
    }

    fn decrypt(&self, data: &[u8]) -> CryptoResult<Vec<u8>> {
        Self::check_length(data.len())?;
        let (iv, body) = data.split_at(BLOCK_SIZE);
        self.decryptor(iv)?
            .decrypt_padded_vec_mut::<Pkcs7>(body)
            .map_err(|_| CryptoError::Decryption("invalid padding".to_string()))
    }

    fn decrypt_into(&self, data: &[u8], out: &mut [u8]) -> CryptoResult<usize> {
        Self::check_length(data.len())?;
        let (iv, body) = data.split_at(BLOCK_SIZE);
        if out.len() < body.len() {
            return Err(CryptoError::BufferTooSmall {
                needed: body.len(),
                available: out.len(),
            });
        }
        let plain = self
            .decryptor(iv)?
            .decrypt_padded_b2b_mut::<Pkcs7>(body, &mut out[..body.len()])
            .map_err(|_| CryptoError::Decryption("invalid padding".to_string()))?;
        Ok(plain.len())
    }

    fn plain_text_size(&self, data: &[u8]) -> CryptoResult<usize> {
        Self::check_length(data.len())?;
        let mut tail = [0u8; 2 * BLOCK_SIZE];
        tail.copy_from_slice(&data[data.len() - 2 * BLOCK_SIZE..]);
        let padding = self.padding_len(&tail)?;
        Ok(data.len() - BLOCK_SIZE - padding)
    }
}

/// Validates PKCS#7 padding on a final plaintext block.
pub(crate) fn pkcs7_padding_len(block: &[u8]) -> CryptoResult<usize> {
    let pad = block.last().copied().unwrap_or(0) as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > block.len() {
        return Err(CryptoError::Decryption("invalid padding".to_string()));
    }
    if block[block.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err(CryptoError::Decryption("invalid padding".to_string()));
    }
    Ok(pad)
}
