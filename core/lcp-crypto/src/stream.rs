//! Streaming decryption of publication resources.
//!
//! [`DecryptingStream`] consumes `IV || ciphertext` sequentially and yields
//! plaintext. It keeps the most recent decrypted block back until the
//! source is exhausted, since only the final block carries padding.

use crate::cipher::{Aes256Cbc, BLOCK_SIZE, CbcDecryptor, pkcs7_padding_len};
use crate::error::{CryptoError, CryptoResult};
use crate::key::ContentKey;
use crate::profile::AES256_CBC_URI;
use cbc::cipher::BlockDecryptMut;
use cbc::cipher::generic_array::GenericArray;
use lcp_types::ReadableStream;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};

const READ_CHUNK: usize = 64 * 1024;

/// Reader adapter that decrypts an AES-256-CBC resource on the fly.
pub struct DecryptingStream<R> {
    inner: R,
    cipher: Aes256Cbc,
    decryptor: Option<CbcDecryptor>,
    /// Ciphertext read but not yet decrypted (less than one block after each fill).
    pending: Vec<u8>,
    /// Plaintext ready to hand out.
    ready: Vec<u8>,
    ready_pos: usize,
    held: Option<[u8; BLOCK_SIZE]>,
    finished: bool,
}

impl<R: Read> DecryptingStream<R> {
    /// Wraps `inner`, failing with `UnsupportedAlgorithm` for anything but
    /// AES-256-CBC.
    pub fn new(content_key: &ContentKey, algorithm: &str, inner: R) -> CryptoResult<Self> {
        if algorithm != AES256_CBC_URI {
            return Err(CryptoError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        Ok(Self {
            inner,
            cipher: Aes256Cbc::new(content_key.as_bytes())?,
            decryptor: None,
            pending: Vec::with_capacity(READ_CHUNK + BLOCK_SIZE),
            ready: Vec::new(),
            ready_pos: 0,
            held: None,
            finished: false,
        })
    }

    /// Returns the wrapped reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self) -> io::Result<()> {
        self.ready.clear();
        self.ready_pos = 0;

        let start = self.pending.len();
        self.pending.resize(start + READ_CHUNK, 0);
        let read = loop {
            match self.inner.read(&mut self.pending[start..]) {
                Ok(read) => break read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.pending.truncate(start);
                    return Err(e);
                }
            }
        };
        self.pending.truncate(start + read);

        if self.decryptor.is_none() && self.pending.len() >= BLOCK_SIZE {
            let decryptor = self
                .cipher
                .decryptor(&self.pending[..BLOCK_SIZE])
                .map_err(invalid_data)?;
            self.decryptor = Some(decryptor);
            self.pending.drain(..BLOCK_SIZE);
        }

        if let Some(decryptor) = self.decryptor.as_mut() {
            let whole = self.pending.len() - self.pending.len() % BLOCK_SIZE;
            for chunk in self.pending[..whole].chunks_exact_mut(BLOCK_SIZE) {
                decryptor.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
                let mut block = [0u8; BLOCK_SIZE];
                block.copy_from_slice(chunk);
                if let Some(previous) = self.held.replace(block) {
                    self.ready.extend_from_slice(&previous);
                }
            }
            self.pending.drain(..whole);
        }

        if read == 0 {
            self.finish()?;
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        if !self.pending.is_empty() || self.decryptor.is_none() {
            return Err(invalid_data(CryptoError::Decryption(
                "truncated ciphertext".to_string(),
            )));
        }
        let last = self.held.take().ok_or_else(|| {
            invalid_data(CryptoError::Decryption("no ciphertext blocks".to_string()))
        })?;
        let padding = pkcs7_padding_len(&last).map_err(invalid_data)?;
        self.ready.extend_from_slice(&last[..BLOCK_SIZE - padding]);
        Ok(())
    }
}

impl<R: Read> Read for DecryptingStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.ready_pos < self.ready.len() {
                let n = buf.len().min(self.ready.len() - self.ready_pos);
                buf[..n].copy_from_slice(&self.ready[self.ready_pos..self.ready_pos + n]);
                self.ready_pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            self.fill()?;
        }
    }
}

impl<R: ReadableStream> DecryptingStream<R> {
    /// Upper bound of the plaintext length, from the source size alone.
    #[must_use]
    pub fn max_size(&self) -> u64 {
        max_plain_text_size(self.inner.size())
    }
}

impl<R: Read + Seek> DecryptingStream<R> {
    /// Exact plaintext length, read from the final block of the source.
    /// The source position is left where it was.
    pub fn plain_text_size(&mut self) -> CryptoResult<u64> {
        exact_size(&self.cipher, &mut self.inner)
    }
}

impl<R> std::fmt::Debug for DecryptingStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptingStream")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

fn invalid_data(err: CryptoError) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, err)
}

/// Largest plaintext a ciphertext of `cipher_len` bytes can hold
/// (IV removed, at least one padding byte).
#[must_use]
pub fn max_plain_text_size(cipher_len: u64) -> u64 {
    cipher_len.saturating_sub(BLOCK_SIZE as u64 + 1)
}

/// Exact plaintext length of a seekable resource. Decrypts only the final
/// block and restores the stream position.
pub fn plain_text_size<S: Read + Seek + ?Sized>(
    content_key: &ContentKey,
    source: &mut S,
) -> CryptoResult<u64> {
    exact_size(&Aes256Cbc::new(content_key.as_bytes())?, source)
}

fn exact_size<S: Read + Seek + ?Sized>(cipher: &Aes256Cbc, source: &mut S) -> CryptoResult<u64> {
    let position = source.stream_position()?;
    let len = source.seek(SeekFrom::End(0))?;
    let len_usize =
        usize::try_from(len).map_err(|_| CryptoError::InvalidCiphertextLength(usize::MAX))?;
    Aes256Cbc::check_length(len_usize)?;

    let mut tail = [0u8; 2 * BLOCK_SIZE];
    source.seek(SeekFrom::End(-(2 * BLOCK_SIZE as i64)))?;
    source.read_exact(&mut tail)?;
    source.seek(SeekFrom::Start(position))?;

    let padding = cipher.padding_len(&tail)?;
    Ok(len - BLOCK_SIZE as u64 - padding as u64)
}
