use lcp_crypto::{
    AES256_CBC_URI, Aes256Cbc, ContentKey, DecryptingStream, generate_content_key,
    max_plain_text_size, plain_text_size,
};
use std::io::{Cursor, ErrorKind, Read, Seek, SeekFrom};

fn encrypted(key: &ContentKey, plaintext: &[u8]) -> Vec<u8> {
    Aes256Cbc::new(key.as_bytes()).unwrap().encrypt(plaintext)
}

/// Reader that hands out at most `step` bytes per call.
struct Trickle {
    data: Vec<u8>,
    pos: usize,
    step: usize,
}

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(self.step).min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[test]
fn stream_matches_plaintext() {
    let key = generate_content_key();
    let plaintext: Vec<u8> = (0..200_000).map(|i| (i % 253) as u8).collect();
    let mut stream =
        DecryptingStream::new(&key, AES256_CBC_URI, Cursor::new(encrypted(&key, &plaintext)))
            .unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(out, plaintext);
}

#[test]
fn stream_handles_tiny_source_reads() {
    let key = generate_content_key();
    let plaintext = b"a short resource that is a few blocks long".to_vec();
    let source = Trickle {
        data: encrypted(&key, &plaintext),
        pos: 0,
        step: 5,
    };
    let mut stream = DecryptingStream::new(&key, AES256_CBC_URI, source).unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert_eq!(out, plaintext);
}

#[test]
fn stream_of_empty_plaintext() {
    let key = generate_content_key();
    let mut stream =
        DecryptingStream::new(&key, AES256_CBC_URI, Cursor::new(encrypted(&key, b""))).unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn truncated_stream_is_invalid_data() {
    let key = generate_content_key();
    let mut data = encrypted(&key, &[5u8; 100]);
    data.truncate(data.len() - 3);
    let mut stream = DecryptingStream::new(&key, AES256_CBC_URI, Cursor::new(data)).unwrap();
    let err = stream.read_to_end(&mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn iv_only_stream_is_invalid_data() {
    let key = generate_content_key();
    let mut stream =
        DecryptingStream::new(&key, AES256_CBC_URI, Cursor::new(vec![0u8; 16])).unwrap();
    let err = stream.read_to_end(&mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidData);
}

#[test]
fn unsupported_algorithm_is_rejected() {
    let key = generate_content_key();
    assert!(
        DecryptingStream::new(&key, "urn:nope", Cursor::new(Vec::new())).is_err()
    );
}

#[test]
fn max_size_bounds_plaintext() {
    let key = generate_content_key();
    let data = encrypted(&key, &[1u8; 33]);
    let stream = DecryptingStream::new(&key, AES256_CBC_URI, Cursor::new(data.clone())).unwrap();
    assert_eq!(stream.max_size(), data.len() as u64 - 17);
    assert!(stream.max_size() >= 33);
    assert_eq!(max_plain_text_size(5), 0);
}

#[test]
fn exact_size_for_seekable_source() {
    let key = generate_content_key();
    for len in [0usize, 1, 16, 31, 4096] {
        let mut source = Cursor::new(encrypted(&key, &vec![9u8; len]));
        source.seek(SeekFrom::Start(7)).unwrap();
        assert_eq!(plain_text_size(&key, &mut source).unwrap(), len as u64);
        assert_eq!(source.position(), 7);
    }
}

#[test]
fn exact_size_rejects_bad_length() {
    let key = generate_content_key();
    assert!(plain_text_size(&key, &mut Cursor::new(vec![0u8; 40])).is_err());
}

#[test]
fn stream_reports_exact_size_mid_read() {
    let key = generate_content_key();
    let plaintext = vec![3u8; 1000];
    let mut stream =
        DecryptingStream::new(&key, AES256_CBC_URI, Cursor::new(encrypted(&key, &plaintext)))
            .unwrap();
    let mut head = [0u8; 100];
    stream.read_exact(&mut head).unwrap();
    assert_eq!(stream.plain_text_size().unwrap(), 1000);
    let mut rest = Vec::new();
    stream.read_to_end(&mut rest).unwrap();
    assert_eq!(head.len() + rest.len(), 1000);
}
