use lcp_crypto::{
    AES256_CBC_URI, Aes256Cbc, BLOCK_SIZE, CryptoError, SymmetricAlgorithm, generate_content_key,
};

fn cipher() -> Aes256Cbc {
    Aes256Cbc::new(generate_content_key().as_bytes()).unwrap()
}

#[test]
fn encrypt_decrypt_roundtrip() {
    let cipher = cipher();
    let encrypted = cipher.encrypt(b"Hello, World!");
    assert_eq!(cipher.decrypt(&encrypted).unwrap(), b"Hello, World!");
}

#[test]
fn ciphertext_layout_is_iv_plus_padded_blocks() {
    let cipher = cipher();
    let iv = [9u8; BLOCK_SIZE];
    let encrypted = cipher.encrypt_with_iv(&iv, &[0u8; 20]);
    assert_eq!(&encrypted[..BLOCK_SIZE], &iv);
    assert_eq!(encrypted.len(), BLOCK_SIZE + 32);

    // A whole-block plaintext gets a full block of padding.
    assert_eq!(cipher.encrypt(&[0u8; 32]).len(), BLOCK_SIZE + 48);
}

#[test]
fn empty_plaintext_roundtrip() {
    let cipher = cipher();
    let encrypted = cipher.encrypt(b"");
    assert_eq!(encrypted.len(), 2 * BLOCK_SIZE);
    assert!(cipher.decrypt(&encrypted).unwrap().is_empty());
}

#[test]
fn base64_roundtrip() {
    let cipher = cipher();
    let encoded = cipher.encrypt_base64(b"urn:uuid:1234");
    assert_eq!(cipher.decrypt_base64(&encoded).unwrap(), b"urn:uuid:1234");
}

#[test]
fn bad_base64_is_encoding_error() {
    assert!(matches!(
        cipher().decrypt_base64("***").unwrap_err(),
        CryptoError::Encoding(_)
    ));
}

#[test]
fn wrong_key_fails_or_garbles() {
    let encrypted = cipher().encrypt(b"Secret message that spans blocks");
    match cipher().decrypt(&encrypted) {
        Err(CryptoError::Decryption(_)) => {}
        Ok(plain) => assert_ne!(plain, b"Secret message that spans blocks"),
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn rejects_truncated_ciphertext() {
    let cipher = cipher();
    assert!(matches!(
        cipher.decrypt(&[0u8; BLOCK_SIZE]).unwrap_err(),
        CryptoError::InvalidCiphertextLength(16)
    ));
    assert!(matches!(
        cipher.decrypt(&[0u8; 40]).unwrap_err(),
        CryptoError::InvalidCiphertextLength(40)
    ));
}

#[test]
fn rejects_wrong_key_length() {
    assert!(matches!(
        Aes256Cbc::new(&[0u8; 16]).unwrap_err(),
        CryptoError::InvalidKeyLength { .. }
    ));
}

#[test]
fn decrypt_into_reports_length() {
    let cipher = cipher();
    let plaintext: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
    let encrypted = cipher.encrypt(&plaintext);

    let mut out = vec![0u8; encrypted.len()];
    let n = cipher.decrypt_into(&encrypted, &mut out).unwrap();
    assert_eq!(&out[..n], &plaintext[..]);
}

#[test]
fn decrypt_into_rejects_small_buffer() {
    let cipher = cipher();
    let encrypted = cipher.encrypt(&[1u8; 64]);
    let mut out = vec![0u8; 10];
    assert!(matches!(
        cipher.decrypt_into(&encrypted, &mut out).unwrap_err(),
        CryptoError::BufferTooSmall { .. }
    ));
}

#[test]
fn plain_text_size_matches_decryption() {
    let cipher = cipher();
    for len in [0usize, 1, 15, 16, 17, 100] {
        let encrypted = cipher.encrypt(&vec![3u8; len]);
        assert_eq!(cipher.plain_text_size(&encrypted).unwrap(), len);
    }
}

#[test]
fn name_is_algorithm_uri() {
    assert_eq!(cipher().name(), AES256_CBC_URI);
}
