use lcp_crypto::{
    AES256_CBC_URI, Aes256Cbc, EncryptionProfile, UserKey, decrypt_content_key, decrypt_data,
    decrypt_data_vec, decrypt_license_data, decrypt_user_key, generate_content_key,
    hash_passphrase, sha256, verify_user_key,
};
use lcp_types::StatusCode;

const LICENSE_ID: &str = "urn:uuid:1234";

/// Key check and encrypted content key as a server would issue them.
struct Issued {
    key_check: String,
    encrypted_content_key: String,
    content_key: [u8; 32],
}

fn issue(profile: &EncryptionProfile, passphrase: &str) -> Issued {
    let user_key = profile.transform_user_key(&sha256(passphrase.as_bytes()));
    let cipher = Aes256Cbc::new(&user_key).unwrap();
    let content_key = *generate_content_key().as_bytes();
    Issued {
        key_check: cipher.encrypt_base64(LICENSE_ID.as_bytes()),
        encrypted_content_key: cipher.encrypt_base64(&content_key),
        content_key,
    }
}

#[test]
fn passphrase_hash_is_sha256() {
    let hash = hash_passphrase(&EncryptionProfile::basic(), "secret").unwrap();
    assert_eq!(*hash.as_bytes(), sha256(b"secret"));
}

#[test]
fn correct_passphrase_unlocks_both_profiles() {
    for profile in [EncryptionProfile::basic(), EncryptionProfile::legacy()] {
        let issued = issue(&profile, "secret");
        let (hash, user_key) =
            decrypt_user_key(&profile, "secret", LICENSE_ID, &issued.key_check, AES256_CBC_URI)
                .unwrap();
        assert_eq!(*hash.as_bytes(), sha256(b"secret"));

        let content_key = decrypt_content_key(
            &profile,
            &user_key,
            &issued.encrypted_content_key,
            AES256_CBC_URI,
        )
        .unwrap();
        assert_eq!(*content_key.as_bytes(), issued.content_key);
    }
}

#[test]
fn wrong_passphrase_is_rejected() {
    let profile = EncryptionProfile::basic();
    let issued = issue(&profile, "secret");
    let err = decrypt_user_key(&profile, "wrong", LICENSE_ID, &issued.key_check, AES256_CBC_URI)
        .unwrap_err();
    assert_eq!(err.code, StatusCode::UserPassphraseNotValid);
}

#[test]
fn key_check_must_match_license_id() {
    let profile = EncryptionProfile::basic();
    let issued = issue(&profile, "secret");
    let err = decrypt_user_key(&profile, "secret", "urn:uuid:other", &issued.key_check, AES256_CBC_URI)
        .unwrap_err();
    assert_eq!(err.code, StatusCode::UserPassphraseNotValid);
}

#[test]
fn profile_mismatch_is_rejected() {
    let issued = issue(&EncryptionProfile::legacy(), "secret");
    let err = decrypt_user_key(
        &EncryptionProfile::basic(),
        "secret",
        LICENSE_ID,
        &issued.key_check,
        AES256_CBC_URI,
    )
    .unwrap_err();
    assert_eq!(err.code, StatusCode::UserPassphraseNotValid);
}

#[test]
fn stored_hash_verifies_like_passphrase() {
    let profile = EncryptionProfile::legacy();
    let issued = issue(&profile, "secret");
    let stored = UserKey::from_bytes(sha256(b"secret"));
    let user_key =
        verify_user_key(&profile, &stored, LICENSE_ID, &issued.key_check, AES256_CBC_URI).unwrap();
    assert_eq!(*user_key.as_bytes(), profile.transform_user_key(&sha256(b"secret")));
}

#[test]
fn unknown_algorithm_is_profile_not_found() {
    let profile = EncryptionProfile::basic();
    let issued = issue(&profile, "secret");
    let err = decrypt_user_key(&profile, "secret", LICENSE_ID, &issued.key_check, "urn:nope")
        .unwrap_err();
    assert_eq!(err.code, StatusCode::EncryptionProfileNotFound);
}

#[test]
fn corrupted_content_key_is_license_encrypted() {
    let profile = EncryptionProfile::basic();
    let user_key = UserKey::from_bytes(sha256(b"secret"));
    let err = decrypt_content_key(&profile, &user_key, "bm90IGEga2V5", AES256_CBC_URI).unwrap_err();
    assert_eq!(err.code, StatusCode::LicenseEncrypted);

    // Decrypts cleanly but is not 32 bytes long.
    let short = Aes256Cbc::new(user_key.as_bytes()).unwrap().encrypt_base64(&[1u8; 16]);
    let err = decrypt_content_key(&profile, &user_key, &short, AES256_CBC_URI).unwrap_err();
    assert_eq!(err.code, StatusCode::LicenseEncrypted);
}

#[test]
fn license_fields_decrypt_with_user_key() {
    let profile = EncryptionProfile::basic();
    let user_key = UserKey::from_bytes(sha256(b"secret"));
    let encrypted = Aes256Cbc::new(user_key.as_bytes())
        .unwrap()
        .encrypt_base64(b"reader@example.org");
    assert_eq!(
        decrypt_license_data(&profile, &user_key, &encrypted, AES256_CBC_URI).unwrap(),
        "reader@example.org"
    );
}

#[test]
fn publication_data_roundtrip() {
    let profile = EncryptionProfile::basic();
    let content_key = generate_content_key();
    let plaintext = b"<html><body>chapter one</body></html>";
    let encrypted = Aes256Cbc::new(content_key.as_bytes()).unwrap().encrypt(plaintext);

    let mut out = vec![0u8; encrypted.len()];
    let n = decrypt_data(&profile, &content_key, AES256_CBC_URI, &encrypted, &mut out).unwrap();
    assert_eq!(&out[..n], plaintext);
    assert_eq!(
        decrypt_data_vec(&profile, &content_key, AES256_CBC_URI, &encrypted).unwrap(),
        plaintext
    );
}

#[test]
fn corrupted_publication_data_is_publication_encrypted() {
    let profile = EncryptionProfile::basic();
    let content_key = generate_content_key();
    let err = decrypt_data_vec(&profile, &content_key, AES256_CBC_URI, &[0u8; 20]).unwrap_err();
    assert_eq!(err.code, StatusCode::PublicationEncrypted);
}
