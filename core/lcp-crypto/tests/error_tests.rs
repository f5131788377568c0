use lcp_crypto::CryptoError;
use lcp_types::{Status, StatusCode};

#[test]
fn error_display_invalid_key_length() {
    let err = CryptoError::InvalidKeyLength {
        expected: 32,
        actual: 16,
    };
    let msg = format!("{err}");
    assert!(msg.contains("32"));
    assert!(msg.contains("16"));
}

#[test]
fn error_display_decryption() {
    let err = CryptoError::Decryption("invalid padding".into());
    assert!(format!("{err}").contains("decryption failed"));
}

#[test]
fn error_from_io() {
    let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
    let err: CryptoError = io.into();
    assert!(format!("{err}").contains("I/O error"));
}

#[test]
fn into_status_keeps_detail() {
    let status = CryptoError::Decryption("invalid padding".into())
        .into_status(StatusCode::PublicationEncrypted);
    assert_eq!(status.code, StatusCode::PublicationEncrypted);
    let message = status.message.unwrap();
    assert!(message.starts_with("ErrorDecryptionPublicationEncrypted: "));
    assert!(message.contains("invalid padding"));
}

#[test]
fn unknown_algorithm_maps_to_profile_not_found() {
    let status = CryptoError::UnsupportedAlgorithm("urn:x".into())
        .into_status(StatusCode::LicenseEncrypted);
    assert_eq!(status.code, StatusCode::EncryptionProfileNotFound);

    let status: Status = CryptoError::UnknownProfile("urn:y".into()).into();
    assert_eq!(status.code, StatusCode::EncryptionProfileNotFound);
}

#[test]
fn other_errors_default_to_common() {
    let status: Status = CryptoError::Encoding("bad hex".into()).into();
    assert_eq!(status.code, StatusCode::CommonError);
}
