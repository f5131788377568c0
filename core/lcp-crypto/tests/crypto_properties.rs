//! Property-based tests for the crypto crate.
//!
//! These tests verify properties that must always hold:
//! - Buffer and streaming decryption agree for any plaintext and read size
//! - The exact plaintext size matches the decrypted length
//! - Keys survive their hex storage encoding

use lcp_crypto::{
    AES256_CBC_URI, Aes256Cbc, ContentKey, DecryptingStream, EncryptionProfile, SymmetricAlgorithm,
    UserKey, hash_stream, plain_text_size, sha256,
};
use proptest::prelude::*;
use std::io::{Cursor, Read};

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn key_strategy() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

fn plaintext_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..5000)
}

// =============================================================================
// DECRYPTION PROPERTIES
// =============================================================================

mod decryption_properties {
    use super::*;

    proptest! {
        /// Streaming output equals buffer decryption for arbitrary read sizes.
        #[test]
        fn stream_equals_buffer(
            key in key_strategy(),
            plaintext in plaintext_strategy(),
            read_size in 1usize..200,
        ) {
            let cipher = Aes256Cbc::new(&key).unwrap();
            let encrypted = cipher.encrypt(&plaintext);
            let buffered = cipher.decrypt(&encrypted).unwrap();

            let mut stream = DecryptingStream::new(
                &ContentKey::from_bytes(key),
                AES256_CBC_URI,
                Cursor::new(encrypted),
            ).unwrap();
            let mut streamed = Vec::new();
            let mut buf = vec![0u8; read_size];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                streamed.extend_from_slice(&buf[..n]);
            }

            prop_assert_eq!(&streamed, &buffered);
            prop_assert_eq!(streamed, plaintext);
        }

        /// The exact size computed from the tail equals the real plaintext length.
        #[test]
        fn exact_size_matches(key in key_strategy(), plaintext in plaintext_strategy()) {
            let encrypted = Aes256Cbc::new(&key).unwrap().encrypt(&plaintext);
            let size = plain_text_size(&ContentKey::from_bytes(key), &mut Cursor::new(encrypted))
                .unwrap();
            prop_assert_eq!(size, plaintext.len() as u64);
        }
    }
}

// =============================================================================
// KEY PROPERTIES
// =============================================================================

mod key_properties {
    use super::*;

    proptest! {
        /// Stored hex form parses back to the same key.
        #[test]
        fn hex_roundtrip(bytes in key_strategy()) {
            let key = UserKey::from_bytes(bytes);
            prop_assert_eq!(UserKey::from_hex(&key.to_hex()).unwrap(), key);
        }

        /// Profile transforms are deterministic.
        #[test]
        fn transforms_are_deterministic(passphrase in "[a-zA-Z0-9]{1,40}") {
            let hash = sha256(passphrase.as_bytes());
            let profile = EncryptionProfile::legacy();
            prop_assert_eq!(profile.transform_user_key(&hash), profile.transform_user_key(&hash));
        }

        /// Streaming hash equals one-shot hash.
        #[test]
        fn stream_hash_equals_one_shot(data in plaintext_strategy()) {
            prop_assert_eq!(hash_stream(&mut Cursor::new(&data)).unwrap(), sha256(&data));
        }
    }
}
