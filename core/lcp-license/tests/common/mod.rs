//! Shared helpers for license tests.
#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::STANDARD};
use lcp_crypto::{
    AES256_CBC_URI, Aes256Cbc, BASIC_PROFILE, ContentKey, EncryptionProfile, RSA_SHA256_URI,
    sha256,
};
use lcp_license::{LicenseService, ServiceConfig, ServiceContext, canonical_license};
use lcp_types::{
    DownloadRequest, MemoryStorageProvider, NetCallback, NetEvent, NetProvider, Status, StatusCode,
};
use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use serde_json::{Value, json};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const LICENSE_ID: &str = "urn:uuid:1234";
pub const PASSPHRASE: &str = "correct horse battery staple";
pub const PROVIDER: &str = "https://provider.example.org";
pub const USER_ID: &str = "user-42";

pub fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/../../testdata/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read(&path).unwrap_or_else(|e| panic!("missing fixture {path}: {e}"))
}

pub fn root_certificate() -> String {
    STANDARD.encode(fixture("root.der"))
}

pub fn content_key() -> ContentKey {
    ContentKey::from_bytes([7u8; 32])
}

/// Builds signed license JSON.
pub struct LicenseBuilder {
    pub id: String,
    pub profile: String,
    pub passphrase: String,
    pub issued: String,
    pub updated: Option<String>,
    pub links: Vec<Value>,
    pub user: Value,
    pub signature_under_encryption: bool,
}

impl Default for LicenseBuilder {
    fn default() -> Self {
        Self {
            id: LICENSE_ID.to_string(),
            profile: BASIC_PROFILE.to_string(),
            passphrase: PASSPHRASE.to_string(),
            issued: "2020-03-01T10:00:00Z".to_string(),
            updated: None,
            links: vec![json!({
                "rel": "publication",
                "href": "https://provider.example.org/book.epub",
                "type": "application/epub+zip"
            })],
            user: json!({ "id": USER_ID }),
            signature_under_encryption: false,
        }
    }
}

impl LicenseBuilder {
    pub fn user_key(&self) -> [u8; 32] {
        let profile = match self.profile.as_str() {
            BASIC_PROFILE => EncryptionProfile::basic(),
            _ => EncryptionProfile::legacy(),
        };
        profile.transform_user_key(&sha256(self.passphrase.as_bytes()))
    }

    pub fn value(&self) -> Value {
        let cipher = Aes256Cbc::new(&self.user_key()).unwrap();
        let signature = json!({
            "algorithm": RSA_SHA256_URI,
            "certificate": STANDARD.encode(fixture("provider.der")),
            "value": ""
        });
        let mut license = json!({
            "id": self.id,
            "issued": self.issued,
            "provider": PROVIDER,
            "encryption": {
                "profile": self.profile,
                "content_key": {
                    "algorithm": AES256_CBC_URI,
                    "encrypted_value": cipher.encrypt_base64(content_key().as_bytes())
                },
                "user_key": {
                    "algorithm": "http://www.w3.org/2001/04/xmlenc#sha256",
                    "text_hint": "The usual one",
                    "key_check": cipher.encrypt_base64(self.id.as_bytes())
                }
            },
            "links": self.links,
            "user": self.user,
            "rights": { "print": 10, "copy": 2048, "start": "2020-01-01T00:00:00Z" }
        });
        if let Some(updated) = &self.updated {
            license["updated"] = json!(updated);
        }
        if self.signature_under_encryption {
            license["encryption"]["signature"] = signature;
        } else {
            license["signature"] = signature;
        }
        license
    }

    /// Signed license JSON.
    pub fn build(&self) -> String {
        sign_license(self.value())
    }
}

/// Signs a license value over its canonical form and returns the JSON.
pub fn sign_license(mut license: Value) -> String {
    let (_, canonical) = canonical_license(&license.to_string()).unwrap();
    let pem = String::from_utf8(fixture("provider_key.pem")).unwrap();
    let key = RsaPrivateKey::from_pkcs8_pem(&pem).unwrap();
    let value = STANDARD.encode(SigningKey::<Sha256>::new(key).sign(canonical.as_bytes()).to_vec());
    if license["encryption"].get("signature").is_some() {
        license["encryption"]["signature"]["value"] = json!(value);
    } else {
        license["signature"]["value"] = json!(value);
    }
    serde_json::to_string_pretty(&license).unwrap()
}

#[derive(Clone)]
pub enum Answer {
    Body(Vec<u8>),
    Hang,
}

/// Network provider answering on spawned threads. Unknown URLs fail.
#[derive(Default)]
pub struct FakeNet {
    answers: Mutex<HashMap<String, Answer>>,
    requests: Mutex<Vec<String>>,
}

impl FakeNet {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, url: &str, answer: Answer) {
        self.answers.lock().unwrap().insert(url.to_string(), answer);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl NetProvider for FakeNet {
    fn start_download(&self, request: Arc<DownloadRequest>, callback: Arc<dyn NetCallback>) {
        self.requests.lock().unwrap().push(request.url().to_string());
        let answer = self.answers.lock().unwrap().get(request.url()).cloned();
        thread::spawn(move || match answer {
            Some(Answer::Body(body)) => {
                request.write(&body);
                callback.on_event(&request, NetEvent::Ended(Ok(())));
            }
            Some(Answer::Hang) => {
                while !request.is_canceled() {
                    thread::sleep(Duration::from_millis(5));
                }
                callback.on_event(&request, NetEvent::Canceled);
            }
            None => callback.on_event(
                &request,
                NetEvent::Ended(Err(Status::new(StatusCode::RequestFailed, "404 Not Found"))),
            ),
        });
    }
}

pub struct Harness {
    pub service: LicenseService,
    pub net: Arc<FakeNet>,
    pub storage: Arc<MemoryStorageProvider>,
}

pub fn harness() -> Harness {
    harness_with(
        ServiceConfig::default().with_root_certificate(root_certificate()),
        Arc::new(MemoryStorageProvider::new()),
    )
}

pub fn harness_with(config: ServiceConfig, storage: Arc<MemoryStorageProvider>) -> Harness {
    let net = FakeNet::new();
    let service = LicenseService::new(ServiceContext::new(
        config,
        net.clone(),
        storage.clone(),
    ));
    Harness {
        service,
        net,
        storage,
    }
}

/// Encrypts `plain` with the test content key.
pub fn encrypt_resource(plain: &[u8]) -> Vec<u8> {
    Aes256Cbc::new(content_key().as_bytes()).unwrap().encrypt(plain)
}

pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
