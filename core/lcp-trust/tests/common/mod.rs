//! Shared helpers for lcp-trust integration tests.
#![allow(dead_code)]

use base64::{Engine, engine::general_purpose::STANDARD};
use lcp_types::{DownloadRequest, LcpResult, NetCallback, NetEvent, NetProvider, Status, StatusCode};
use rsa::RsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub const PROVIDER_CRL: &str = "http://crl.example.org/provider.crl";
pub const ROOT_CRL: &str = "http://crl.example.org/root.crl";

pub fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/../../testdata/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read(&path).unwrap_or_else(|e| panic!("missing fixture {path}: {e}"))
}

pub fn fixture_base64(name: &str) -> String {
    STANDARD.encode(fixture(name))
}

pub fn sign_base64(data: &[u8]) -> String {
    let pem = String::from_utf8(fixture("provider_key.pem")).unwrap();
    let key = RsaPrivateKey::from_pkcs8_pem(&pem).unwrap();
    STANDARD.encode(SigningKey::<Sha256>::new(key).sign(data).to_vec())
}

#[derive(Clone)]
pub enum Answer {
    Body(Vec<u8>),
    Fail,
    /// Never answers until the request is canceled.
    Hang,
    /// Answers after a delay.
    Slow(Vec<u8>, Duration),
}

/// Network provider answering from a spawned thread per request.
/// Unknown URLs fail.
#[derive(Default)]
pub struct FakeNet {
    answers: Mutex<HashMap<String, Answer>>,
    requests: Mutex<Vec<String>>,
    started: AtomicUsize,
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

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

impl NetProvider for FakeNet {
    fn start_download(&self, request: Arc<DownloadRequest>, callback: Arc<dyn NetCallback>) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.url().to_string());
        let answer = self
            .answers
            .lock()
            .unwrap()
            .get(request.url())
            .cloned()
            .unwrap_or(Answer::Fail);

        thread::spawn(move || {
            callback.on_event(&request, NetEvent::Started);
            let ended: LcpResult<()> = match answer {
                Answer::Body(body) => {
                    request.write(&body);
                    Ok(())
                }
                Answer::Slow(body, delay) => {
                    thread::sleep(delay);
                    request.write(&body);
                    Ok(())
                }
                Answer::Fail => Err(Status::new(StatusCode::RequestFailed, "404 Not Found")),
                Answer::Hang => {
                    while !request.is_canceled() {
                        thread::sleep(Duration::from_millis(5));
                    }
                    callback.on_event(&request, NetEvent::Canceled);
                    return;
                }
            };
            callback.on_event(&request, NetEvent::Ended(ended));
        });
    }
}

/// Polls `cond` until it holds or `timeout` elapses.
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
