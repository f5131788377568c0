//! Network collaborator contract.
//!
//! The embedding application supplies a [`NetProvider`]. Downloads are
//! asynchronous: `start_download` returns immediately and progress is
//! reported through a [`NetCallback`]. [`PendingDownload`] turns one request
//! into a blocking wait that a second thread can cut short.

use crate::status::{LcpResult, Status, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Events a provider reports for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum NetEvent {
    Started,
    /// Fraction in `0.0..=1.0`.
    Progressed(f32),
    Canceled,
    Ended(LcpResult<()>),
}

/// Receiver of download events. Called from provider-owned threads.
pub trait NetCallback: Send + Sync {
    fn on_event(&self, request: &DownloadRequest, event: NetEvent);
}

/// Transport supplied by the embedding application.
pub trait NetProvider: Send + Sync {
    /// Starts fetching `request.url()` into the request body. Must not block.
    fn start_download(&self, request: Arc<DownloadRequest>, callback: Arc<dyn NetCallback>);
}

/// One download: target URL, cancel flag and in-memory body.
#[derive(Debug)]
pub struct DownloadRequest {
    url: String,
    canceled: AtomicBool,
    body: Mutex<Vec<u8>>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            canceled: AtomicBool::new(false),
            body: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Asks the provider to stop. Providers poll this between chunks.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    /// Appends received bytes to the body.
    pub fn write(&self, chunk: &[u8]) {
        self.body
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(chunk);
    }

    /// Takes the body, leaving it empty.
    pub fn take_body(&self) -> Vec<u8> {
        std::mem::take(&mut *self.body.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Completion cell for one request.
///
/// Records the first terminal event (`Ended` or `Canceled`) and wakes every
/// waiter. [`cancel`](Self::cancel) completes the cell itself, so a waiter
/// returns at once even if the provider never reports back.
#[derive(Debug)]
pub struct PendingDownload {
    request: Arc<DownloadRequest>,
    outcome: Mutex<Option<LcpResult<()>>>,
    done: Condvar,
}

impl PendingDownload {
    pub fn new(url: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            request: Arc::new(DownloadRequest::new(url)),
            outcome: Mutex::new(None),
            done: Condvar::new(),
        })
    }

    #[must_use]
    pub fn request(&self) -> &Arc<DownloadRequest> {
        &self.request
    }

    /// Hands the request to `net` with this cell as the callback.
    pub fn start(self: &Arc<Self>, net: &dyn NetProvider) {
        let callback: Arc<dyn NetCallback> = Arc::clone(self) as Arc<dyn NetCallback>;
        net.start_download(Arc::clone(&self.request), callback);
    }

    /// Cancels the request and wakes waiters with `RequestCanceled`.
    pub fn cancel(&self) {
        self.request.cancel();
        self.complete(Err(Status::from_code(StatusCode::RequestCanceled)));
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Blocks until the request ends or is canceled.
    pub fn wait(&self) -> LcpResult<()> {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = outcome.as_ref() {
                return result.clone();
            }
            outcome = self
                .done
                .wait(outcome)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`; `None` means
    /// still running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<LcpResult<()>> {
        let outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        let (outcome, _) = self
            .done
            .wait_timeout_while(outcome, timeout, |outcome| outcome.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        outcome.clone()
    }

    /// Takes the downloaded body.
    pub fn take_body(&self) -> Vec<u8> {
        self.request.take_body()
    }

    fn complete(&self, result: LcpResult<()>) {
        let mut outcome = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        if outcome.is_some() {
            return;
        }
        let result = if self.request.is_canceled() {
            Err(Status::from_code(StatusCode::RequestCanceled))
        } else {
            result
        };
        *outcome = Some(result);
        self.done.notify_all();
    }
}

impl NetCallback for PendingDownload {
    fn on_event(&self, request: &DownloadRequest, event: NetEvent) {
        match event {
            NetEvent::Started => debug!(url = %request.url(), "download started"),
            NetEvent::Progressed(fraction) => {
                debug!(url = %request.url(), progress = fraction, "download progress");
            }
            NetEvent::Canceled => {
                self.complete(Err(Status::from_code(StatusCode::RequestCanceled)));
            }
            NetEvent::Ended(result) => self.complete(result),
        }
    }
}

/// Downloads `url` and blocks until it finishes, returning the body.
pub fn download_blocking(net: &dyn NetProvider, url: &str) -> LcpResult<Vec<u8>> {
    let pending = PendingDownload::new(url);
    pending.start(net);
    pending.wait()?;
    Ok(pending.take_body())
}
