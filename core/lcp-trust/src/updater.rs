//! CRL download loop.
//!
//! [`CrlUpdater::update`] walks the candidate URLs in order and blocks on
//! each download until it ends, stopping at the first CRL that applies.
//! Only one run is in flight at a time; a second caller waits for it and
//! receives the same result.

use crate::revocation::RevocationList;
use lcp_types::{LcpResult, NetProvider, PendingDownload, Status, StatusCode};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Default)]
struct RunState {
    in_progress: bool,
    /// Completed runs; waiters use it to notice their run finished.
    completed: u64,
    last_result: Option<LcpResult<()>>,
    current: Option<Arc<PendingDownload>>,
    canceled: bool,
    closed: bool,
}

/// Fetches CRLs from a growing, de-duplicated list of URLs.
pub struct CrlUpdater {
    net: Arc<dyn NetProvider>,
    list: Arc<RevocationList>,
    urls: Mutex<Vec<String>>,
    run: Mutex<RunState>,
    run_done: Condvar,
}

impl CrlUpdater {
    /// Creates an updater seeded with `default_url` when it is non-empty.
    pub fn new(
        net: Arc<dyn NetProvider>,
        list: Arc<RevocationList>,
        default_url: Option<&str>,
    ) -> Self {
        let urls = default_url
            .filter(|url| !url.is_empty())
            .map(|url| vec![url.to_string()])
            .unwrap_or_default();
        Self {
            net,
            list,
            urls: Mutex::new(urls),
            run: Mutex::new(RunState::default()),
            run_done: Condvar::new(),
        }
    }

    /// Appends URLs not seen before, keeping first-seen order.
    pub fn update_crl_urls<S: AsRef<str>>(&self, urls: &[S]) {
        let mut known = self.urls.lock().unwrap_or_else(PoisonError::into_inner);
        for url in urls {
            let url = url.as_ref();
            if !url.is_empty() && !known.iter().any(|existing| existing == url) {
                debug!(url, "new CRL distribution point");
                known.push(url.to_string());
            }
        }
    }

    #[must_use]
    pub fn contains_url(&self, url: &str) -> bool {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|known| known == url)
    }

    #[must_use]
    pub fn contains_any_url(&self) -> bool {
        !self
            .urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Snapshot of the candidate URLs.
    #[must_use]
    pub fn urls(&self) -> Vec<String> {
        self.urls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn revocation_list(&self) -> &Arc<RevocationList> {
        &self.list
    }

    /// Runs one refresh, or joins the one already in flight.
    ///
    /// Fails with `RequestCanceled` when canceled, and with `RequestFailed`
    /// when no URL produced a usable CRL.
    pub fn update(&self) -> LcpResult<()> {
        let mut run = self.lock_run();
        if run.closed {
            return Err(Status::new(StatusCode::RequestCanceled, "CRL updater closed"));
        }
        if run.in_progress {
            let target = run.completed + 1;
            while run.completed < target {
                run = self
                    .run_done
                    .wait(run)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            return run.last_result.clone().unwrap_or(Ok(()));
        }
        run.in_progress = true;
        run.canceled = false;
        drop(run);

        let mut guard = RunGuard {
            updater: self,
            result: None,
        };
        let result = self.run_once();
        guard.result = Some(result.clone());
        result
    }

    /// Cancels the run in flight, if any. Later runs are unaffected.
    pub fn cancel(&self) {
        let mut run = self.lock_run();
        if !run.in_progress {
            return;
        }
        run.canceled = true;
        if let Some(pending) = run.current.as_ref() {
            info!(url = %pending.request().url(), "canceling CRL download");
            pending.cancel();
        }
    }

    /// Cancels the run in flight and refuses every later one.
    pub fn close(&self) {
        self.lock_run().closed = true;
        self.cancel();
    }

    fn run_once(&self) -> LcpResult<()> {
        let urls = self.urls();
        if urls.is_empty() {
            debug!("no CRL URL to refresh from");
            return Ok(());
        }

        let mut last_error: Option<Status> = None;
        for url in urls {
            let pending = PendingDownload::new(url.as_str());
            {
                let mut run = self.lock_run();
                if run.canceled || run.closed {
                    return Err(Status::from_code(StatusCode::RequestCanceled));
                }
                run.current = Some(Arc::clone(&pending));
            }

            info!(url = %url, "downloading CRL");
            pending.start(self.net.as_ref());
            match pending.wait() {
                Ok(()) if pending.request().is_canceled() => {
                    return Err(Status::from_code(StatusCode::RequestCanceled));
                }
                Ok(()) => match self.list.update(&pending.take_body()) {
                    Ok(()) => {
                        info!(url = %url, "CRL applied");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(url = %url, error = %e, "CRL rejected");
                        last_error = Some(e.into_status(StatusCode::RequestFailed));
                    }
                },
                Err(status) if status.code == StatusCode::RequestCanceled => {
                    info!(url = %url, "CRL download canceled");
                    return Err(status);
                }
                Err(status) => {
                    warn!(url = %url, error = %status, "CRL download failed");
                    last_error = Some(status);
                }
            }
        }

        let detail = last_error
            .map(|status| status.to_string())
            .unwrap_or_else(|| "no CRL URL succeeded".to_string());
        Err(Status::with_context(StatusCode::RequestFailed, detail))
    }

    fn lock_run(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_run(&self, result: LcpResult<()>) {
        let mut run = self.lock_run();
        run.in_progress = false;
        run.current = None;
        run.completed += 1;
        run.last_result = Some(result);
        self.run_done.notify_all();
    }
}

/// Ends the run even when the transport panics, so waiters never hang.
struct RunGuard<'a> {
    updater: &'a CrlUpdater,
    result: Option<LcpResult<()>>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let result = self
            .result
            .take()
            .unwrap_or_else(|| Err(Status::new(StatusCode::CommonError, "CRL update aborted")));
        self.updater.finish_run(result);
    }
}

impl std::fmt::Debug for CrlUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrlUpdater")
            .field("urls", &self.urls())
            .finish_non_exhaustive()
    }
}
