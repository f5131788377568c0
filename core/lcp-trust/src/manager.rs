//! Revocation management: one list, one updater and one poll timer per
//! service, shared by every verification.

use crate::certificate::Certificate;
use crate::revocation::RevocationList;
use crate::timer::{Schedule, ThreadTimer, TimerController};
use crate::updater::CrlUpdater;
use chrono::Utc;
use lcp_types::{LcpResult, NetProvider, Status, StatusCode};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Poll interval used when the CRL has no future `nextUpdate`.
pub const DEFAULT_FALLBACK_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Owns the revocation state and keeps it fresh in the background.
pub struct RevocationManager {
    list: Arc<RevocationList>,
    updater: Arc<CrlUpdater>,
    timer: ThreadTimer,
    fallback: Duration,
}

impl RevocationManager {
    /// Creates the manager and, when a seed URL exists, starts an
    /// immediate background fetch.
    pub fn new(
        net: Arc<dyn NetProvider>,
        default_crl_url: Option<&str>,
        fallback: Duration,
    ) -> Self {
        let list = Arc::new(RevocationList::new());
        let updater = Arc::new(CrlUpdater::new(net, Arc::clone(&list), default_crl_url));
        let timer = ThreadTimer::new(Schedule::After(Duration::ZERO), false);

        let handler_updater = Arc::clone(&updater);
        let handler_list = Arc::clone(&list);
        let controller = timer.controller();
        timer.set_handler(Arc::new(move || -> LcpResult<()> {
            let result = handler_updater.update();
            reschedule(&controller, &handler_list, fallback);
            match result {
                Err(status) if status.code.is_network_error() => {
                    warn!(error = %status, "background CRL refresh failed");
                    Ok(())
                }
                other => other,
            }
        }));

        if updater.contains_any_url() {
            timer.start();
        }

        Self {
            list,
            updater,
            timer,
            fallback,
        }
    }

    #[must_use]
    pub fn revocation_list(&self) -> &Arc<RevocationList> {
        &self.list
    }

    #[must_use]
    pub fn updater(&self) -> &Arc<CrlUpdater> {
        &self.updater
    }

    #[must_use]
    pub fn timer(&self) -> &ThreadTimer {
        &self.timer
    }

    /// Revocation step of license verification.
    ///
    /// Learns the distribution points of both certificates, refreshes the
    /// list first if it was never loaded, makes sure the poll timer runs,
    /// surfaces any background failure, then checks the provider serial.
    pub fn process_revocation(
        &self,
        root: &Certificate,
        provider: &Certificate,
    ) -> LcpResult<()> {
        self.updater.update_crl_urls(root.distribution_points());
        self.updater.update_crl_urls(provider.distribution_points());

        // Concurrent first refreshes join the updater's run in flight.
        if self.updater.contains_any_url() && !self.list.has_this_update() {
            info!("no revocation list yet, refreshing before verification");
            if let Err(status) = self.updater.update() {
                warn!(
                    error = %status,
                    "first CRL refresh failed, continuing without revocation data"
                );
            }
            reschedule(&self.timer.controller(), &self.list, self.fallback);
        }
        if self.updater.contains_any_url() && !self.timer.is_running() {
            reschedule(&self.timer.controller(), &self.list, self.fallback);
            self.timer.start();
        }

        if let Some(failure) = self.timer.take_failure() {
            return Err(failure);
        }
        self.check_revocation(provider)
    }

    /// Checks the provider serial against the current list.
    pub fn check_revocation(&self, provider: &Certificate) -> LcpResult<()> {
        if self.list.is_revoked(provider.serial_number()) {
            warn!(serial = %provider.serial_number(), "provider certificate revoked");
            return Err(Status::from_code(StatusCode::ProviderCertificateRevoked));
        }
        Ok(())
    }

    /// Cancels any download and stops polling. Idempotent.
    pub fn shutdown(&self) {
        self.updater.close();
        self.timer.stop();
    }
}

impl Drop for RevocationManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RevocationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationManager")
            .field("updater", &self.updater)
            .field("timer", &self.timer)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

/// Schedule following a refresh: the CRL's `nextUpdate` if it lies in the
/// future, otherwise the fallback interval.
#[must_use]
pub fn next_refresh(list: &RevocationList, fallback: Duration) -> Schedule {
    match list.next_update() {
        Some(next) if next > Utc::now() => Schedule::At(SystemTime::from(next)),
        _ => Schedule::After(fallback),
    }
}

fn reschedule(controller: &TimerController, list: &RevocationList, fallback: Duration) {
    let schedule = next_refresh(list, fallback);
    info!(?schedule, "next CRL refresh scheduled");
    controller.set_schedule(schedule);
    controller.set_auto_reset(true);
}
