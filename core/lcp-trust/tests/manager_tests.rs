mod common;

use common::{Answer, FakeNet, PROVIDER_CRL, ROOT_CRL, fixture, wait_until};
use lcp_trust::{Certificate, RevocationList, RevocationManager, Schedule, next_refresh};
use lcp_types::{DownloadRequest, NetCallback, NetProvider, StatusCode};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, SystemTime};

const FALLBACK: Duration = Duration::from_secs(600);

fn certificates() -> (Certificate, Certificate) {
    (
        Certificate::from_der(&fixture("root.der")).unwrap(),
        Certificate::from_der(&fixture("provider.der")).unwrap(),
    )
}

#[test]
fn revoked_provider_is_rejected() {
    let net = FakeNet::new();
    net.answer(PROVIDER_CRL, Answer::Body(fixture("crl_revoked.der")));
    let manager = RevocationManager::new(net.clone(), None, FALLBACK);
    let (root, provider) = certificates();

    let err = manager.process_revocation(&root, &provider).unwrap_err();
    assert_eq!(err.code, StatusCode::ProviderCertificateRevoked);
    assert!(manager.revocation_list().has_this_update());
    assert_eq!(manager.updater().urls(), [ROOT_CRL, PROVIDER_CRL]);
}

#[test]
fn clean_crl_lets_provider_through() {
    let net = FakeNet::new();
    net.answer(ROOT_CRL, Answer::Body(fixture("crl_clean.der")));
    let manager = RevocationManager::new(net.clone(), None, FALLBACK);
    let (root, provider) = certificates();

    manager.process_revocation(&root, &provider).unwrap();
    assert!(manager.timer().is_running());
}

#[test]
fn unreachable_crl_fails_open() {
    let net = FakeNet::new();
    let manager = RevocationManager::new(net.clone(), None, FALLBACK);
    let (root, provider) = certificates();

    manager.process_revocation(&root, &provider).unwrap();
    assert!(!manager.revocation_list().has_this_update());
    assert_eq!(manager.timer().schedule(), Schedule::After(FALLBACK));
}

#[test]
fn loaded_list_skips_first_time_refresh() {
    let net = FakeNet::new();
    let manager = RevocationManager::new(net.clone(), None, FALLBACK);
    manager
        .revocation_list()
        .update(&fixture("crl_revoked.der"))
        .unwrap();
    let (root, provider) = certificates();

    let err = manager.process_revocation(&root, &provider).unwrap_err();
    assert_eq!(err.code, StatusCode::ProviderCertificateRevoked);
    assert_eq!(net.started(), 0);
}

#[test]
fn seed_url_is_fetched_in_background() {
    let net = FakeNet::new();
    net.answer(ROOT_CRL, Answer::Body(fixture("crl_revoked.der")));
    let manager = RevocationManager::new(net.clone(), Some(ROOT_CRL), FALLBACK);

    assert!(wait_until(Duration::from_secs(5), || {
        manager.revocation_list().has_this_update()
    }));
    assert!(manager.revocation_list().is_revoked("1001"));
    assert!(wait_until(Duration::from_secs(5), || matches!(
        manager.timer().schedule(),
        Schedule::At(_)
    )));
}

#[test]
fn refresh_follows_future_next_update() {
    let list = RevocationList::from_der(&fixture("crl_clean.der")).unwrap();
    match next_refresh(&list, FALLBACK) {
        Schedule::At(when) => assert!(when > SystemTime::now()),
        other => panic!("unexpected schedule {other:?}"),
    }
    assert_eq!(
        next_refresh(&RevocationList::new(), FALLBACK),
        Schedule::After(FALLBACK)
    );
}

/// Panics on the first request, then serves a clean CRL.
struct PanicOnceNet {
    inner: Arc<FakeNet>,
    calls: AtomicUsize,
}

impl NetProvider for PanicOnceNet {
    fn start_download(&self, request: Arc<DownloadRequest>, callback: Arc<dyn NetCallback>) {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("transport exploded");
        }
        self.inner.start_download(request, callback);
    }
}

#[test]
fn background_panic_surfaces_on_next_check() {
    let inner = FakeNet::new();
    inner.answer(ROOT_CRL, Answer::Body(fixture("crl_clean.der")));
    let net = Arc::new(PanicOnceNet {
        inner,
        calls: AtomicUsize::new(0),
    });
    let manager = RevocationManager::new(net.clone(), Some(ROOT_CRL), FALLBACK);
    assert!(wait_until(Duration::from_secs(5), || {
        net.calls.load(Ordering::SeqCst) == 1 && !manager.timer().is_running()
    }));

    let (root, provider) = certificates();
    let err = manager.process_revocation(&root, &provider).unwrap_err();
    assert_eq!(err.code, StatusCode::CommonError);
    assert!(err.message.unwrap().contains("transport exploded"));

    manager.process_revocation(&root, &provider).unwrap();
}

#[test]
fn shutdown_interrupts_hanging_download() {
    let net = FakeNet::new();
    net.answer(ROOT_CRL, Answer::Hang);
    let manager = RevocationManager::new(net.clone(), Some(ROOT_CRL), FALLBACK);
    assert!(wait_until(Duration::from_secs(5), || net.started() == 1));

    let done = thread::spawn(move || {
        manager.shutdown();
        manager.timer().is_running()
    });
    assert!(!done.join().unwrap());
}

#[test]
fn concurrent_first_refreshes_share_one_download() {
    let net = FakeNet::new();
    net.answer(
        ROOT_CRL,
        Answer::Slow(fixture("crl_revoked.der"), Duration::from_millis(300)),
    );
    let manager = RevocationManager::new(net.clone(), None, FALLBACK);
    let (root, provider) = certificates();

    thread::scope(|s| {
        let verifications: Vec<_> = (0..4)
            .map(|_| s.spawn(|| manager.process_revocation(&root, &provider)))
            .collect();
        for verification in verifications {
            let err = verification.join().unwrap().unwrap_err();
            assert_eq!(err.code, StatusCode::ProviderCertificateRevoked);
        }
    });
    assert_eq!(net.requests(), [ROOT_CRL]);
}
