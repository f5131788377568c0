//! Certificate trust and revocation for LCP licenses.
//!
//! - [`Certificate`]: X.509 decoding, chain check against the root CA
//! - [`RevocationList`] and [`CrlUpdater`]: CRL state and its download loop
//! - [`RevocationManager`]: the shared list, updater and poll timer
//! - [`TrustVerifier`]: the ordered license trust checks
//!
//! CRL and certificate parsing uses the RustCrypto `x509-cert` types; no
//! general X.509 path building is attempted.

mod certificate;
mod distribution;
mod error;
mod manager;
mod revocation;
mod timer;
mod updater;
mod verifier;

pub use certificate::Certificate;
pub use distribution::CrlDistributionPoints;
pub use error::{TrustError, TrustResult};
pub use manager::{DEFAULT_FALLBACK_INTERVAL, RevocationManager, next_refresh};
pub use revocation::RevocationList;
pub use timer::{Schedule, ThreadTimer, TimerController, TimerHandler};
pub use updater::CrlUpdater;
pub use verifier::{LicenseView, TrustVerifier, check_validity_window, verify_license};
