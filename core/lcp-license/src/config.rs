//! Service configuration, loadable from TOML.

use crate::error::{LicenseError, LicenseResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Provider id used in storage keys when a license names none.
pub const UNKNOWN_PROVIDER: &str = "UnknownProvider";
/// User id used in storage keys when a license names none.
pub const UNKNOWN_USER_ID: &str = "UnknownUserId";

fn default_fallback_secs() -> u64 {
    600
}

fn default_provider_id() -> String {
    UNKNOWN_PROVIDER.to_string()
}

fn default_user_id() -> String {
    UNKNOWN_USER_ID.to_string()
}

/// Settings of a [`LicenseService`](crate::LicenseService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Base64 DER root certificate. Verification fails without one.
    #[serde(default)]
    pub root_certificate: Option<String>,
    /// CRL URL fetched before any certificate has been seen.
    #[serde(default)]
    pub default_crl_url: Option<String>,
    /// CRL poll interval when the list carries no future `nextUpdate`.
    #[serde(default = "default_fallback_secs")]
    pub crl_fallback_interval_secs: u64,
    /// Device name reported to status document servers; defaults to the host name.
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default = "default_provider_id")]
    pub provider_id_fallback: String,
    #[serde(default = "default_user_id")]
    pub user_id_fallback: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_certificate: None,
            default_crl_url: None,
            crl_fallback_interval_secs: default_fallback_secs(),
            device_name: None,
            provider_id_fallback: default_provider_id(),
            user_id_fallback: default_user_id(),
        }
    }
}

impl ServiceConfig {
    /// Loads a TOML configuration file.
    pub fn load_from(path: impl AsRef<Path>) -> LicenseResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| LicenseError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&contents)
            .map_err(|e| LicenseError::Config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "loaded service configuration");
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> LicenseResult<Self> {
        toml::from_str(contents).map_err(|e| LicenseError::Config(e.to_string()))
    }

    #[must_use]
    pub fn with_root_certificate(mut self, root_certificate: impl Into<String>) -> Self {
        self.root_certificate = Some(root_certificate.into());
        self
    }

    #[must_use]
    pub fn with_default_crl_url(mut self, url: impl Into<String>) -> Self {
        self.default_crl_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn crl_fallback_interval(&self) -> Duration {
        Duration::from_secs(self.crl_fallback_interval_secs)
    }
}
