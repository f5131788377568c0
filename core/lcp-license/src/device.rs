//! Device identity reported to the status document server.
//!
//! The id is a stable fingerprint of the machine: it survives restarts and
//! changes only when the host identity changes. The name is the configured
//! device name or the host name.

use lcp_crypto::sha256;
use serde::{Deserialize, Serialize};
use std::env;

/// Identity sent as `id` and `name` in status document URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    id: String,
    name: String,
}

impl DeviceIdentity {
    /// Identity of the current machine, named `name` when given.
    #[must_use]
    pub fn current(name: Option<&str>) -> Self {
        let components = collect_device_ids();
        let digest = sha256(components.join("|").as_bytes());
        Self {
            id: hex::encode(&digest[..16]),
            name: name
                .filter(|name| !name.is_empty())
                .map_or_else(host_name, str::to_string),
        }
    }

    /// Fixed identity, for embedders that manage their own device ids.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Template variables for status document links.
    #[must_use]
    pub fn template_vars(&self) -> [(&str, &str); 2] {
        [("id", self.id.as_str()), ("name", self.name.as_str())]
    }
}

fn collect_device_ids() -> Vec<String> {
    let mut ids = vec![
        env::consts::OS.to_string(),
        env::consts::ARCH.to_string(),
        host_name(),
    ];
    ids.extend(platform_uuid());
    ids.extend(["USER", "USERNAME"].iter().find_map(|var| env::var(var).ok()));
    ids
}

fn host_name() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(target_os = "linux")]
fn platform_uuid() -> Option<String> {
    ["/etc/machine-id", "/var/lib/dbus/machine-id"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|contents| contents.trim().to_string())
        .find(|id| !id.is_empty())
}

#[cfg(target_os = "macos")]
fn platform_uuid() -> Option<String> {
    let output = std::process::Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .ok()?;
    let text = String::from_utf8(output.stdout).ok()?;
    let line = text.lines().find(|line| line.contains("\"IOPlatformUUID\""))?;
    line.rsplit('"').nth(1).map(str::to_string)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn platform_uuid() -> Option<String> {
    None
}
