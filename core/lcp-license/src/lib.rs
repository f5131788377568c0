//! LCP license lifecycle.
//!
//! This crate handles:
//! - Parsing licenses and computing the canonical form their signature covers
//! - The per-license state machine `Opened → Verified → Unlocked → Decrypted`
//! - A registry of opened licenses, one per id
//! - Unlocking by passphrase or by a user key remembered in storage
//! - Decryption of publication resources, in memory or as a stream
//! - License Status Document processing gating decryption
//!
//! # Design Principles
//!
//! - **No globals**: collaborators arrive through [`ServiceContext`]
//! - **Uniform results**: every operation returns `LcpResult<T>`
//! - **Fail-open revocation**: an unreachable CRL server does not block reading

mod canonical;
mod config;
mod device;
mod document;
mod error;
mod license;
#[cfg(feature = "online")]
mod net;
mod service;
mod status_document;

pub use canonical::{canonical_license, canonicalize};
pub use config::{ServiceConfig, UNKNOWN_PROVIDER, UNKNOWN_USER_ID};
pub use device::DeviceIdentity;
pub use document::{
    ContentKeyInfo, Encryption, LicenseDocument, Rights, SignatureInfo, UserInfo, UserKeyInfo,
};
pub use error::{LicenseError, LicenseResult};
pub use license::{License, LicenseState};
pub use service::{LicenseService, ServiceContext};
pub use status_document::{
    LICENSE_LINK, LicenseStatus, PotentialRights, STATUS_LINK, StatusDocument,
    StatusDocumentState, StatusUpdated, expand_template, hash_matches,
};

#[cfg(feature = "online")]
pub use net::HttpNetProvider;
