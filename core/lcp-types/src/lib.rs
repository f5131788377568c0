//! Core type definitions shared by the LCP client crates.
//!
//! This crate defines the shared vocabulary used throughout the
//! trust and decryption pipeline:
//! - The `Status` / `StatusCode` taxonomy returned by every public operation
//! - License links (possibly repeated per relation name)
//! - Timestamp parsing for license and certificate dates
//! - Collaborator contracts: network, storage and readable streams
//!
//! Cryptography, certificate handling and license orchestration live in
//! their own crates and depend on this one.

mod links;
mod net;
mod status;
mod storage;
mod stream;
mod timestamp;

pub use links::{Link, Links};
pub use net::{
    DownloadRequest, NetCallback, NetEvent, NetProvider, PendingDownload, download_blocking,
};
pub use status::{LcpResult, Status, StatusCode};
pub use storage::{MemoryStorageProvider, StorageKey, StorageProvider};
pub use stream::ReadableStream;
pub use timestamp::{format_timestamp, parse_timestamp};
