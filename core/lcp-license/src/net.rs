//! HTTP transport over `reqwest` (feature `online`).

use lcp_types::{DownloadRequest, LcpResult, NetCallback, NetEvent, NetProvider, Status, StatusCode};
use std::io::Read;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;

/// [`NetProvider`] running each download on its own thread with a blocking
/// client. The cancel flag is checked between body chunks.
#[derive(Debug, Clone)]
pub struct HttpNetProvider {
    client: reqwest::blocking::Client,
}

impl HttpNetProvider {
    pub fn new() -> LcpResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("lcp-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                Status::with_context(StatusCode::RequestFailed, format!("http client: {e}"))
            })?;
        Ok(Self { client })
    }

    #[must_use]
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl NetProvider for HttpNetProvider {
    fn start_download(&self, request: Arc<DownloadRequest>, callback: Arc<dyn NetCallback>) {
        let client = self.client.clone();
        thread::spawn(move || {
            callback.on_event(&request, NetEvent::Started);
            let event = match fetch(&client, &request, callback.as_ref()) {
                Ok(()) if request.is_canceled() => NetEvent::Canceled,
                Ok(()) => NetEvent::Ended(Ok(())),
                Err(status) => NetEvent::Ended(Err(status)),
            };
            callback.on_event(&request, event);
        });
    }
}

fn fetch(
    client: &reqwest::blocking::Client,
    request: &DownloadRequest,
    callback: &dyn NetCallback,
) -> LcpResult<()> {
    let url = request.url();
    let mut response = client
        .get(url)
        .send()
        .map_err(|e| {
            Status::with_context(StatusCode::RequestFailed, format!("fetch failed: {e}"))
        })?;
    if !response.status().is_success() {
        return Err(Status::with_context(
            StatusCode::RequestFailed,
            format!("HTTP {} fetching {url}", response.status()),
        ));
    }

    let total = response.content_length();
    let mut received = 0u64;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        if request.is_canceled() {
            debug!(url, "download canceled");
            return Ok(());
        }
        let n = response
            .read(&mut buffer)
            .map_err(|e| {
                Status::with_context(StatusCode::RequestFailed, format!("read body: {e}"))
            })?;
        if n == 0 {
            return Ok(());
        }
        request.write(&buffer[..n]);
        received += n as u64;
        if let Some(total) = total.filter(|&total| total > 0) {
            callback.on_event(request, NetEvent::Progressed(received as f32 / total as f32));
        }
    }
}
