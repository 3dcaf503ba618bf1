//! Download of remote archives.
//!
//! Stages only see the `Fetcher` trait; the blocking reqwest client lives here.

use reqwest::blocking::Client;
use std::time::Duration;

use crate::error::{Error, Result};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fetches the full body behind a URL.
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Blocking HTTP(S) fetcher. No retries; any failure is surfaced as
/// `network.fetch_failed`.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("vimbuild/{}", VERSION))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create HTTP client".to_string())))?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        log_status!("fetch", "GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| Error::network_fetch_failed(url, e.to_string(), None))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network_fetch_failed(
                url,
                format!("HTTP {}", status),
                Some(status.as_u16()),
            ));
        }

        let body = response
            .bytes()
            .map_err(|e| Error::network_fetch_failed(url, e.to_string(), Some(status.as_u16())))?;

        Ok(body.to_vec())
    }
}
