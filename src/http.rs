// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Fetching release payloads (NZB files) from indexers.

use std::time::Duration;

use crate::error::DownloadClientError;

/// Default timeout for connection establishment (in seconds).
const CONNECTION_TIMEOUT_SECS: u64 = 10;

/// Default timeout for a whole payload download (in seconds).
const DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Downloads release payloads by URL.
pub trait HttpProvider: Send + Sync {
    fn download_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadClientError>;
}

/// [`HttpProvider`] backed by a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl ReqwestHttp {
    pub fn new() -> Result<Self, DownloadClientError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
            .user_agent(concat!("fetchbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DownloadClientError::Unreachable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(DOWNLOAD_TIMEOUT_SECS),
        })
    }

    /// Set a custom timeout for payload downloads.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl HttpProvider for ReqwestHttp {
    fn download_bytes(&self, url: &str) -> Result<Vec<u8>, DownloadClientError> {
        tracing::debug!(url = %url, "Downloading release payload");

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| DownloadClientError::from_reqwest(e, url))?;

        let bytes = response
            .bytes()
            .map_err(|e| DownloadClientError::from_reqwest(e, url))?;

        Ok(bytes.to_vec())
    }
}
