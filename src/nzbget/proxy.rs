// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! JSON-RPC transport for NZBGet.
//!
//! [`NzbgetProxy`] exposes the raw API methods the adapter needs. Submission,
//! removal and retry are provided methods built on top of `append`,
//! `history` and `editqueue`, so alternative transports only implement the
//! primitives.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::config::NzbgetSettings;
use crate::error::DownloadClientError;
use crate::utils::mask_sensitive;

use super::types::{
    JsonRpcRequest, JsonRpcResponse, NzbgetGlobalStatus, NzbgetHistoryItem, NzbgetParameter,
    NzbgetPostQueueItem, NzbgetQueueItem, DRONE_PARAMETER,
};

/// Default timeout for connection establishment (in seconds).
const CONNECTION_TIMEOUT_SECS: u64 = 10;

/// Raw NZBGet API calls.
pub trait NzbgetProxy: Send + Sync {
    fn get_version(&self, settings: &NzbgetSettings) -> Result<String, DownloadClientError>;

    fn get_global_status(&self, settings: &NzbgetSettings) -> Result<NzbgetGlobalStatus, DownloadClientError>;

    fn get_queue(&self, settings: &NzbgetSettings) -> Result<Vec<NzbgetQueueItem>, DownloadClientError>;

    fn get_post_queue(&self, settings: &NzbgetSettings) -> Result<Vec<NzbgetPostQueueItem>, DownloadClientError>;

    fn get_history(&self, settings: &NzbgetSettings) -> Result<Vec<NzbgetHistoryItem>, DownloadClientError>;

    /// Flattened `Name -> Value` view of the server configuration.
    fn get_config(&self, settings: &NzbgetSettings) -> Result<HashMap<String, String>, DownloadClientError>;

    /// Add an NZB to the queue. Returns NZBGet's id, `<= 0` on rejection.
    fn append(
        &self,
        filename: &str,
        content: &[u8],
        category: &str,
        priority: i32,
        parameters: &[NzbgetParameter],
        settings: &NzbgetSettings,
    ) -> Result<i32, DownloadClientError>;

    fn edit_queue(
        &self,
        command: &str,
        offset: i32,
        edit_text: &str,
        id: i32,
        settings: &NzbgetSettings,
    ) -> Result<bool, DownloadClientError>;

    /// Submit an NZB tagged with a fresh correlation id, which is returned.
    fn download_nzb(
        &self,
        nzb: &[u8],
        title: &str,
        category: &str,
        priority: i32,
        settings: &NzbgetSettings,
    ) -> Result<String, DownloadClientError> {
        let drone_id = new_drone_id();
        let parameters = [NzbgetParameter::new(DRONE_PARAMETER, drone_id.as_str())];

        let nzb_id = self.append(title, nzb, category, priority, &parameters, settings)?;
        if nzb_id <= 0 {
            return Err(DownloadClientError::Api(format!(
                "NZBGet rejected {} (append returned {})",
                title, nzb_id
            )));
        }

        tracing::debug!(title = %title, nzb_id, drone = %drone_id, "NZB appended");
        Ok(drone_id)
    }

    fn remove_from_history(&self, id: &str, settings: &NzbgetSettings) -> Result<(), DownloadClientError> {
        edit_history(self, id, "HistoryDelete", settings)
    }

    fn retry_download(&self, id: &str, settings: &NzbgetSettings) -> Result<(), DownloadClientError> {
        edit_history(self, id, "HistoryRedownload", settings)
    }
}

/// 128 random bits as 32 lowercase hex characters.
pub fn new_drone_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode(bytes)
}

fn edit_history<P: NzbgetProxy + ?Sized>(
    proxy: &P,
    id: &str,
    command: &str,
    settings: &NzbgetSettings,
) -> Result<(), DownloadClientError> {
    let history = proxy.get_history(settings)?;

    let Some(item) = history.iter().find(|h| h.matches(id)) else {
        tracing::warn!(id = %id, command = %command, "Unable to find download in NZBGet history");
        return Ok(());
    };

    if !proxy.edit_queue(command, 0, "", item.id, settings)? {
        return Err(DownloadClientError::Api(format!(
            "NZBGet refused {} for {}",
            command, item.name
        )));
    }

    tracing::info!(id = %id, nzb_id = item.id, command = %command, "NZBGet history updated");
    Ok(())
}

/// [`NzbgetProxy`] over HTTP with a blocking reqwest client.
#[derive(Debug, Clone)]
pub struct HttpNzbgetProxy {
    client: reqwest::blocking::Client,
}

impl HttpNzbgetProxy {
    pub fn new() -> Result<Self, DownloadClientError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
            .user_agent(concat!("fetchbridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DownloadClientError::Unreachable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    fn call<T: DeserializeOwned>(
        &self,
        settings: &NzbgetSettings,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, DownloadClientError> {
        let url = format!("{}/jsonrpc", settings.base_url());

        tracing::trace!(
            url = %url,
            method = %method,
            username = %settings.username,
            password = %mask_sensitive(&settings.password, 2),
            "NZBGet request"
        );

        let mut request = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .json(&JsonRpcRequest { method, params });

        if !settings.username.is_empty() || !settings.password.is_empty() {
            request = request.basic_auth(&settings.username, Some(&settings.password));
        }

        let response = request
            .send()
            .map_err(|e| DownloadClientError::from_reqwest(e, &url))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DownloadClientError::AuthenticationFailed(format!(
                "NZBGet at {} rejected user {}",
                settings.base_url(),
                settings.username
            )));
        }
        if !status.is_success() {
            return Err(DownloadClientError::Unreachable(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        let envelope: JsonRpcResponse<T> = response.json().map_err(|e| {
            DownloadClientError::InvalidResponse(format!("Failed to parse {} response: {}", method, e))
        })?;

        if let Some(error) = envelope.error {
            return Err(DownloadClientError::Api(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            )));
        }

        envelope
            .result
            .ok_or_else(|| DownloadClientError::InvalidResponse(format!("{} returned no result", method)))
    }
}

impl NzbgetProxy for HttpNzbgetProxy {
    fn get_version(&self, settings: &NzbgetSettings) -> Result<String, DownloadClientError> {
        self.call(settings, "version", Vec::new())
    }

    fn get_global_status(&self, settings: &NzbgetSettings) -> Result<NzbgetGlobalStatus, DownloadClientError> {
        self.call(settings, "status", Vec::new())
    }

    fn get_queue(&self, settings: &NzbgetSettings) -> Result<Vec<NzbgetQueueItem>, DownloadClientError> {
        self.call(settings, "listgroups", vec![json!(0)])
    }

    fn get_post_queue(&self, settings: &NzbgetSettings) -> Result<Vec<NzbgetPostQueueItem>, DownloadClientError> {
        self.call(settings, "postqueue", vec![json!(0)])
    }

    fn get_history(&self, settings: &NzbgetSettings) -> Result<Vec<NzbgetHistoryItem>, DownloadClientError> {
        self.call(settings, "history", vec![json!(false)])
    }

    fn get_config(&self, settings: &NzbgetSettings) -> Result<HashMap<String, String>, DownloadClientError> {
        let entries: Vec<NzbgetParameter> = self.call(settings, "config", Vec::new())?;
        Ok(entries.into_iter().map(|e| (e.name, e.value)).collect())
    }

    fn append(
        &self,
        filename: &str,
        content: &[u8],
        category: &str,
        priority: i32,
        parameters: &[NzbgetParameter],
        settings: &NzbgetSettings,
    ) -> Result<i32, DownloadClientError> {
        let content = base64::engine::general_purpose::STANDARD.encode(content);

        // NZBFilename, Content, Category, Priority, AddToTop, AddPaused,
        // DupeKey, DupeScore, DupeMode, PPParameters
        let params = vec![
            json!(filename),
            json!(content),
            json!(category),
            json!(priority),
            json!(false),
            json!(false),
            json!(""),
            json!(0),
            json!("SCORE"),
            json!(parameters),
        ];

        self.call(settings, "append", params)
    }

    fn edit_queue(
        &self,
        command: &str,
        offset: i32,
        edit_text: &str,
        id: i32,
        settings: &NzbgetSettings,
    ) -> Result<bool, DownloadClientError> {
        self.call(
            settings,
            "editqueue",
            vec![json!(command), json!(offset), json!(edit_text), json!([id])],
        )
    }
}
