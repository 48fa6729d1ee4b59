// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! NZBGet JSON-RPC wire types.
//!
//! Field names follow NZBGet's API exactly. 64-bit sizes arrive split into
//! `...Hi`/`...Lo` 32-bit halves and are joined with [`super::make_i64`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Name of the post-processing parameter carrying our correlation id.
pub const DRONE_PARAMETER: &str = "drone";

/// JSON-RPC request body.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub method: &'a str,
    pub params: Vec<serde_json::Value>,
}

/// JSON-RPC response envelope; exactly one of `result`/`error` is set.
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonRpcError {
    pub name: String,
    pub code: i32,
    pub message: String,
}

/// Result of the `status` method (only the fields we use).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NzbgetGlobalStatus {
    /// Bytes per second.
    pub download_rate: i64,
    pub download_paused: bool,
}

/// Name/value pair, used for post-processing parameters and config entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NzbgetParameter {
    pub name: String,
    pub value: String,
}

impl NzbgetParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

fn drone_value(parameters: &[NzbgetParameter]) -> Option<&str> {
    parameters
        .iter()
        .find(|p| p.name == DRONE_PARAMETER)
        .map(|p| p.value.as_str())
}

/// Entry of the download queue (`listgroups`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NzbgetQueueItem {
    #[serde(rename = "NZBID")]
    pub nzb_id: i32,
    #[serde(rename = "NZBName")]
    pub nzb_name: String,
    pub category: String,
    pub file_size_lo: u32,
    pub file_size_hi: u32,
    pub remaining_size_lo: u32,
    pub remaining_size_hi: u32,
    pub paused_size_lo: u32,
    pub paused_size_hi: u32,
    pub active_downloads: i32,
    pub parameters: Vec<NzbgetParameter>,
}

impl NzbgetQueueItem {
    /// Our correlation id when present, else NZBGet's own id.
    pub fn client_id(&self) -> String {
        drone_value(&self.parameters)
            .map(str::to_string)
            .unwrap_or_else(|| self.nzb_id.to_string())
    }
}

/// Entry of the post-processing queue (`postqueue`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NzbgetPostQueueItem {
    #[serde(rename = "NZBID")]
    pub nzb_id: i32,
    pub progress_label: String,
    /// Per-mille of the current stage.
    pub stage_progress: i32,
    pub stage_time_sec: i32,
}

/// Entry of the history (`history`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NzbgetHistoryItem {
    #[serde(rename = "ID")]
    pub id: i32,
    pub name: String,
    pub category: String,
    pub file_size_lo: u32,
    pub file_size_hi: u32,
    pub dest_dir: String,
    pub par_status: String,
    pub unpack_status: String,
    pub move_status: String,
    pub script_status: String,
    pub delete_status: String,
    pub mark_status: String,
    pub parameters: Vec<NzbgetParameter>,
}

impl NzbgetHistoryItem {
    pub fn client_id(&self) -> String {
        drone_value(&self.parameters)
            .map(str::to_string)
            .unwrap_or_else(|| self.id.to_string())
    }

    /// True if `id` names this entry, by correlation id or numeric id.
    pub fn matches(&self, id: &str) -> bool {
        drone_value(&self.parameters) == Some(id) || self.id.to_string() == id
    }
}

/// A storage bucket configured in NZBGet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NzbgetCategory {
    pub name: String,
    pub dest_dir: PathBuf,
    pub unpack: bool,
    pub def_script: Option<String>,
    pub aliases: Option<String>,
}
