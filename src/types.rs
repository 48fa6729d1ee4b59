// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Canonical types shared by every download-client adapter.
//!
//! Whatever a backend calls its jobs, adapters hand the rest of the system
//! [`DownloadClientItem`]s with one of five [`DownloadItemStatus`] values.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transfer protocol a release is fetched over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadProtocol {
    Usenet,
    Torrent,
}

impl fmt::Display for DownloadProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadProtocol::Usenet => write!(f, "usenet"),
            DownloadProtocol::Torrent => write!(f, "torrent"),
        }
    }
}

/// Status of an item as seen by the rest of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloadItemStatus {
    /// Waiting in the backend queue, nothing assigned yet
    Queued,
    /// Being fetched or post-processed
    Downloading,
    /// Held by the user or by a global pause
    Paused,
    /// Finished and available at the output path
    Completed,
    /// Finished, but one of the post-processing stages failed
    Failed,
}

impl DownloadItemStatus {
    /// Returns true once the backend will not touch the item again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadItemStatus::Completed | DownloadItemStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DownloadItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A release picked by the search side, ready to be handed to a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Display title, also used to name the payload file.
    pub title: String,
    /// Where the NZB (or torrent) payload can be fetched.
    pub download_url: String,
    pub protocol: DownloadProtocol,
    /// Recently aired releases may be queued with a different priority.
    pub is_recent: bool,
}

impl ReleaseInfo {
    pub fn usenet(title: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            download_url: download_url.into(),
            protocol: DownloadProtocol::Usenet,
            is_recent: false,
        }
    }

    pub fn recent(mut self, is_recent: bool) -> Self {
        self.is_recent = is_recent;
        self
    }
}

/// Result of resolving an item title to a known series and episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEpisode {
    pub series_title: String,
    pub season_number: u32,
    pub episode_numbers: Vec<u32>,
}

/// Canonical unit exposed to the rest of the system.
///
/// `download_client_id` is unique within one backend's result set for one
/// call, and `total_size >= remaining_size >= 0` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadClientItem {
    /// Name of the configured client that reported the item.
    pub download_client: String,
    /// Stable identity within the backend, used to follow the item across polls.
    pub download_client_id: String,
    pub title: String,
    /// Backend-side category; empty for backends that have none.
    pub category: String,
    pub total_size: i64,
    pub remaining_size: i64,
    /// Absent while paused or when throughput is zero.
    pub remaining_time: Option<Duration>,
    pub output_path: Option<PathBuf>,
    pub status: DownloadItemStatus,
    pub message: Option<String>,
    /// Filled in by release resolution; unresolved items never leave an adapter.
    pub remote_episode: Option<RemoteEpisode>,
}

impl DownloadClientItem {
    /// Create an item with the identity fields set and everything else empty.
    pub fn new(
        download_client: impl Into<String>,
        download_client_id: impl Into<String>,
        title: impl Into<String>,
        status: DownloadItemStatus,
    ) -> Self {
        Self {
            download_client: download_client.into(),
            download_client_id: download_client_id.into(),
            title: title.into(),
            category: String::new(),
            total_size: 0,
            remaining_size: 0,
            remaining_time: None,
            output_path: None,
            status,
            message: None,
            remote_episode: None,
        }
    }

    /// Equality ignoring the remaining-time estimate, which drifts with wall time.
    pub fn same_state(&self, other: &Self) -> bool {
        self.download_client_id == other.download_client_id
            && self.title == other.title
            && self.category == other.category
            && self.total_size == other.total_size
            && self.remaining_size == other.remaining_size
            && self.output_path == other.output_path
            && self.status == other.status
            && self.message == other.message
    }
}

/// What the driver needs to know about where a backend writes its output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadClientStatus {
    /// Backend output is reachable without remapping.
    pub is_localhost: bool,
    pub output_root_folders: Vec<PathBuf>,
}
