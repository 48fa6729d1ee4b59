// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! fetchbridge - Download client integration library
//!
//! One item model for every download manager.
//!
//! Each backend speaks its own protocol and has its own vocabulary for the
//! state of a download. fetchbridge adapts them to a single
//! [`DownloadClientItem`] with five statuses, so a poller can treat an NZBGet
//! server and a blackhole folder the same way.
//!
//! # Core Modules
//!
//! - [`client`] - The `DownloadClient` contract, shared helpers and path remapping
//! - [`nzbget`] - NZBGet adapter (JSON-RPC queue, post-queue and history reconciliation)
//! - [`blackhole`] - Drop-folder / watch-folder adapter
//! - [`driver`] - Concurrent polling and snapshot diffing
//! - [`config`] - Config file model and per-backend settings
//! - [`validation`] - Structured validation failures
//! - [`error`] - Error taxonomy and operator-facing formatting

pub mod blackhole;
pub mod client;
pub mod config;
pub mod disk;
pub mod driver;
pub mod error;
pub mod http;
pub mod nzbget;
pub mod parser;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use types::{
    DownloadClientItem, DownloadClientStatus, DownloadItemStatus, DownloadProtocol, ReleaseInfo,
    RemoteEpisode,
};

pub use client::{Bound, ConfiguredClient, DownloadClient};
pub use config::{ClientConfig, ClientDefinition, Config, NzbgetSettings, UsenetBlackholeSettings};
pub use error::{format_error, DownloadClientError, ErrorBuilder};
pub use validation::{ValidationFailure, ValidationResult};

pub use blackhole::UsenetBlackhole;
pub use nzbget::Nzbget;

pub use driver::{poll_all, ClientFactory, ItemChange, PollOutcome, SnapshotTracker};
pub use parser::{ReleaseResolver, SceneTitleParser};
pub use utils::{clean_file_name, mask_sensitive};
