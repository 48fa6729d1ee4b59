// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! NZBGet adapter.
//!
//! An NZBGet item can be in one of three places: the download queue, the
//! post-processing queue (unpack, repair, move, scripts) or the history.
//! A listing reconciles all three into [`DownloadClientItem`]s:
//!
//! - queue entries with a post-processing entry are `Downloading` and carry
//!   the stage label as message
//! - otherwise paused (globally, or nothing left but paused files) entries are
//!   `Paused`
//! - otherwise `Queued` while no connection is assigned, else `Downloading`
//! - history entries are `Completed` unless a post-processing stage failed;
//!   entries deleted manually by the user are left out
//!
//! Remaining-time estimates for the queue are cumulative in queue order, so an
//! item's estimate includes the backlog ahead of it.

pub mod proxy;
pub mod types;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::client::remap::remap_storage;
use crate::client::{dedupe_by_id, resolve_items, retain_category, DownloadClient};
use crate::config::{ClientDefinition, NzbgetSettings};
use crate::disk::DiskProvider;
use crate::error::DownloadClientError;
use crate::http::HttpProvider;
use crate::parser::ReleaseResolver;
use crate::types::{
    DownloadClientItem, DownloadClientStatus, DownloadItemStatus, DownloadProtocol, ReleaseInfo,
};
use crate::utils::clean_file_name;
use crate::validation::{test_folder, ValidationFailure};

pub use proxy::{HttpNzbgetProxy, NzbgetProxy};
pub use types::{
    NzbgetCategory, NzbgetGlobalStatus, NzbgetHistoryItem, NzbgetParameter, NzbgetPostQueueItem,
    NzbgetQueueItem,
};

/// Post-processing outcomes that count as success.
const SUCCESS_STATUSES: &[&str] = &["SUCCESS", "NONE"];

/// Category indices are scanned from 1 up to (excluding) this bound.
const MAX_CATEGORY_INDEX: usize = 100;

/// Join NZBGet's split 64-bit value: `(hi << 32) | lo`, read as signed.
///
/// ```
/// use fetchbridge::nzbget::make_i64;
///
/// assert_eq!(make_i64(0, 1_500_000_000), 1_500_000_000);
/// assert_eq!(make_i64(1, 0), 1 << 32);
/// ```
pub fn make_i64(high: u32, low: u32) -> i64 {
    (((high as u64) << 32) | low as u64) as i64
}

/// Categories from NZBGet's flattened config (`Category1.Name`, `Category2.Name`, ...).
///
/// Scanning stops at the first index without a name.
pub fn get_categories(config: &HashMap<String, String>) -> Vec<NzbgetCategory> {
    let mut categories = Vec::new();

    for i in 1..MAX_CATEGORY_INDEX {
        let key = |field: &str| format!("Category{}.{}", i, field);

        let Some(name) = config.get(&key("Name")) else {
            break;
        };

        let dest_dir = match config.get(&key("DestDir")).filter(|d| !d.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let main_dir = config.get("MainDir").map(String::as_str).unwrap_or("");
                let dest_dir = config
                    .get("DestDir")
                    .map(|d| d.replace("${MainDir}", main_dir))
                    .unwrap_or_default();

                let append = config
                    .get("AppendCategoryDir")
                    .map(|v| v == "yes")
                    .unwrap_or(true);

                if append {
                    Path::new(&dest_dir).join(name)
                } else {
                    PathBuf::from(dest_dir)
                }
            }
        };

        categories.push(NzbgetCategory {
            name: name.clone(),
            dest_dir,
            unpack: config.get(&key("Unpack")).map(|v| v == "yes").unwrap_or(false),
            def_script: config.get(&key("DefScript")).cloned(),
            aliases: config.get(&key("Aliases")).cloned(),
        });
    }

    categories
}

fn find_category(config: &HashMap<String, String>, name: &str) -> Option<NzbgetCategory> {
    get_categories(config).into_iter().find(|c| c.name == name)
}

/// Classify the download queue against the post-processing queue.
pub fn reconcile_queue(
    client_name: &str,
    status: &NzbgetGlobalStatus,
    queue: &[NzbgetQueueItem],
    post_queue: &[NzbgetPostQueueItem],
) -> Vec<DownloadClientItem> {
    let post_queue: HashMap<i32, &NzbgetPostQueueItem> =
        post_queue.iter().map(|p| (p.nzb_id, p)).collect();

    let mut total_remaining: i64 = 0;
    let mut items = Vec::with_capacity(queue.len());

    for entry in queue {
        // Sizes are signed on the wire; negative values count as nothing
        let total_size = make_i64(entry.file_size_hi, entry.file_size_lo).max(0);
        let paused_size = make_i64(entry.paused_size_hi, entry.paused_size_lo).max(0);
        let remaining_size = make_i64(entry.remaining_size_hi, entry.remaining_size_lo).max(0);

        let mut item = DownloadClientItem::new(
            client_name,
            entry.client_id(),
            clean_file_name(&entry.nzb_name),
            DownloadItemStatus::Downloading,
        );
        item.category = entry.category.clone();
        item.total_size = total_size;

        if let Some(post) = post_queue.get(&entry.nzb_id) {
            item.message = Some(post.progress_label.clone());

            if post.stage_progress != 0 {
                let elapsed = post.stage_time_sec as i64;
                let secs = elapsed * 1000 / post.stage_progress as i64 - elapsed;
                item.remaining_time = u64::try_from(secs).ok().map(Duration::from_secs);
            }
        } else if status.download_paused || remaining_size == paused_size {
            item.status = DownloadItemStatus::Paused;
            item.remaining_size = remaining_size.min(total_size);
        } else {
            if entry.active_downloads == 0 && remaining_size != 0 {
                item.status = DownloadItemStatus::Queued;
            }

            item.remaining_size = remaining_size.saturating_sub(paused_size).clamp(0, total_size);

            if status.download_rate > 0 {
                total_remaining = total_remaining.saturating_add(item.remaining_size);
                let secs = total_remaining / status.download_rate;
                item.remaining_time = u64::try_from(secs).ok().map(Duration::from_secs);
            }
        }

        tracing::trace!(
            id = %item.download_client_id,
            status = %item.status,
            remaining = item.remaining_size,
            "Classified queue item"
        );
        items.push(item);
    }

    items
}

/// Classify history entries, skipping manual deletions.
pub fn history_items(client_name: &str, history: &[NzbgetHistoryItem]) -> Vec<DownloadClientItem> {
    history
        .iter()
        .filter(|entry| {
            let manual = entry.delete_status == "MANUAL";
            if manual {
                tracing::trace!(id = entry.id, name = %entry.name, "Skipping manually deleted history item");
            }
            !manual
        })
        .map(|entry| {
            let failed = [
                &entry.par_status,
                &entry.unpack_status,
                &entry.move_status,
                &entry.script_status,
            ]
            .iter()
            .any(|s| !SUCCESS_STATUSES.contains(&s.as_str()));

            let status = if failed {
                DownloadItemStatus::Failed
            } else {
                DownloadItemStatus::Completed
            };

            let mut item = DownloadClientItem::new(
                client_name,
                entry.client_id(),
                clean_file_name(&entry.name),
                status,
            );
            item.category = entry.category.clone();
            item.total_size = make_i64(entry.file_size_hi, entry.file_size_lo).max(0);
            item.remaining_time = Some(Duration::ZERO);
            if !entry.dest_dir.is_empty() {
                item.output_path = Some(PathBuf::from(&entry.dest_dir));
            }
            item.message = Some(format!(
                "PAR Status: {} - Unpack Status: {} - Move Status: {} - Script Status: {} - Delete Status: {} - Mark Status: {}",
                entry.par_status,
                entry.unpack_status,
                entry.move_status,
                entry.script_status,
                entry.delete_status,
                entry.mark_status
            ));
            item
        })
        .collect()
}

/// Adapter for an NZBGet server.
#[derive(Clone)]
pub struct Nzbget {
    proxy: Arc<dyn NzbgetProxy>,
    http: Arc<dyn HttpProvider>,
    disk: Arc<dyn DiskProvider>,
    resolver: Arc<dyn ReleaseResolver>,
}

impl Nzbget {
    pub fn new(
        proxy: Arc<dyn NzbgetProxy>,
        http: Arc<dyn HttpProvider>,
        disk: Arc<dyn DiskProvider>,
        resolver: Arc<dyn ReleaseResolver>,
    ) -> Self {
        Self {
            proxy,
            http,
            disk,
            resolver,
        }
    }

    fn get_queue(&self, definition: &ClientDefinition<NzbgetSettings>) -> Result<Vec<DownloadClientItem>, DownloadClientError> {
        let settings = &definition.settings;

        let status = self.proxy.get_global_status(settings)?;
        let queue = self.proxy.get_queue(settings)?;
        let post_queue = self.proxy.get_post_queue(settings)?;

        Ok(reconcile_queue(&definition.name, &status, &queue, &post_queue))
    }

    fn get_history(&self, definition: &ClientDefinition<NzbgetSettings>) -> Result<Vec<DownloadClientItem>, DownloadClientError> {
        let settings = &definition.settings;

        let mut history = self.proxy.get_history(settings)?;
        history.truncate(settings.history_limit);

        Ok(history_items(&definition.name, &history))
    }

    fn test_connection(&self, settings: &NzbgetSettings) -> Option<ValidationFailure> {
        match self.proxy.get_version(settings) {
            Ok(version) => {
                tracing::debug!(host = %settings.host, version = %version, "Connected to NZBGet");
                None
            }
            Err(e) => {
                if matches!(e, DownloadClientError::AuthenticationFailed(_))
                    || e.to_string().to_lowercase().contains("authentication failed")
                {
                    return Some(ValidationFailure::new("Username", "Authentication failed"));
                }
                tracing::error!(host = %settings.host, error = %e, "Unable to connect to NZBGet");
                Some(ValidationFailure::new("Host", "Unable to connect to NZBGet"))
            }
        }
    }

    fn test_category(&self, settings: &NzbgetSettings) -> Result<Option<ValidationFailure>, DownloadClientError> {
        if settings.tv_category.trim().is_empty() {
            return Ok(None);
        }

        let config = self.proxy.get_config(settings)?;
        if find_category(&config, &settings.tv_category).is_some() {
            return Ok(None);
        }

        Ok(Some(
            ValidationFailure::new("TvCategory", "Category does not exist")
                .with_info_link(format!("http://{}:{}/", settings.host, settings.port))
                .with_detailed_description(
                    "The category you entered doesn't exist in NZBGet. Go to NZBGet to create it.",
                ),
        ))
    }
}

impl DownloadClient for Nzbget {
    type Settings = NzbgetSettings;

    fn implementation(&self) -> &'static str {
        "NZBGet"
    }

    fn protocol(&self) -> DownloadProtocol {
        DownloadProtocol::Usenet
    }

    fn download(
        &self,
        definition: &ClientDefinition<NzbgetSettings>,
        release: &ReleaseInfo,
    ) -> Result<Option<String>, DownloadClientError> {
        let settings = &definition.settings;
        let filename = format!("{}.nzb", release.title);
        let priority = if release.is_recent {
            settings.recent_tv_priority
        } else {
            settings.older_tv_priority
        };

        let nzb = self.http.download_bytes(&release.download_url)?;

        tracing::info!(client = %definition.name, title = %filename, "Adding report to the queue");

        let id = self
            .proxy
            .download_nzb(&nzb, &filename, &settings.tv_category, priority.value(), settings)?;

        Ok(Some(id))
    }

    fn fetch_items(
        &self,
        definition: &ClientDefinition<NzbgetSettings>,
    ) -> Result<Vec<DownloadClientItem>, DownloadClientError> {
        let settings = &definition.settings;

        let category = match settings.local_path() {
            Some(_) => {
                let config = self.proxy.get_config(settings)?;
                find_category(&config, &settings.tv_category)
            }
            None => None,
        };

        let mut items = self.get_queue(definition)?;
        items.extend(self.get_history(definition)?);

        retain_category(&mut items, &settings.tv_category);

        if let Some(category) = &category {
            for item in &mut items {
                remap_storage(item, &category.dest_dir, settings.local_path());
            }
        }

        let items = resolve_items(items, self.resolver.as_ref());
        Ok(dedupe_by_id(items))
    }

    fn remove_item(&self, definition: &ClientDefinition<NzbgetSettings>, id: &str) -> Result<(), DownloadClientError> {
        self.proxy.remove_from_history(id, &definition.settings)
    }

    fn retry_download(&self, definition: &ClientDefinition<NzbgetSettings>, id: &str) -> Result<(), DownloadClientError> {
        self.proxy.retry_download(id, &definition.settings)
    }

    fn get_status(
        &self,
        definition: &ClientDefinition<NzbgetSettings>,
    ) -> Result<DownloadClientStatus, DownloadClientError> {
        let settings = &definition.settings;
        let config = self.proxy.get_config(settings)?;

        let output_root_folders = match find_category(&config, &settings.tv_category) {
            Some(category) => match settings.local_path() {
                Some(local) => vec![PathBuf::from(local)],
                None => vec![category.dest_dir],
            },
            None => Vec::new(),
        };

        Ok(DownloadClientStatus {
            is_localhost: settings.is_localhost(),
            output_root_folders,
        })
    }

    fn test(
        &self,
        definition: &ClientDefinition<NzbgetSettings>,
        failures: &mut Vec<ValidationFailure>,
    ) -> Result<(), DownloadClientError> {
        let settings = &definition.settings;

        if let Some(failure) = self.test_connection(settings) {
            // Nothing else can be checked without a connection
            failures.push(failure);
            return Ok(());
        }

        failures.extend(self.test_category(settings)?);

        if let Some(local) = settings.local_path() {
            failures.extend(test_folder(self.disk.as_ref(), Path::new(local), "TvCategoryLocalPath", true));
        }

        Ok(())
    }
}
