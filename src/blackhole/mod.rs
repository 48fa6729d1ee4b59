// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Usenet blackhole adapter.
//!
//! There is no remote API. Releases are dropped as `.nzb` files into a folder
//! some external downloader watches, and finished downloads show up in a
//! second folder, either as a subfolder or as a bare video file. Anything
//! still held open (locked) by the downloader is reported as downloading.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{dedupe_by_id, resolve_items, DownloadClient};
use crate::config::{ClientDefinition, UsenetBlackholeSettings};
use crate::disk::{video_files, DiskProvider};
use crate::error::DownloadClientError;
use crate::http::HttpProvider;
use crate::parser::ReleaseResolver;
use crate::types::{
    DownloadClientItem, DownloadClientStatus, DownloadItemStatus, DownloadProtocol, ReleaseInfo,
};
use crate::utils::clean_file_name;
use crate::validation::{test_folder, ValidationFailure};

const IMPLEMENTATION: &str = "Usenet Blackhole";

/// Adapter for a drop-folder/watch-folder pair.
#[derive(Clone)]
pub struct UsenetBlackhole {
    http: Arc<dyn HttpProvider>,
    disk: Arc<dyn DiskProvider>,
    resolver: Arc<dyn ReleaseResolver>,
}

impl UsenetBlackhole {
    pub fn new(
        http: Arc<dyn HttpProvider>,
        disk: Arc<dyn DiskProvider>,
        resolver: Arc<dyn ReleaseResolver>,
    ) -> Self {
        Self { http, disk, resolver }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn watched_item(
        &self,
        client_name: &str,
        path: &Path,
        id_stamp: i64,
        total_size: i64,
        locked: bool,
    ) -> DownloadClientItem {
        let name = Self::file_name(path);
        let status = if locked {
            DownloadItemStatus::Downloading
        } else {
            DownloadItemStatus::Completed
        };

        let mut item = DownloadClientItem::new(
            client_name,
            format!("{}_{}_{}", client_name, name, id_stamp),
            clean_file_name(&name),
            status,
        );
        item.total_size = total_size;
        item.output_path = Some(path.to_path_buf());
        if !locked {
            item.remaining_time = Some(Duration::ZERO);
        }
        item
    }

    fn size_of(&self, file: &Path) -> i64 {
        match self.disk.get_file_size(file) {
            Ok(size) => i64::try_from(size).unwrap_or(i64::MAX),
            Err(e) => {
                // Files can vanish between listing and stat
                tracing::debug!(file = %file.display(), error = %e, "Unable to read file size");
                0
            }
        }
    }

    fn scan_folders(&self, client_name: &str, watch_folder: &Path) -> Result<Vec<DownloadClientItem>, DownloadClientError> {
        let mut items = Vec::new();

        for folder in self.disk.get_directories(watch_folder)? {
            let scanned = self
                .disk
                .get_files(&folder, true)
                .and_then(|files| Ok((files, self.disk.folder_creation_time_utc(&folder)?)));

            let (files, created) = match scanned {
                Ok(scanned) => scanned,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    // Moved or renamed by the downloader since the listing
                    tracing::debug!(folder = %folder.display(), error = %e, "Skipping vanished folder");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let total_size = files.iter().map(|f| self.size_of(f)).fold(0i64, i64::saturating_add);
            let locked = files.iter().any(|f| self.disk.is_file_locked(f));

            items.push(self.watched_item(
                client_name,
                &folder,
                created.timestamp_micros(),
                total_size,
                locked,
            ));
        }

        Ok(items)
    }

    fn scan_video_files(&self, client_name: &str, watch_folder: &Path) -> Result<Vec<DownloadClientItem>, DownloadClientError> {
        let mut items = Vec::new();

        for file in video_files(self.disk.as_ref(), watch_folder)? {
            let written = match self.disk.file_last_write_utc(&file) {
                Ok(written) => written,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::debug!(file = %file.display(), error = %e, "Skipping vanished file");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let locked = self.disk.is_file_locked(&file);

            items.push(self.watched_item(
                client_name,
                &file,
                written.timestamp_micros(),
                self.size_of(&file),
                locked,
            ));
        }

        Ok(items)
    }
}

impl DownloadClient for UsenetBlackhole {
    type Settings = UsenetBlackholeSettings;

    fn implementation(&self) -> &'static str {
        IMPLEMENTATION
    }

    fn protocol(&self) -> DownloadProtocol {
        DownloadProtocol::Usenet
    }

    fn download(
        &self,
        definition: &ClientDefinition<UsenetBlackholeSettings>,
        release: &ReleaseInfo,
    ) -> Result<Option<String>, DownloadClientError> {
        let filename: PathBuf = definition
            .settings
            .nzb_folder
            .join(format!("{}.nzb", clean_file_name(&release.title)));

        tracing::debug!(url = %release.download_url, file = %filename.display(), "Downloading NZB");

        let nzb = self.http.download_bytes(&release.download_url)?;
        self.disk.write_file(&filename, &nzb)?;

        tracing::info!(client = %definition.name, file = %filename.display(), "NZB saved to blackhole");
        Ok(None)
    }

    fn fetch_items(
        &self,
        definition: &ClientDefinition<UsenetBlackholeSettings>,
    ) -> Result<Vec<DownloadClientItem>, DownloadClientError> {
        let watch_folder = &definition.settings.watch_folder;

        let mut items = self.scan_folders(&definition.name, watch_folder)?;
        items.extend(self.scan_video_files(&definition.name, watch_folder)?);

        let items = resolve_items(items, self.resolver.as_ref());
        Ok(dedupe_by_id(items))
    }

    fn remove_item(&self, _definition: &ClientDefinition<UsenetBlackholeSettings>, _id: &str) -> Result<(), DownloadClientError> {
        Err(DownloadClientError::not_supported(IMPLEMENTATION, "RemoveItem"))
    }

    fn retry_download(&self, _definition: &ClientDefinition<UsenetBlackholeSettings>, _id: &str) -> Result<(), DownloadClientError> {
        Err(DownloadClientError::not_supported(IMPLEMENTATION, "RetryDownload"))
    }

    fn get_status(
        &self,
        definition: &ClientDefinition<UsenetBlackholeSettings>,
    ) -> Result<DownloadClientStatus, DownloadClientError> {
        Ok(DownloadClientStatus {
            is_localhost: true,
            output_root_folders: vec![definition.settings.watch_folder.clone()],
        })
    }

    fn test(
        &self,
        definition: &ClientDefinition<UsenetBlackholeSettings>,
        failures: &mut Vec<ValidationFailure>,
    ) -> Result<(), DownloadClientError> {
        let settings = &definition.settings;

        failures.extend(test_folder(self.disk.as_ref(), &settings.nzb_folder, "NzbFolder", true));
        failures.extend(test_folder(self.disk.as_ref(), &settings.watch_folder, "WatchFolder", true));

        Ok(())
    }
}
