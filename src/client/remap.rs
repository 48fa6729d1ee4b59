// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Path remapping between a backend's filesystem view and ours.
//!
//! When a backend runs on another machine or in a container, the paths it
//! reports (e.g. `/downloads/tv/Show.S01E01`) are not the paths we can open
//! (e.g. `/mnt/nas/tv/Show.S01E01`). Given the backend-side root and the
//! configured local equivalent, the prefix is swapped.

use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::types::DownloadClientItem;

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn trim_separators(path: &str) -> &str {
    let trimmed = path.trim_end_matches(is_separator);
    // Keep a bare root like "/" intact
    if trimmed.is_empty() && !path.is_empty() {
        &path[..1]
    } else {
        trimmed
    }
}

/// Rewrite `path` from under `remote_root` to under `local_root`.
///
/// Returns `None` when `path` is not inside `remote_root`. The match must end
/// at a separator so `/data/tv2` is not treated as inside `/data/tv`.
/// Separators in the rewritten remainder are converted to the local style.
///
/// # Examples
///
/// ```
/// use fetchbridge::client::remap::remap_path;
///
/// let remapped = remap_path("/downloads/tv/Show/ep.mkv", "/downloads/tv", "/mnt/tv");
/// assert_eq!(remapped.as_deref(), Some("/mnt/tv/Show/ep.mkv"));
/// assert_eq!(remap_path("/other/Show", "/downloads/tv", "/mnt/tv"), None);
/// ```
pub fn remap_path(path: &str, remote_root: &str, local_root: &str) -> Option<String> {
    if path.trim().is_empty() || remote_root.trim().is_empty() || local_root.trim().is_empty() {
        return None;
    }

    let remote_root = trim_separators(remote_root);
    let local_root = trim_separators(local_root);

    let rest = path.strip_prefix(remote_root)?;
    if !rest.is_empty() && !rest.starts_with(is_separator) && !remote_root.ends_with(is_separator) {
        return None;
    }

    let rest: String = rest
        .chars()
        .map(|c| if is_separator(c) { MAIN_SEPARATOR } else { c })
        .collect();
    let rest = rest.trim_start_matches(MAIN_SEPARATOR);

    if rest.is_empty() {
        Some(local_root.to_string())
    } else if local_root.ends_with(is_separator) {
        Some(format!("{}{}", local_root, rest))
    } else {
        Some(format!("{}{}{}", local_root, MAIN_SEPARATOR, rest))
    }
}

/// Rewrite an item's output path from the backend namespace into ours.
///
/// Leaves the item untouched when it has no output path, when no local
/// override is configured, or when the path lies outside `remote_root`.
pub fn remap_storage(item: &mut DownloadClientItem, remote_root: &Path, local_root: Option<&str>) {
    let Some(local_root) = local_root else {
        return;
    };
    let Some(output) = item.output_path.as_ref() else {
        return;
    };

    let output = output.to_string_lossy();
    let remote = remote_root.to_string_lossy();

    if let Some(remapped) = remap_path(&output, &remote, local_root) {
        tracing::trace!(from = %output, to = %remapped, "Remapped output path");
        item.output_path = Some(PathBuf::from(remapped));
    }
}
