// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Disk access used by filesystem-based adapters and folder validation.
//!
//! [`DiskProvider`] is the seam; [`LocalDisk`] talks to the real filesystem.
//! A file counts as "locked" when another handle holds an exclusive lock on
//! it, which is how in-flight downloads in a watch folder are recognised.

use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use fs2::FileExt;

/// Name of the probe file written while checking folder permissions.
const WRITE_PROBE_FILE: &str = "fetchbridge_test.txt";

/// Extensions recognised as finished video files.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "3gp", "asf", "avi", "divx", "dvr-ms", "flv", "iso", "m2ts", "m2v", "m4v", "mkv", "mov",
    "mp4", "mpeg", "mpg", "ogm", "ogv", "rm", "rmvb", "ts", "vob", "webm", "wmv", "wtv", "xvid",
];

/// Filesystem operations needed by the adapters.
pub trait DiskProvider: Send + Sync {
    fn folder_exists(&self, path: &Path) -> bool;

    /// Write and delete a probe file; `Err` if the folder refuses writes.
    fn check_folder_writable(&self, path: &Path) -> io::Result<()>;

    /// Immediate subdirectories, sorted by path.
    fn get_directories(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Files in `path`, descending into subdirectories when `recursive`, sorted by path.
    fn get_files(&self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>>;

    fn get_file_size(&self, path: &Path) -> io::Result<u64>;

    /// True if another process currently holds the file open exclusively.
    fn is_file_locked(&self, path: &Path) -> bool;

    fn folder_creation_time_utc(&self, path: &Path) -> io::Result<DateTime<Utc>>;

    fn file_last_write_utc(&self, path: &Path) -> io::Result<DateTime<Utc>>;

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// [`DiskProvider`] backed by `std::fs` and `fs2` advisory locks.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDisk;

impl LocalDisk {
    pub fn new() -> Self {
        Self
    }

    fn collect_files(path: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_type = entry.file_type()?;

            if file_type.is_file() {
                out.push(entry.path());
            } else if recursive && file_type.is_dir() {
                Self::collect_files(&entry.path(), recursive, out)?;
            }
        }
        Ok(())
    }
}

impl DiskProvider for LocalDisk {
    fn folder_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn check_folder_writable(&self, path: &Path) -> io::Result<()> {
        let probe = path.join(WRITE_PROBE_FILE);
        fs::write(&probe, Utc::now().to_rfc3339())?;
        fs::remove_file(&probe)
    }

    fn get_directories(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn get_files(&self, path: &Path, recursive: bool) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        Self::collect_files(path, recursive, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn get_file_size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }

    fn is_file_locked(&self, path: &Path) -> bool {
        let file = match OpenOptions::new().read(true).open(path) {
            Ok(file) => file,
            // Gone since the listing: nobody is writing it any more
            Err(e) if e.kind() == ErrorKind::NotFound => return false,
            Err(_) => return true,
        };

        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = file.unlock();
                false
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => true,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Lock probe failed");
                true
            }
        }
    }

    fn folder_creation_time_utc(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        let metadata = fs::metadata(path)?;
        // Not every filesystem records a birth time
        let created = metadata.created().or_else(|_| metadata.modified())?;
        Ok(to_utc(created))
    }

    fn file_last_write_utc(&self, path: &Path) -> io::Result<DateTime<Utc>> {
        Ok(to_utc(fs::metadata(path)?.modified()?))
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }
}

fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Returns true if the path has a recognised video extension.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            MEDIA_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Video files directly inside `folder` (not in its subfolders).
pub fn video_files(disk: &dyn DiskProvider, folder: &Path) -> io::Result<Vec<PathBuf>> {
    Ok(disk
        .get_files(folder, false)?
        .into_iter()
        .filter(|f| is_video_file(f))
        .collect())
}
