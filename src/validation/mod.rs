// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration validation results.
//!
//! `validate()` on an adapter never throws for routine problems: it returns a
//! [`ValidationResult`] listing every field that needs the operator's attention.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::disk::DiskProvider;

/// A single problem with one configuration field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Settings field the failure is about (empty when it concerns the whole client).
    pub property_name: String,
    pub error_message: String,
    /// Where the operator can go to fix it (e.g. the backend's web UI).
    pub info_link: Option<String>,
    /// Longer explanation shown under the message.
    pub detailed_description: Option<String>,
}

impl ValidationFailure {
    pub fn new(property_name: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            error_message: error_message.into(),
            info_link: None,
            detailed_description: None,
        }
    }

    pub fn with_info_link(mut self, link: impl Into<String>) -> Self {
        self.info_link = Some(link.into());
        self
    }

    pub fn with_detailed_description(mut self, description: impl Into<String>) -> Self {
        self.detailed_description = Some(description.into());
        self
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.property_name.is_empty() {
            write!(f, "{}", self.error_message)
        } else {
            write!(f, "{}: {}", self.property_name, self.error_message)
        }
    }
}

/// Outcome of validating one client's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub failures: Vec<ValidationFailure>,
}

impl ValidationResult {
    pub fn new(failures: Vec<ValidationFailure>) -> Self {
        Self { failures }
    }

    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures for one settings field.
    pub fn for_property(&self, property_name: &str) -> Vec<&ValidationFailure> {
        self.failures
            .iter()
            .filter(|f| f.property_name == property_name)
            .collect()
    }
}

/// Check that a configured folder exists and, when required, accepts writes.
pub fn test_folder(
    disk: &dyn DiskProvider,
    folder: &Path,
    property_name: &str,
    must_be_writable: bool,
) -> Option<ValidationFailure> {
    if !disk.folder_exists(folder) {
        return Some(
            ValidationFailure::new(property_name, "Folder does not exist").with_detailed_description(
                "The folder you specified does not exist or is inaccessible. \
                 Please verify the folder permissions for the user account running this service.",
            ),
        );
    }

    if must_be_writable {
        if let Err(e) = disk.check_folder_writable(folder) {
            tracing::error!(
                folder = %folder.display(),
                error = %e,
                "Write probe failed"
            );
            return Some(
                ValidationFailure::new(property_name, "Unable to write to folder")
                    .with_detailed_description(
                        "The folder you specified is not writable. \
                         Please verify the folder permissions for the user account running this service.",
                    ),
            );
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::LocalDisk;
    use tempfile::TempDir;

    #[test]
    fn test_failure_display() {
        let failure = ValidationFailure::new("Host", "Unable to connect to NZBGet");
        assert_eq!(failure.to_string(), "Host: Unable to connect to NZBGet");

        let general = ValidationFailure::new("", "Test was aborted");
        assert_eq!(general.to_string(), "Test was aborted");
    }

    #[test]
    fn test_result_for_property() {
        let result = ValidationResult::new(vec![
            ValidationFailure::new("Host", "a"),
            ValidationFailure::new("TvCategory", "b"),
        ]);
        assert!(!result.is_valid());
        assert_eq!(result.for_property("TvCategory").len(), 1);
        assert!(result.for_property("Port").is_empty());
    }

    #[test]
    fn test_folder_missing() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let missing = temp_dir.path().join("nope");

        let failure = test_folder(&LocalDisk::new(), &missing, "WatchFolder", true)
            .expect("Missing folder should fail");
        assert_eq!(failure.property_name, "WatchFolder");
        assert_eq!(failure.error_message, "Folder does not exist");
        assert!(failure.detailed_description.is_some());
    }

    #[test]
    fn test_folder_ok_and_probe_cleaned_up() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let failure = test_folder(&LocalDisk::new(), temp_dir.path(), "NzbFolder", true);
        assert!(failure.is_none());

        let leftover = std::fs::read_dir(temp_dir.path())
            .expect("Failed to list temp dir")
            .count();
        assert_eq!(leftover, 0, "Write probe must not leave files behind");
    }
}
