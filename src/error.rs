// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Error types for download-client adapters, plus operator-facing formatting.
//!
//! [`DownloadClientError`] is what transport proxies and adapters return.
//! Transient variants never escape the listing path: adapters log them and
//! report an empty snapshot. [`format_error`] and [`ErrorBuilder`] render
//! problems for a human with possible causes and suggested fixes.

use std::fmt;

use thiserror::Error;

/// Errors raised while talking to a download client.
#[derive(Debug, Error)]
pub enum DownloadClientError {
    /// Connection refused, timed out, DNS failure or a non-success HTTP status.
    #[error("Unable to reach download client: {0}")]
    Unreachable(String),

    /// The backend rejected the configured credentials.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The backend answered but reported an error for the call.
    #[error("Download client API error: {0}")]
    Api(String),

    /// The backend answered with something that could not be decoded.
    #[error("Invalid response from download client: {0}")]
    InvalidResponse(String),

    /// Permanent capability gap of this backend type.
    #[error("{operation} is not supported by {client}")]
    NotSupported {
        client: String,
        operation: &'static str,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadClientError {
    /// Returns true if retrying on the next poll cycle may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DownloadClientError::Unreachable(_) | DownloadClientError::InvalidResponse(_)
        )
    }

    pub fn not_supported(client: impl Into<String>, operation: &'static str) -> Self {
        DownloadClientError::NotSupported {
            client: client.into(),
            operation,
        }
    }

    /// Map a transport failure the way the HTTP clients classify them.
    pub fn from_reqwest(err: reqwest::Error, endpoint: &str) -> Self {
        if err.is_connect() {
            DownloadClientError::Unreachable(format!("Cannot connect to {}", endpoint))
        } else if err.is_timeout() {
            DownloadClientError::Unreachable(format!("Request to {} timed out", endpoint))
        } else if err.is_decode() {
            DownloadClientError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            if status.as_u16() == 401 {
                DownloadClientError::AuthenticationFailed(format!(
                    "{} rejected the configured credentials",
                    endpoint
                ))
            } else {
                DownloadClientError::Unreachable(format!("HTTP {} from {}", status, endpoint))
            }
        } else {
            DownloadClientError::Unreachable(err.to_string())
        }
    }
}

/// Formats an error message with title, causes and fixes.
///
/// # Example
///
/// ```
/// use fetchbridge::error::format_error;
///
/// let error = format_error(
///     "NZBGet: Unable to connect to NZBGet",
///     &["NZBGet is not running", "Wrong host or port in config"],
///     &["Start NZBGet", "Check the client settings: fetchbridge test"],
/// );
/// assert!(error.contains("Possible causes:"));
/// ```
pub fn format_error(title: &str, causes: &[&str], fixes: &[&str]) -> String {
    let mut output = String::new();

    output.push_str(&format!("[✗] {}\n", title));

    if !causes.is_empty() {
        output.push_str("\nPossible causes:\n");
        for cause in causes {
            output.push_str(&format!("  - {}\n", cause));
        }
    }

    if !fixes.is_empty() {
        output.push_str("\nTry these fixes:\n");
        for (i, fix) in fixes.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, fix));
        }
    }

    output
}

/// Builder for constructing formatted error messages.
///
/// # Example
///
/// ```
/// use fetchbridge::error::ErrorBuilder;
///
/// let error = ErrorBuilder::new("Blackhole: Folder does not exist")
///     .cause("The watch folder was removed")
///     .fix("Create the folder or update the settings")
///     .build();
/// assert!(error.contains("[✗] Blackhole: Folder does not exist"));
/// ```
#[derive(Debug, Clone)]
pub struct ErrorBuilder {
    title: String,
    causes: Vec<String>,
    fixes: Vec<String>,
}

impl ErrorBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            causes: Vec::new(),
            fixes: Vec::new(),
        }
    }

    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    pub fn fix(mut self, fix: impl Into<String>) -> Self {
        self.fixes.push(fix.into());
        self
    }

    pub fn build(self) -> String {
        let causes: Vec<&str> = self.causes.iter().map(|s| s.as_str()).collect();
        let fixes: Vec<&str> = self.fixes.iter().map(|s| s.as_str()).collect();
        format_error(&self.title, &causes, &fixes)
    }
}

impl fmt::Display for ErrorBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_error() {
        let error = format_error("Test Error", &["Cause 1", "Cause 2"], &["Fix 1", "Fix 2"]);

        assert!(error.contains("[✗] Test Error"));
        assert!(error.contains("  - Cause 1"));
        assert!(error.contains("  - Cause 2"));
        assert!(error.contains("  1. Fix 1"));
        assert!(error.contains("  2. Fix 2"));
    }

    #[test]
    fn test_empty_causes_and_fixes() {
        let error = format_error("Empty test", &[], &[]);
        assert!(error.contains("[✗] Empty test"));
        assert!(!error.contains("Possible causes:"));
        assert!(!error.contains("Try these fixes:"));
    }

    #[test]
    fn test_error_builder_display() {
        let builder = ErrorBuilder::new("Display test").cause("Cause").fix("Fix");
        let error = format!("{}", builder);
        assert!(error.contains("[✗] Display test"));
        assert!(error.contains("Cause"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(DownloadClientError::Unreachable("x".into()).is_transient());
        assert!(DownloadClientError::InvalidResponse("x".into()).is_transient());
        assert!(!DownloadClientError::AuthenticationFailed("x".into()).is_transient());
        assert!(!DownloadClientError::not_supported("Blackhole", "remove").is_transient());
    }

    #[test]
    fn test_not_supported_display() {
        let err = DownloadClientError::not_supported("Blackhole", "RemoveItem");
        assert_eq!(err.to_string(), "RemoveItem is not supported by Blackhole");
    }
}
