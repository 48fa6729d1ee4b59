// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The download-client capability contract.
//!
//! Every backend adapter implements [`DownloadClient`]. Settings are not held
//! by the adapter: each call receives the immutable [`ClientDefinition`] it
//! should act on. Behaviour shared by all adapters (category filtering,
//! release resolution, duplicate suppression, path remapping) lives in the
//! free functions of this module and in [`remap`].
//!
//! [`ConfiguredClient`] is the object-safe view the driver uses to poll a
//! heterogeneous set of backends; [`Bound`] pairs an adapter with its definition.

pub mod remap;

use std::collections::HashSet;

use crate::config::ClientDefinition;
use crate::error::DownloadClientError;
use crate::parser::ReleaseResolver;
use crate::types::{DownloadClientItem, DownloadClientStatus, DownloadProtocol, ReleaseInfo};
use crate::validation::{ValidationFailure, ValidationResult};

/// Operations every backend supports, uniform across wire protocols.
pub trait DownloadClient: Send + Sync {
    type Settings: Clone + Send + Sync + 'static;

    /// Backend type name, e.g. "NZBGet".
    fn implementation(&self) -> &'static str;

    fn protocol(&self) -> DownloadProtocol;

    /// Submit a release. Returns the backend item id when the backend has one.
    fn download(
        &self,
        definition: &ClientDefinition<Self::Settings>,
        release: &ReleaseInfo,
    ) -> Result<Option<String>, DownloadClientError>;

    /// Current snapshot restricted to the managed category, unresolved titles dropped.
    ///
    /// Fails as a whole when any backend fetch fails; no partial snapshot is
    /// assembled from a subset of the sources.
    fn fetch_items(
        &self,
        definition: &ClientDefinition<Self::Settings>,
    ) -> Result<Vec<DownloadClientItem>, DownloadClientError>;

    /// Like [`fetch_items`](Self::fetch_items), but a failure is logged and
    /// reported as an empty snapshot.
    fn get_items(&self, definition: &ClientDefinition<Self::Settings>) -> Vec<DownloadClientItem> {
        match self.fetch_items(definition) {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(
                    client = %definition.name,
                    implementation = self.implementation(),
                    error = %e,
                    "Failed to get items from download client"
                );
                Vec::new()
            }
        }
    }

    fn remove_item(
        &self,
        definition: &ClientDefinition<Self::Settings>,
        id: &str,
    ) -> Result<(), DownloadClientError>;

    fn retry_download(
        &self,
        definition: &ClientDefinition<Self::Settings>,
        id: &str,
    ) -> Result<(), DownloadClientError>;

    fn get_status(
        &self,
        definition: &ClientDefinition<Self::Settings>,
    ) -> Result<DownloadClientStatus, DownloadClientError>;

    /// Backend-specific checks, appending to `failures`.
    ///
    /// An `Err` means the test could not run to completion.
    fn test(
        &self,
        definition: &ClientDefinition<Self::Settings>,
        failures: &mut Vec<ValidationFailure>,
    ) -> Result<(), DownloadClientError>;

    /// Run [`test`](Self::test) and collect the failures. Never mutates backend state.
    fn validate(&self, definition: &ClientDefinition<Self::Settings>) -> ValidationResult {
        let mut failures = Vec::new();

        if let Err(e) = self.test(definition, &mut failures) {
            tracing::error!(client = %definition.name, error = %e, "Test aborted due to an error");
            failures.push(ValidationFailure::new(
                "",
                format!("Test was aborted due to an error: {}", e),
            ));
        }

        ValidationResult::new(failures)
    }
}

/// Keep only items in the managed category.
pub fn retain_category(items: &mut Vec<DownloadClientItem>, category: &str) {
    items.retain(|item| item.category == category);
}

/// Attach the resolved release to each item, dropping items that do not resolve.
pub fn resolve_items(
    items: Vec<DownloadClientItem>,
    resolver: &dyn ReleaseResolver,
) -> Vec<DownloadClientItem> {
    items
        .into_iter()
        .filter_map(|mut item| match resolver.resolve(&item.title) {
            Some(episode) => {
                item.remote_episode = Some(episode);
                Some(item)
            }
            None => {
                tracing::debug!(title = %item.title, "Ignoring unknown release");
                None
            }
        })
        .collect()
}

/// Drop items whose id was already seen earlier in the sequence.
pub fn dedupe_by_id(items: Vec<DownloadClientItem>) -> Vec<DownloadClientItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(item.download_client_id.clone());
            if !fresh {
                tracing::warn!(
                    id = %item.download_client_id,
                    title = %item.title,
                    "Duplicate download client id, keeping first occurrence"
                );
            }
            fresh
        })
        .collect()
}

/// Object-safe view of an adapter bound to its definition.
pub trait ConfiguredClient: Send + Sync {
    fn name(&self) -> &str;
    fn implementation(&self) -> &'static str;
    fn protocol(&self) -> DownloadProtocol;
    fn download(&self, release: &ReleaseInfo) -> Result<Option<String>, DownloadClientError>;
    fn fetch_items(&self) -> Result<Vec<DownloadClientItem>, DownloadClientError>;
    fn get_items(&self) -> Vec<DownloadClientItem>;
    fn remove_item(&self, id: &str) -> Result<(), DownloadClientError>;
    fn retry_download(&self, id: &str) -> Result<(), DownloadClientError>;
    fn get_status(&self) -> Result<DownloadClientStatus, DownloadClientError>;
    fn validate(&self) -> ValidationResult;
}

/// An adapter together with the definition it operates on.
pub struct Bound<C: DownloadClient> {
    client: C,
    definition: ClientDefinition<C::Settings>,
}

impl<C: DownloadClient> Bound<C> {
    pub fn new(client: C, definition: ClientDefinition<C::Settings>) -> Self {
        Self { client, definition }
    }

    pub fn definition(&self) -> &ClientDefinition<C::Settings> {
        &self.definition
    }
}

impl<C: DownloadClient> ConfiguredClient for Bound<C> {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn implementation(&self) -> &'static str {
        self.client.implementation()
    }

    fn protocol(&self) -> DownloadProtocol {
        self.client.protocol()
    }

    fn download(&self, release: &ReleaseInfo) -> Result<Option<String>, DownloadClientError> {
        self.client.download(&self.definition, release)
    }

    fn fetch_items(&self) -> Result<Vec<DownloadClientItem>, DownloadClientError> {
        self.client.fetch_items(&self.definition)
    }

    fn get_items(&self) -> Vec<DownloadClientItem> {
        self.client.get_items(&self.definition)
    }

    fn remove_item(&self, id: &str) -> Result<(), DownloadClientError> {
        self.client.remove_item(&self.definition, id)
    }

    fn retry_download(&self, id: &str) -> Result<(), DownloadClientError> {
        self.client.retry_download(&self.definition, id)
    }

    fn get_status(&self) -> Result<DownloadClientStatus, DownloadClientError> {
        self.client.get_status(&self.definition)
    }

    fn validate(&self) -> ValidationResult {
        self.client.validate(&self.definition)
    }
}
