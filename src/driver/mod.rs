// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Polling driver.
//!
//! Builds the configured clients, polls them concurrently on the blocking
//! pool and turns successive snapshots into item changes. Each client is
//! polled once per cycle, and a client that fails (or panics) only affects
//! its own outcome.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use fetchbridge::config::Config;
//! use fetchbridge::driver::{poll_all, ClientFactory, SnapshotTracker};
//! use fetchbridge::parser::SceneTitleParser;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load(&Config::default_path())?;
//! let factory = ClientFactory::with_defaults(
//!     Arc::new(SceneTitleParser::new()),
//!     Duration::from_secs(config.download_timeout_secs),
//! )?;
//! let mut tracker = SnapshotTracker::new();
//!
//! for outcome in poll_all(factory.build_all(&config)).await {
//!     for change in tracker.apply(&outcome) {
//!         println!("{}", change);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use crate::blackhole::UsenetBlackhole;
use crate::client::{Bound, ConfiguredClient};
use crate::config::{ClientConfig, Config};
use crate::disk::{DiskProvider, LocalDisk};
use crate::error::DownloadClientError;
use crate::http::{HttpProvider, ReqwestHttp};
use crate::nzbget::{HttpNzbgetProxy, Nzbget, NzbgetProxy};
use crate::parser::ReleaseResolver;
use crate::types::{DownloadClientItem, DownloadItemStatus};

/// Shortest allowed poll interval (in seconds).
const MIN_POLL_INTERVAL_SECS: u64 = 5;

/// Builds [`ConfiguredClient`]s from configuration, sharing collaborators.
#[derive(Clone)]
pub struct ClientFactory {
    nzbget_proxy: Arc<dyn NzbgetProxy>,
    http: Arc<dyn HttpProvider>,
    disk: Arc<dyn DiskProvider>,
    resolver: Arc<dyn ReleaseResolver>,
}

impl ClientFactory {
    pub fn new(
        nzbget_proxy: Arc<dyn NzbgetProxy>,
        http: Arc<dyn HttpProvider>,
        disk: Arc<dyn DiskProvider>,
        resolver: Arc<dyn ReleaseResolver>,
    ) -> Self {
        Self {
            nzbget_proxy,
            http,
            disk,
            resolver,
        }
    }

    /// Real HTTP transports and the local filesystem.
    ///
    /// Creates blocking HTTP clients, so call this outside an async context.
    /// `download_timeout` bounds each NZB payload fetch.
    pub fn with_defaults(
        resolver: Arc<dyn ReleaseResolver>,
        download_timeout: Duration,
    ) -> Result<Self, DownloadClientError> {
        Ok(Self::new(
            Arc::new(HttpNzbgetProxy::new()?),
            Arc::new(ReqwestHttp::new()?.with_timeout(download_timeout)),
            Arc::new(LocalDisk::new()),
            resolver,
        ))
    }

    pub fn build(&self, config: &ClientConfig) -> Arc<dyn ConfiguredClient> {
        match config {
            ClientConfig::Nzbget(definition) => Arc::new(Bound::new(
                Nzbget::new(
                    self.nzbget_proxy.clone(),
                    self.http.clone(),
                    self.disk.clone(),
                    self.resolver.clone(),
                ),
                definition.clone(),
            )),
            ClientConfig::UsenetBlackhole(definition) => Arc::new(Bound::new(
                UsenetBlackhole::new(self.http.clone(), self.disk.clone(), self.resolver.clone()),
                definition.clone(),
            )),
        }
    }

    /// All enabled clients, in configuration order.
    pub fn build_all(&self, config: &Config) -> Vec<Arc<dyn ConfiguredClient>> {
        config
            .clients
            .iter()
            .filter(|c| {
                if !c.is_enabled() {
                    tracing::debug!(client = %c.name(), "Skipping disabled client");
                }
                c.is_enabled()
            })
            .map(|c| self.build(c))
            .collect()
    }
}

/// Result of polling one client.
#[derive(Debug)]
pub struct PollOutcome {
    pub client: String,
    pub result: Result<Vec<DownloadClientItem>, DownloadClientError>,
}

impl PollOutcome {
    pub fn is_reachable(&self) -> bool {
        self.result.is_ok()
    }
}

/// Poll every client once, concurrently. Outcomes keep the input order.
pub async fn poll_all(clients: Vec<Arc<dyn ConfiguredClient>>) -> Vec<PollOutcome> {
    let mut tasks = JoinSet::new();

    for (index, client) in clients.into_iter().enumerate() {
        tasks.spawn(async move {
            let name = client.name().to_string();
            let result = tokio::task::spawn_blocking(move || client.fetch_items())
                .await
                .unwrap_or_else(|e| {
                    Err(DownloadClientError::Unreachable(format!("Poll task failed: {}", e)))
                });
            (index, PollOutcome { client: name, result })
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => tracing::error!(error = %e, "Poll task aborted"),
        }
    }

    outcomes.sort_by_key(|(index, _)| *index);
    outcomes.into_iter().map(|(_, outcome)| outcome).collect()
}

/// A difference between two snapshots of one client.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemChange {
    Added(DownloadClientItem),
    StatusChanged {
        item: DownloadClientItem,
        from: DownloadItemStatus,
        to: DownloadItemStatus,
    },
    Removed(DownloadClientItem),
}

impl ItemChange {
    pub fn item(&self) -> &DownloadClientItem {
        match self {
            ItemChange::Added(item) | ItemChange::Removed(item) => item,
            ItemChange::StatusChanged { item, .. } => item,
        }
    }
}

impl fmt::Display for ItemChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemChange::Added(item) => {
                write!(f, "[{}] + {} ({})", item.download_client, item.title, item.status)
            }
            ItemChange::StatusChanged { item, from, to } => {
                write!(f, "[{}] ~ {} ({} -> {})", item.download_client, item.title, from, to)
            }
            ItemChange::Removed(item) => write!(f, "[{}] - {}", item.download_client, item.title),
        }
    }
}

/// Last known items per client, keyed by download client id.
#[derive(Debug, Default)]
pub struct SnapshotTracker {
    known: HashMap<String, HashMap<String, DownloadClientItem>>,
}

impl SnapshotTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a poll outcome and return what changed since the previous one.
    ///
    /// An unreachable client keeps its known items and reports no changes.
    pub fn apply(&mut self, outcome: &PollOutcome) -> Vec<ItemChange> {
        let items = match &outcome.result {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(client = %outcome.client, error = %e, "Client unreachable, keeping known items");
                return Vec::new();
            }
        };

        let mut previous = self.known.remove(&outcome.client).unwrap_or_default();
        let mut current = HashMap::with_capacity(items.len());
        let mut changes = Vec::new();

        for item in items {
            match previous.remove(&item.download_client_id) {
                None => changes.push(ItemChange::Added(item.clone())),
                Some(old) if old.status != item.status => changes.push(ItemChange::StatusChanged {
                    item: item.clone(),
                    from: old.status,
                    to: item.status,
                }),
                Some(_) => {}
            }
            current.insert(item.download_client_id.clone(), item.clone());
        }

        let mut removed: Vec<DownloadClientItem> = previous.into_values().collect();
        removed.sort_by(|a, b| a.download_client_id.cmp(&b.download_client_id));
        changes.extend(removed.into_iter().map(ItemChange::Removed));

        self.known.insert(outcome.client.clone(), current);
        changes
    }

    pub fn known_items(&self, client: &str) -> Vec<&DownloadClientItem> {
        let mut items: Vec<&DownloadClientItem> = self
            .known
            .get(client)
            .map(|m| m.values().collect())
            .unwrap_or_default();
        items.sort_by(|a, b| a.download_client_id.cmp(&b.download_client_id));
        items
    }

    /// Forget clients that are no longer configured.
    pub fn retain_clients(&mut self, names: &HashSet<String>) {
        self.known.retain(|name, _| names.contains(name));
    }
}

/// Poll all configured clients every `interval` (or the configured interval)
/// until Ctrl-C, reloading the config file before each cycle.
pub async fn watch<F>(
    factory: &ClientFactory,
    config_path: &Path,
    interval: Option<Duration>,
    on_change: F,
) -> anyhow::Result<()>
where
    F: FnMut(&ItemChange),
{
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Unable to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    watch_until(factory, config_path, interval, ctrl_c, on_change).await
}

/// Like [`watch`], but stops when `shutdown` completes.
///
/// `shutdown` is polled for the whole run, including while a poll cycle is in
/// flight; a cycle interrupted this way reports no changes.
pub async fn watch_until<S, F>(
    factory: &ClientFactory,
    config_path: &Path,
    interval: Option<Duration>,
    shutdown: S,
    mut on_change: F,
) -> anyhow::Result<()>
where
    S: Future<Output = ()>,
    F: FnMut(&ItemChange),
{
    tokio::pin!(shutdown);
    let mut tracker = SnapshotTracker::new();

    loop {
        let period = match Config::load(config_path) {
            Ok(config) => {
                let clients = factory.build_all(&config);
                let names: HashSet<String> = clients.iter().map(|c| c.name().to_string()).collect();
                tracker.retain_clients(&names);

                let outcomes = tokio::select! {
                    _ = &mut shutdown => {
                        tracing::info!("Stopping watch loop");
                        return Ok(());
                    }
                    outcomes = poll_all(clients) => outcomes,
                };

                let reachable = outcomes.iter().filter(|o| o.is_reachable()).count();
                tracing::info!(clients = outcomes.len(), reachable, "Poll cycle finished");

                for outcome in &outcomes {
                    for change in tracker.apply(outcome) {
                        on_change(&change);
                    }
                }

                interval.unwrap_or(Duration::from_secs(config.poll_interval_secs))
            }
            Err(e) => {
                tracing::error!(path = %config_path.display(), error = %format!("{:#}", e), "Failed to reload config");
                interval.unwrap_or(Duration::from_secs(Config::default().poll_interval_secs))
            }
        };

        let period = period.max(Duration::from_secs(MIN_POLL_INTERVAL_SECS));

        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Stopping watch loop");
                return Ok(());
            }
            _ = tokio::time::sleep(period) => {}
        }
    }
}
