//! Polling driver tests.
//!
//! Concurrent polls must isolate failures per client, keep the configured
//! order, and feed the snapshot tracker so unreachable clients do not look
//! like mass removals.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fetchbridge::config::Config;
use fetchbridge::disk::LocalDisk;
use fetchbridge::driver::{poll_all, watch_until, ClientFactory, ItemChange, SnapshotTracker};
use fetchbridge::http::HttpProvider;
use fetchbridge::nzbget::NzbgetProxy;
use fetchbridge::{
    ConfiguredClient, DownloadClientError, DownloadClientItem, DownloadClientStatus,
    DownloadItemStatus, DownloadProtocol, ReleaseInfo, SceneTitleParser, ValidationResult,
};

// =============================================================================
// Scripted client
// =============================================================================

enum Script {
    Items(Vec<DownloadClientItem>),
    Fail,
    Panic,
}

/// A client whose successive polls follow a script. The last step repeats.
struct ScriptedClient {
    name: String,
    delay: Duration,
    steps: Mutex<Vec<Script>>,
    polls: AtomicUsize,
}

impl ScriptedClient {
    fn new(name: &str, steps: Vec<Script>) -> Self {
        Self {
            name: name.to_string(),
            delay: Duration::ZERO,
            steps: Mutex::new(steps),
            polls: AtomicUsize::new(0),
        }
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl ConfiguredClient for ScriptedClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn implementation(&self) -> &'static str {
        "Scripted"
    }

    fn protocol(&self) -> DownloadProtocol {
        DownloadProtocol::Usenet
    }

    fn download(&self, _release: &ReleaseInfo) -> Result<Option<String>, DownloadClientError> {
        Ok(None)
    }

    fn fetch_items(&self) -> Result<Vec<DownloadClientItem>, DownloadClientError> {
        std::thread::sleep(self.delay);
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);

        let steps = self.steps.lock().unwrap();
        let step = &steps[poll.min(steps.len() - 1)];
        match step {
            Script::Items(items) => Ok(items.clone()),
            Script::Fail => Err(DownloadClientError::Unreachable(format!("{} is offline", self.name))),
            Script::Panic => panic!("backend exploded"),
        }
    }

    fn get_items(&self) -> Vec<DownloadClientItem> {
        self.fetch_items().unwrap_or_default()
    }

    fn remove_item(&self, _id: &str) -> Result<(), DownloadClientError> {
        Ok(())
    }

    fn retry_download(&self, _id: &str) -> Result<(), DownloadClientError> {
        Ok(())
    }

    fn get_status(&self) -> Result<DownloadClientStatus, DownloadClientError> {
        Ok(DownloadClientStatus::default())
    }

    fn validate(&self) -> ValidationResult {
        ValidationResult::default()
    }
}

fn item(client: &str, id: &str, status: DownloadItemStatus) -> DownloadClientItem {
    DownloadClientItem::new(client, id, format!("Series.Title.S01E0{}", id), status)
}

// =============================================================================
// poll_all
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_poll_all_isolates_failures() {
    let clients: Vec<Arc<dyn ConfiguredClient>> = vec![
        Arc::new(ScriptedClient::new(
            "Healthy",
            vec![Script::Items(vec![item("Healthy", "1", DownloadItemStatus::Queued)])],
        )),
        Arc::new(ScriptedClient::new("Offline", vec![Script::Fail])),
        Arc::new(ScriptedClient::new("Broken", vec![Script::Panic])),
    ];

    let outcomes = poll_all(clients).await;

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].client, "Healthy");
    assert_eq!(outcomes[0].result.as_ref().unwrap().len(), 1);

    assert!(!outcomes[1].is_reachable());
    assert!(matches!(outcomes[1].result, Err(DownloadClientError::Unreachable(_))));

    // A panicking adapter is reported as its own failure
    assert_eq!(outcomes[2].client, "Broken");
    match &outcomes[2].result {
        Err(DownloadClientError::Unreachable(message)) => assert!(message.contains("Poll task failed")),
        other => panic!("expected unreachable, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_poll_all_keeps_input_order() {
    // The first client finishes last
    let clients: Vec<Arc<dyn ConfiguredClient>> = vec![
        Arc::new(ScriptedClient::new("Slow", vec![Script::Items(vec![])]).slow(Duration::from_millis(200))),
        Arc::new(ScriptedClient::new("Fast", vec![Script::Items(vec![])])),
        Arc::new(ScriptedClient::new("Faster", vec![Script::Items(vec![])])),
    ];

    let outcomes = poll_all(clients).await;
    let names: Vec<&str> = outcomes.iter().map(|o| o.client.as_str()).collect();
    assert_eq!(names, vec!["Slow", "Fast", "Faster"]);
}

#[tokio::test]
async fn test_poll_all_empty() {
    assert!(poll_all(Vec::new()).await.is_empty());
}

// =============================================================================
// Snapshot flow
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_snapshot_flow_across_outage() {
    let client = Arc::new(ScriptedClient::new(
        "NZBGet",
        vec![
            Script::Items(vec![
                item("NZBGet", "1", DownloadItemStatus::Downloading),
                item("NZBGet", "2", DownloadItemStatus::Queued),
            ]),
            Script::Fail,
            Script::Items(vec![item("NZBGet", "1", DownloadItemStatus::Completed)]),
        ],
    ));

    let mut tracker = SnapshotTracker::new();
    let mut history = Vec::new();

    for _ in 0..3 {
        let clients: Vec<Arc<dyn ConfiguredClient>> = vec![client.clone()];
        for outcome in poll_all(clients).await {
            history.push(tracker.apply(&outcome));
        }
    }

    assert_eq!(history[0].len(), 2);
    assert!(history[0].iter().all(|c| matches!(c, ItemChange::Added(_))));

    // Outage: nothing reported, nothing forgotten
    assert!(history[1].is_empty());
    assert_eq!(tracker.known_items("NZBGet").len(), 2);

    assert_eq!(history[2].len(), 2);
    assert_eq!(
        history[2][0],
        ItemChange::StatusChanged {
            item: item("NZBGet", "1", DownloadItemStatus::Completed),
            from: DownloadItemStatus::Downloading,
            to: DownloadItemStatus::Completed,
        }
    );
    assert_eq!(history[2][1].item().download_client_id, "2");
    assert!(matches!(history[2][1], ItemChange::Removed(_)));
    assert_eq!(history[2][1].to_string(), "[NZBGet] - Series.Title.S01E02");
}

#[tokio::test]
async fn test_retain_clients_drops_unconfigured() {
    let mut tracker = SnapshotTracker::new();
    let clients: Vec<Arc<dyn ConfiguredClient>> = vec![
        Arc::new(ScriptedClient::new(
            "Old",
            vec![Script::Items(vec![item("Old", "1", DownloadItemStatus::Queued)])],
        )),
        Arc::new(ScriptedClient::new(
            "Kept",
            vec![Script::Items(vec![item("Kept", "1", DownloadItemStatus::Queued)])],
        )),
    ];

    for outcome in poll_all(clients).await {
        tracker.apply(&outcome);
    }

    tracker.retain_clients(&HashSet::from(["Kept".to_string()]));
    assert!(tracker.known_items("Old").is_empty());
    assert_eq!(tracker.known_items("Kept").len(), 1);
}

// =============================================================================
// Factory
// =============================================================================

/// An NZBGet that never answers; status requests take `delay` to fail.
#[derive(Default)]
struct NoProxy {
    delay: Duration,
}

impl NzbgetProxy for NoProxy {
    fn get_version(&self, _: &fetchbridge::NzbgetSettings) -> Result<String, DownloadClientError> {
        Err(DownloadClientError::Unreachable("no server".into()))
    }
    fn get_global_status(
        &self,
        _: &fetchbridge::NzbgetSettings,
    ) -> Result<fetchbridge::nzbget::NzbgetGlobalStatus, DownloadClientError> {
        std::thread::sleep(self.delay);
        Err(DownloadClientError::Unreachable("no server".into()))
    }
    fn get_queue(
        &self,
        _: &fetchbridge::NzbgetSettings,
    ) -> Result<Vec<fetchbridge::nzbget::NzbgetQueueItem>, DownloadClientError> {
        Err(DownloadClientError::Unreachable("no server".into()))
    }
    fn get_post_queue(
        &self,
        _: &fetchbridge::NzbgetSettings,
    ) -> Result<Vec<fetchbridge::nzbget::NzbgetPostQueueItem>, DownloadClientError> {
        Err(DownloadClientError::Unreachable("no server".into()))
    }
    fn get_history(
        &self,
        _: &fetchbridge::NzbgetSettings,
    ) -> Result<Vec<fetchbridge::nzbget::NzbgetHistoryItem>, DownloadClientError> {
        Err(DownloadClientError::Unreachable("no server".into()))
    }
    fn get_config(
        &self,
        _: &fetchbridge::NzbgetSettings,
    ) -> Result<std::collections::HashMap<String, String>, DownloadClientError> {
        Err(DownloadClientError::Unreachable("no server".into()))
    }
    fn append(
        &self,
        _: &str,
        _: &[u8],
        _: &str,
        _: i32,
        _: &[fetchbridge::nzbget::NzbgetParameter],
        _: &fetchbridge::NzbgetSettings,
    ) -> Result<i32, DownloadClientError> {
        Err(DownloadClientError::Unreachable("no server".into()))
    }
    fn edit_queue(
        &self,
        _: &str,
        _: i32,
        _: &str,
        _: i32,
        _: &fetchbridge::NzbgetSettings,
    ) -> Result<bool, DownloadClientError> {
        Err(DownloadClientError::Unreachable("no server".into()))
    }
}

struct NoHttp;

impl HttpProvider for NoHttp {
    fn download_bytes(&self, _url: &str) -> Result<Vec<u8>, DownloadClientError> {
        Err(DownloadClientError::Unreachable("offline".into()))
    }
}

#[tokio::test]
async fn test_factory_builds_enabled_clients_in_order() {
    let dir = tempfile::TempDir::new().unwrap();
    let watch = dir.path().join("done");
    std::fs::create_dir(&watch).unwrap();

    let config = Config::from_json(&format!(
        r#"{{
            "clients": [
                {{ "implementation": "usenet_blackhole", "name": "Drop",
                   "settings": {{ "nzb_folder": {nzb:?}, "watch_folder": {watch:?} }} }},
                {{ "implementation": "nzbget", "name": "Disabled", "enable": false, "settings": {{}} }},
                {{ "implementation": "nzbget", "name": "NZBGet", "settings": {{}} }}
            ]
        }}"#,
        nzb = dir.path().display().to_string(),
        watch = watch.display().to_string(),
    ))
    .unwrap();

    let factory = ClientFactory::new(
        Arc::new(NoProxy::default()),
        Arc::new(NoHttp),
        Arc::new(LocalDisk::new()),
        Arc::new(SceneTitleParser::new()),
    );

    let clients = factory.build_all(&config);
    let described: Vec<(&str, &str)> = clients.iter().map(|c| (c.name(), c.implementation())).collect();
    assert_eq!(described, vec![("Drop", "Usenet Blackhole"), ("NZBGet", "NZBGet")]);

    let outcomes = poll_all(clients).await;
    assert_eq!(outcomes[0].result.as_ref().unwrap().len(), 0);
    assert!(matches!(outcomes[1].result, Err(DownloadClientError::Unreachable(_))));
}

// =============================================================================
// Watch loop
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_watch_stops_while_poll_in_flight() {
    let dir = tempfile::TempDir::new().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{ "clients": [ { "implementation": "nzbget", "name": "NZBGet", "settings": {} } ] }"#,
    )
    .unwrap();

    let factory = ClientFactory::new(
        Arc::new(NoProxy {
            delay: Duration::from_secs(2),
        }),
        Arc::new(NoHttp),
        Arc::new(LocalDisk::new()),
        Arc::new(SceneTitleParser::new()),
    );

    let mut changes = 0;
    let started = Instant::now();

    // Shutdown fires while the first poll is still waiting on the backend
    watch_until(
        &factory,
        &config_path,
        Some(Duration::from_secs(60)),
        tokio::time::sleep(Duration::from_millis(200)),
        |_| changes += 1,
    )
    .await
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(changes, 0);
}
