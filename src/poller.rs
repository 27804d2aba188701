//! Background status poller.
//!
//! While the owning view is visible the poller fetches the option catalog,
//! broadcasts it and waits the visible interval. While hidden it never
//! fetches; it re-checks visibility every hidden interval and wakes at once
//! when the visibility signal flips to visible. Fetch failures are logged and
//! published as the empty catalog so subscribers always see a fresh snapshot.
//!
//! The poller lives until its cancellation token fires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::{ProvisionerApi, Scope};
use crate::models::{OptionCatalog, RefreshConfig};

/// Snapshots kept for slow subscribers before they start lagging.
const SNAPSHOT_CHANNEL_CAPACITY: usize = 8;

/// Shared, immutable catalog snapshot.
pub type Snapshot = Arc<OptionCatalog>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub scope: Scope,
    pub visible_interval: Duration,
    pub hidden_interval: Duration,
}

impl PollSettings {
    #[must_use]
    pub fn from_config(scope: Scope, refresh: &RefreshConfig) -> Self {
        Self {
            scope,
            visible_interval: refresh.visible_interval(),
            hidden_interval: refresh.hidden_interval(),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(Scope::Local, &RefreshConfig::default())
    }
}

pub struct StatusPoller<A> {
    api: A,
    settings: PollSettings,
    tx: broadcast::Sender<Snapshot>,
}

/// Handle of a running poller.
pub struct PollerHandle {
    tx: broadcast::Sender<Snapshot>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Wait for the poller task to finish after cancellation.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "status poller task failed");
        }
    }

    #[must_use]
    pub fn into_task(self) -> JoinHandle<()> {
        self.task
    }
}

impl<A: ProvisionerApi> StatusPoller<A> {
    #[must_use]
    pub fn new(api: A, settings: PollSettings) -> Self {
        let (tx, _) = broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY);
        Self { api, settings, tx }
    }

    /// Subscribe before spawning to be sure to see the first snapshot.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn spawn(self, visible: watch::Receiver<bool>, cancel: CancellationToken) -> PollerHandle {
        let tx = self.tx.clone();
        let task = tokio::spawn(self.run(visible, cancel));
        PollerHandle { tx, task }
    }

    async fn run(self, mut visible: watch::Receiver<bool>, cancel: CancellationToken) {
        tracing::debug!(scope = ?self.settings.scope, "status poller started");

        loop {
            let is_visible = *visible.borrow_and_update();

            if is_visible {
                let snapshot = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    result = self.api.fetch_options(self.settings.scope) => match result {
                        Ok(catalog) => catalog,
                        Err(e) => {
                            tracing::warn!(error = %e, "status poll failed, publishing empty catalog");
                            OptionCatalog::default()
                        }
                    },
                };
                // No subscribers is not an error; the next tick tries again
                let _ = self.tx.send(Arc::new(snapshot));

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.visible_interval) => {}
                }
            } else {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    changed = visible.changed() => {
                        if changed.is_err() {
                            tracing::debug!("visibility signal closed");
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.settings.hidden_interval) => {}
                }
            }
        }

        tracing::debug!("status poller stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;
    use crate::client::ApiError;
    use crate::models::KernelConfig;

    #[derive(Default)]
    struct FakeApi {
        fetches: Mutex<Vec<Instant>>,
        fail: bool,
    }

    impl FakeApi {
        fn fetch_times(&self) -> Vec<Instant> {
            self.fetches.lock().unwrap().clone()
        }
    }

    impl ProvisionerApi for FakeApi {
        async fn fetch_options(&self, _scope: Scope) -> Result<OptionCatalog, ApiError> {
            self.fetches.lock().unwrap().push(Instant::now());
            if self.fail {
                return Err(ApiError::Response {
                    status: reqwest::StatusCode::BAD_GATEWAY,
                    message: "down".to_string(),
                });
            }
            Ok(OptionCatalog {
                documentation_href: "docs".to_string(),
                ..Default::default()
            })
        }

        async fn submit_config(&self, _config: &KernelConfig) -> Result<(), ApiError> {
            Ok(())
        }

        async fn cancel_allocation(&self, _id: &str) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn settings() -> PollSettings {
        PollSettings {
            scope: Scope::Local,
            visible_interval: Duration::from_millis(2000),
            hidden_interval: Duration::from_millis(500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_never_fetches_and_wakes_on_visible() {
        let api = Arc::new(FakeApi::default());
        let (visible_tx, visible_rx) = watch::channel(false);
        let cancel = CancellationToken::new();
        let poller = StatusPoller::new(Arc::clone(&api), settings());
        let mut rx = poller.subscribe();
        let handle = poller.spawn(visible_rx, cancel.clone());

        tokio::time::sleep(Duration::from_millis(5_250)).await;
        assert!(api.fetch_times().is_empty());

        let shown_at = Instant::now();
        visible_tx.send(true).unwrap();
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.documentation_href, "docs");

        let fetches = api.fetch_times();
        assert_eq!(fetches.len(), 1);
        assert_eq!(fetches[0], shown_at);

        cancel.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_polls_every_interval() {
        let api = Arc::new(FakeApi::default());
        let (_visible_tx, visible_rx) = watch::channel(true);
        let cancel = CancellationToken::new();
        let poller = StatusPoller::new(Arc::clone(&api), settings());
        let mut rx = poller.subscribe();
        let handle = poller.spawn(visible_rx, cancel.clone());

        for _ in 0..3 {
            rx.recv().await.unwrap();
        }
        let fetches = api.fetch_times();
        assert_eq!(fetches[1] - fetches[0], Duration::from_millis(2000));
        assert_eq!(fetches[2] - fetches[1], Duration::from_millis(2000));

        cancel.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_hiding_stops_fetching() {
        let api = Arc::new(FakeApi::default());
        let (visible_tx, visible_rx) = watch::channel(true);
        let cancel = CancellationToken::new();
        let poller = StatusPoller::new(Arc::clone(&api), settings());
        let mut rx = poller.subscribe();
        let handle = poller.spawn(visible_rx, cancel.clone());

        rx.recv().await.unwrap();
        visible_tx.send(false).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.fetch_times().len(), 1);

        cancel.cancel();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_publishes_empty_catalog() {
        let api = Arc::new(FakeApi {
            fail: true,
            ..Default::default()
        });
        let (_visible_tx, visible_rx) = watch::channel(true);
        let cancel = CancellationToken::new();
        let poller = StatusPoller::new(api, settings());
        let mut rx = poller.subscribe();
        let handle = poller.spawn(visible_rx, cancel.clone());

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(*snapshot, OptionCatalog::default());

        cancel.cancel();
        handle.join().await;
    }
}
