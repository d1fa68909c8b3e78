//! The provider synchronization loop.
//!
//! Each cycle resolves the source URL (operator override first, compiled-in
//! default otherwise), fetches and normalizes the document, skips it when it
//! matches the applied one, and otherwise hands it to the catalog. Cycles
//! that complete without error are followed by the steady interval; failed
//! cycles by an exponentially growing retry delay.

use std::sync::Arc;
use std::time::Duration;

use cloudtide_core::{RuntimeSettings, SearchSyncConfig};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::errors::SyncError;
use crate::sync::backoff::Backoff;
use crate::sync::canonical::normalize;
use crate::sync::diff_gate::should_apply;
use crate::sync::fetcher::DocumentFetcher;
use crate::sync::reload::ReloadCoordinator;
use crate::sync::shutdown::{Shutdown, ShutdownSignal};
use crate::sync::state::{SyncPhase, SyncState};

/// What a single cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The fetched document matched the applied one
    Unchanged,
    /// A changed document was applied
    Applied {
        /// Revision of the new snapshot
        revision: u64,
    },
    /// The cycle failed; the applied snapshot is unchanged
    Failed(SyncError),
}

/// Result of [`SyncLoop::run_cycle`].
#[derive(Debug)]
pub struct CycleReport {
    /// Source the cycle fetched from
    pub url: String,
    /// What happened
    pub outcome: CycleOutcome,
    /// Delay before the next cycle
    pub next_delay: Duration,
}

/// Periodic provider synchronization.
#[derive(Debug)]
pub struct SyncLoop {
    fetcher: Arc<dyn DocumentFetcher>,
    settings: RuntimeSettings,
    default_url: String,
    coordinator: ReloadCoordinator,
    backoff: Backoff,
    steady_interval: Duration,
}

impl SyncLoop {
    /// Creates a loop that writes through `coordinator`.
    pub fn new(
        config: &SearchSyncConfig,
        fetcher: Arc<dyn DocumentFetcher>,
        settings: RuntimeSettings,
        coordinator: ReloadCoordinator,
    ) -> Self {
        Self {
            fetcher,
            settings,
            default_url: config.default_url.clone(),
            coordinator,
            backoff: Backoff::from_config(config),
            steady_interval: config.steady_interval,
        }
    }

    /// Shared state written by this loop.
    pub fn state(&self) -> &Arc<SyncState> {
        self.coordinator.state()
    }

    /// Source for the next cycle. Read fresh every cycle so settings changes
    /// take effect without a restart.
    pub fn source_url(&self) -> String {
        self.settings
            .search_config_url()
            .unwrap_or_else(|| self.default_url.clone())
    }

    /// Runs one fetch, compare and apply cycle.
    ///
    /// Never fails: errors are logged, recorded in the shared state and
    /// reported as [`CycleOutcome::Failed`].
    pub async fn run_cycle(&mut self) -> CycleReport {
        let url = self.source_url();

        let outcome = match self.fetch_and_apply(&url).await {
            Ok(outcome) => outcome,
            Err(error) => CycleOutcome::Failed(error),
        };

        let next_delay = match &outcome {
            CycleOutcome::Failed(error) => {
                let delay = self.backoff.next_delay();
                self.state().record_failure(error);
                warn!(
                    url = %url,
                    kind = error.kind(),
                    error = %error,
                    retry_in_ms = delay.as_millis() as u64,
                    "Search provider sync failed"
                );
                delay
            }
            CycleOutcome::Unchanged | CycleOutcome::Applied { .. } => {
                self.backoff.reset();
                self.state().record_success();
                self.steady_interval
            }
        };

        self.state().set_phase(SyncPhase::Scheduled(next_delay));
        CycleReport {
            url,
            outcome,
            next_delay,
        }
    }

    async fn fetch_and_apply(&self, url: &str) -> Result<CycleOutcome, SyncError> {
        self.state().set_phase(SyncPhase::Fetching);
        let raw = self.fetcher.fetch(url).await?;
        let candidate = normalize(&raw)?;
        self.state().record_fetch();

        self.state().set_phase(SyncPhase::Deciding);
        if !should_apply(&candidate, &self.state().last_applied()) {
            debug!(url, "Search providers unchanged");
            return Ok(CycleOutcome::Unchanged);
        }

        self.state().set_phase(SyncPhase::Applying);
        let snapshot = self.coordinator.apply(candidate)?;
        Ok(CycleOutcome::Applied {
            revision: snapshot.revision,
        })
    }

    /// Runs cycles until `shutdown` fires.
    ///
    /// The first cycle starts immediately. Cancellation is honoured while
    /// sleeping and while a fetch is in flight; an abandoned fetch leaves the
    /// applied snapshot untouched.
    pub async fn run(mut self, mut shutdown: ShutdownSignal) {
        info!(
            default_url = %self.default_url,
            override_url = ?self.settings.search_config_url(),
            "Search provider sync started"
        );

        let mut delay = Duration::ZERO;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if shutdown.is_triggered() {
                break;
            }

            let report = tokio::select! {
                biased;
                _ = shutdown.triggered() => {
                    debug!("Abandoning in-flight provider fetch");
                    break;
                }
                report = self.run_cycle() => report,
            };
            delay = report.next_delay;
        }

        self.state().set_phase(SyncPhase::Stopped);
        info!("Search provider sync stopped");
    }
}

/// Handle to a spawned [`SyncLoop`].
#[derive(Debug)]
pub struct SyncLoopHandle {
    state: Arc<SyncState>,
    shutdown: Shutdown,
    task: JoinHandle<()>,
}

impl SyncLoopHandle {
    /// Shared state written by the loop.
    pub fn state(&self) -> &Arc<SyncState> {
        &self.state
    }

    /// Requests cancellation without waiting for the loop to exit.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Waits for the loop to exit.
    ///
    /// # Errors
    /// - `JoinError` - The loop task panicked or was aborted
    pub async fn join(self) -> Result<(), JoinError> {
        self.task.await
    }

    /// Requests cancellation and waits for the loop to exit.
    pub async fn stop(self) {
        self.shutdown.trigger();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Search provider sync task ended abnormally");
        }
    }
}

/// Spawns `sync_loop` on the current runtime.
pub fn spawn_sync_loop(sync_loop: SyncLoop) -> SyncLoopHandle {
    let state = Arc::clone(sync_loop.state());
    let shutdown = Shutdown::new();
    let task = tokio::spawn(sync_loop.run(shutdown.subscribe()));

    SyncLoopHandle {
        state,
        shutdown,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DEFAULT_PROVIDERS, ProviderCatalog};
    use crate::sync::BroadcastSink;
    use async_trait::async_trait;
    use bytes::Bytes;
    use cloudtide_core::{CloudtideConfig, EngineConfig};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Replays scripted responses and records requested URLs.
    #[derive(Debug, Default)]
    struct ScriptedFetcher {
        responses: Mutex<VecDeque<Result<&'static [u8], u16>>>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<&'static [u8], u16>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DocumentFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> Result<Bytes, SyncError> {
            self.requested.lock().push(url.to_string());
            match self.responses.lock().pop_front() {
                Some(Ok(body)) => Ok(Bytes::from_static(body)),
                Some(Err(status)) => Err(SyncError::HttpStatus {
                    url: url.to_string(),
                    status,
                }),
                None => Err(SyncError::Network {
                    url: url.to_string(),
                    reason: "script exhausted".to_string(),
                }),
            }
        }
    }

    const CHANGED: &[u8] = br#"{"eztv": {"name": "EZTV", "url": "https://eztv.ag/search/{{query}}", "list": "tr", "result": {"name": "td a"}}}"#;

    fn sync_loop(fetcher: Arc<ScriptedFetcher>, settings: RuntimeSettings) -> SyncLoop {
        let config = CloudtideConfig::for_testing().search_sync;
        let catalog = Arc::new(ProviderCatalog::new());
        let state = Arc::new(SyncState::seeded(catalog.as_ref(), DEFAULT_PROVIDERS).unwrap());
        let coordinator =
            ReloadCoordinator::new(catalog, state, Arc::new(BroadcastSink::new(4)));
        SyncLoop::new(&config, fetcher, settings, coordinator)
    }

    #[tokio::test]
    async fn test_failures_back_off_then_success_resets() {
        let fetcher = ScriptedFetcher::new(vec![Err(500), Err(502), Ok(CHANGED), Err(503)]);
        let mut sync = sync_loop(fetcher, RuntimeSettings::default());

        let first = sync.run_cycle().await;
        let second = sync.run_cycle().await;
        assert!(matches!(first.outcome, CycleOutcome::Failed(_)));
        assert_eq!(first.next_delay, Duration::from_millis(10));
        assert_eq!(second.next_delay, Duration::from_millis(20));
        assert_eq!(sync.state().status().consecutive_failures, 2);

        let third = sync.run_cycle().await;
        assert!(matches!(third.outcome, CycleOutcome::Applied { revision: 1 }));
        assert_eq!(third.next_delay, Duration::from_secs(60));
        assert_eq!(sync.state().fetch_attempts(), 1);

        let fourth = sync.run_cycle().await;
        assert_eq!(fourth.next_delay, Duration::from_millis(10));
        assert_eq!(sync.state().phase(), SyncPhase::Scheduled(Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_unchanged_document_is_not_reapplied() {
        let fetcher = ScriptedFetcher::new(vec![Ok(DEFAULT_PROVIDERS)]);
        let mut sync = sync_loop(fetcher, RuntimeSettings::default());
        let seeded = sync.state().snapshot();

        let report = sync.run_cycle().await;

        assert!(matches!(report.outcome, CycleOutcome::Unchanged));
        assert!(Arc::ptr_eq(&seeded, &sync.state().snapshot()));
        assert_eq!(sync.state().fetch_attempts(), 1);
    }

    #[tokio::test]
    async fn test_override_is_read_every_cycle() {
        let fetcher = ScriptedFetcher::new(vec![Err(404), Err(404)]);
        let settings = RuntimeSettings::default();
        let mut sync = sync_loop(fetcher.clone(), settings.clone());

        sync.run_cycle().await;
        settings
            .replace(EngineConfig {
                search_config_url: Some("https://mirror.example/providers.json".to_string()),
                ..Default::default()
            })
            .unwrap();
        let report = sync.run_cycle().await;

        assert_eq!(report.url, "https://mirror.example/providers.json");
        let requested = fetcher.requested.lock().clone();
        assert_eq!(
            requested,
            vec![
                cloudtide_core::DEFAULT_SEARCH_CONFIG_URL.to_string(),
                "https://mirror.example/providers.json".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_document_does_not_count_as_fetch() {
        let fetcher = ScriptedFetcher::new(vec![Ok(&b"<html>maintenance</html>"[..])]);
        let mut sync = sync_loop(fetcher, RuntimeSettings::default());

        let report = sync.run_cycle().await;

        assert!(matches!(
            report.outcome,
            CycleOutcome::Failed(SyncError::MalformedDocument { .. })
        ));
        assert_eq!(sync.state().fetch_attempts(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_sleeping() {
        let fetcher = ScriptedFetcher::new(vec![Ok(DEFAULT_PROVIDERS)]);
        let handle = spawn_sync_loop(sync_loop(fetcher.clone(), RuntimeSettings::default()));
        let mut phases = handle.state().subscribe_phase();

        phases
            .wait_for(|phase| matches!(phase, SyncPhase::Scheduled(_)))
            .await
            .unwrap();
        let state = Arc::clone(handle.state());
        handle.stop().await;

        assert_eq!(state.phase(), SyncPhase::Stopped);
        assert_eq!(fetcher.requested.lock().len(), 1);
    }
}
