//! Shared synchronization state.
//!
//! The sync loop is the only writer. API handlers and other tasks read the
//! applied snapshot through an [`ArcSwap`], so they always observe either
//! the complete old provider set or the complete new one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;

use crate::catalog::{ProviderSet, Scraper};
use crate::errors::SyncError;
use crate::sync::canonical::normalize;

/// Where the sync loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Started, first cycle not yet run
    Idle,
    /// Waiting on the source
    Fetching,
    /// Comparing the fetched document with the applied one
    Deciding,
    /// Handing a changed document to the catalog
    Applying,
    /// Sleeping until the next cycle
    Scheduled(Duration),
    /// Cancelled; no further cycles will run
    Stopped,
}

impl SyncPhase {
    /// Lower-case phase name for status output.
    pub fn name(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Fetching => "fetching",
            SyncPhase::Deciding => "deciding",
            SyncPhase::Applying => "applying",
            SyncPhase::Scheduled(_) => "scheduled",
            SyncPhase::Stopped => "stopped",
        }
    }
}

/// A provider document that has been accepted by the catalog.
#[derive(Debug, Clone)]
pub struct AppliedSnapshot {
    /// Zero for the bundled seed, incremented on every applied change
    pub revision: u64,
    /// Canonical encoding of the document
    pub canonical: Bytes,
    /// Providers the catalog built from the document
    pub providers: Arc<ProviderSet>,
    /// When the document was applied
    pub applied_at: DateTime<Utc>,
}

/// Point-in-time view of the sync loop for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    /// Name of the current phase
    pub phase: &'static str,
    /// Revision of the applied snapshot
    pub revision: u64,
    /// Number of active providers
    pub provider_count: usize,
    /// When the applied snapshot was installed
    pub applied_at: DateTime<Utc>,
    /// Fetches that produced a well-formed document
    pub fetch_attempts: u64,
    /// Failed cycles since the last successful one
    pub consecutive_failures: u32,
    /// Error of the most recent cycle, if it failed
    pub last_error: Option<String>,
    /// When the most recent cycle finished
    pub last_cycle_at: Option<DateTime<Utc>>,
    /// Delay before the next cycle while scheduled
    pub next_delay_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct CycleHealth {
    consecutive_failures: u32,
    last_error: Option<String>,
    last_cycle_at: Option<DateTime<Utc>>,
}

/// State shared between the sync loop and its readers.
#[derive(Debug)]
pub struct SyncState {
    applied: ArcSwap<AppliedSnapshot>,
    fetch_attempts: AtomicU64,
    health: Mutex<CycleHealth>,
    phase: watch::Sender<SyncPhase>,
}

impl SyncState {
    /// Creates state whose applied snapshot is the given seed document.
    ///
    /// The seed is normalized and loaded into `scraper`, so the catalog and
    /// the applied snapshot agree from the start.
    ///
    /// # Errors
    /// - `SyncError::MalformedDocument` - Seed is not valid JSON
    /// - `SyncError::ConfigRejected` - The catalog refused the seed
    pub fn seeded(scraper: &dyn Scraper, seed: &[u8]) -> Result<Self, SyncError> {
        let canonical = normalize(seed)?;
        let providers = scraper.load_config(&canonical)?;

        let (phase, _) = watch::channel(SyncPhase::Idle);
        Ok(Self {
            applied: ArcSwap::from_pointee(AppliedSnapshot {
                revision: 0,
                canonical,
                providers,
                applied_at: Utc::now(),
            }),
            fetch_attempts: AtomicU64::new(0),
            health: Mutex::new(CycleHealth::default()),
            phase,
        })
    }

    /// Returns the applied snapshot.
    pub fn snapshot(&self) -> Arc<AppliedSnapshot> {
        self.applied.load_full()
    }

    /// Returns the active provider set.
    pub fn providers(&self) -> Arc<ProviderSet> {
        Arc::clone(&self.applied.load().providers)
    }

    /// Returns the canonical bytes of the applied document.
    pub fn last_applied(&self) -> Bytes {
        self.applied.load().canonical.clone()
    }

    /// Number of fetches that produced a well-formed document.
    pub fn fetch_attempts(&self) -> u64 {
        self.fetch_attempts.load(Ordering::Relaxed)
    }

    /// Returns the current phase.
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Subscribes to phase changes.
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Builds a status report.
    pub fn status(&self) -> SyncStatus {
        let snapshot = self.applied.load();
        let health = self.health.lock();
        let phase = self.phase();

        SyncStatus {
            phase: phase.name(),
            revision: snapshot.revision,
            provider_count: snapshot.providers.len(),
            applied_at: snapshot.applied_at,
            fetch_attempts: self.fetch_attempts(),
            consecutive_failures: health.consecutive_failures,
            last_error: health.last_error.clone(),
            last_cycle_at: health.last_cycle_at,
            next_delay_ms: match phase {
                SyncPhase::Scheduled(delay) => Some(delay.as_millis() as u64),
                _ => None,
            },
        }
    }

    pub(crate) fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }

    pub(crate) fn record_fetch(&self) {
        self.fetch_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        let mut health = self.health.lock();
        health.consecutive_failures = 0;
        health.last_error = None;
        health.last_cycle_at = Some(Utc::now());
    }

    pub(crate) fn record_failure(&self, error: &SyncError) {
        let mut health = self.health.lock();
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.last_error = Some(error.to_string());
        health.last_cycle_at = Some(Utc::now());
    }

    /// Installs a new snapshot with the next revision number.
    pub(crate) fn install(&self, canonical: Bytes, providers: Arc<ProviderSet>) -> Arc<AppliedSnapshot> {
        let snapshot = Arc::new(AppliedSnapshot {
            revision: self.applied.load().revision + 1,
            canonical,
            providers,
            applied_at: Utc::now(),
        });
        self.applied.store(Arc::clone(&snapshot));
        snapshot
    }
}
