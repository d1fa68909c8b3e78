//! Remote synchronization of the provider catalog.

pub mod backoff;
pub mod canonical;
pub mod diff_gate;
pub mod fetcher;
pub mod reload;
pub mod shutdown;
pub mod sink;
pub mod state;
pub mod sync_loop;

pub use backoff::Backoff;
pub use canonical::normalize;
pub use diff_gate::should_apply;
pub use fetcher::{DocumentFetcher, HttpFetcher};
pub use reload::ReloadCoordinator;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use sink::{BroadcastSink, ProviderUpdate, StateSink};
pub use state::{AppliedSnapshot, SyncPhase, SyncState, SyncStatus};
pub use sync_loop::{CycleOutcome, CycleReport, SyncLoop, SyncLoopHandle, spawn_sync_loop};
