//! Cloudtide Search - Search provider catalog and its remote synchronization

#![deny(missing_docs)]
#![deny(clippy::missing_errors_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Search providers are described declaratively in a JSON document. A
//! bundled document is active from startup; a background loop periodically
//! fetches the published document, and when it changes, validates it and
//! swaps the new provider set in atomically.

pub mod catalog;
pub mod errors;
pub mod sync;

// Re-export main types
pub use catalog::{
    DEFAULT_PROVIDERS, Extractor, ProviderCatalog, ProviderDefinition, ProviderSet, Scraper,
};
pub use errors::{ScraperError, SyncError};
pub use sync::{
    AppliedSnapshot, BroadcastSink, CycleOutcome, CycleReport, DocumentFetcher, HttpFetcher,
    ProviderUpdate, ReloadCoordinator, StateSink, SyncLoop, SyncLoopHandle, SyncPhase, SyncState,
    SyncStatus, spawn_sync_loop,
};

/// Convenience type alias for Results with SyncError.
pub type Result<T> = std::result::Result<T, SyncError>;
