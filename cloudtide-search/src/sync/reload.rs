//! Applying changed provider documents.

use std::sync::Arc;

use bytes::Bytes;

use crate::catalog::Scraper;
use crate::errors::SyncError;
use crate::sync::sink::{ProviderUpdate, StateSink};
use crate::sync::state::{AppliedSnapshot, SyncState};

/// Moves an accepted document into the catalog, the shared state and the sink.
///
/// Applying is all-or-nothing. When the catalog refuses the document neither
/// the state nor the sink is touched.
#[derive(Debug, Clone)]
pub struct ReloadCoordinator {
    scraper: Arc<dyn Scraper>,
    state: Arc<SyncState>,
    sink: Arc<dyn StateSink>,
}

impl ReloadCoordinator {
    /// Creates a coordinator over the given catalog, state and sink.
    pub fn new(scraper: Arc<dyn Scraper>, state: Arc<SyncState>, sink: Arc<dyn StateSink>) -> Self {
        Self {
            scraper,
            state,
            sink,
        }
    }

    /// Shared state this coordinator writes to.
    pub fn state(&self) -> &Arc<SyncState> {
        &self.state
    }

    /// Applies a canonical document.
    ///
    /// # Errors
    /// - `SyncError::ConfigRejected` - The catalog refused the document; the
    ///   previously applied snapshot stays active
    pub fn apply(&self, candidate: Bytes) -> Result<Arc<AppliedSnapshot>, SyncError> {
        let providers = self.scraper.load_config(&candidate)?;
        let snapshot = self.state.install(candidate, providers);

        self.sink.publish(ProviderUpdate {
            revision: snapshot.revision,
            providers: Arc::clone(&snapshot.providers),
        });

        tracing::info!(
            revision = snapshot.revision,
            providers = snapshot.providers.len(),
            "Loaded new search providers"
        );
        Ok(snapshot)
    }
}
