//! Publication of newly applied provider sets.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::catalog::ProviderSet;

/// A provider set that has just been applied.
#[derive(Debug, Clone)]
pub struct ProviderUpdate {
    /// Revision of the applied snapshot
    pub revision: u64,
    /// The new active providers
    pub providers: Arc<ProviderSet>,
}

/// Receiver of provider updates, typically the application's published state.
pub trait StateSink: Send + Sync + std::fmt::Debug {
    /// Publishes an update. Must not block.
    fn publish(&self, update: ProviderUpdate);
}

/// [`StateSink`] that fans updates out over a broadcast channel.
///
/// Publishing with no subscribers, or with subscribers that have fallen
/// behind, is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<ProviderUpdate>,
}

impl BroadcastSink {
    /// Creates a sink buffering up to `capacity` updates per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to future updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ProviderUpdate> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl StateSink for BroadcastSink {
    fn publish(&self, update: ProviderUpdate) {
        let revision = update.revision;
        match self.sender.send(update) {
            Ok(receivers) => tracing::debug!(revision, receivers, "Published provider update"),
            Err(_) => tracing::debug!(revision, "Provider update published with no subscribers"),
        }
    }
}
