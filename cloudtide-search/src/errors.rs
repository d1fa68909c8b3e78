//! Error types for provider loading and provider synchronization.

use thiserror::Error;

/// Errors raised while parsing or validating a provider document.
#[derive(Debug, Error)]
pub enum ScraperError {
    /// The document does not have the shape of a provider mapping.
    #[error("Invalid provider document: {reason}")]
    InvalidDocument {
        /// What was wrong with the document
        reason: String,
    },

    /// A single provider definition failed validation.
    #[error("Invalid provider '{id}': {reason}")]
    InvalidProvider {
        /// Identifier of the offending provider
        id: String,
        /// What was wrong with the definition
        reason: String,
    },

    /// A URL template could not be rendered.
    #[error("Template error in '{template}': {reason}")]
    Template {
        /// The template being rendered
        template: String,
        /// Why rendering failed
        reason: String,
    },
}

/// Errors from a single synchronization cycle.
///
/// None of these are fatal: the sync loop logs them, keeps the active
/// provider set, and retries after a backoff delay.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Connection, timeout, or body read failure while fetching.
    #[error("Network error fetching {url}: {reason}")]
    Network {
        /// Source that was being fetched
        url: String,
        /// The reason for the network error
        reason: String,
    },

    /// The source answered with a non-success status.
    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus {
        /// Source that was being fetched
        url: String,
        /// Status code returned by the source
        status: u16,
    },

    /// The fetched body is not well-formed JSON.
    #[error("Malformed provider document: {reason}")]
    MalformedDocument {
        /// The reason the document could not be parsed
        reason: String,
    },

    /// The document is well-formed but the provider catalog refused it.
    #[error("Provider document rejected: {0}")]
    ConfigRejected(#[from] ScraperError),
}

impl SyncError {
    /// Short category name used in status reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Network { .. } => "network",
            SyncError::HttpStatus { .. } => "http_status",
            SyncError::MalformedDocument { .. } => "malformed_document",
            SyncError::ConfigRejected(_) => "config_rejected",
        }
    }
}
