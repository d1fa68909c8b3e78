//! Cloudtide Core - Shared building blocks for the Cloudtide service
//!
//! This crate holds what every other Cloudtide crate leans on: the central
//! configuration, the live runtime settings operators can change while the
//! service runs, and tracing setup.

pub mod config;
pub mod settings;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::{
    CloudtideConfig, DEFAULT_SEARCH_CONFIG_URL, EngineConfig, SearchSyncConfig, ServerConfig,
};
pub use settings::RuntimeSettings;

/// Core errors that can bubble up from any Cloudtide subsystem.
#[derive(Debug, thiserror::Error)]
pub enum CloudtideError {
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {reason}")]
    Logging { reason: String },
}

impl CloudtideError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            CloudtideError::Configuration { reason } => format!("Invalid settings: {reason}"),
            CloudtideError::Io(_) => "File system error occurred".to_string(),
            CloudtideError::Logging { .. } => "Could not initialize logging".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(self, CloudtideError::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, CloudtideError>;
