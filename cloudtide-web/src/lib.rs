//! Cloudtide Web - JSON API Server

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Exposes the published search provider state, the sync loop status and
//! the operator settings over HTTP, and hosts the provider sync loop.

pub mod errors;
pub mod handlers;
pub mod server;

// Re-export main types
pub use errors::WebError;
pub use server::{AppState, build_router, run_server};

/// Convenience type alias for Results with WebError.
pub type Result<T> = std::result::Result<T, WebError>;
