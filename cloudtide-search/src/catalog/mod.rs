//! Search provider catalog.
//!
//! A provider document is a JSON object mapping provider identifiers to
//! [`ProviderDefinition`]s. Identifiers containing a slash (`1337x/item`)
//! describe follow-up item pages of the provider before the slash.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::errors::ScraperError;

pub mod definition;

pub use definition::{Extractor, ProviderDefinition, render_template};

/// Provider definitions keyed by identifier.
pub type ProviderSet = BTreeMap<String, ProviderDefinition>;

/// Provider document bundled with the binary and active before the first
/// remote document is applied.
pub const DEFAULT_PROVIDERS: &[u8] = include_bytes!("default_providers.json");

/// Component that turns provider documents into an active provider set.
///
/// `load_config` must be all-or-nothing: a rejected document leaves the
/// previously active set untouched.
pub trait Scraper: Send + Sync + std::fmt::Debug {
    /// Parses, validates and activates a provider document.
    ///
    /// # Errors
    /// - `ScraperError::InvalidDocument` - Document is not a provider mapping
    /// - `ScraperError::InvalidProvider` - A definition failed validation
    fn load_config(&self, document: &[u8]) -> Result<Arc<ProviderSet>, ScraperError>;

    /// Returns the currently active provider set.
    fn active(&self) -> Arc<ProviderSet>;
}

/// [`Scraper`] backed by declarative provider definitions.
#[derive(Debug)]
pub struct ProviderCatalog {
    active: ArcSwap<ProviderSet>,
}

impl ProviderCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            active: ArcSwap::from_pointee(ProviderSet::new()),
        }
    }

    /// Parses and validates a provider document without activating it.
    ///
    /// # Errors
    /// - `ScraperError::InvalidDocument` - Not a JSON object of definitions,
    ///   or no providers at all
    /// - `ScraperError::InvalidProvider` - A definition failed validation
    pub fn parse(document: &[u8]) -> Result<ProviderSet, ScraperError> {
        let providers: ProviderSet =
            serde_json::from_slice(document).map_err(|e| ScraperError::InvalidDocument {
                reason: e.to_string(),
            })?;

        if providers.is_empty() {
            return Err(ScraperError::InvalidDocument {
                reason: "document defines no providers".to_string(),
            });
        }

        for (id, definition) in &providers {
            definition.validate(id)?;

            // Item endpoints hang off a listing provider
            if let Some((parent, _)) = id.split_once('/') {
                if !providers.contains_key(parent) {
                    return Err(ScraperError::InvalidProvider {
                        id: id.clone(),
                        reason: format!("item endpoint without provider '{parent}'"),
                    });
                }
            }
        }

        Ok(providers)
    }

    /// Looks up a provider in the active set.
    pub fn get(&self, id: &str) -> Option<ProviderDefinition> {
        self.active.load().get(id).cloned()
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Scraper for ProviderCatalog {
    fn load_config(&self, document: &[u8]) -> Result<Arc<ProviderSet>, ScraperError> {
        let providers = Arc::new(Self::parse(document)?);
        self.active.store(Arc::clone(&providers));

        tracing::debug!(providers = providers.len(), "Provider catalog loaded");
        Ok(providers)
    }

    fn active(&self) -> Arc<ProviderSet> {
        self.active.load_full()
    }
}
