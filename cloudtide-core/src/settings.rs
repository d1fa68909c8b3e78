//! Live runtime settings shared between the API and background tasks.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::CloudtideError;
use crate::config::EngineConfig;

/// Shared handle to the operator-controlled engine settings.
///
/// Cloning the handle shares the same settings. Readers take a short read
/// lock and copy out what they need, so a settings update never waits on a
/// long-running reader.
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    inner: Arc<RwLock<EngineConfig>>,
}

impl RuntimeSettings {
    /// Creates runtime settings seeded with the given engine configuration.
    pub fn new(initial: EngineConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Returns a copy of the current settings.
    pub fn snapshot(&self) -> EngineConfig {
        self.inner.read().clone()
    }

    /// Returns the operator's search config override, if one is set.
    pub fn search_config_url(&self) -> Option<String> {
        self.inner.read().search_config_override().map(str::to_string)
    }

    /// Validates and installs new settings, returning the previous ones.
    ///
    /// # Errors
    /// - `CloudtideError::Configuration` - The new settings failed validation;
    ///   the current settings are left in place
    pub fn replace(&self, next: EngineConfig) -> Result<EngineConfig, CloudtideError> {
        next.validate()?;

        let previous = std::mem::replace(&mut *self.inner.write(), next);
        tracing::info!(
            search_config_url = ?self.search_config_url(),
            "Runtime settings updated"
        );
        Ok(previous)
    }
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_is_visible_through_clones() {
        let settings = RuntimeSettings::default();
        let reader = settings.clone();
        assert_eq!(reader.search_config_url(), None);

        let next = EngineConfig {
            search_config_url: Some("https://example.com/providers.json".to_string()),
            ..Default::default()
        };
        let previous = settings.replace(next).unwrap();

        assert_eq!(previous, EngineConfig::default());
        assert_eq!(
            reader.search_config_url().as_deref(),
            Some("https://example.com/providers.json")
        );
    }

    #[test]
    fn test_invalid_replace_keeps_current_settings() {
        let settings = RuntimeSettings::default();
        let invalid = EngineConfig {
            incoming_port: 0,
            ..Default::default()
        };

        let result = settings.replace(invalid);

        assert!(matches!(result, Err(CloudtideError::Configuration { .. })));
        assert_eq!(settings.snapshot(), EngineConfig::default());
    }
}
