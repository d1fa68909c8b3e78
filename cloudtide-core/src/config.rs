//! Centralized configuration for Cloudtide.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::CloudtideError;

/// Remote document listing the search providers, used when no override is set.
pub const DEFAULT_SEARCH_CONFIG_URL: &str = "https://gist.githubusercontent.com/jpillora/4d945b46b3025843b066adf3d685be6b/raw/scraper-config.json";

/// Central configuration for all Cloudtide components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct CloudtideConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub search_sync: SearchSyncConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Title shown to API clients
    pub title: String,
    /// Address to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            title: "Cloudtide".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Operator-facing engine settings.
///
/// This is the document accepted by `POST /api/configure` and may change
/// while the service runs. Field names on the wire keep the established
/// PascalCase spelling so existing clients continue to work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct EngineConfig {
    pub auto_start: bool,
    pub disable_encryption: bool,
    pub download_directory: PathBuf,
    pub enable_upload: bool,
    pub enable_seeding: bool,
    pub incoming_port: u16,
    /// Overrides the compiled-in search provider source when non-empty.
    /// Encoded as `""` when unset.
    #[serde(rename = "SearchConfigURL", serialize_with = "serialize_override")]
    pub search_config_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            disable_encryption: false,
            download_directory: PathBuf::from("./downloads"),
            enable_upload: true,
            enable_seeding: false,
            incoming_port: 50007,
            search_config_url: None,
        }
    }
}

fn serialize_override<S>(url: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(url.as_deref().unwrap_or_default())
}

impl EngineConfig {
    /// Returns the search config override, treating blank values as unset.
    pub fn search_config_override(&self) -> Option<&str> {
        self.search_config_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Checks the settings before they are accepted into the running service.
    ///
    /// # Errors
    /// - `CloudtideError::Configuration` - Empty download directory, zero port,
    ///   or a search config override that is not an http(s) URL
    pub fn validate(&self) -> Result<(), CloudtideError> {
        if self.download_directory.as_os_str().is_empty() {
            return Err(CloudtideError::Configuration {
                reason: "download directory must not be empty".to_string(),
            });
        }

        if self.incoming_port == 0 {
            return Err(CloudtideError::Configuration {
                reason: "incoming port must not be zero".to_string(),
            });
        }

        if let Some(raw) = self.search_config_override() {
            let parsed = url::Url::parse(raw).map_err(|e| CloudtideError::Configuration {
                reason: format!("search config URL '{raw}' is invalid: {e}"),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(CloudtideError::Configuration {
                    reason: format!("search config URL '{raw}' must use http or https"),
                });
            }
        }

        Ok(())
    }
}

/// Search provider synchronization configuration.
///
/// Controls where provider definitions come from, how often they are polled,
/// and how quickly failed polls are retried.
#[derive(Debug, Clone)]
pub struct SearchSyncConfig {
    /// Source used when no operator override is set
    pub default_url: String,
    /// Poll period after a cycle that completed without error
    pub steady_interval: Duration,
    /// First retry delay after a failure
    pub initial_backoff: Duration,
    /// Upper bound for retry delays
    pub backoff_ceiling: Duration,
    /// Growth factor between consecutive retry delays
    pub backoff_factor: f64,
    /// Add up to 10% random jitter to retry delays
    pub backoff_jitter: bool,
    /// Deadline for a single fetch, including the body
    pub fetch_timeout: Duration,
    /// Largest provider document accepted
    pub max_document_bytes: usize,
    /// User agent for provider document requests
    pub user_agent: &'static str,
}

impl Default for SearchSyncConfig {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_SEARCH_CONFIG_URL.to_string(),
            steady_interval: Duration::from_secs(30 * 60),
            initial_backoff: Duration::from_millis(100),
            backoff_ceiling: Duration::from_secs(30 * 60),
            backoff_factor: 2.0,
            backoff_jitter: false,
            fetch_timeout: Duration::from_secs(30),
            max_document_bytes: 4 * 1024 * 1024, // 4 MiB
            user_agent: "cloudtide/0.1.0",
        }
    }
}

impl SearchSyncConfig {
    /// Checks that the timings cannot make the sync loop poll without pause.
    ///
    /// # Errors
    /// - `CloudtideError::Configuration` - Zero poll interval, zero initial
    ///   backoff, initial backoff above the ceiling, zero fetch timeout,
    ///   or a growth factor below 1
    pub fn validate(&self) -> Result<(), CloudtideError> {
        let reject = |reason: &str| {
            Err(CloudtideError::Configuration {
                reason: reason.to_string(),
            })
        };

        if self.steady_interval.is_zero() {
            return reject("search poll interval must not be zero");
        }
        if self.initial_backoff.is_zero() {
            return reject("initial search backoff must not be zero");
        }
        if self.initial_backoff > self.backoff_ceiling {
            return reject("initial search backoff must not exceed the backoff ceiling");
        }
        if self.fetch_timeout.is_zero() {
            return reject("search fetch timeout must not be zero");
        }
        if self.backoff_factor.is_nan() || self.backoff_factor < 1.0 {
            return reject("search backoff factor must be at least 1");
        }

        Ok(())
    }
}

impl CloudtideConfig {
    /// Validates every section that the running service depends on.
    ///
    /// # Errors
    /// - `CloudtideError::Configuration` - Engine settings or sync timings are invalid
    pub fn validate(&self) -> Result<(), CloudtideError> {
        self.engine.validate()?;
        self.search_sync.validate()
    }

    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults. Unparseable values and zero durations
    /// are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("CLOUDTIDE_HOST") {
            config.server.host = host;
        }

        if let Ok(port) = std::env::var("CLOUDTIDE_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.server.port = port;
            }
        }

        if let Ok(dir) = std::env::var("CLOUDTIDE_DOWNLOAD_DIR") {
            config.engine.download_directory = PathBuf::from(dir);
        }

        if let Ok(url) = std::env::var("CLOUDTIDE_SEARCH_CONFIG_URL") {
            config.engine.search_config_url = Some(url);
        }

        if let Ok(interval) = std::env::var("CLOUDTIDE_SEARCH_INTERVAL_SECS") {
            if let Some(seconds) = parse_nonzero_secs(&interval) {
                config.search_sync.steady_interval = Duration::from_secs(seconds);
            }
        }

        if let Ok(timeout) = std::env::var("CLOUDTIDE_FETCH_TIMEOUT") {
            if let Some(seconds) = parse_nonzero_secs(&timeout) {
                config.search_sync.fetch_timeout = Duration::from_secs(seconds);
            }
        }

        config
    }

    /// Creates a configuration with short timings for tests.
    pub fn for_testing() -> Self {
        Self {
            search_sync: SearchSyncConfig {
                steady_interval: Duration::from_secs(60),
                initial_backoff: Duration::from_millis(10),
                backoff_ceiling: Duration::from_secs(1),
                fetch_timeout: Duration::from_secs(2),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn parse_nonzero_secs(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|seconds| *seconds > 0)
}
