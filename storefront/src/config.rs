//! Configuration management for the storefront client.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Default REST API base URL
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Default directory for persisted cart and session data
pub const DEFAULT_DATA_DIR: &str = ".storefront";

/// Time allowed for outstanding round trips to finish on exit
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "storefront=info";

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// REST API base URL (`STOREFRONT_API_URL`)
    pub api_url: String,
    /// Local storage directory (`STOREFRONT_DATA_DIR`)
    pub data_dir: PathBuf,
    /// Upper bound on waiting for order/catalog results
    /// (`STOREFRONT_RESPONSE_TIMEOUT_SECS`); unset means wait for the outcome
    pub response_timeout: Option<Duration>,
    /// Print a Prometheus metrics snapshot to stderr on exit (`STOREFRONT_METRICS`)
    pub print_metrics: bool,
    /// Tracing filter (`RUST_LOG`)
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            response_timeout: None,
            print_metrics: false,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file. Missing or
    /// unparsable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            api_url: lookup("STOREFRONT_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or(defaults.api_url),
            data_dir: lookup("STOREFRONT_DATA_DIR")
                .filter(|dir| !dir.is_empty())
                .map_or(defaults.data_dir, PathBuf::from),
            response_timeout: lookup("STOREFRONT_RESPONSE_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .or(defaults.response_timeout),
            print_metrics: lookup("STOREFRONT_METRICS")
                .map_or(defaults.print_metrics, |flag| {
                    matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
                }),
            log_filter: lookup("RUST_LOG").unwrap_or(defaults.log_filter),
        }
    }
}
