//! Exporter configuration and endpoint resolution
//!
//! The platform runs under two brand deployments with identical variable
//! shapes (Keywords AI and Respan); both are honored, Keywords AI first.
//! Base URL precedence: explicit argument > environment variable > built-in
//! default.

use std::env;

use serde_json::{Map as JsonMap, Value as JsonValue};

/// Keywords AI brand environment variables
pub const KEYWORDSAI_API_KEY_VAR: &str = "KEYWORDSAI_API_KEY";
pub const KEYWORDSAI_BASE_URL_VAR: &str = "KEYWORDSAI_BASE_URL";

/// Respan brand environment variables (same shapes, second in precedence)
pub const RESPAN_API_KEY_VAR: &str = "RESPAN_API_KEY";
pub const RESPAN_BASE_URL_VAR: &str = "RESPAN_BASE_URL";

/// Built-in platform endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.keywordsai.co/api";

/// Sub-path accepting batches of log records
pub const INGEST_PATH: &str = "/v1/traces/ingest";

/// Sub-path for gateway-mode proxying of LLM calls
pub const GATEWAY_PATH: &str = "/chat/completions";

fn env_first(vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.trim().is_empty())
}

/// Read the API key from the environment, Keywords AI brand first.
pub fn api_key_from_env() -> Option<String> {
    env_first(&[KEYWORDSAI_API_KEY_VAR, RESPAN_API_KEY_VAR])
}

/// Read the base URL from the environment, Keywords AI brand first.
pub fn base_url_from_env() -> Option<String> {
    env_first(&[KEYWORDSAI_BASE_URL_VAR, RESPAN_BASE_URL_VAR])
}

/// Append a sub-path to a base URL.
///
/// A base already ending in `/api` is not given a second `/api` segment;
/// one that does not gets `/api` inserted before the sub-path:
///
/// ```
/// use keywordsai_tracing::config::append_path;
///
/// assert_eq!(
///     append_path("https://api.x.ai", "/chat/completions"),
///     "https://api.x.ai/api/chat/completions"
/// );
/// assert_eq!(
///     append_path("https://api.x.ai/api", "/chat/completions"),
///     "https://api.x.ai/api/chat/completions"
/// );
/// ```
pub fn append_path(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/api") {
        format!("{}{}", base, path)
    } else {
        format!("{}/api{}", base, path)
    }
}

/// Configuration shared by every adapter in this crate.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub customer_identifier: Option<String>,
    pub session_identifier: Option<String>,
    /// Static metadata merged into every record (lowest precedence).
    pub metadata: JsonMap<String, JsonValue>,
    /// Propagate delivery failures to the caller instead of logging them.
    pub raise_on_error: bool,
    /// Bounded export queue size; a full queue drops the batch with a warning.
    pub max_queue: usize,
    pub max_retries: u32,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ExporterConfig {
    /// Resolve configuration from the environment and built-in defaults.
    pub fn from_env() -> Self {
        Self {
            api_key: api_key_from_env(),
            base_url: base_url_from_env().unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            customer_identifier: None,
            session_identifier: None,
            metadata: JsonMap::new(),
            raise_on_error: false,
            max_queue: 1024,
            max_retries: crate::retry::DEFAULT_MAX_RETRIES,
        }
    }

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::from_env()
        }
    }

    /// Explicit base URL, overriding the environment and the default.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_customer_identifier(mut self, id: impl Into<String>) -> Self {
        self.customer_identifier = Some(id.into());
        self
    }

    pub fn with_session_identifier(mut self, id: impl Into<String>) -> Self {
        self.session_identifier = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_raise_on_error(mut self, raise_on_error: bool) -> Self {
        self.raise_on_error = raise_on_error;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Full URL of the log ingestion endpoint.
    pub fn ingest_endpoint(&self) -> String {
        append_path(&self.base_url, INGEST_PATH)
    }

    /// Full URL of the gateway-mode chat completions endpoint.
    pub fn gateway_endpoint(&self) -> String {
        append_path(&self.base_url, GATEWAY_PATH)
    }
}
