use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Symtrack";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pain level at or above which a log is treated as an emergency.
///
/// Read by the row adapter, the filters and both exports. Older backend
/// revisions used 7.
pub const EMERGENCY_PAIN_THRESHOLD: u8 = 8;

/// Share codes are always 8 characters from `[A-Z0-9]`.
pub const SHARE_CODE_LEN: usize = 8;

/// Maximum number of logs requested from shared-history.
pub const DEFAULT_HISTORY_LIMIT: u32 = 500;

/// Access token lifetime used by the in-memory backend.
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// HTTP request timeout for the remote sharing API.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "symtrack_lib=info,symtrack=info,warn"
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Connection settings for the remote sharing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingConfig {
    /// Base URL of the backend (edge functions live under `/functions/v1`).
    pub base_url: String,
    /// Public API key sent as the `apikey` header.
    pub api_key: Option<String>,
    /// Patient session JWT issued by the external auth provider.
    pub session_token: Option<String>,
    pub timeout_secs: u64,
    pub history_limit: u32,
}

impl SharingConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            session_token: None,
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load from `SYMTRACK_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let base_url = lookup("SYMTRACK_API_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("SYMTRACK_API_URL"))?;
        let mut config = Self::new(base_url.trim());

        config.api_key = lookup("SYMTRACK_API_KEY").filter(|v| !v.is_empty());
        config.session_token = lookup("SYMTRACK_SESSION_TOKEN").filter(|v| !v.is_empty());

        if let Some(raw) = lookup("SYMTRACK_HTTP_TIMEOUT_SECS") {
            config.timeout_secs = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "SYMTRACK_HTTP_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
        }
        if let Some(raw) = lookup("SYMTRACK_HISTORY_LIMIT") {
            config.history_limit = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: "SYMTRACK_HISTORY_LIMIT",
                value: raw.clone(),
            })?;
        }

        Ok(config)
    }
}
