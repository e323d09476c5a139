//! Client configuration

use serde::{Deserialize, Serialize};

/// Default getStopInfo endpoint
pub const DEFAULT_HOST: &str = "https://yandex.ru/maps/api/masstransit/getStopInfo";

/// Configuration for a masstransit session
#[derive(Clone, Serialize, Deserialize)]
pub struct MasstransitConfig {
    /// Full URL of the getStopInfo endpoint
    #[serde(default = "default_host")]
    pub host: String,

    /// Value of the `locale` query parameter
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Value of the `lang` query parameter
    #[serde(default = "default_language")]
    pub language: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Pre-supplied anti-forgery token; skips the bootstrap refresh when set
    #[serde(default)]
    pub csrf_token: Option<String>,

    /// Treat HTTP 404 from getStopInfo as "no prognosis data" and retry
    /// without prognosis mode
    #[serde(default = "default_retry_on_not_found")]
    pub retry_on_not_found: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_locale() -> String {
    "ru_RU".to_string()
}

fn default_language() -> String {
    "ru".to_string()
}

const fn default_timeout_secs() -> u64 {
    15
}

const fn default_retry_on_not_found() -> bool {
    true
}

impl Default for MasstransitConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            locale: default_locale(),
            language: default_language(),
            timeout_secs: default_timeout_secs(),
            csrf_token: None,
            retry_on_not_found: default_retry_on_not_found(),
        }
    }
}

// The token is a credential; keep it out of debug output.
impl std::fmt::Debug for MasstransitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasstransitConfig")
            .field("host", &self.host)
            .field("locale", &self.locale)
            .field("language", &self.language)
            .field("timeout_secs", &self.timeout_secs)
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "[REDACTED]"))
            .field("retry_on_not_found", &self.retry_on_not_found)
            .finish()
    }
}

impl MasstransitConfig {
    /// Create a configuration suitable for testing
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout_secs: 5,
            csrf_token: Some("test-token".to_string()),
            ..Default::default()
        }
    }

    /// Use a custom endpoint URL
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Skip the bootstrap refresh by supplying a token up front
    #[must_use]
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Set the `locale` and `lang` query parameters
    #[must_use]
    pub fn with_locale(mut self, locale: impl Into<String>, language: impl Into<String>) -> Self {
        self.locale = locale.into();
        self.language = language.into();
        self
    }

    /// Set the per-request timeout
    #[must_use]
    pub const fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// The pre-supplied token, if it is non-empty
    #[must_use]
    pub fn initial_token(&self) -> Option<&str> {
        self.csrf_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("host must not be empty".to_string());
        }

        let url =
            reqwest::Url::parse(&self.host).map_err(|e| format!("host is not a URL: {e}"))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!("host must be http or https, got {}", url.scheme()));
        }

        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than 0".to_string());
        }

        if self.locale.is_empty() || self.language.is_empty() {
            return Err("locale and language must not be empty".to_string());
        }

        Ok(())
    }
}
