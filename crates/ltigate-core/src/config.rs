//! Resolved configuration passed into every component constructor.
//!
//! Nothing in this crate reads the process environment. The binary builds an
//! [`LtiConfig`] once at startup (from flags and env vars) and hands
//! references to it down.

use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Default AGS scope requested for score passback.
pub const DEFAULT_AGS_SCOPE: &str = "https://purl.imsglobal.org/spec/lti-ags/scope/score";

#[derive(Debug, Clone, Deserialize)]
pub struct LtiConfig {
    pub legacy: LegacyClientConfig,
    pub platform: PlatformConfig,
    pub tool: ToolConfig,

    #[serde(default)]
    pub grading: GradingConfig,

    #[serde(default)]
    pub keyset: KeySetConfig,

    #[serde(default)]
    pub http: HttpConfig,

    /// Leeway applied to `exp` and `nbf` checks.
    #[serde(default = "default_clock_skew")]
    pub clock_skew_seconds: u64,

    /// Language used when a launch carries code but no `language` parameter.
    #[serde(default = "default_language")]
    pub default_language: String,
}

/// The single trusted OAuth 1.0a consumer.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyClientConfig {
    pub consumer_key: String,
    pub shared_secret: String,
}

/// The LTI 1.3 platform this tool is registered with.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Expected `iss` of id_tokens.
    pub issuer: String,
    /// This tool's client id at the platform; the expected `aud`.
    pub client_id: String,
    #[serde(default)]
    pub deployment_id: Option<String>,
    pub jwks_url: String,
    pub token_url: String,
    /// OIDC authorization endpoint for login initiation.
    pub auth_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolConfig {
    /// Public base URL of this tool; the OIDC redirect URI is derived from it.
    pub base_url: String,
    pub client_secret: String,
    /// Where successful token launches are redirected.
    pub frontend_url: String,
    /// Scheme assumed for legacy signature reconstruction when no
    /// `X-Forwarded-Proto` header is present.
    #[serde(default = "default_public_scheme")]
    pub public_scheme: String,
    /// Key set document served at `/lti/jwks`.
    #[serde(default)]
    pub jwks: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GradingConfig {
    #[serde(default = "default_ags_scope")]
    pub scope: String,
    #[serde(default = "default_max_score")]
    pub default_max_score: f64,
    /// Capacity of the background grade queue.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            scope: default_ags_scope(),
            default_max_score: default_max_score(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeySetConfig {
    /// How long a fetched key set is served without refetching.
    #[serde(default = "default_keyset_ttl")]
    pub ttl_seconds: u64,
    /// Minimum gap between refetches triggered by an unknown `kid`.
    #[serde(default = "default_min_refresh")]
    pub min_refresh_seconds: u64,
}

impl Default for KeySetConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_keyset_ttl(),
            min_refresh_seconds: default_min_refresh(),
        }
    }
}

impl KeySetConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn min_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.min_refresh_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

fn default_clock_skew() -> u64 {
    60
}

fn default_language() -> String {
    "go".to_string()
}

fn default_public_scheme() -> String {
    "http".to_string()
}

fn default_ags_scope() -> String {
    DEFAULT_AGS_SCOPE.to_string()
}

fn default_max_score() -> f64 {
    100.0
}

fn default_queue_capacity() -> usize {
    100
}

fn default_keyset_ttl() -> u64 {
    300
}

fn default_min_refresh() -> u64 {
    30
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

/// A configuration problem found by [`LtiConfig::validate`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} is not an absolute http(s) URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("public scheme must be http or https, got {0}")]
    InvalidScheme(String),
}

impl LtiConfig {
    /// Check the configuration, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let required = [
            ("legacy.consumer_key", &self.legacy.consumer_key),
            ("legacy.shared_secret", &self.legacy.shared_secret),
            ("platform.issuer", &self.platform.issuer),
            ("platform.client_id", &self.platform.client_id),
            ("tool.client_secret", &self.tool.client_secret),
            ("default_language", &self.default_language),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.push(ConfigError::Empty(field));
            }
        }

        let urls = [
            ("platform.jwks_url", &self.platform.jwks_url),
            ("platform.token_url", &self.platform.token_url),
            ("platform.auth_url", &self.platform.auth_url),
            ("tool.base_url", &self.tool.base_url),
            ("tool.frontend_url", &self.tool.frontend_url),
        ];
        for (field, value) in urls {
            if !is_absolute_http_url(value) {
                errors.push(ConfigError::InvalidUrl {
                    field,
                    value: value.clone(),
                });
            }
        }

        if !matches!(self.tool.public_scheme.as_str(), "http" | "https") {
            errors.push(ConfigError::InvalidScheme(self.tool.public_scheme.clone()));
        }
        if self.http.timeout_seconds == 0 {
            errors.push(ConfigError::Zero("http.timeout_seconds"));
        }
        if self.grading.queue_capacity == 0 {
            errors.push(ConfigError::Zero("grading.queue_capacity"));
        }
        if self.grading.default_max_score <= 0.0 {
            errors.push(ConfigError::Zero("grading.default_max_score"));
        }

        errors
    }

    /// Clock skew as a signed number of seconds, for timestamp arithmetic.
    pub fn clock_skew(&self) -> i64 {
        i64::try_from(self.clock_skew_seconds).unwrap_or(i64::MAX)
    }
}

fn is_absolute_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// Configuration pointing every platform URL at `platform` (a mock
/// server's base URI), with the consumer and tool secrets used in tests.
#[cfg(test)]
pub(crate) fn test_config(platform: &str) -> LtiConfig {
    serde_json::from_value(serde_json::json!({
        "legacy": {"consumer_key": "DSA_2025", "shared_secret": "DSA_Secret_2025"},
        "platform": {
            "issuer": platform,
            "client_id": "tool-client",
            "jwks_url": format!("{}/jwks", platform),
            "token_url": format!("{}/token", platform),
            "auth_url": format!("{}/auth", platform)
        },
        "tool": {
            "base_url": "https://tool.example.com",
            "client_secret": "s3cret&more",
            "frontend_url": "https://app.example.com/launch"
        }
    }))
    .expect("test config deserializes")
}
