//! Command-line flags and their environment fallbacks.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use ltigate_core::config::{
    GradingConfig, HttpConfig, KeySetConfig, LegacyClientConfig, LtiConfig, PlatformConfig,
    ToolConfig, DEFAULT_AGS_SCOPE,
};
use ltigate_telemetry::{LogFormat, TelemetryConfig};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "ltigate",
    about = "LTI tool provider: launch verification and grade passback",
    version
)]
pub struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 8081)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, env = "LISTEN_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Expected `iss` of platform id_tokens.
    #[arg(long, env = "PLATFORM_ISSUER", default_value = "http://localhost:8888")]
    pub platform_issuer: String,

    #[arg(
        long,
        env = "PLATFORM_JWKS_URL",
        default_value = "http://localhost:8888/mod/lti/certs.php"
    )]
    pub platform_jwks_url: String,

    #[arg(
        long,
        env = "PLATFORM_TOKEN_URL",
        default_value = "http://localhost:8888/mod/lti/token.php"
    )]
    pub platform_token_url: String,

    #[arg(
        long,
        env = "PLATFORM_AUTH_URL",
        default_value = "http://localhost:8888/mod/lti/auth.php"
    )]
    pub platform_auth_url: String,

    /// This tool's client id at the platform.
    #[arg(long, env = "LTI_CLIENT_ID")]
    pub client_id: String,

    #[arg(long, env = "LTI_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: String,

    /// Public base URL of this tool.
    #[arg(long, env = "TOOL_ISSUER", default_value = "http://localhost:8081")]
    pub tool_issuer: String,

    #[arg(long, env = "LTI_DEPLOYMENT_ID")]
    pub deployment_id: Option<String>,

    #[arg(long, env = "AGS_SCOPE", default_value = DEFAULT_AGS_SCOPE)]
    pub ags_scope: String,

    /// Base URL of the Judge0 code runner.
    #[arg(long, env = "JUDGE0_URL", default_value = "http://localhost:2358")]
    pub judge0_url: String,

    #[arg(long, env = "JUDGE0_AUTH_TOKEN", hide_env_values = true)]
    pub judge0_auth_token: Option<String>,

    /// Where successful token launches are redirected.
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: String,

    /// OAuth 1.0a consumer key of the trusted legacy platform.
    #[arg(long, env = "LTI_CONSUMER_KEY")]
    pub consumer_key: String,

    #[arg(long, env = "LTI_CONSUMER_SECRET", hide_env_values = true)]
    pub consumer_secret: String,

    /// Scheme assumed when rebuilding signed URLs without X-Forwarded-Proto.
    #[arg(long, env = "PUBLIC_SCHEME", default_value = "http")]
    pub public_scheme: String,

    /// JSON key set served at /lti/jwks.
    #[arg(long, env = "TOOL_JWKS_FILE")]
    pub tool_jwks_file: Option<PathBuf>,

    #[arg(long, env = "DEFAULT_LANGUAGE", default_value = "go")]
    pub default_language: String,

    #[arg(long, env = "DEFAULT_MAX_SCORE", default_value_t = 100.0)]
    pub default_max_score: f64,

    #[arg(long, env = "CLOCK_SKEW_SECONDS", default_value_t = 60)]
    pub clock_skew_seconds: u64,

    /// Timeout for every outbound call.
    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 30)]
    pub http_timeout_seconds: u64,

    #[arg(long, env = "KEYSET_TTL_SECONDS", default_value_t = 300)]
    pub keyset_ttl_seconds: u64,

    #[arg(long, env = "GRADE_QUEUE_CAPACITY", default_value_t = 100)]
    pub grade_queue_capacity: usize,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// `json` or `pretty`.
    #[arg(long, env = "LOG_FORMAT", default_value = "json")]
    pub log_format: String,
}

impl Cli {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn telemetry_config(&self) -> anyhow::Result<TelemetryConfig> {
        let format = LogFormat::parse(&self.log_format)
            .with_context(|| format!("unknown log format: {}", self.log_format))?;
        Ok(TelemetryConfig::new()
            .with_log_level(&self.log_level)
            .with_log_format(format))
    }

    /// Build the core configuration, reading the tool key set file if one
    /// was given.
    pub fn lti_config(&self) -> anyhow::Result<LtiConfig> {
        let jwks = match &self.tool_jwks_file {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .with_context(|| format!("{} is not valid JSON", path.display()))?;
                Some(value)
            }
            None => None,
        };

        Ok(LtiConfig {
            legacy: LegacyClientConfig {
                consumer_key: self.consumer_key.clone(),
                shared_secret: self.consumer_secret.clone(),
            },
            platform: PlatformConfig {
                issuer: self.platform_issuer.clone(),
                client_id: self.client_id.clone(),
                deployment_id: self.deployment_id.clone(),
                jwks_url: self.platform_jwks_url.clone(),
                token_url: self.platform_token_url.clone(),
                auth_url: self.platform_auth_url.clone(),
            },
            tool: ToolConfig {
                base_url: self.tool_issuer.clone(),
                client_secret: self.client_secret.clone(),
                frontend_url: self.frontend_url.clone(),
                public_scheme: self.public_scheme.clone(),
                jwks,
            },
            grading: GradingConfig {
                scope: self.ags_scope.clone(),
                default_max_score: self.default_max_score,
                queue_capacity: self.grade_queue_capacity,
            },
            keyset: KeySetConfig {
                ttl_seconds: self.keyset_ttl_seconds,
                ..KeySetConfig::default()
            },
            http: HttpConfig {
                timeout_seconds: self.http_timeout_seconds,
                ..HttpConfig::default()
            },
            clock_skew_seconds: self.clock_skew_seconds,
            default_language: self.default_language.clone(),
        })
    }
}
