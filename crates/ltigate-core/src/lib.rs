//! LTI protocol core.
//!
//! Verifies launches under both trust models (OAuth 1.0a signed forms and
//! JWT id_tokens checked against a platform key set), exchanges client
//! credentials for a bearer token, and posts scores back to the platform's
//! line item. Everything here receives an explicit [`LtiConfig`] and already
//! parsed request data; sockets and routing live in the `ltigate` binary.

pub mod claims;
pub mod config;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod grade;
pub mod jwk;
pub mod keyset;
pub mod launch;
pub mod legacy;
pub mod login;
pub mod params;
pub mod token;
pub mod worker;

pub use claims::{ClaimsExtractor, Context, GradingEndpoint, LaunchClaims, ResourceLink};
pub use config::{ConfigError, LtiConfig};
pub use error::LtiError;
pub use exchange::{BearerToken, TokenExchangeClient};
pub use execution::{
    CleanRunPolicy, CodeExecutor, ExecutionError, ExecutionRequest, ExecutionResult, ScoringPolicy,
};
pub use grade::{GradeEnvelope, GradePassbackClient, GradeSubmission};
pub use keyset::{KeySet, KeySetCache};
pub use launch::{LaunchOptions, LaunchOrchestrator, LaunchOutcome, TrustMode, ID_TOKEN_PARAM};
pub use legacy::LegacySignatureVerifier;
pub use login::{LoginError, LoginInitiator, LoginRedirect};
pub use params::LaunchParameters;
pub use token::{TokenVerifier, VerifiedToken};
pub use worker::{GradeJob, GradeObserver, GradeQueue, GradeQueueFull};

/// Build the shared outbound HTTP client with the configured timeouts.
pub fn http_client(config: &config::HttpConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(concat!("ltigate/", env!("CARGO_PKG_VERSION")))
        .build()
}
