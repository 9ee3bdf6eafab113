//! OAuth2 client-credentials exchange against the platform token endpoint.

use crate::config::LtiConfig;
use crate::error::LtiError;
use ltigate_telemetry::MetricsRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Access token granted by the platform.
///
/// Held for a single outbound call; never cached across launches.
#[derive(Clone, Deserialize, Serialize)]
pub struct BearerToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Advisory lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl BearerToken {
    /// A token obtained out of band (e.g. supplied by the caller).
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
            scope: None,
        }
    }

    /// `Authorization` header value.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Obtains grade-scoped bearer tokens with the tool's client credentials.
pub struct TokenExchangeClient {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl TokenExchangeClient {
    pub fn new(client: reqwest::Client, config: &LtiConfig) -> Self {
        Self {
            client,
            token_url: config.platform.token_url.clone(),
            client_id: config.platform.client_id.clone(),
            client_secret: config.tool.client_secret.clone(),
            scope: config.grading.scope.clone(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Exchange the configured credentials for a token.
    pub async fn exchange(&self) -> Result<BearerToken, LtiError> {
        self.exchange_with(&self.token_url, &self.client_id, &self.client_secret, &self.scope)
            .await
    }

    /// Exchange explicit credentials. No retries: the caller owns retry
    /// policy.
    pub async fn exchange_with(
        &self,
        token_endpoint: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<BearerToken, LtiError> {
        let started = Instant::now();
        let result = self
            .request_token(token_endpoint, client_id, client_secret, scope)
            .await;

        if let Some(metrics) = &self.metrics {
            metrics.record_outbound("token_exchange", started.elapsed().as_secs_f64());
        }
        if let Err(e) = &result {
            tracing::warn!(
                client_id = %client_id,
                error = %e,
                "client credentials exchange failed"
            );
        }
        result
    }

    async fn request_token(
        &self,
        token_endpoint: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<BearerToken, LtiError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("scope", scope),
        ];

        let response = self
            .client
            .post(token_endpoint)
            .header("accept", "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| LtiError::TokenEndpointUnreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LtiError::TokenEndpointRejected(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| LtiError::TokenEndpointUnreachable(e.to_string()))?;
        let token: BearerToken = serde_json::from_slice(&bytes)
            .map_err(|e| LtiError::TokenResponseMalformed(e.to_string()))?;

        if token.access_token.is_empty() {
            return Err(LtiError::TokenResponseMalformed(
                "empty access_token".into(),
            ));
        }
        Ok(token)
    }
}
