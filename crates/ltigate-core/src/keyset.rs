//! Platform key sets and their cache.
//!
//! Entries are replaced whole under a write lock; readers clone an
//! `Arc<KeySet>` and never see a half-updated set.

use crate::config::KeySetConfig;
use crate::error::LtiError;
use crate::jwk::{Algorithm, Jwk};
use ltigate_telemetry::MetricsRegistry;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// An immutable set of platform public keys.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct KeySetDocument {
    keys: Vec<Jwk>,
}

impl KeySet {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// Parse a JWKS document (`{"keys": [...]}`).
    pub fn from_json(body: &[u8]) -> Result<Self, LtiError> {
        let doc: KeySetDocument =
            serde_json::from_slice(body).map_err(|e| LtiError::KeySetMalformed(e.to_string()))?;
        Ok(Self::new(doc.keys))
    }

    /// Select the key for a token header.
    ///
    /// With a `kid`, the key must carry that id and be usable for `alg`.
    /// Without one, the first usable key wins.
    pub fn find(&self, kid: Option<&str>, alg: Algorithm) -> Option<&Jwk> {
        self.keys.iter().find(|key| {
            key.is_usable_for(alg)
                && match kid {
                    Some(kid) => key.kid.as_deref() == Some(kid),
                    None => true,
                }
        })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: Instant,
}

/// Fetches platform key sets and serves them from memory for a TTL.
pub struct KeySetCache {
    client: reqwest::Client,
    ttl: Duration,
    min_refresh_interval: Duration,
    entries: RwLock<HashMap<String, CachedKeySet>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl KeySetCache {
    pub fn new(client: reqwest::Client, config: &KeySetConfig) -> Self {
        Self {
            client,
            ttl: config.ttl(),
            min_refresh_interval: config.min_refresh_interval(),
            entries: RwLock::new(HashMap::new()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Key set for `jwks_url`, fetched if absent or older than the TTL.
    pub async fn resolve(&self, jwks_url: &str) -> Result<Arc<KeySet>, LtiError> {
        if let Some(keys) = self.cached(jwks_url, self.ttl) {
            return Ok(keys);
        }
        self.refresh(jwks_url).await
    }

    /// Refetch after a token named a `kid` the cached set lacks.
    ///
    /// Returns `None` without fetching when the cached set is younger than
    /// the minimum refresh interval, so a stream of garbage key ids cannot
    /// turn every launch into a fetch.
    pub async fn refresh_after_miss(&self, jwks_url: &str) -> Result<Option<Arc<KeySet>>, LtiError> {
        if self.cached(jwks_url, self.min_refresh_interval).is_some() {
            return Ok(None);
        }
        self.refresh(jwks_url).await.map(Some)
    }

    /// Fetch `jwks_url` and replace the cached entry.
    pub async fn refresh(&self, jwks_url: &str) -> Result<Arc<KeySet>, LtiError> {
        let started = Instant::now();
        let result = self.fetch(jwks_url).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_outbound("keyset", started.elapsed().as_secs_f64());
            let outcome = match &result {
                Ok(_) => "ok",
                Err(e) => e.kind(),
            };
            metrics.record_keyset_fetch(outcome);
        }

        let keys = Arc::new(result?);
        ltigate_telemetry::log_keyset_refreshed!(jwks_url = %jwks_url, keys = keys.len());

        self.entries.write().insert(
            jwks_url.to_string(),
            CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: Instant::now(),
            },
        );
        Ok(keys)
    }

    /// Fetch and parse a key set without touching the cache.
    pub async fn fetch(&self, jwks_url: &str) -> Result<KeySet, LtiError> {
        let response = self
            .client
            .get(jwks_url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| LtiError::KeySetUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LtiError::KeySetUnavailable(format!(
                "key set endpoint returned {}",
                status.as_u16()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| LtiError::KeySetUnavailable(e.to_string()))?;
        KeySet::from_json(&body)
    }

    fn cached(&self, jwks_url: &str, max_age: Duration) -> Option<Arc<KeySet>> {
        let entries = self.entries.read();
        let entry = entries.get(jwks_url)?;
        (entry.fetched_at.elapsed() < max_age).then(|| Arc::clone(&entry.keys))
    }
}
