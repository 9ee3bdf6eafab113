//! LTI 1.1 launch verification (OAuth 1.0a, HMAC-SHA1).

use crate::config::LegacyClientConfig;
use crate::error::LtiError;
use crate::params::LaunchParameters;
use ltigate_oauth1::{self as oauth1, RequestTarget, SIGNATURE_PARAM};

/// Parameter carrying the consumer key.
pub const CONSUMER_KEY_PARAM: &str = "oauth_consumer_key";

/// Verifies signed launch forms from the single trusted legacy consumer.
#[derive(Debug, Clone)]
pub struct LegacySignatureVerifier {
    consumer_key: String,
    shared_secret: String,
}

impl LegacySignatureVerifier {
    pub fn new(config: &LegacyClientConfig) -> Self {
        Self {
            consumer_key: config.consumer_key.clone(),
            shared_secret: config.shared_secret.clone(),
        }
    }

    /// The consumer key this verifier trusts.
    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    /// Check the `oauth_signature` of a launch.
    ///
    /// Returns `Ok(false)` when the signature does not match; a mismatch is
    /// a normal negative result. Errors are reserved for launches that
    /// cannot be checked at all: a missing consumer key or signature, or a
    /// consumer key other than the configured one.
    pub fn verify(
        &self,
        target: &RequestTarget,
        params: &LaunchParameters,
    ) -> Result<bool, LtiError> {
        let consumer_key = params
            .get(CONSUMER_KEY_PARAM)
            .ok_or(LtiError::MissingCredential(CONSUMER_KEY_PARAM))?;

        if consumer_key != self.consumer_key {
            return Err(LtiError::UnknownClient(consumer_key.to_string()));
        }

        let supplied = params
            .get(SIGNATURE_PARAM)
            .ok_or(LtiError::MissingCredential(SIGNATURE_PARAM))?;

        let canonical = oauth1::canonical_string(target, params.pairs());
        tracing::debug!(canonical = %canonical, "legacy launch base string");

        let key = oauth1::signing_key(&self.shared_secret, None);
        Ok(oauth1::verify(&canonical, &key, supplied))
    }
}
