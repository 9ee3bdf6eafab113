//! OIDC third-party login initiation.
//!
//! The platform POSTs `iss`, `login_hint` and `target_link_uri`; the tool
//! answers with a redirect to the platform's authorization endpoint asking
//! for an id_token to be form-posted back to `/lti/launch`.

use crate::config::LtiConfig;
use crate::params::LaunchParameters;
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use thiserror::Error;

const STATE_LEN: usize = 32;

/// Path on the tool that receives the id_token.
pub const LAUNCH_PATH: &str = "/lti/launch";

#[derive(Debug, Error)]
pub enum LoginError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("unknown issuer: {0}")]
    UnknownIssuer(String),

    #[error("unknown client_id: {0}")]
    UnknownClient(String),

    #[error("platform authorization URL is invalid: {0}")]
    InvalidAuthUrl(String),
}

/// Authorization redirect plus the values a caller may want to correlate
/// with the returning launch.
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub url: Url,
    pub state: String,
    pub nonce: String,
}

#[derive(Debug, Clone)]
pub struct LoginInitiator {
    issuer: String,
    client_id: String,
    auth_url: String,
    redirect_uri: String,
}

impl LoginInitiator {
    pub fn new(config: &LtiConfig) -> Self {
        Self {
            issuer: config.platform.issuer.clone(),
            client_id: config.platform.client_id.clone(),
            auth_url: config.platform.auth_url.clone(),
            redirect_uri: format!(
                "{}{}",
                config.tool.base_url.trim_end_matches('/'),
                LAUNCH_PATH
            ),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn initiate(&self, params: &LaunchParameters) -> Result<LoginRedirect, LoginError> {
        let iss = required(params, "iss")?;
        let login_hint = required(params, "login_hint")?;
        required(params, "target_link_uri")?;

        if iss != self.issuer {
            return Err(LoginError::UnknownIssuer(iss.to_string()));
        }
        if let Some(client_id) = params.get("client_id") {
            if client_id != self.client_id {
                return Err(LoginError::UnknownClient(client_id.to_string()));
            }
        }

        let state = random_token();
        let nonce = random_token();

        let mut url =
            Url::parse(&self.auth_url).map_err(|e| LoginError::InvalidAuthUrl(e.to_string()))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "id_token")
                .append_pair("response_mode", "form_post")
                .append_pair("scope", "openid")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri)
                .append_pair("login_hint", login_hint)
                .append_pair("state", &state)
                .append_pair("nonce", &nonce)
                .append_pair("prompt", "none");
            if let Some(hint) = params.get("lti_message_hint") {
                query.append_pair("lti_message_hint", hint);
            }
            if let Some(deployment) = params.get("lti_deployment_id") {
                query.append_pair("lti_deployment_id", deployment);
            }
        }

        tracing::debug!(iss = %iss, redirect_uri = %self.redirect_uri, "login initiated");

        Ok(LoginRedirect { url, state, nonce })
    }
}

fn required<'a>(params: &'a LaunchParameters, name: &'static str) -> Result<&'a str, LoginError> {
    params.get(name).ok_or(LoginError::MissingParameter(name))
}

fn random_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use std::collections::HashMap;

    const PLATFORM: &str = "https://lms.example.edu";

    fn initiator() -> LoginInitiator {
        LoginInitiator::new(&test_config(PLATFORM))
    }

    fn login_params(extra: &[(&str, &str)]) -> LaunchParameters {
        let mut params: LaunchParameters = [
            ("iss", PLATFORM),
            ("login_hint", "user-42"),
            ("target_link_uri", "https://tool.example.com/lti/launch"),
        ]
        .into_iter()
        .collect();
        for (k, v) in extra {
            params.insert(*k, *v);
        }
        params
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_redirect_carries_oidc_parameters() {
        let redirect = initiator()
            .initiate(&login_params(&[("lti_message_hint", "hint-1")]))
            .unwrap();
        let q = query(&redirect.url);

        assert!(redirect.url.as_str().starts_with("https://lms.example.edu/auth?"));
        assert_eq!(q["response_type"], "id_token");
        assert_eq!(q["response_mode"], "form_post");
        assert_eq!(q["scope"], "openid");
        assert_eq!(q["prompt"], "none");
        assert_eq!(q["client_id"], "tool-client");
        assert_eq!(q["redirect_uri"], "https://tool.example.com/lti/launch");
        assert_eq!(q["login_hint"], "user-42");
        assert_eq!(q["lti_message_hint"], "hint-1");
        assert_eq!(q["state"], redirect.state);
        assert_eq!(q["nonce"], redirect.nonce);
        assert!(!q.contains_key("lti_deployment_id"));
    }

    #[test]
    fn test_state_and_nonce_are_random_alphanumeric() {
        let a = initiator().initiate(&login_params(&[])).unwrap();
        let b = initiator().initiate(&login_params(&[])).unwrap();

        for value in [&a.state, &a.nonce, &b.state] {
            assert_eq!(value.len(), 32);
            assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        }
        assert_ne!(a.state, a.nonce);
        assert_ne!(a.state, b.state);
    }

    #[test]
    fn test_missing_parameters() {
        for name in ["iss", "login_hint", "target_link_uri"] {
            let params: LaunchParameters = login_params(&[])
                .pairs()
                .filter(|(k, _)| *k != name)
                .collect();
            let err = initiator().initiate(&params).unwrap_err();
            assert!(matches!(err, LoginError::MissingParameter(n) if n == name));
        }
    }

    #[test]
    fn test_unknown_issuer_rejected() {
        let base = login_params(&[]);
        let params: LaunchParameters = base
            .pairs()
            .filter(|(k, _)| *k != "iss")
            .chain([("iss", "https://evil.example")])
            .collect();
        assert!(matches!(
            initiator().initiate(&params),
            Err(LoginError::UnknownIssuer(_))
        ));
    }

    #[test]
    fn test_client_id_must_match_when_present() {
        assert!(initiator()
            .initiate(&login_params(&[("client_id", "tool-client")]))
            .is_ok());
        assert!(matches!(
            initiator().initiate(&login_params(&[("client_id", "other")])),
            Err(LoginError::UnknownClient(_))
        ));
    }

    #[test]
    fn test_deployment_id_forwarded() {
        let redirect = initiator()
            .initiate(&login_params(&[("lti_deployment_id", "deployment-1")]))
            .unwrap();
        assert_eq!(query(&redirect.url)["lti_deployment_id"], "deployment-1");
    }
}
