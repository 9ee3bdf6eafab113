//! Typed launch model built from verified token claims or a verified
//! legacy form.

use crate::error::LtiError;
use crate::launch::TrustMode;
use crate::params::LaunchParameters;
use crate::token::VerifiedToken;
use serde::Serialize;
use serde_json::{Map, Value};

/// LTI 1.3 claim names.
pub mod claim {
    pub const MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
    pub const VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
    pub const DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
    pub const TARGET_LINK_URI: &str = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
    pub const RESOURCE_LINK: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
    pub const CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
    pub const CUSTOM: &str = "https://purl.imsglobal.org/spec/lti/claim/custom";
    pub const ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
    pub const LAUNCH_PRESENTATION: &str =
        "https://purl.imsglobal.org/spec/lti/claim/launch_presentation";
    pub const TOOL_PLATFORM: &str = "https://purl.imsglobal.org/spec/lti/claim/tool_platform";
    pub const AGS_ENDPOINT: &str = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint";
}

/// Message type assumed for legacy launches that omit `lti_message_type`.
pub const LEGACY_DEFAULT_MESSAGE_TYPE: &str = "basic-lti-launch-request";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceLink {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Assignment and Grade Services endpoint advertised by the platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradingEndpoint {
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineitem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lineitems: Option<String>,
}

/// A verified launch.
///
/// Only produced by [`ClaimsExtractor`] from a [`VerifiedToken`] or from a
/// legacy form whose signature already checked out; other crates cannot
/// build one.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
pub struct LaunchClaims {
    pub mode: TrustMode,
    pub issuer: String,
    pub subject: String,
    pub audience: Vec<String>,
    pub expires_at: Option<i64>,
    pub issued_at: Option<i64>,
    pub nonce: Option<String>,
    pub message_type: String,
    pub version: Option<String>,
    pub deployment_id: String,
    pub target_link_uri: Option<String>,
    pub resource_link: Option<ResourceLink>,
    pub context: Option<Context>,
    /// Custom parameters, passed through unexamined.
    pub custom: Map<String, Value>,
    pub grading: Option<GradingEndpoint>,
    pub roles: Vec<String>,
    pub return_url: Option<String>,
    pub platform_name: Option<String>,
}

impl LaunchClaims {
    /// A custom parameter rendered as a string (numbers and booleans are
    /// formatted, objects and arrays are ignored).
    pub fn custom_str(&self, name: &str) -> Option<String> {
        match self.custom.get(name)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Source code to run. Platforms that double the `custom_` prefix end up
    /// delivering it as `custom_code`.
    pub fn code(&self) -> Option<String> {
        self.custom_str("code")
            .or_else(|| self.custom_str("custom_code"))
    }

    pub fn language(&self, default: &str) -> String {
        self.custom_str("language")
            .or_else(|| self.custom_str("custom_language"))
            .unwrap_or_else(|| default.to_string())
    }

    /// Line item scores should be posted to, if the platform offered one.
    pub fn lineitem(&self) -> Option<&str> {
        self.grading.as_ref()?.lineitem.as_deref()
    }

    pub fn context_id(&self) -> Option<&str> {
        self.context.as_ref().map(|c| c.id.as_str())
    }
}

/// Maps verified claims onto [`LaunchClaims`].
pub struct ClaimsExtractor;

impl ClaimsExtractor {
    /// Build the launch model from a verified id_token.
    ///
    /// Fails with `MissingRequiredClaim` when the message type, deployment id
    /// or subject is absent.
    pub fn extract(token: &VerifiedToken) -> Result<LaunchClaims, LtiError> {
        let claims = token.claims();

        let message_type =
            string_claim(claims, claim::MESSAGE_TYPE).ok_or(LtiError::MissingRequiredClaim("message_type"))?;
        let deployment_id =
            string_claim(claims, claim::DEPLOYMENT_ID).ok_or(LtiError::MissingRequiredClaim("deployment_id"))?;
        let subject = string_claim(claims, "sub").ok_or(LtiError::MissingRequiredClaim("sub"))?;

        let audience = match claims.get("aud") {
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        let resource_link = object_claim(claims, claim::RESOURCE_LINK).and_then(|link| {
            Some(ResourceLink {
                id: string_claim(link, "id")?,
                title: string_claim(link, "title"),
                description: string_claim(link, "description"),
            })
        });

        let context = object_claim(claims, claim::CONTEXT).and_then(|ctx| {
            Some(Context {
                id: string_claim(ctx, "id")?,
                title: string_claim(ctx, "title"),
                label: string_claim(ctx, "label"),
            })
        });

        let grading = object_claim(claims, claim::AGS_ENDPOINT).map(|ags| GradingEndpoint {
            scopes: ags
                .get("scope")
                .and_then(Value::as_array)
                .map(|s| s.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default(),
            lineitem: string_claim(ags, "lineitem"),
            lineitems: string_claim(ags, "lineitems"),
        });

        let roles = claims
            .get(claim::ROLES)
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();

        Ok(LaunchClaims {
            mode: TrustMode::Token,
            issuer: string_claim(claims, "iss").unwrap_or_default(),
            subject,
            audience,
            expires_at: claims.get("exp").and_then(Value::as_i64),
            issued_at: claims.get("iat").and_then(Value::as_i64),
            nonce: string_claim(claims, "nonce"),
            message_type,
            version: string_claim(claims, claim::VERSION),
            deployment_id,
            target_link_uri: string_claim(claims, claim::TARGET_LINK_URI),
            resource_link,
            context,
            custom: object_claim(claims, claim::CUSTOM).cloned().unwrap_or_default(),
            grading,
            roles,
            return_url: object_claim(claims, claim::LAUNCH_PRESENTATION)
                .and_then(|lp| string_claim(lp, "return_url")),
            platform_name: object_claim(claims, claim::TOOL_PLATFORM)
                .and_then(|tp| string_claim(tp, "name")),
        })
    }

    /// Build the launch model from a legacy form.
    ///
    /// Callers must have verified the form's signature first.
    pub(crate) fn from_legacy(params: &LaunchParameters) -> Result<LaunchClaims, LtiError> {
        let consumer_key = params
            .get("oauth_consumer_key")
            .ok_or(LtiError::MissingCredential("oauth_consumer_key"))?;
        // Anonymous launches leave the subject empty.
        let subject = params.get("user_id").unwrap_or_default();

        let resource_link = params.get("resource_link_id").map(|id| ResourceLink {
            id: id.to_string(),
            title: params.get("resource_link_title").map(str::to_string),
            description: params.get("resource_link_description").map(str::to_string),
        });

        let context = params.get("context_id").map(|id| Context {
            id: id.to_string(),
            title: params.get("context_title").map(str::to_string),
            label: params.get("context_label").map(str::to_string),
        });

        let custom = params
            .with_prefix("custom_")
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();

        let roles = params
            .get("roles")
            .map(|r| {
                r.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(LaunchClaims {
            mode: TrustMode::Legacy,
            issuer: consumer_key.to_string(),
            subject: subject.to_string(),
            audience: Vec::new(),
            expires_at: None,
            issued_at: params.get("oauth_timestamp").and_then(|t| t.parse().ok()),
            nonce: params.get("oauth_nonce").map(str::to_string),
            message_type: params
                .get("lti_message_type")
                .unwrap_or(LEGACY_DEFAULT_MESSAGE_TYPE)
                .to_string(),
            version: params.get("lti_version").map(str::to_string),
            deployment_id: consumer_key.to_string(),
            target_link_uri: None,
            resource_link,
            context,
            custom,
            // LTI 1.1 outcomes (POX) are not AGS; legacy launches carry no line item.
            grading: None,
            roles,
            return_url: params
                .get("launch_presentation_return_url")
                .map(str::to_string),
            platform_name: params
                .get("tool_consumer_instance_name")
                .map(str::to_string),
        })
    }
}

fn string_claim(claims: &Map<String, Value>, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn object_claim<'a>(claims: &'a Map<String, Value>, name: &str) -> Option<&'a Map<String, Value>> {
    claims.get(name).and_then(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyset::KeySet;
    use crate::token::TokenVerifier;
    use ltigate_test::keys::{jwks, EcKeyPair};
    use ltigate_test::token::{launch_claims, mint};
    use serde_json::json;

    const NOW: i64 = 1_700_000_000;

    fn verified(claims: &Value) -> VerifiedToken {
        let key = EcKeyPair::generate("k");
        let keys = KeySet::from_json(jwks(&[&key]).to_string().as_bytes()).unwrap();
        TokenVerifier::with_expectations(None, None, 60)
            .verify_at(&mint(&key, claims), &keys, NOW)
            .unwrap()
    }

    #[test]
    fn test_extract_full_launch() {
        let token = verified(&launch_claims("https://lms", "client", NOW));
        let launch = ClaimsExtractor::extract(&token).unwrap();

        assert_eq!(launch.mode, TrustMode::Token);
        assert_eq!(launch.issuer, "https://lms");
        assert_eq!(launch.subject, "user-42");
        assert_eq!(launch.audience, vec!["client"]);
        assert_eq!(launch.message_type, "LtiResourceLinkRequest");
        assert_eq!(launch.deployment_id, "deployment-1");
        assert_eq!(launch.version.as_deref(), Some("1.3.0"));
        assert_eq!(launch.resource_link.as_ref().unwrap().id, "rl-7");
        assert_eq!(launch.context_id(), Some("course-9"));
        assert_eq!(launch.context.as_ref().unwrap().label.as_deref(), Some("DSA"));
        assert_eq!(launch.lineitem(), Some("https://lms/lineitems/42"));
        assert_eq!(launch.grading.as_ref().unwrap().scopes.len(), 1);
        assert_eq!(launch.roles.len(), 1);
        assert_eq!(launch.code().as_deref(), Some("print(1)"));
        assert_eq!(launch.language("go"), "python");
    }

    #[test]
    fn test_missing_required_claims() {
        for (name, expected) in [
            (claim::MESSAGE_TYPE, "message_type"),
            (claim::DEPLOYMENT_ID, "deployment_id"),
            ("sub", "sub"),
        ] {
            let mut claims = launch_claims("https://lms", "client", NOW);
            claims.as_object_mut().unwrap().remove(name);

            let err = ClaimsExtractor::extract(&verified(&claims)).unwrap_err();
            assert!(
                matches!(err, LtiError::MissingRequiredClaim(n) if n == expected),
                "{name}"
            );
        }
    }

    #[test]
    fn test_custom_parameters_pass_through() {
        let mut claims = launch_claims("https://lms", "client", NOW);
        claims[claim::CUSTOM] = json!({"attempts": 3, "nested": {"a": 1}, "flag": true});

        let launch = ClaimsExtractor::extract(&verified(&claims)).unwrap();
        assert_eq!(launch.custom.len(), 3);
        assert_eq!(launch.custom_str("attempts").as_deref(), Some("3"));
        assert_eq!(launch.custom_str("flag").as_deref(), Some("true"));
        assert_eq!(launch.custom_str("nested"), None);
        assert_eq!(launch.code(), None);
        assert_eq!(launch.language("go"), "go");
    }

    #[test]
    fn test_optional_structures_absent() {
        let mut claims = launch_claims("https://lms", "client", NOW);
        let obj = claims.as_object_mut().unwrap();
        obj.remove(claim::AGS_ENDPOINT);
        obj.remove(claim::CONTEXT);
        obj.remove(claim::RESOURCE_LINK);

        let launch = ClaimsExtractor::extract(&verified(&claims)).unwrap();
        assert!(launch.grading.is_none());
        assert!(launch.context.is_none());
        assert!(launch.resource_link.is_none());
        assert_eq!(launch.lineitem(), None);
    }

    #[test]
    fn test_from_legacy() {
        let params: LaunchParameters = [
            ("oauth_consumer_key", "DSA_2025"),
            ("oauth_timestamp", "1700000000"),
            ("user_id", "42"),
            ("roles", "Learner, Instructor,"),
            ("context_id", "c1"),
            ("context_title", "Algorithms"),
            ("resource_link_id", "r1"),
            ("custom_custom_code", "print(1)"),
            ("custom_language", "python"),
            ("launch_presentation_return_url", "https://lms/return"),
        ]
        .into_iter()
        .collect();

        let launch = ClaimsExtractor::from_legacy(&params).unwrap();
        assert_eq!(launch.mode, TrustMode::Legacy);
        assert_eq!(launch.issuer, "DSA_2025");
        assert_eq!(launch.deployment_id, "DSA_2025");
        assert_eq!(launch.subject, "42");
        assert_eq!(launch.message_type, LEGACY_DEFAULT_MESSAGE_TYPE);
        assert_eq!(launch.roles, vec!["Learner", "Instructor"]);
        assert_eq!(launch.context_id(), Some("c1"));
        assert_eq!(launch.issued_at, Some(1_700_000_000));
        assert_eq!(launch.code().as_deref(), Some("print(1)"));
        assert_eq!(launch.language("go"), "python");
        assert_eq!(launch.return_url.as_deref(), Some("https://lms/return"));
    }

    #[test]
    fn test_from_legacy_single_prefix_code() {
        let params: LaunchParameters = [
            ("oauth_consumer_key", "DSA_2025"),
            ("user_id", "42"),
            ("custom_code", "fmt.Println(1)"),
        ]
        .into_iter()
        .collect();

        let launch = ClaimsExtractor::from_legacy(&params).unwrap();
        assert_eq!(launch.code().as_deref(), Some("fmt.Println(1)"));
        assert_eq!(launch.language("go"), "go");
    }

    #[test]
    fn test_from_legacy_without_user() {
        let params: LaunchParameters = [
            ("oauth_consumer_key", "DSA_2025"),
            ("custom_custom_code", "print(1)"),
        ]
        .into_iter()
        .collect();

        let launch = ClaimsExtractor::from_legacy(&params).unwrap();
        assert_eq!(launch.subject, "");
        assert_eq!(launch.code().as_deref(), Some("print(1)"));
    }

    #[test]
    fn test_from_legacy_requires_consumer_key() {
        let params: LaunchParameters = [("user_id", "42")].into_iter().collect();
        assert!(matches!(
            ClaimsExtractor::from_legacy(&params),
            Err(LtiError::MissingCredential("oauth_consumer_key"))
        ));
    }
}
