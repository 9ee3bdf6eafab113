//! Error taxonomy shared by every verifier and client in this crate.

use thiserror::Error;

/// Errors raised while verifying a launch or talking to the platform.
///
/// Detail strings are safe to show to a caller: they never contain secrets,
/// signatures or raw tokens.
#[derive(Debug, Error)]
pub enum LtiError {
    /// A required credential parameter (consumer key, signature, id_token)
    /// was not supplied.
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    /// The consumer key is not the configured legacy client.
    #[error("unknown client: {0}")]
    UnknownClient(String),

    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// No key in the platform key set matches the token header.
    #[error("no signing key found for kid {0}")]
    UnknownKey(String),

    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("token is not yet valid")]
    TokenNotYetValid,

    #[error("token issuer does not match the configured platform")]
    IssuerMismatch,

    #[error("token audience does not include this tool")]
    AudienceMismatch,

    /// The token names a deployment other than the configured one.
    #[error("token deployment {0} is not the configured deployment")]
    DeploymentMismatch(String),

    #[error("platform key set unavailable: {0}")]
    KeySetUnavailable(String),

    #[error("platform key set malformed: {0}")]
    KeySetMalformed(String),

    #[error("token endpoint unreachable: {0}")]
    TokenEndpointUnreachable(String),

    /// The token endpoint answered with a non-2xx status.
    #[error("token endpoint rejected the request with status {0}")]
    TokenEndpointRejected(u16),

    #[error("token response malformed: {0}")]
    TokenResponseMalformed(String),

    #[error("grade endpoint unreachable: {0}")]
    GradeEndpointUnreachable(String),

    /// The score endpoint answered with a non-2xx status.
    #[error("grade rejected with status {0}")]
    GradeRejected(u16),

    #[error("missing required claim: {0}")]
    MissingRequiredClaim(&'static str),
}

impl LtiError {
    /// Stable snake_case identifier, used as a metric label and log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential(_) => "missing_credential",
            Self::UnknownClient(_) => "unknown_client",
            Self::MalformedToken(_) => "malformed_token",
            Self::UnknownKey(_) => "unknown_key",
            Self::SignatureInvalid => "signature_invalid",
            Self::TokenExpired => "token_expired",
            Self::TokenNotYetValid => "token_not_yet_valid",
            Self::IssuerMismatch => "issuer_mismatch",
            Self::AudienceMismatch => "audience_mismatch",
            Self::DeploymentMismatch(_) => "deployment_mismatch",
            Self::KeySetUnavailable(_) => "keyset_unavailable",
            Self::KeySetMalformed(_) => "keyset_malformed",
            Self::TokenEndpointUnreachable(_) => "token_endpoint_unreachable",
            Self::TokenEndpointRejected(_) => "token_endpoint_rejected",
            Self::TokenResponseMalformed(_) => "token_response_malformed",
            Self::GradeEndpointUnreachable(_) => "grade_endpoint_unreachable",
            Self::GradeRejected(_) => "grade_rejected",
            Self::MissingRequiredClaim(_) => "missing_required_claim",
        }
    }

    /// True when the caller presented bad or untrusted credentials, as
    /// opposed to the platform or a collaborator misbehaving.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::UnknownClient(_)
                | Self::MalformedToken(_)
                | Self::UnknownKey(_)
                | Self::SignatureInvalid
                | Self::TokenExpired
                | Self::TokenNotYetValid
                | Self::IssuerMismatch
                | Self::AudienceMismatch
                | Self::DeploymentMismatch(_)
        )
    }

    /// True when the request itself is incomplete.
    pub fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential(_) | Self::MissingRequiredClaim(_)
        )
    }

    /// True when an upstream service (key set, token or score endpoint)
    /// failed.
    pub fn is_upstream_failure(&self) -> bool {
        !self.is_verification_failure() && !self.is_bad_request()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_stable() {
        assert_eq!(LtiError::SignatureInvalid.kind(), "signature_invalid");
        assert_eq!(
            LtiError::UnknownKey("k1".into()).kind(),
            "unknown_key"
        );
        assert_eq!(LtiError::GradeRejected(500).kind(), "grade_rejected");
    }

    #[test]
    fn test_classification_is_exclusive() {
        let all = [
            LtiError::MissingCredential("oauth_signature"),
            LtiError::UnknownClient("x".into()),
            LtiError::MalformedToken("x".into()),
            LtiError::UnknownKey("x".into()),
            LtiError::SignatureInvalid,
            LtiError::TokenExpired,
            LtiError::TokenNotYetValid,
            LtiError::IssuerMismatch,
            LtiError::AudienceMismatch,
            LtiError::KeySetUnavailable("x".into()),
            LtiError::KeySetMalformed("x".into()),
            LtiError::TokenEndpointUnreachable("x".into()),
            LtiError::TokenEndpointRejected(401),
            LtiError::TokenResponseMalformed("x".into()),
            LtiError::GradeEndpointUnreachable("x".into()),
            LtiError::GradeRejected(422),
            LtiError::MissingRequiredClaim("sub"),
        ];
        for err in &all {
            let classes = [
                err.is_verification_failure(),
                err.is_bad_request(),
                err.is_upstream_failure(),
            ];
            assert_eq!(classes.iter().filter(|c| **c).count(), 1, "{err:?}");
        }
    }

    #[test]
    fn test_display_does_not_leak_internals() {
        let err = LtiError::UnknownClient("moodle".into());
        assert_eq!(err.to_string(), "unknown client: moodle");
    }
}
