//! id_token minting.

use crate::keys::TokenSigner;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};

/// Claim namespaces used by LTI 1.3 launches.
pub mod claim {
    pub const MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
    pub const VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
    pub const DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
    pub const TARGET_LINK_URI: &str = "https://purl.imsglobal.org/spec/lti/claim/target_link_uri";
    pub const RESOURCE_LINK: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
    pub const CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
    pub const CUSTOM: &str = "https://purl.imsglobal.org/spec/lti/claim/custom";
    pub const ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
    pub const AGS_ENDPOINT: &str = "https://purl.imsglobal.org/spec/lti-ags/claim/endpoint";
}

/// Sign `claims` with a header naming the signer's `alg` and `kid`.
pub fn mint(signer: &dyn TokenSigner, claims: &Value) -> String {
    let header = json!({"alg": signer.alg(), "typ": "JWT", "kid": signer.kid()});
    mint_with_header(signer, &header, claims)
}

/// Sign `claims` under an arbitrary header (e.g. one without `kid`).
pub fn mint_with_header(signer: &dyn TokenSigner, header: &Value, claims: &Value) -> String {
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );
    let signature = signer.sign(signing_input.as_bytes());
    format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature))
}

/// A complete LtiResourceLinkRequest claim set, valid for five minutes from
/// `now` (seconds since the epoch).
pub fn launch_claims(issuer: &str, client_id: &str, now: i64) -> Value {
    json!({
        "iss": issuer,
        "sub": "user-42",
        "aud": client_id,
        "exp": now + 300,
        "iat": now,
        "nonce": "n-0S6_WzA2Mj",
        (claim::MESSAGE_TYPE): "LtiResourceLinkRequest",
        (claim::VERSION): "1.3.0",
        (claim::DEPLOYMENT_ID): "deployment-1",
        (claim::TARGET_LINK_URI): "https://tool.example.com/lti/launch",
        (claim::RESOURCE_LINK): {"id": "rl-7", "title": "Exercise 1"},
        (claim::CONTEXT): {"id": "course-9", "title": "Data Structures", "label": "DSA"},
        (claim::ROLES): ["http://purl.imsglobal.org/vocab/lis/v2/membership#Learner"],
        (claim::CUSTOM): {"code": "print(1)", "language": "python"},
        (claim::AGS_ENDPOINT): {
            "scope": ["https://purl.imsglobal.org/spec/lti-ags/scope/score"],
            "lineitem": format!("{}/lineitems/42", issuer),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::EcKeyPair;

    #[test]
    fn test_mint_has_three_segments() {
        let key = EcKeyPair::generate("k");
        let token = mint(&key, &json!({"sub": "x"}));
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_launch_claims_carry_lti_namespaces() {
        let claims = launch_claims("https://lms.example", "client", 1_700_000_000);
        assert_eq!(claims[claim::MESSAGE_TYPE], "LtiResourceLinkRequest");
        assert_eq!(
            claims[claim::AGS_ENDPOINT]["lineitem"],
            "https://lms.example/lineitems/42"
        );
    }
}
