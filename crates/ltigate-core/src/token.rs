//! id_token (JWT) verification against a platform key set.
//!
//! A token moves through parse, key resolution, signature check and claim
//! checks in that order; the first failing stage decides the error. Claims
//! are only ever handed out inside a [`VerifiedToken`], which nothing
//! outside this module can construct.

use crate::config::LtiConfig;
use crate::error::LtiError;
use crate::jwk::{Algorithm, Jwk};
use crate::keyset::KeySet;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default)]
    pub typ: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
}

/// A structurally valid but unverified token.
#[derive(Debug, Clone)]
pub struct ParsedToken {
    pub header: TokenHeader,
    pub algorithm: Algorithm,
    claims: Map<String, Value>,
    signing_input: String,
    signature: Vec<u8>,
}

impl ParsedToken {
    /// The `kid` the token asks for, or `"(none)"`.
    pub fn kid_label(&self) -> &str {
        self.header.kid.as_deref().unwrap_or("(none)")
    }
}

/// Claims of a token that passed every check.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    claims: Map<String, Value>,
    kid: Option<String>,
}

impl VerifiedToken {
    /// Standard and extension claims in one flat mapping.
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    pub fn into_claims(self) -> Map<String, Value> {
        self.claims
    }

    /// Key id that verified the signature, if the header named one.
    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Received,
    Parsed,
    KeyResolved,
    SignatureChecked,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Parsed => "parsed",
            Self::KeyResolved => "key_resolved",
            Self::SignatureChecked => "signature_checked",
        }
    }
}

/// Checks id_tokens: signature, then `exp`, `nbf`, `iss` and `aud`.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    expected_issuer: Option<String>,
    expected_audience: Option<String>,
    clock_skew: i64,
}

impl TokenVerifier {
    /// Expect the configured platform issuer and this tool's client id.
    pub fn new(config: &LtiConfig) -> Self {
        Self {
            expected_issuer: Some(config.platform.issuer.clone()),
            expected_audience: Some(config.platform.client_id.clone()),
            clock_skew: config.clock_skew(),
        }
    }

    /// A verifier with explicit expectations; `None` skips that check.
    pub fn with_expectations(
        expected_issuer: Option<String>,
        expected_audience: Option<String>,
        clock_skew: i64,
    ) -> Self {
        Self {
            expected_issuer,
            expected_audience,
            clock_skew,
        }
    }

    pub fn verify(&self, token: &str, keys: &KeySet) -> Result<VerifiedToken, LtiError> {
        self.verify_at(token, keys, chrono::Utc::now().timestamp())
    }

    /// Verify as of `now` (seconds since the epoch).
    pub fn verify_at(&self, token: &str, keys: &KeySet, now: i64) -> Result<VerifiedToken, LtiError> {
        let mut stage = Stage::Received;
        let result = self.run(token, keys, now, &mut stage);
        if let Err(e) = &result {
            tracing::debug!(stage = stage.as_str(), error = %e, "id_token rejected");
        }
        result
    }

    fn run(
        &self,
        token: &str,
        keys: &KeySet,
        now: i64,
        stage: &mut Stage,
    ) -> Result<VerifiedToken, LtiError> {
        let parsed = parse(token)?;
        *stage = Stage::Parsed;

        let key = resolve_key(&parsed, keys)?;
        *stage = Stage::KeyResolved;

        check_signature(&parsed, key)?;
        *stage = Stage::SignatureChecked;

        self.check_claims(&parsed.claims, now)?;

        Ok(VerifiedToken {
            claims: parsed.claims,
            kid: parsed.header.kid,
        })
    }

    fn check_claims(&self, claims: &Map<String, Value>, now: i64) -> Result<(), LtiError> {
        let exp = numeric_claim(claims, "exp")?
            .ok_or_else(|| LtiError::MalformedToken("missing exp claim".into()))?;
        if now > exp.saturating_add(self.clock_skew) {
            return Err(LtiError::TokenExpired);
        }

        if let Some(nbf) = numeric_claim(claims, "nbf")? {
            if now.saturating_add(self.clock_skew) < nbf {
                return Err(LtiError::TokenNotYetValid);
            }
        }

        if let Some(expected) = &self.expected_issuer {
            let iss = claims.get("iss").and_then(Value::as_str);
            if iss != Some(expected.as_str()) {
                return Err(LtiError::IssuerMismatch);
            }
        }

        if let Some(expected) = &self.expected_audience {
            let audiences = audience_list(claims.get("aud"));
            if !audiences.contains(&expected.as_str()) {
                return Err(LtiError::AudienceMismatch);
            }
            // With several audiences the authorized party must be us.
            if audiences.len() > 1 {
                if let Some(azp) = claims.get("azp").and_then(Value::as_str) {
                    if azp != expected {
                        return Err(LtiError::AudienceMismatch);
                    }
                }
            }
        }

        Ok(())
    }
}

/// Split and decode a compact JWS without checking anything but its shape.
pub fn parse(token: &str) -> Result<ParsedToken, LtiError> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        return Err(LtiError::MalformedToken(
            "expected three dot-separated segments".into(),
        ));
    }

    let header_bytes = decode_segment(parts[0], "header")?;
    let header: TokenHeader = serde_json::from_slice(&header_bytes)
        .map_err(|e| LtiError::MalformedToken(format!("invalid header: {}", e)))?;

    let algorithm = Algorithm::parse(&header.alg)
        .ok_or_else(|| LtiError::MalformedToken(format!("unsupported algorithm {}", header.alg)))?;

    let claims_bytes = decode_segment(parts[1], "payload")?;
    let claims: Map<String, Value> = serde_json::from_slice(&claims_bytes)
        .map_err(|e| LtiError::MalformedToken(format!("invalid payload: {}", e)))?;

    let signature = decode_segment(parts[2], "signature")?;
    if signature.is_empty() {
        return Err(LtiError::MalformedToken("empty signature".into()));
    }

    Ok(ParsedToken {
        header,
        algorithm,
        claims,
        signing_input: format!("{}.{}", parts[0], parts[1]),
        signature,
    })
}

fn resolve_key<'a>(parsed: &ParsedToken, keys: &'a KeySet) -> Result<&'a Jwk, LtiError> {
    keys.find(parsed.header.kid.as_deref(), parsed.algorithm)
        .ok_or_else(|| LtiError::UnknownKey(parsed.kid_label().to_string()))
}

fn check_signature(parsed: &ParsedToken, key: &Jwk) -> Result<(), LtiError> {
    match key.verify(
        parsed.algorithm,
        parsed.signing_input.as_bytes(),
        &parsed.signature,
    ) {
        Ok(true) => Ok(()),
        Ok(false) => Err(LtiError::SignatureInvalid),
        Err(e) => Err(LtiError::KeySetMalformed(format!(
            "key {}: {}",
            parsed.kid_label(),
            e
        ))),
    }
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, LtiError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| LtiError::MalformedToken(format!("invalid base64url in {}: {}", name, e)))
}

fn numeric_claim(claims: &Map<String, Value>, name: &str) -> Result<Option<i64>, LtiError> {
    match claims.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .map(Some)
            .ok_or_else(|| LtiError::MalformedToken(format!("{} is not a number", name))),
    }
}

fn audience_list(aud: Option<&Value>) -> Vec<&str> {
    match aud {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ltigate_test::keys::{jwks, EcKeyPair, RsaKeyPair, TokenSigner};
    use ltigate_test::token::{launch_claims, mint, mint_with_header};
    use serde_json::json;

    const ISSUER: &str = "https://lms.example.edu";
    const CLIENT_ID: &str = "tool-client";
    const NOW: i64 = 1_700_000_000;

    fn verifier() -> TokenVerifier {
        TokenVerifier::with_expectations(Some(ISSUER.into()), Some(CLIENT_ID.into()), 60)
    }

    fn keyset(signers: &[&dyn TokenSigner]) -> KeySet {
        KeySet::from_json(jwks(signers).to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_valid_rs256_token() {
        let key = RsaKeyPair::test_key("rsa-1");
        let token = mint(&key, &launch_claims(ISSUER, CLIENT_ID, NOW));

        let verified = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap();
        assert_eq!(verified.claims()["sub"], "user-42");
        assert_eq!(verified.kid(), Some("rsa-1"));
    }

    #[test]
    fn test_valid_es256_token() {
        let key = EcKeyPair::generate("ec-1");
        let token = mint(&key, &launch_claims(ISSUER, CLIENT_ID, NOW));

        let verified = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap();
        assert_eq!(
            verified.claims()["https://purl.imsglobal.org/spec/lti/claim/deployment_id"],
            "deployment-1"
        );
    }

    #[test]
    fn test_malformed_segments() {
        let keys = KeySet::default();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.@@@.###"] {
            let err = verifier().verify_at(token, &keys, NOW).unwrap_err();
            assert!(matches!(err, LtiError::MalformedToken(_)), "{token}: {err:?}");
        }
    }

    #[test]
    fn test_alg_none_is_malformed() {
        let key = EcKeyPair::generate("ec-1");
        let header = json!({"alg": "none", "kid": "ec-1"});
        let token = mint_with_header(&key, &header, &launch_claims(ISSUER, CLIENT_ID, NOW));

        let err = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap_err();
        assert!(matches!(err, LtiError::MalformedToken(_)));
    }

    #[test]
    fn test_hs256_is_malformed() {
        let key = EcKeyPair::generate("ec-1");
        let header = json!({"alg": "HS256", "kid": "ec-1"});
        let token = mint_with_header(&key, &header, &launch_claims(ISSUER, CLIENT_ID, NOW));

        let err = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap_err();
        assert!(matches!(err, LtiError::MalformedToken(_)));
    }

    #[test]
    fn test_unknown_kid_before_signature_check() {
        let published = EcKeyPair::generate("published");
        let rogue = EcKeyPair::generate("rogue");
        let token = mint(&rogue, &launch_claims(ISSUER, CLIENT_ID, NOW));

        let err = verifier()
            .verify_at(&token, &keyset(&[&published]), NOW)
            .unwrap_err();
        assert!(matches!(err, LtiError::UnknownKey(ref kid) if kid == "rogue"));
    }

    #[test]
    fn test_known_kid_wrong_key_is_signature_invalid() {
        let published = EcKeyPair::generate("shared-kid");
        let forger = EcKeyPair::generate("shared-kid");
        let token = mint(&forger, &launch_claims(ISSUER, CLIENT_ID, NOW));

        let err = verifier()
            .verify_at(&token, &keyset(&[&published]), NOW)
            .unwrap_err();
        assert!(matches!(err, LtiError::SignatureInvalid));
    }

    #[test]
    fn test_tampered_payload_is_signature_invalid() {
        let key = RsaKeyPair::test_key("rsa-1");
        let token = mint(&key, &launch_claims(ISSUER, CLIENT_ID, NOW));
        let mut claims = launch_claims(ISSUER, CLIENT_ID, NOW);
        claims["sub"] = json!("admin");
        let forged_payload = URL_SAFE_NO_PAD.encode(claims.to_string());

        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        let err = verifier().verify_at(&forged, &keyset(&[&key]), NOW).unwrap_err();
        assert!(matches!(err, LtiError::SignatureInvalid));
    }

    #[test]
    fn test_expired_with_valid_signature() {
        let key = EcKeyPair::generate("ec-1");
        let token = mint(&key, &launch_claims(ISSUER, CLIENT_ID, NOW - 3600));

        let err = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap_err();
        assert!(matches!(err, LtiError::TokenExpired));
    }

    #[test]
    fn test_expiry_within_clock_skew_accepted() {
        let key = EcKeyPair::generate("ec-1");
        // exp = NOW - 300 + 300 = NOW; checking 30s later stays inside 60s skew.
        let token = mint(&key, &launch_claims(ISSUER, CLIENT_ID, NOW - 300));

        assert!(verifier().verify_at(&token, &keyset(&[&key]), NOW + 30).is_ok());
    }

    #[test]
    fn test_not_yet_valid() {
        let key = EcKeyPair::generate("ec-1");
        let mut claims = launch_claims(ISSUER, CLIENT_ID, NOW);
        claims["nbf"] = json!(NOW + 600);
        let token = mint(&key, &claims);

        let err = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap_err();
        assert!(matches!(err, LtiError::TokenNotYetValid));
    }

    #[test]
    fn test_missing_exp_is_malformed() {
        let key = EcKeyPair::generate("ec-1");
        let mut claims = launch_claims(ISSUER, CLIENT_ID, NOW);
        claims.as_object_mut().unwrap().remove("exp");
        let token = mint(&key, &claims);

        let err = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap_err();
        assert!(matches!(err, LtiError::MalformedToken(_)));
    }

    #[test]
    fn test_issuer_mismatch() {
        let key = EcKeyPair::generate("ec-1");
        let token = mint(&key, &launch_claims("https://evil.example", CLIENT_ID, NOW));

        let err = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap_err();
        assert!(matches!(err, LtiError::IssuerMismatch));
    }

    #[test]
    fn test_audience_mismatch() {
        let key = EcKeyPair::generate("ec-1");
        let token = mint(&key, &launch_claims(ISSUER, "another-tool", NOW));

        let err = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap_err();
        assert!(matches!(err, LtiError::AudienceMismatch));
    }

    #[test]
    fn test_audience_array_and_azp() {
        let key = EcKeyPair::generate("ec-1");
        let mut claims = launch_claims(ISSUER, CLIENT_ID, NOW);
        claims["aud"] = json!(["other", CLIENT_ID]);
        let token = mint(&key, &claims);
        assert!(verifier().verify_at(&token, &keyset(&[&key]), NOW).is_ok());

        claims["azp"] = json!("other");
        let token = mint(&key, &claims);
        let err = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap_err();
        assert!(matches!(err, LtiError::AudienceMismatch));
    }

    #[test]
    fn test_expectations_optional() {
        let key = EcKeyPair::generate("ec-1");
        let token = mint(&key, &launch_claims("https://anyone", "anything", NOW));

        let lenient = TokenVerifier::with_expectations(None, None, 0);
        assert!(lenient.verify_at(&token, &keyset(&[&key]), NOW).is_ok());
    }

    #[test]
    fn test_header_without_kid_uses_first_matching_key() {
        let key = EcKeyPair::generate("ec-1");
        let header = json!({"alg": "ES256", "typ": "JWT"});
        let token = mint_with_header(&key, &header, &launch_claims(ISSUER, CLIENT_ID, NOW));

        let verified = verifier().verify_at(&token, &keyset(&[&key]), NOW).unwrap();
        assert_eq!(verified.kid(), None);
    }
}
