//! JSON Web Keys and signature checks with `ring`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::signature::{self, RsaPublicKeyComponents, UnparsedPublicKey};
use serde::{Deserialize, Serialize};

/// Token signing algorithms accepted for id_tokens.
///
/// `none` and the HMAC family are deliberately absent: a platform signs with
/// its private key and publishes the public half in its key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
}

impl Algorithm {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RS256" => Some(Self::RS256),
            "RS384" => Some(Self::RS384),
            "RS512" => Some(Self::RS512),
            "ES256" => Some(Self::ES256),
            "ES384" => Some(Self::ES384),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
        }
    }

    /// JWK `kty` a key must have to verify this algorithm.
    pub fn key_type(&self) -> &'static str {
        match self {
            Self::RS256 | Self::RS384 | Self::RS512 => "RSA",
            Self::ES256 | Self::ES384 => "EC",
        }
    }

    fn curve(&self) -> Option<&'static str> {
        match self {
            Self::ES256 => Some("P-256"),
            Self::ES384 => Some("P-384"),
            _ => None,
        }
    }
}

/// A public key from a platform key set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type: "RSA" or "EC".
    pub kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Intended use; keys marked for anything but `sig` are ignored.
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    // RSA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    // EC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
}

impl Jwk {
    /// Whether this key may be used to check signatures made with `alg`.
    pub fn is_usable_for(&self, alg: Algorithm) -> bool {
        if self.kty != alg.key_type() {
            return false;
        }
        if self.use_.as_deref().is_some_and(|u| u != "sig") {
            return false;
        }
        if let Some(key_alg) = self.alg.as_deref() {
            return key_alg == alg.as_str();
        }
        true
    }

    /// Verify `signature` over `message`.
    ///
    /// Returns `Ok(false)` when the signature does not match and `Err` when
    /// the key itself is unusable (missing or undecodable components, curve
    /// mismatch).
    pub fn verify(&self, alg: Algorithm, message: &[u8], signature: &[u8]) -> Result<bool, String> {
        match alg {
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
                self.verify_rsa(alg, message, signature)
            }
            Algorithm::ES256 | Algorithm::ES384 => self.verify_ec(alg, message, signature),
        }
    }

    fn verify_rsa(&self, alg: Algorithm, message: &[u8], sig: &[u8]) -> Result<bool, String> {
        let params: &signature::RsaParameters = match alg {
            Algorithm::RS256 => &signature::RSA_PKCS1_2048_8192_SHA256,
            Algorithm::RS384 => &signature::RSA_PKCS1_2048_8192_SHA384,
            _ => &signature::RSA_PKCS1_2048_8192_SHA512,
        };

        let n = decode_component(self.n.as_deref(), "n")?;
        let e = decode_component(self.e.as_deref(), "e")?;

        let key = RsaPublicKeyComponents {
            n: strip_leading_zeros(&n),
            e: strip_leading_zeros(&e),
        };
        Ok(key.verify(params, message, sig).is_ok())
    }

    fn verify_ec(&self, alg: Algorithm, message: &[u8], sig: &[u8]) -> Result<bool, String> {
        let verification: &signature::EcdsaVerificationAlgorithm = match alg {
            Algorithm::ES256 => &signature::ECDSA_P256_SHA256_FIXED,
            _ => &signature::ECDSA_P384_SHA384_FIXED,
        };

        let crv = self.crv.as_deref().ok_or("missing EC curve (crv)")?;
        if alg.curve() != Some(crv) {
            return Err(format!("algorithm {} incompatible with curve {}", alg.as_str(), crv));
        }

        let x = decode_component(self.x.as_deref(), "x")?;
        let y = decode_component(self.y.as_deref(), "y")?;

        // Uncompressed point: 0x04 || x || y
        let mut point = Vec::with_capacity(1 + x.len() + y.len());
        point.push(0x04);
        point.extend_from_slice(&x);
        point.extend_from_slice(&y);

        Ok(UnparsedPublicKey::new(verification, &point)
            .verify(message, sig)
            .is_ok())
    }
}

fn decode_component(value: Option<&str>, name: &str) -> Result<Vec<u8>, String> {
    let value = value.ok_or_else(|| format!("missing key component {}", name))?;
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| format!("invalid base64url in {}: {}", name, e))
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ltigate_test::keys::{EcKeyPair, RsaKeyPair, TokenSigner};

    #[test]
    fn test_algorithm_parse_rejects_none_and_hmac() {
        assert_eq!(Algorithm::parse("RS256"), Some(Algorithm::RS256));
        assert_eq!(Algorithm::parse("ES384"), Some(Algorithm::ES384));
        assert_eq!(Algorithm::parse("none"), None);
        assert_eq!(Algorithm::parse("HS256"), None);
        assert_eq!(Algorithm::parse("rs256"), None);
    }

    #[test]
    fn test_rsa_verify() {
        let pair = RsaKeyPair::test_key("rsa-1");
        let sig = pair.sign(b"header.payload");
        let jwk: Jwk = serde_json::from_value(pair.jwk()).unwrap();

        assert!(jwk.verify(Algorithm::RS256, b"header.payload", &sig).unwrap());
        assert!(!jwk.verify(Algorithm::RS256, b"header.tampered", &sig).unwrap());
    }

    #[test]
    fn test_ec_verify() {
        let pair = EcKeyPair::generate("ec-1");
        let sig = pair.sign(b"header.payload");
        let jwk: Jwk = serde_json::from_value(pair.jwk()).unwrap();

        assert!(jwk.verify(Algorithm::ES256, b"header.payload", &sig).unwrap());
        assert!(!jwk.verify(Algorithm::ES256, b"other", &sig).unwrap());
    }

    #[test]
    fn test_ec_curve_mismatch_is_error() {
        let pair = EcKeyPair::generate("ec-1");
        let jwk: Jwk = serde_json::from_value(pair.jwk()).unwrap();
        assert!(jwk.verify(Algorithm::ES384, b"m", b"s").is_err());
    }

    #[test]
    fn test_missing_component_is_error() {
        let jwk = Jwk {
            kty: "RSA".into(),
            kid: None,
            alg: None,
            use_: None,
            n: None,
            e: Some("AQAB".into()),
            x: None,
            y: None,
            crv: None,
        };
        assert!(jwk.verify(Algorithm::RS256, b"m", b"s").is_err());
    }

    #[test]
    fn test_is_usable_for() {
        let mut jwk: Jwk = serde_json::from_value(serde_json::json!({
            "kty": "RSA", "kid": "k", "n": "AQAB", "e": "AQAB"
        }))
        .unwrap();
        assert!(jwk.is_usable_for(Algorithm::RS256));
        assert!(!jwk.is_usable_for(Algorithm::ES256));

        jwk.use_ = Some("enc".into());
        assert!(!jwk.is_usable_for(Algorithm::RS256));

        jwk.use_ = Some("sig".into());
        jwk.alg = Some("RS512".into());
        assert!(!jwk.is_usable_for(Algorithm::RS256));
        assert!(jwk.is_usable_for(Algorithm::RS512));
    }
}
