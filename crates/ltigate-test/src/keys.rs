//! Signing keys for test id_tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, KeyPair};
use serde_json::{json, Value};

/// RSA-2048 private key (PKCS#8 DER) used only by tests.
const RSA_TEST_KEY: &[u8] = include_bytes!("../fixtures/rsa-2048.pk8");
/// Base64url modulus of [`RSA_TEST_KEY`].
const RSA_TEST_MODULUS: &str = include_str!("../fixtures/rsa-2048.n");

/// A key that can sign JWTs and describe itself as a JWK.
pub trait TokenSigner {
    /// JWS `alg` header value.
    fn alg(&self) -> &'static str;
    fn kid(&self) -> &str;
    fn sign(&self, message: &[u8]) -> Vec<u8>;
    /// Public half as a JWK object.
    fn jwk(&self) -> Value;
}

/// RS256 signer backed by the embedded test key.
pub struct RsaKeyPair {
    kid: String,
    pair: signature::RsaKeyPair,
}

impl RsaKeyPair {
    pub fn test_key(kid: &str) -> Self {
        let pair = signature::RsaKeyPair::from_pkcs8(RSA_TEST_KEY).expect("embedded test key is valid");
        Self {
            kid: kid.to_string(),
            pair,
        }
    }
}

impl TokenSigner for RsaKeyPair {
    fn alg(&self) -> &'static str {
        "RS256"
    }

    fn kid(&self) -> &str {
        &self.kid
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        let rng = SystemRandom::new();
        let mut sig = vec![0; self.pair.public().modulus_len()];
        self.pair
            .sign(&signature::RSA_PKCS1_SHA256, &rng, message, &mut sig)
            .expect("RSA signing succeeds");
        sig
    }

    fn jwk(&self) -> Value {
        json!({
            "kty": "RSA",
            "kid": self.kid,
            "use": "sig",
            "alg": "RS256",
            "n": RSA_TEST_MODULUS.trim(),
            "e": "AQAB",
        })
    }
}

/// ES256 signer with a key generated per instance.
pub struct EcKeyPair {
    kid: String,
    pair: EcdsaKeyPair,
    rng: SystemRandom,
}

impl EcKeyPair {
    pub fn generate(kid: &str) -> Self {
        let rng = SystemRandom::new();
        let alg = &signature::ECDSA_P256_SHA256_FIXED_SIGNING;
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(alg, &rng).expect("P-256 key generation");
        let pair = EcdsaKeyPair::from_pkcs8(alg, pkcs8.as_ref(), &rng).expect("generated key parses");
        Self {
            kid: kid.to_string(),
            pair,
            rng,
        }
    }
}

impl TokenSigner for EcKeyPair {
    fn alg(&self) -> &'static str {
        "ES256"
    }

    fn kid(&self) -> &str {
        &self.kid
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.pair
            .sign(&self.rng, message)
            .expect("ECDSA signing succeeds")
            .as_ref()
            .to_vec()
    }

    fn jwk(&self) -> Value {
        // Uncompressed point: 0x04 || x || y, 32 bytes each.
        let point = self.pair.public_key().as_ref();
        json!({
            "kty": "EC",
            "kid": self.kid,
            "use": "sig",
            "crv": "P-256",
            "x": URL_SAFE_NO_PAD.encode(&point[1..33]),
            "y": URL_SAFE_NO_PAD.encode(&point[33..65]),
        })
    }
}

/// A key set document containing the public halves of `signers`.
pub fn jwks(signers: &[&dyn TokenSigner]) -> Value {
    json!({ "keys": signers.iter().map(|s| s.jwk()).collect::<Vec<_>>() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsa_signature_length() {
        let key = RsaKeyPair::test_key("k1");
        assert_eq!(key.sign(b"abc").len(), 256);
        assert_eq!(key.jwk()["kid"], "k1");
    }

    #[test]
    fn test_ec_keys_are_distinct() {
        let a = EcKeyPair::generate("a");
        let b = EcKeyPair::generate("b");
        assert_ne!(a.jwk()["x"], b.jwk()["x"]);
        assert_eq!(a.sign(b"abc").len(), 64);
    }

    #[test]
    fn test_jwks_document() {
        let rsa = RsaKeyPair::test_key("r");
        let ec = EcKeyPair::generate("e");
        let doc = jwks(&[&rsa, &ec]);
        assert_eq!(doc["keys"].as_array().map(Vec::len), Some(2));
    }
}
