//! OAuth 1.0a (HMAC-SHA1) signing primitives.
//!
//! Standalone library crate shared by the legacy launch verifier in
//! `ltigate-core` and by the test harness, which signs launches the same way
//! a platform does. Pure functions only: no I/O, no clock, no randomness.

use base64::{engine::general_purpose::STANDARD, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// Name of the request parameter that carries the signature.
pub const SIGNATURE_PARAM: &str = "oauth_signature";

// --- Public types ---

/// Request line components that enter the signature base string.
pub struct RequestTarget<'a> {
    /// HTTP method (will be uppercased).
    pub method: &'a str,
    /// URL scheme (will be lowercased).
    pub scheme: &'a str,
    /// Host, optionally with a port. Lowercased; the default port for the
    /// scheme is dropped.
    pub host: &'a str,
    /// Request path. Case-sensitive, used verbatim.
    pub path: &'a str,
}

// --- Public functions ---

/// Percent-encode a string with the RFC 3986 profile used by OAuth 1.0a.
///
/// Encodes all bytes except unreserved characters (`A-Z a-z 0-9 - _ . ~`).
/// Space becomes `%20`, never `+`.
pub fn percent_encode(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// Build the base string URI: `scheme://host/path` without query or fragment.
pub fn base_url(target: &RequestTarget) -> String {
    let scheme = target.scheme.to_ascii_lowercase();
    let host = target.host.to_ascii_lowercase();
    let host = strip_default_port(&scheme, &host);
    let path = if target.path.is_empty() {
        "/"
    } else {
        target.path
    };
    format!("{}://{}{}", scheme, host, path)
}

/// Normalize request parameters.
///
/// Every pair is encoded to `key=value`, the encoded pairs are sorted as
/// whole strings (so equal keys are ordered by their encoded value) and
/// joined with `&`. The signature parameter is skipped.
pub fn normalized_parameters<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut pairs: Vec<String> = params
        .into_iter()
        .filter(|(k, _)| *k != SIGNATURE_PARAM)
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect();

    pairs.sort_unstable();
    pairs.join("&")
}

/// Build the canonical signature base string:
/// `METHOD&encode(base_url)&encode(normalized_parameters)`.
pub fn canonical_string<'a, I>(target: &RequestTarget, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    format!(
        "{}&{}&{}",
        target.method.to_ascii_uppercase(),
        percent_encode(&base_url(target)),
        percent_encode(&normalized_parameters(params)),
    )
}

/// Build the HMAC key: `encode(consumer_secret)&encode(token_secret)`.
///
/// LTI launches carry no token, so `token_secret` is `None` there and the
/// key ends with a bare `&`.
pub fn signing_key(consumer_secret: &str, token_secret: Option<&str>) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        token_secret.map(percent_encode).unwrap_or_default()
    )
}

/// Compute the base64-encoded HMAC-SHA1 signature of `canonical`.
pub fn sign(canonical: &str, signing_key: &str) -> String {
    STANDARD.encode(hmac_sha1(signing_key.as_bytes(), canonical.as_bytes()))
}

/// Check a caller-supplied signature against `canonical`.
///
/// Returns `false` for any mismatch, including a signature that is not valid
/// base64. The digest comparison runs in constant time.
pub fn verify(canonical: &str, signing_key: &str, supplied: &str) -> bool {
    let Ok(supplied) = STANDARD.decode(supplied.trim()) else {
        return false;
    };
    let mut mac = new_mac(signing_key.as_bytes());
    mac.update(canonical.as_bytes());
    mac.verify_slice(&supplied).is_ok()
}

// --- Private helpers ---

fn new_mac(key: &[u8]) -> Hmac<Sha1> {
    Hmac::<Sha1>::new_from_slice(key).expect("HMAC accepts any key length")
}

fn hmac_sha1(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = new_mac(key);
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn strip_default_port<'a>(scheme: &str, host: &'a str) -> &'a str {
    let default_port = match scheme {
        "http" => "80",
        "https" => "443",
        _ => return host,
    };
    match host.rsplit_once(':') {
        Some((name, port)) if port == default_port => name,
        _ => host,
    }
}

// --- Tests ---
