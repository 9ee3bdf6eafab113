//! Signing LTI 1.1 launch forms the way a platform does.

use ltigate_oauth1::{self as oauth1, RequestTarget, SIGNATURE_PARAM};

/// Add the `oauth_*` protocol parameters to `params` and sign the result.
///
/// Returns the full form, signature included, ready to post to `target`.
pub fn sign_launch(
    target: &RequestTarget,
    params: &[(&str, &str)],
    consumer_key: &str,
    shared_secret: &str,
) -> Vec<(String, String)> {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let timestamp = chrono::Utc::now().timestamp().to_string();

    let mut form: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    form.extend([
        ("oauth_consumer_key".to_string(), consumer_key.to_string()),
        ("oauth_nonce".to_string(), nonce),
        ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
        ("oauth_timestamp".to_string(), timestamp),
        ("oauth_version".to_string(), "1.0".to_string()),
    ]);

    let canonical = oauth1::canonical_string(
        target,
        form.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    );
    let signature = oauth1::sign(&canonical, &oauth1::signing_key(shared_secret, None));
    form.push((SIGNATURE_PARAM.to_string(), signature));
    form
}

/// Encode a form as an `application/x-www-form-urlencoded` body.
pub fn form_body(form: &[(String, String)]) -> String {
    form.iter()
        .map(|(k, v)| format!("{}={}", oauth1::percent_encode(k), oauth1::percent_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Replace the value of `name` in a signed form, leaving the signature stale.
pub fn tamper(form: &mut [(String, String)], name: &str, value: &str) {
    for (k, v) in form.iter_mut() {
        if k == name {
            *v = value.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> RequestTarget<'static> {
        RequestTarget {
            method: "POST",
            scheme: "http",
            host: "localhost",
            path: "/lti",
        }
    }

    #[test]
    fn test_signed_form_verifies() {
        let form = sign_launch(&target(), &[("user_id", "42")], "DSA_2025", "secret");
        let (_, signature) = form
            .iter()
            .find(|(k, _)| k == SIGNATURE_PARAM)
            .expect("signature appended");

        let canonical =
            oauth1::canonical_string(&target(), form.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        assert!(oauth1::verify(
            &canonical,
            &oauth1::signing_key("secret", None),
            signature
        ));
    }

    #[test]
    fn test_form_body_encodes_spaces() {
        let body = form_body(&[("a b".into(), "c+d".into())]);
        assert_eq!(body, "a%20b=c%2Bd");
    }
}
