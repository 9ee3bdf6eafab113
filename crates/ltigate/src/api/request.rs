//! Turning HTTP requests into launch inputs.

use axum::http::{header, HeaderMap, Method, Uri};
use ltigate_core::LaunchParameters;
use ltigate_oauth1::RequestTarget;

/// Decoded `application/x-www-form-urlencoded` pairs, repeats preserved.
pub type FormPairs = Vec<(String, String)>;

/// Query pairs followed by form pairs.
pub fn launch_parameters(query: FormPairs, form: FormPairs) -> LaunchParameters {
    query.into_iter().chain(form).collect()
}

/// The URL the platform signed, as seen from outside any proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicTarget {
    method: String,
    scheme: String,
    host: String,
    path: String,
}

impl PublicTarget {
    /// Scheme from `X-Forwarded-Proto`, else `default_scheme`; host from
    /// `X-Forwarded-Host`, else `Host`, else the request URI.
    pub fn from_request(method: &Method, uri: &Uri, headers: &HeaderMap, default_scheme: &str) -> Self {
        let scheme = forwarded(headers, "x-forwarded-proto")
            .unwrap_or(default_scheme)
            .to_string();
        let host = forwarded(headers, "x-forwarded-host")
            .or_else(|| headers.get(header::HOST).and_then(|h| h.to_str().ok()))
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .unwrap_or_default()
            .to_string();

        Self {
            method: method.as_str().to_string(),
            scheme,
            host,
            path: uri.path().to_string(),
        }
    }

    pub fn as_target(&self) -> RequestTarget<'_> {
        RequestTarget {
            method: &self.method,
            scheme: &self.scheme,
            host: &self.host,
            path: &self.path,
        }
    }
}

/// First hop of a possibly comma-separated forwarding header.
fn forwarded<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_plain_request_uses_host_and_default_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8081"));
        let uri: Uri = "/lti?x=1".parse().unwrap();

        let target = PublicTarget::from_request(&Method::POST, &uri, &headers, "http");
        let t = target.as_target();
        assert_eq!(t.method, "POST");
        assert_eq!(t.scheme, "http");
        assert_eq!(t.host, "localhost:8081");
        assert_eq!(t.path, "/lti");
    }

    #[test]
    fn test_forwarded_headers_win() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("10.0.0.5:8081"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("https, http"));
        headers.insert("x-forwarded-host", HeaderValue::from_static("tool.example.com"));
        let uri: Uri = "/lti".parse().unwrap();

        let target = PublicTarget::from_request(&Method::POST, &uri, &headers, "http");
        assert_eq!(target.as_target().scheme, "https");
        assert_eq!(target.as_target().host, "tool.example.com");
    }

    #[test]
    fn test_query_and_form_merge() {
        let params = launch_parameters(
            vec![("a".into(), "1".into())],
            vec![("a".into(), "2".into()), ("b".into(), "3".into())],
        );
        assert_eq!(params.get_all("a"), ["1", "2"]);
        assert_eq!(params.get("b"), Some("3"));
    }
}
