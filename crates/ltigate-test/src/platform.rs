//! Mock LMS: key set, token endpoint and line-item score endpoints.

use crate::keys::{jwks, TokenSigner};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Media type of AGS score submissions.
pub const SCORE_CONTENT_TYPE: &str = "application/vnd.ims.lis.v1.score+json";

/// An LTI 1.3 platform stand-in on a random local port.
///
/// The platform's issuer is its base URI; paths are fixed:
/// `/jwks`, `/token`, `/auth`, `/lineitems/{id}/scores`.
pub struct MockPlatform {
    server: MockServer,
}

impl MockPlatform {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/jwks", self.server.uri())
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.server.uri())
    }

    pub fn auth_url(&self) -> String {
        format!("{}/auth", self.server.uri())
    }

    pub fn lineitem_url(&self, id: &str) -> String {
        format!("{}/lineitems/{}", self.server.uri(), id)
    }

    /// Publish the public halves of `signers` at `/jwks`.
    pub async fn serve_keys(&self, signers: &[&dyn TokenSigner]) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks(signers)))
            .mount(&self.server)
            .await;
    }

    /// Serve an arbitrary response at `/jwks`.
    pub async fn serve_keys_response(&self, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Answer client-credentials grants at `/token` with `access_token`.
    pub async fn serve_token(&self, access_token: &str) {
        let body = json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "https://purl.imsglobal.org/spec/lti-ags/scope/score",
        });
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Serve an arbitrary response at `/token`.
    pub async fn serve_token_response(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }

    /// Accept scores for line item `id` when presented with `bearer`.
    pub async fn accept_scores(&self, id: &str, bearer: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/lineitems/{}/scores", id)))
            .and(header("content-type", SCORE_CONTENT_TYPE))
            .and(header("authorization", format!("Bearer {}", bearer).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&self.server)
            .await;
    }

    /// Reject every score for line item `id` with `status`.
    pub async fn reject_scores(&self, id: &str, status: u16) {
        Mock::given(method("POST"))
            .and(path(format!("/lineitems/{}/scores", id)))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Requests received on `request_path`, oldest first.
    pub async fn requests_to(&self, request_path: &str) -> Vec<Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == request_path)
            .collect()
    }

    /// Score envelopes posted to line item `id`, as JSON.
    pub async fn received_scores(&self, id: &str) -> Vec<Value> {
        self.requests_to(&format!("/lineitems/{}/scores", id))
            .await
            .iter()
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::EcKeyPair;

    #[tokio::test]
    async fn test_serves_key_set() {
        let platform = MockPlatform::start().await;
        let key = EcKeyPair::generate("k1");
        platform.serve_keys(&[&key]).await;

        let body: Value = reqwest::get(platform.jwks_url())
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["keys"][0]["kid"], "k1");
    }

    #[tokio::test]
    async fn test_records_scores() {
        let platform = MockPlatform::start().await;
        platform.accept_scores("42", "tok").await;

        let status = reqwest::Client::new()
            .post(format!("{}/scores", platform.lineitem_url("42")))
            .header("content-type", SCORE_CONTENT_TYPE)
            .header("authorization", "Bearer tok")
            .body(r#"{"scoreGiven":1}"#)
            .send()
            .await
            .unwrap()
            .status();

        assert_eq!(status, 200);
        assert_eq!(platform.received_scores("42").await[0]["scoreGiven"], 1);
    }
}
