//! RFC 9457 Problem Details error responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use ltigate_core::{LoginError, LtiError};
use serde::Serialize;

const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// RFC 9457 Problem Details response.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProblemDetails {
    fn new(kind: &str, title: &str, status: u16, detail: Option<String>) -> Self {
        Self {
            error_type: format!("urn:ltigate:error:{}", kind),
            title: title.into(),
            status,
            detail,
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new("bad-request", "Bad Request", 400, Some(detail.into()))
    }

    pub fn unauthorized(kind: &str, detail: impl Into<String>) -> Self {
        Self::new(kind, "Unauthorized", 401, Some(detail.into()))
    }

    pub fn bad_gateway(kind: &str, detail: impl Into<String>) -> Self {
        Self::new(kind, "Bad Gateway", 502, Some(detail.into()))
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Json(&self).into_response();
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        response
    }
}

/// 400 for incomplete requests, 401 for credentials that fail
/// verification, 502 when the platform misbehaves.
impl From<LtiError> for ProblemDetails {
    fn from(err: LtiError) -> Self {
        let kind = err.kind().replace('_', "-");
        if err.is_bad_request() {
            Self::new(&kind, "Bad Request", 400, Some(err.to_string()))
        } else if err.is_verification_failure() {
            Self::unauthorized(&kind, err.to_string())
        } else {
            Self::bad_gateway(&kind, err.to_string())
        }
    }
}

impl From<LoginError> for ProblemDetails {
    fn from(err: LoginError) -> Self {
        Self::bad_request(err.to_string())
    }
}
