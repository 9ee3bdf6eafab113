//! LTI 1.1 launch endpoint.
//!
//! The signed form may also carry an id_token instead of an OAuth
//! signature; the orchestrator picks the trust model from what is present.

use axum::{
    extract::{rejection::FormRejection, Form, Query, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use ltigate_core::{
    ExecutionResult, LaunchClaims, LaunchOptions, LaunchOutcome, LtiError, TrustMode,
};
use reqwest::Url;
use serde::Serialize;

use super::request::{launch_parameters, FormPairs, PublicTarget};
use super::router::AppState;
use crate::error::ProblemDetails;

/// Shown to the learner when the signature does not match.
pub const SIGNATURE_FAILED_MESSAGE: &str = "LTI signature verification failed.";

const RETURN_URL_PARAM: &str = "launch_presentation_return_url";

#[derive(Serialize)]
struct LaunchResponse {
    success: bool,
    launch: LaunchClaims,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution: Option<ExecutionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    grade_job: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ExecutionView {
    Completed { result: ExecutionResult },
    Failed { error: String },
}

impl From<LaunchOutcome> for LaunchResponse {
    fn from(outcome: LaunchOutcome) -> Self {
        Self {
            success: true,
            launch: outcome.claims,
            execution: outcome.execution.map(|e| match e {
                Ok(result) => ExecutionView::Completed { result },
                Err(e) => ExecutionView::Failed {
                    error: e.to_string(),
                },
            }),
            score: outcome.score,
            grade_job: outcome.grade_job.map(|id| id.to_string()),
        }
    }
}

/// POST /lti
pub async fn launch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<FormPairs>,
    form: Result<Form<FormPairs>, FormRejection>,
) -> Response {
    let Form(form) = match form {
        Ok(form) => form,
        Err(e) => return ProblemDetails::bad_request(e.body_text()).into_response(),
    };
    let params = launch_parameters(query, form);
    let target =
        PublicTarget::from_request(&method, &uri, &headers, &state.config.tool.public_scheme);

    let result = match TrustMode::detect(&params) {
        Ok(mode) => {
            state
                .orchestrator
                .handle_launch(mode, &target.as_target(), &params, LaunchOptions::default())
                .await
                .map_err(|e| (mode, e))
        }
        Err(e) => Err((TrustMode::Legacy, e)),
    };

    match result {
        Ok(outcome) => Json(LaunchResponse::from(outcome)).into_response(),
        Err((mode, err)) => {
            // Only an OAuth-signed form may send the learner back to the
            // platform; a return URL inside an unverified token is untrusted.
            let return_url = match mode {
                TrustMode::Legacy => params.get(RETURN_URL_PARAM),
                TrustMode::Token => None,
            };
            rejection(err, return_url)
        }
    }
}

fn rejection(err: LtiError, return_url: Option<&str>) -> Response {
    let message = match &err {
        LtiError::SignatureInvalid => SIGNATURE_FAILED_MESSAGE.to_string(),
        other => other.to_string(),
    };

    if let Some(redirect) = return_url.and_then(|url| redirect_with_error(url, &message)) {
        return redirect;
    }

    match err {
        LtiError::SignatureInvalid => {
            ProblemDetails::unauthorized("signature-invalid", "Invalid LTI signature.")
                .into_response()
        }
        other => ProblemDetails::from(other).into_response(),
    }
}

/// 303 back to the platform with `lti_msg` and `lti_errormsg` appended.
fn redirect_with_error(return_url: &str, message: &str) -> Option<Response> {
    let mut url = Url::parse(return_url).ok()?;
    url.query_pairs_mut()
        .append_pair("lti_msg", "LTI Launch Error")
        .append_pair("lti_errormsg", message);
    Some(Redirect::to(url.as_str()).into_response())
}
