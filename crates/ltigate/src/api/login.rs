use axum::{
    extract::{rejection::FormRejection, Form, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use ltigate_core::LaunchParameters;

use super::request::FormPairs;
use super::router::AppState;
use crate::error::ProblemDetails;

/// GET|POST /lti/login
///
/// OIDC third-party login initiation. Answers with a 302 to the platform's
/// authorization endpoint.
pub async fn initiate(
    State(state): State<AppState>,
    form: Result<Form<FormPairs>, FormRejection>,
) -> Result<Response, ProblemDetails> {
    let Form(pairs) = form.map_err(|e| ProblemDetails::bad_request(e.body_text()))?;
    let params: LaunchParameters = pairs.into_iter().collect();

    let redirect = state.login.initiate(&params)?;
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, redirect.url.to_string())],
    )
        .into_response())
}
