//! LTI 1.3 launch endpoint (OIDC redirect target).

use axum::{
    extract::{rejection::FormRejection, Form, State},
    http::{HeaderMap, Method, Uri},
    response::{IntoResponse, Redirect, Response},
};
use ltigate_core::{LaunchClaims, LaunchParameters, TrustMode};
use reqwest::Url;

use super::request::{FormPairs, PublicTarget};
use super::router::AppState;
use crate::error::ProblemDetails;

/// POST /lti/launch
///
/// Verifies the form-posted id_token and sends the browser on to the
/// frontend. Failures are answered directly, never redirected.
pub async fn launch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    form: Result<Form<FormPairs>, FormRejection>,
) -> Result<Response, ProblemDetails> {
    let Form(pairs) = form.map_err(|e| ProblemDetails::bad_request(e.body_text()))?;
    let params: LaunchParameters = pairs.into_iter().collect();
    let target =
        PublicTarget::from_request(&method, &uri, &headers, &state.config.tool.public_scheme);

    let claims = state
        .orchestrator
        .verify(TrustMode::Token, &target.as_target(), &params)
        .await?;

    let location = frontend_location(&state.config.tool.frontend_url, &claims)
        .ok_or_else(|| ProblemDetails::bad_gateway("frontend-url", "frontend URL is invalid"))?;
    Ok(Redirect::to(location.as_str()).into_response())
}

/// Frontend URL with `user`, `context` and, when present, `lineitem`.
fn frontend_location(frontend_url: &str, claims: &LaunchClaims) -> Option<Url> {
    let mut url = Url::parse(frontend_url).ok()?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("user", &claims.subject);
        query.append_pair("context", claims.context_id().unwrap_or_default());
        if let Some(lineitem) = claims.lineitem() {
            query.append_pair("lineitem", lineitem);
        }
    }
    Some(url)
}
