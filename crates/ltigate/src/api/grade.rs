//! Synchronous grade submission.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use ltigate_core::grade::clamp_score;
use ltigate_core::{BearerToken, GradeSubmission};
use serde::{Deserialize, Serialize};

use super::router::AppState;
use crate::error::ProblemDetails;

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub lineitem_url: String,
    pub user_id: String,
    pub score: f64,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default)]
    pub comment: Option<String>,
    /// Token obtained by the caller; exchanged from client credentials when
    /// absent.
    #[serde(default)]
    pub access_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub success: bool,
    pub message: &'static str,
    pub data: GradeData,
}

#[derive(Debug, Serialize)]
pub struct GradeData {
    pub user_id: String,
    pub score: f64,
    pub max_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub timestamp: String,
}

/// POST /lti/grade
///
/// Posts the score and waits for the platform, so passback failures are
/// returned to the caller.
pub async fn submit_grade(
    State(state): State<AppState>,
    body: Result<Json<GradeRequest>, JsonRejection>,
) -> Result<Json<GradeResponse>, ProblemDetails> {
    let Json(req) = body.map_err(|e| ProblemDetails::bad_request(e.body_text()))?;

    if req.lineitem_url.trim().is_empty() || req.user_id.trim().is_empty() {
        return Err(ProblemDetails::bad_request(
            "lineitem_url and user_id are required",
        ));
    }

    let max_score = req
        .max_score
        .unwrap_or(state.config.grading.default_max_score);
    let score = clamp_score(req.score, max_score).map_err(ProblemDetails::bad_request)?;

    let submission = GradeSubmission {
        lineitem_url: req.lineitem_url,
        user_id: req.user_id,
        score,
        max_score,
        comment: req.comment,
    };
    let bearer = req
        .access_token
        .filter(|t| !t.is_empty())
        .map(BearerToken::from_access_token);

    let envelope = state.passback.submit(&submission, bearer.as_ref()).await?;

    Ok(Json(GradeResponse {
        success: true,
        message: "Grade submitted successfully",
        data: GradeData {
            user_id: envelope.user_id,
            score: envelope.score_given,
            max_score: envelope.score_maximum,
            comment: envelope.comment,
            timestamp: envelope.timestamp,
        },
    }))
}
