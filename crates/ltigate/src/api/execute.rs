//! Code execution with background grade passback.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use ltigate_core::launch::AUTO_GRADE_COMMENT;
use ltigate_core::{ExecutionRequest, ExecutionResult, GradeSubmission};
use serde::{Deserialize, Serialize};

use super::router::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub lineitem: Option<String>,
    #[serde(default)]
    pub max_score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_job: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecuteResponse {
    fn failure(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                success: false,
                result: None,
                score: None,
                grade_job: None,
                error: Some(error.into()),
            }),
        )
    }
}

/// POST /lti/execute
///
/// Runs the code, scores it and, when the caller names a learner and a line
/// item, queues the grade. The response never waits on the platform.
pub async fn execute_code(
    State(state): State<AppState>,
    body: Result<Json<ExecuteRequest>, JsonRejection>,
) -> (StatusCode, Json<ExecuteResponse>) {
    let req = match body {
        Ok(Json(req)) => req,
        Err(e) => return ExecuteResponse::failure(StatusCode::BAD_REQUEST, e.body_text()),
    };
    if req.code.trim().is_empty() {
        return ExecuteResponse::failure(StatusCode::BAD_REQUEST, "code is required");
    }

    let orchestrator = &state.orchestrator;
    let language = req
        .language
        .filter(|l| !l.is_empty())
        .unwrap_or_else(|| orchestrator.default_language().to_string());

    let execution = orchestrator
        .execute(ExecutionRequest {
            source_code: req.code,
            language,
        })
        .await;
    let result = match execution {
        Some(Ok(result)) => result,
        Some(Err(e)) => {
            return ExecuteResponse::failure(
                StatusCode::BAD_GATEWAY,
                format!("Execution error: {}", e),
            )
        }
        None => {
            return ExecuteResponse::failure(
                StatusCode::SERVICE_UNAVAILABLE,
                "code execution is not configured",
            )
        }
    };

    let max_score = req.max_score.unwrap_or(orchestrator.max_score());
    if !(max_score.is_finite() && max_score > 0.0) {
        return ExecuteResponse::failure(StatusCode::BAD_REQUEST, "max_score must be positive");
    }
    let score = orchestrator.score(&result, Some(max_score));

    let grade_job = match (req.user_id, req.lineitem) {
        (Some(user_id), Some(lineitem)) if !user_id.is_empty() && !lineitem.is_empty() => {
            orchestrator.enqueue_grade(GradeSubmission {
                lineitem_url: lineitem,
                user_id,
                score,
                max_score,
                comment: Some(AUTO_GRADE_COMMENT.to_string()),
            })
        }
        _ => None,
    };

    (
        StatusCode::OK,
        Json(ExecuteResponse {
            success: true,
            result: Some(result),
            score: Some(score),
            grade_job: grade_job.map(|id| id.to_string()),
            error: None,
        }),
    )
}
