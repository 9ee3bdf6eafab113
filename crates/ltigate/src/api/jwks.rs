use axum::{extract::State, Json};
use serde_json::{json, Value};

use super::router::AppState;

/// GET /lti/jwks
///
/// The tool's own key set. Empty unless one was configured.
pub async fn tool_key_set(State(state): State<AppState>) -> Json<Value> {
    Json(
        state
            .config
            .tool
            .jwks
            .clone()
            .unwrap_or_else(|| json!({"keys": []})),
    )
}
