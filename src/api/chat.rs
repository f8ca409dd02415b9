//! Chat API endpoint.

use axum::{extract::State, Json};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::models::ChatAnswer;
use crate::router::GENERAL_QUESTION;
use crate::AppState;

/// Question body. `container` is a label as offered by `/api/containers`.
#[derive(Debug, Deserialize)]
pub struct ChatQuery {
    pub query: String,
    #[serde(default = "default_container")]
    pub container: String,
    /// Index name, `NO_INDEX` to opt out, or empty to resolve from the container
    #[serde(default)]
    pub index: Option<String>,
}

fn default_container() -> String {
    GENERAL_QUESTION.to_string()
}

/// POST /api/chat - Ask a question, grounded when an index applies.
pub async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<ChatQuery>,
) -> ApiResult<ChatAnswer> {
    let answer = state
        .router
        .ask(&request.query, &request.container, request.index.as_deref())
        .await?;
    success(answer)
}
