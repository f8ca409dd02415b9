//! Notice API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{ComplianceCheckRequest, CreateNoticeRequest, Notice};
use crate::notices::build_notice;
use crate::notices::compliance::run_compliance_check;
use crate::router::extract_container_name;
use crate::AppState;

/// GET /api/notices - List notices, newest first.
pub async fn list_notices(State(state): State<AppState>) -> ApiResult<Vec<Notice>> {
    success(state.notices.list().await)
}

/// POST /api/notices - Submit a notice.
pub async fn create_notice(
    State(state): State<AppState>,
    Json(request): Json<CreateNoticeRequest>,
) -> ApiResult<Notice> {
    let notice = build_notice(request)?;
    state.notices.append(notice.clone()).await?;
    tracing::info!("Notice '{}' recorded", notice.title);
    success(notice)
}

/// DELETE /api/notices/{position} - Delete one notice.
pub async fn delete_notice(
    State(state): State<AppState>,
    Path(position): Path<usize>,
) -> ApiResult<Notice> {
    let removed = state.notices.delete(position).await?;
    tracing::info!("Notice '{}' deleted", removed.title);
    success(removed)
}

/// DELETE /api/notices - Delete every notice.
pub async fn clear_notices(State(state): State<AppState>) -> ApiResult<bool> {
    state.notices.clear_all().await?;
    tracing::info!("All notices deleted");
    success(true)
}

/// POST /api/notices/{position}/check - Run and store a compliance check.
pub async fn check_notice(
    State(state): State<AppState>,
    Path(position): Path<usize>,
    Json(request): Json<ComplianceCheckRequest>,
) -> ApiResult<Notice> {
    let container = extract_container_name(&request.container).to_string();
    let index = request.index.trim().to_string();
    if container.is_empty() || index.is_empty() {
        return Err(AppError::Validation(
            "Both container and index are required".to_string(),
        ));
    }

    let notice = state.notices.get(position).await?;
    let result = run_compliance_check(&state.router, &notice, &container, &index).await;
    let updated = state
        .notices
        .record_check_result(position, &notice, result)
        .await?;
    success(updated)
}
