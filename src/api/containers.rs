//! Storage container API endpoints.

use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{success, ApiResult};
use crate::models::{SearchIndexDescriptor, StorageContainer};
use crate::router::container_options;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainersResponse {
    pub items: Vec<StorageContainer>,
    /// Selectable labels, "general question" first
    pub options: Vec<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultIndexResponse {
    pub container: String,
    pub index: Option<String>,
}

/// GET /api/containers - List storage containers and their labels.
pub async fn list_containers(State(state): State<AppState>) -> ApiResult<ContainersResponse> {
    let listing = state.catalog.containers().await;
    let indexed = state.resolver.indexed_containers().await;
    let options = container_options(&listing.items, &indexed);

    success(ContainersResponse {
        items: listing.items,
        options,
        fetched_at: listing.fetched_at,
        warning: listing.warning,
    })
}

/// POST /api/containers/refresh - Drop the container and search caches.
pub async fn refresh_containers(State(state): State<AppState>) -> ApiResult<bool> {
    state.catalog.refresh_containers().await;
    state.catalog.refresh_search().await;
    tracing::info!("Container and search caches invalidated");
    success(true)
}

/// GET /api/containers/{name}/indexes - Candidate indexes for a container.
pub async fn container_indexes(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Vec<SearchIndexDescriptor>> {
    success(state.resolver.resolve_indexes_for_container(&name).await)
}

/// GET /api/containers/{name}/default-index - The index a question would use.
pub async fn container_default_index(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<DefaultIndexResponse> {
    let index = state.resolver.index_for_container(&name).await;
    success(DefaultIndexResponse {
        container: name,
        index,
    })
}
