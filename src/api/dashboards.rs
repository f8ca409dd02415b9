//! Dashboard API endpoints.

use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::models::{Dashboard, DashboardSummary, ShareFilter};
use crate::AppState;

/// Dashboard filter parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    /// Exact resource group name; empty or absent means all.
    #[serde(default)]
    pub resource_group: Option<String>,
    #[serde(default)]
    pub share: ShareFilter,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardsResponse {
    pub subscription_name: Option<String>,
    /// Counts over the unfiltered listing
    pub summary: DashboardSummary,
    pub items: Vec<Dashboard>,
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// GET /api/dashboards - List portal dashboards.
pub async fn list_dashboards(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> ApiResult<DashboardsResponse> {
    let (listing, subscription_name) = state.catalog.dashboards().await;
    let summary = DashboardSummary::of(&listing.items);

    let resource_group = params
        .resource_group
        .as_deref()
        .map(str::trim)
        .filter(|rg| !rg.is_empty());

    let items = listing
        .items
        .into_iter()
        .filter(|d| resource_group.map_or(true, |rg| d.resource_group == rg))
        .filter(|d| params.share.matches(d))
        .collect();

    success(DashboardsResponse {
        subscription_name,
        summary,
        items,
        fetched_at: listing.fetched_at,
        warning: listing.warning,
    })
}

/// POST /api/dashboards/refresh - Drop the cached dashboard listing.
pub async fn refresh_dashboards(State(state): State<AppState>) -> ApiResult<bool> {
    state.catalog.refresh_dashboards().await;
    tracing::info!("Dashboard cache invalidated");
    success(true)
}
