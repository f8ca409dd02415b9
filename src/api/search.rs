//! Search service API endpoints.

use axum::extract::State;

use super::{success, ApiResult};
use crate::catalog::Listing;
use crate::models::{IndexChain, SearchIndexDescriptor};
use crate::resolver::index_chains;
use crate::AppState;

/// GET /api/search/indexes - All indexes of the search service.
pub async fn list_indexes(State(state): State<AppState>) -> ApiResult<Listing<SearchIndexDescriptor>> {
    let listing = match state.catalog.search_snapshot().await {
        Ok(entry) => Listing::fetched(entry.value.indexes.clone(), entry.fetched_at),
        Err(e) => Listing::unavailable("search indexes", &e),
    };
    success(listing)
}

/// GET /api/search/connections - Data source to index chains.
pub async fn list_connections(State(state): State<AppState>) -> ApiResult<Listing<IndexChain>> {
    let listing = match state.catalog.search_snapshot().await {
        Ok(entry) => Listing::fetched(index_chains(&entry.value), entry.fetched_at),
        Err(e) => Listing::unavailable("search connections", &e),
    };
    success(listing)
}
