//! Clients for the external Azure services.
//!
//! Each service sits behind a trait so the resolution and routing logic can run
//! against in-process fakes.

mod graph;
mod openai;
mod search;
mod storage;

pub use graph::*;
pub use openai::*;
pub use search::*;
pub use storage::*;

use async_trait::async_trait;
use reqwest::Response;
use serde_json::Value;

use crate::errors::AppError;
use crate::models::{DataSourceConnection, Indexer, SearchIndexDescriptor, StorageContainer};

/// Lists containers of the configured storage account.
#[async_trait]
pub trait ContainerSource: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<StorageContainer>, AppError>;
}

/// Read-only view of the search service's indexes, data sources and indexers.
#[async_trait]
pub trait SearchCatalog: Send + Sync {
    async fn list_indexes(&self) -> Result<Vec<SearchIndexDescriptor>, AppError>;
    async fn list_data_sources(&self) -> Result<Vec<DataSourceConnection>, AppError>;
    async fn list_indexers(&self) -> Result<Vec<Indexer>, AppError>;
}

/// Subscription lookup and Resource Graph dashboard query.
#[async_trait]
pub trait DashboardSource: Send + Sync {
    async fn subscription_name(&self) -> Result<String, AppError>;
    /// Raw Resource Graph rows for portal dashboards
    async fn query_dashboards(&self) -> Result<Vec<Value>, AppError>;
}

/// Chat-completion endpoint. Returns the provider's JSON untouched.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<Value, AppError>;
}

/// Decode a JSON response, turning non-2xx statuses into upstream errors.
pub(crate) async fn read_json(response: Response, service: &str) -> Result<Value, AppError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let detail = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(body);
        return Err(AppError::Upstream(format!(
            "{} request failed with status {}: {}",
            service, status, detail
        )));
    }

    Ok(serde_json::from_str(&body)?)
}

/// Strip a trailing slash so paths can be appended with `/`.
pub(crate) fn base_url(endpoint: &str) -> &str {
    endpoint.trim_end_matches('/')
}
