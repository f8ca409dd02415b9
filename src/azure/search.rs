//! Azure AI Search management queries (indexes, data sources, indexers).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{base_url, read_json, SearchCatalog};
use crate::credential::ServiceAuth;
use crate::errors::AppError;
use crate::models::{DataSourceConnection, Indexer, SearchIndexDescriptor};

pub const SEARCH_API_VERSION: &str = "2023-11-01";

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    #[serde(default)]
    fields: Vec<Value>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataSourceEntry {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    container: Option<DataContainer>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DataContainer {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexerEntry {
    name: String,
    #[serde(default)]
    data_source_name: String,
    #[serde(default)]
    target_index_name: String,
    #[serde(default)]
    description: Option<String>,
}

fn parse_indexes(body: Value) -> Result<Vec<SearchIndexDescriptor>, AppError> {
    let list: ListResponse<IndexEntry> = serde_json::from_value(body)?;
    Ok(list
        .value
        .into_iter()
        .map(|entry| SearchIndexDescriptor {
            name: entry.name,
            field_count: entry.fields.len(),
            description: entry.description.unwrap_or_default(),
            data_source_name: None,
            indexer_name: None,
        })
        .collect())
}

fn parse_data_sources(body: Value) -> Result<Vec<DataSourceConnection>, AppError> {
    let list: ListResponse<DataSourceEntry> = serde_json::from_value(body)?;
    Ok(list
        .value
        .into_iter()
        .map(|entry| DataSourceConnection {
            name: entry.name,
            kind: entry.kind,
            container_name: entry.container.and_then(|c| c.name),
            description: entry.description.unwrap_or_default(),
        })
        .collect())
}

fn parse_indexers(body: Value) -> Result<Vec<Indexer>, AppError> {
    let list: ListResponse<IndexerEntry> = serde_json::from_value(body)?;
    Ok(list
        .value
        .into_iter()
        .map(|entry| Indexer {
            name: entry.name,
            data_source_name: entry.data_source_name,
            target_index_name: entry.target_index_name,
            description: entry.description.unwrap_or_default(),
        })
        .collect())
}

/// Search service REST client.
pub struct SearchServiceClient {
    http: Client,
    endpoint: Option<String>,
    auth: ServiceAuth,
}

impl SearchServiceClient {
    pub fn new(http: Client, endpoint: Option<String>, auth: ServiceAuth) -> Self {
        Self { http, endpoint, auth }
    }

    async fn get_collection(&self, collection: &str) -> Result<Value, AppError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| AppError::Configuration("AZURE_SEARCH_ENDPOINT is not set".to_string()))?;
        let url = format!("{}/{}", base_url(endpoint), collection);

        let request = self
            .http
            .get(&url)
            .query(&[("api-version", SEARCH_API_VERSION)]);
        let response = self.auth.apply(request).await?.send().await?;
        read_json(response, "Search").await
    }
}

#[async_trait]
impl SearchCatalog for SearchServiceClient {
    async fn list_indexes(&self) -> Result<Vec<SearchIndexDescriptor>, AppError> {
        parse_indexes(self.get_collection("indexes").await?)
    }

    async fn list_data_sources(&self) -> Result<Vec<DataSourceConnection>, AppError> {
        parse_data_sources(self.get_collection("datasources").await?)
    }

    async fn list_indexers(&self) -> Result<Vec<Indexer>, AppError> {
        parse_indexers(self.get_collection("indexers").await?)
    }
}
