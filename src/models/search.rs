//! Azure AI Search models: indexes, data sources and indexers.

use serde::{Deserialize, Serialize};

/// A search index, optionally enriched with the chain that feeds it.
///
/// Enrichment produces a new value; the raw descriptor is never modified.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndexDescriptor {
    pub name: String,
    pub field_count: usize,
    #[serde(default)]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexer_name: Option<String>,
}

impl SearchIndexDescriptor {
    pub fn new(name: impl Into<String>, field_count: usize) -> Self {
        Self {
            name: name.into(),
            field_count,
            description: String::new(),
            data_source_name: None,
            indexer_name: None,
        }
    }

    /// Copy decorated with the data source and indexer that populate it.
    pub fn with_chain(
        &self,
        data_source_name: Option<&str>,
        indexer_name: &str,
        description: String,
    ) -> Self {
        Self {
            name: self.name.clone(),
            field_count: self.field_count,
            description,
            data_source_name: data_source_name.map(str::to_string),
            indexer_name: Some(indexer_name.to_string()),
        }
    }

    /// Copy with a replacement description.
    pub fn with_description(&self, description: String) -> Self {
        Self {
            description,
            ..self.clone()
        }
    }
}

/// Where an indexer pulls documents from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConnection {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub container_name: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// The job that moves documents from a data source into an index.
///
/// `data_source_name` is not guaranteed to reference an existing data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Indexer {
    pub name: String,
    pub data_source_name: String,
    pub target_index_name: String,
    #[serde(default)]
    pub description: String,
}

/// Everything the search service knows, fetched together.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnapshot {
    pub indexes: Vec<SearchIndexDescriptor>,
    pub data_sources: Vec<DataSourceConnection>,
    pub indexers: Vec<Indexer>,
}

/// One data source and the indexers reading from it.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexChain {
    pub container: Option<String>,
    pub data_source: String,
    pub indexers: Vec<IndexerTarget>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IndexerTarget {
    pub name: String,
    pub target_index: String,
}
