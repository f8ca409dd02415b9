//! Container to search-index resolution.
//!
//! Rules are tried in order and the first one producing a result wins:
//! the data source → indexer → index chain, then indexers whose data source name
//! resembles the container, then index names resembling the container.

use std::sync::Arc;

use crate::catalog::ResourceCatalog;
use crate::models::{IndexChain, IndexerTarget, SearchIndexDescriptor, SearchSnapshot};

/// Case-insensitive containment in either direction. Empty strings never match.
pub fn symmetric_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

fn push_unique(out: &mut Vec<SearchIndexDescriptor>, index: SearchIndexDescriptor) {
    if !out.iter().any(|existing| existing.name == index.name) {
        out.push(index);
    }
}

fn find_index<'a>(snapshot: &'a SearchSnapshot, name: &str) -> Option<&'a SearchIndexDescriptor> {
    snapshot.indexes.iter().find(|index| index.name == name)
}

/// Indexes reachable through a data source reading from `container`.
pub fn match_index_chain(container: &str, snapshot: &SearchSnapshot) -> Vec<SearchIndexDescriptor> {
    let mut out = Vec::new();

    let data_sources = snapshot.data_sources.iter().filter(|ds| {
        ds.container_name
            .as_deref()
            .is_some_and(|name| symmetric_match(name, container))
    });

    for ds in data_sources {
        for indexer in snapshot.indexers.iter().filter(|ix| ix.data_source_name == ds.name) {
            let Some(index) = find_index(snapshot, &indexer.target_index_name) else {
                tracing::debug!(
                    "Indexer {} targets unknown index {}",
                    indexer.name,
                    indexer.target_index_name
                );
                continue;
            };
            let description = format!(
                "{} → {} → {} → {}",
                container, ds.name, indexer.name, index.name
            );
            push_unique(
                &mut out,
                index.with_chain(Some(&ds.name), &indexer.name, description),
            );
        }
    }

    out
}

/// Indexes whose indexer's data source name resembles `container`, with and without hyphens.
pub fn match_indexer_names(container: &str, snapshot: &SearchSnapshot) -> Vec<SearchIndexDescriptor> {
    let container_bare = container.replace('-', "");
    let mut out = Vec::new();

    for indexer in &snapshot.indexers {
        let source_bare = indexer.data_source_name.replace('-', "");
        let matched = symmetric_match(container, &indexer.data_source_name)
            || symmetric_match(&container_bare, &source_bare);
        if !matched {
            continue;
        }

        if let Some(index) = find_index(snapshot, &indexer.target_index_name) {
            let description = format!("Populated by indexer {}", indexer.name);
            push_unique(&mut out, index.with_chain(None, &indexer.name, description));
        }
    }

    out
}

/// Indexes whose names resemble `container` or the default index.
pub fn match_index_names(
    container: &str,
    snapshot: &SearchSnapshot,
    default_index: Option<&str>,
) -> Vec<SearchIndexDescriptor> {
    let lower = container.to_lowercase();
    let mut keywords = vec![lower.replace('-', ""), lower.replace('_', ""), lower];
    if let Some(default) = default_index {
        keywords.push(default.to_lowercase());
    }
    keywords.retain(|k| !k.is_empty());

    let mut out = Vec::new();
    for index in &snapshot.indexes {
        if keywords.iter().any(|k| symmetric_match(k, &index.name)) {
            let description = if index.description.is_empty() {
                format!("Name matches container {}", container)
            } else {
                index.description.clone()
            };
            push_unique(&mut out, index.with_description(description));
        }
    }

    out
}

/// Full fallback chain over one snapshot, most relevant index first.
pub fn resolve_in_snapshot(
    container: &str,
    snapshot: &SearchSnapshot,
    default_index: Option<&str>,
) -> Vec<SearchIndexDescriptor> {
    if snapshot.indexes.is_empty() {
        return Vec::new();
    }

    let chained = match_index_chain(container, snapshot);
    if !chained.is_empty() {
        return chained;
    }

    let by_indexer = match_indexer_names(container, snapshot);
    if !by_indexer.is_empty() {
        return by_indexer;
    }

    match_index_names(container, snapshot, default_index)
}

/// Lower-cased container names that some data source reads from.
pub fn indexed_containers(snapshot: &SearchSnapshot) -> Vec<String> {
    let mut names: Vec<String> = snapshot
        .data_sources
        .iter()
        .filter_map(|ds| ds.container_name.as_deref())
        .map(str::to_lowercase)
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Data sources that feed at least one indexer, with their targets.
pub fn index_chains(snapshot: &SearchSnapshot) -> Vec<IndexChain> {
    snapshot
        .data_sources
        .iter()
        .filter_map(|ds| {
            let indexers: Vec<IndexerTarget> = snapshot
                .indexers
                .iter()
                .filter(|ix| ix.data_source_name == ds.name)
                .map(|ix| IndexerTarget {
                    name: ix.name.clone(),
                    target_index: ix.target_index_name.clone(),
                })
                .collect();
            if indexers.is_empty() {
                return None;
            }
            Some(IndexChain {
                container: ds.container_name.clone(),
                data_source: ds.name.clone(),
                indexers,
            })
        })
        .collect()
}

/// Resolves containers against the cached search snapshot. Never fails.
pub struct IndexResolver {
    catalog: Arc<ResourceCatalog>,
    default_index: Option<String>,
}

impl IndexResolver {
    pub fn new(catalog: Arc<ResourceCatalog>, default_index: Option<String>) -> Self {
        Self {
            catalog,
            default_index,
        }
    }

    /// Candidate indexes for `container`; empty when the search service is unavailable.
    pub async fn resolve_indexes_for_container(&self, container: &str) -> Vec<SearchIndexDescriptor> {
        let snapshot = match self.catalog.search_snapshot().await {
            Ok(entry) => entry.value,
            Err(e) => {
                tracing::warn!("Index resolution for {} unavailable: {}", container, e);
                return Vec::new();
            }
        };
        resolve_in_snapshot(container, &snapshot, self.default_index.as_deref())
    }

    /// First candidate, else the configured default index, else `None`.
    pub async fn index_for_container(&self, container: &str) -> Option<String> {
        self.resolve_indexes_for_container(container)
            .await
            .into_iter()
            .next()
            .map(|index| index.name)
            .or_else(|| self.default_index.clone())
    }

    /// Lower-cased container names known to the search service.
    pub async fn indexed_containers(&self) -> Vec<String> {
        match self.catalog.search_snapshot().await {
            Ok(entry) => indexed_containers(&entry.value),
            Err(e) => {
                tracing::warn!("Indexed containers unavailable: {}", e);
                Vec::new()
            }
        }
    }
}
