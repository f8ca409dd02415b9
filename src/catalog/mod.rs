//! Resource enumerators with per-resource caches.
//!
//! Every listing is availability-first: enumeration failures become an empty
//! listing with a warning, never an error.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::azure::{ContainerSource, DashboardSource, SearchCatalog};
use crate::cache::{CacheEntry, TimedCache, RESOURCE_TTL_SECS};
use crate::errors::AppError;
use crate::models::{Dashboard, SearchSnapshot, StorageContainer, HIDDEN_TITLE_TAG};

/// A listing as shown to the user, possibly empty with an explanation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> Listing<T> {
    pub fn fetched(items: Vec<T>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            items,
            fetched_at: Some(fetched_at),
            warning: None,
        }
    }

    /// Empty listing explaining why `name` could not be enumerated.
    pub fn unavailable(name: &str, error: &AppError) -> Self {
        tracing::warn!("Failed to list {}: {}", name, error);
        Self {
            items: Vec::new(),
            fetched_at: None,
            warning: Some(error.message().to_string()),
        }
    }
}

impl<T: Clone> Listing<T> {
    fn from_result(name: &str, result: Result<CacheEntry<Vec<T>>, AppError>) -> Self {
        match result {
            Ok(entry) => Self::fetched(entry.value.as_ref().clone(), entry.fetched_at),
            Err(e) => Self::unavailable(name, &e),
        }
    }
}

/// Dashboards plus the display name of their subscription.
#[derive(Debug, Clone)]
pub struct DashboardSet {
    pub subscription_name: String,
    pub dashboards: Vec<Dashboard>,
}

/// Fixed identifiers needed to decorate dashboards.
#[derive(Debug, Clone, Default)]
pub struct CatalogSettings {
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
}

/// Owns the enumerators and their caches.
pub struct ResourceCatalog {
    containers: Arc<dyn ContainerSource>,
    search: Arc<dyn SearchCatalog>,
    dashboards: Arc<dyn DashboardSource>,
    settings: CatalogSettings,
    container_cache: TimedCache<Vec<StorageContainer>>,
    dashboard_cache: TimedCache<DashboardSet>,
    search_cache: TimedCache<SearchSnapshot>,
}

impl ResourceCatalog {
    pub fn new(
        containers: Arc<dyn ContainerSource>,
        search: Arc<dyn SearchCatalog>,
        dashboards: Arc<dyn DashboardSource>,
        settings: CatalogSettings,
    ) -> Self {
        Self {
            containers,
            search,
            dashboards,
            settings,
            container_cache: TimedCache::new("storage_containers"),
            dashboard_cache: TimedCache::new("azure_dashboards"),
            search_cache: TimedCache::new("search_snapshot"),
        }
    }

    /// Storage containers, cached for the resource window.
    pub async fn containers(&self) -> Listing<StorageContainer> {
        let result = self
            .container_cache
            .get_or_refresh(RESOURCE_TTL_SECS, || self.containers.list_containers())
            .await;
        Listing::from_result("storage containers", result)
    }

    /// Portal dashboards and the subscription display name.
    pub async fn dashboards(&self) -> (Listing<Dashboard>, Option<String>) {
        let result = self
            .dashboard_cache
            .get_or_refresh(RESOURCE_TTL_SECS, || self.fetch_dashboards())
            .await;

        match result {
            Ok(entry) => (
                Listing::fetched(entry.value.dashboards.clone(), entry.fetched_at),
                Some(entry.value.subscription_name.clone()),
            ),
            Err(e) => (Listing::unavailable("dashboards", &e), None),
        }
    }

    /// Indexes, data sources and indexers in one cached snapshot.
    ///
    /// Only a failed index listing is an error; missing data-source or indexer
    /// listings degrade to empty so name-based resolution still works.
    pub async fn search_snapshot(&self) -> Result<CacheEntry<SearchSnapshot>, AppError> {
        self.search_cache
            .get_or_refresh(RESOURCE_TTL_SECS, || self.fetch_search_snapshot())
            .await
    }

    pub async fn refresh_containers(&self) {
        self.container_cache.invalidate().await;
    }

    pub async fn refresh_dashboards(&self) {
        self.dashboard_cache.invalidate().await;
    }

    pub async fn refresh_search(&self) {
        self.search_cache.invalidate().await;
    }

    async fn fetch_dashboards(&self) -> Result<DashboardSet, AppError> {
        let subscription_name = self.dashboards.subscription_name().await?;
        let rows = self.dashboards.query_dashboards().await?;

        let dashboards = rows
            .iter()
            .map(|row| map_dashboard(row, &subscription_name, &self.settings))
            .collect();

        Ok(DashboardSet {
            subscription_name,
            dashboards,
        })
    }

    async fn fetch_search_snapshot(&self) -> Result<SearchSnapshot, AppError> {
        let indexes = self.search.list_indexes().await?;

        let data_sources = self.search.list_data_sources().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to list search data sources: {}", e);
            Vec::new()
        });
        let indexers = self.search.list_indexers().await.unwrap_or_else(|e| {
            tracing::warn!("Failed to list search indexers: {}", e);
            Vec::new()
        });

        Ok(SearchSnapshot {
            indexes,
            data_sources,
            indexers,
        })
    }
}

/// Portal deep link for a dashboard resource id.
pub fn dashboard_url(dashboard_id: &str, tenant_id: &str) -> Option<String> {
    if dashboard_id.is_empty() || tenant_id.is_empty() {
        return None;
    }
    Some(format!(
        "https://portal.azure.com/#@{}/dashboard/arm{}",
        tenant_id, dashboard_id
    ))
}

fn str_field<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
    row.get(key).and_then(Value::as_str)
}

/// Shape one Resource Graph row into a dashboard.
pub fn map_dashboard(row: &Value, subscription_name: &str, settings: &CatalogSettings) -> Dashboard {
    let properties = row.get("properties").cloned().unwrap_or(Value::Null);
    let metadata = properties.get("metadata");
    let name = str_field(row, "name").unwrap_or("Unknown").to_string();

    let display_name = metadata
        .and_then(|m| m.pointer("/model/title"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| name.clone());

    let tags: HashMap<String, String> = row
        .get("tags")
        .and_then(Value::as_object)
        .map(|tags| {
            tags.iter()
                .map(|(k, v)| {
                    let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    (k.clone(), value)
                })
                .collect()
        })
        .unwrap_or_default();
    let is_shared = !tags.contains_key(HIDDEN_TITLE_TAG);

    let metadata_field = |key: &str| {
        metadata
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .unwrap_or("N/A")
            .to_string()
    };

    let id = str_field(row, "id").unwrap_or_default().to_string();
    let portal_url = settings
        .tenant_id
        .as_deref()
        .and_then(|tenant| dashboard_url(&id, tenant));

    Dashboard {
        portal_url,
        name,
        display_name,
        resource_group: str_field(row, "resourceGroup").unwrap_or("N/A").to_string(),
        location: str_field(row, "location").unwrap_or("global").to_string(),
        subscription_id: str_field(row, "subscriptionId")
            .map(str::to_string)
            .or_else(|| settings.subscription_id.clone())
            .unwrap_or_default(),
        subscription_name: subscription_name.to_string(),
        tags,
        is_shared,
        created: metadata_field("created"),
        modified: metadata_field("modified"),
        properties,
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeContainers, FakeDashboards, FakeSearch};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn settings() -> CatalogSettings {
        CatalogSettings {
            tenant_id: Some("tenant-1".to_string()),
            subscription_id: Some("sub-1".to_string()),
        }
    }

    #[test]
    fn test_map_dashboard_uses_model_title() {
        let row = json!({
            "id": "/subscriptions/sub-1/resourceGroups/rg-monitoring/providers/Microsoft.Portal/dashboards/d1",
            "name": "d1",
            "resourceGroup": "rg-monitoring",
            "location": "koreacentral",
            "tags": {"Environment": "Production"},
            "properties": {"metadata": {"model": {"title": "Monitoring"}, "created": "2025-01-01"}}
        });

        let dashboard = map_dashboard(&row, "Prod subscription", &settings());
        assert_eq!(dashboard.display_name, "Monitoring");
        assert_eq!(dashboard.name, "d1");
        assert!(dashboard.is_shared);
        assert_eq!(dashboard.created, "2025-01-01");
        assert_eq!(dashboard.modified, "N/A");
        assert_eq!(dashboard.subscription_id, "sub-1");
        assert_eq!(dashboard.subscription_name, "Prod subscription");
        assert_eq!(
            dashboard.portal_url.as_deref(),
            Some("https://portal.azure.com/#@tenant-1/dashboard/arm/subscriptions/sub-1/resourceGroups/rg-monitoring/providers/Microsoft.Portal/dashboards/d1")
        );
    }

    #[test]
    fn test_map_dashboard_private_and_defaults() {
        let row = json!({"id": "/x", "name": "mine", "tags": {"hidden-title": "My board"}});
        let dashboard = map_dashboard(&row, "s", &CatalogSettings::default());

        assert!(!dashboard.is_shared);
        assert_eq!(dashboard.display_name, "mine");
        assert_eq!(dashboard.resource_group, "N/A");
        assert_eq!(dashboard.location, "global");
        assert!(dashboard.portal_url.is_none());
    }

    #[test]
    fn test_dashboard_url_requires_both_parts() {
        assert!(dashboard_url("", "tenant").is_none());
        assert!(dashboard_url("/id", "").is_none());
    }

    #[tokio::test]
    async fn test_container_listing_cached_until_refresh() {
        let containers = Arc::new(FakeContainers::with_names(&["documents"]));
        let catalog = ResourceCatalog::new(
            containers.clone(),
            Arc::new(FakeSearch::default()),
            Arc::new(FakeDashboards::default()),
            settings(),
        );

        let first = catalog.containers().await;
        let second = catalog.containers().await;
        assert_eq!(first.items.len(), 1);
        assert_eq!(first.fetched_at, second.fetched_at);
        assert_eq!(containers.calls.load(Ordering::SeqCst), 1);

        catalog.refresh_containers().await;
        catalog.containers().await;
        assert_eq!(containers.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_container_failure_becomes_warning() {
        let catalog = ResourceCatalog::new(
            Arc::new(FakeContainers::failing("AZURE_STORAGE_ACCOUNT_NAME is not set")),
            Arc::new(FakeSearch::default()),
            Arc::new(FakeDashboards::default()),
            settings(),
        );

        let listing = catalog.containers().await;
        assert!(listing.items.is_empty());
        assert!(listing.fetched_at.is_none());
        assert_eq!(listing.warning.as_deref(), Some("AZURE_STORAGE_ACCOUNT_NAME is not set"));
    }

    #[tokio::test]
    async fn test_dashboards_listing() {
        let dashboards = FakeDashboards {
            subscription: Some("Prod".to_string()),
            rows: vec![json!({"id": "/a", "name": "a"}), json!({"id": "/b", "name": "b", "tags": {"hidden-title": "b"}})],
        };
        let catalog = ResourceCatalog::new(
            Arc::new(FakeContainers::default()),
            Arc::new(FakeSearch::default()),
            Arc::new(dashboards),
            settings(),
        );

        let (listing, subscription) = catalog.dashboards().await;
        assert_eq!(subscription.as_deref(), Some("Prod"));
        assert_eq!(listing.items.len(), 2);
        assert!(listing.items[0].is_shared);
        assert!(!listing.items[1].is_shared);
    }

    #[tokio::test]
    async fn test_search_snapshot_tolerates_missing_linkage() {
        let search = FakeSearch {
            indexes: Some(vec![crate::models::SearchIndexDescriptor::new("documents-index", 3)]),
            data_sources: None,
            indexers: None,
            ..Default::default()
        };
        let catalog = ResourceCatalog::new(
            Arc::new(FakeContainers::default()),
            Arc::new(search),
            Arc::new(FakeDashboards::default()),
            settings(),
        );

        let snapshot = catalog.search_snapshot().await.unwrap();
        assert_eq!(snapshot.value.indexes.len(), 1);
        assert!(snapshot.value.data_sources.is_empty());
        assert!(snapshot.value.indexers.is_empty());
    }
}
