//! In-process fakes for the external service traits.

use std::collections::VecDeque;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::azure::{ChatCompletion, ChatRequest, ContainerSource, DashboardSource, SearchCatalog};
use crate::errors::AppError;
use crate::models::{DataSourceConnection, Indexer, SearchIndexDescriptor, SearchSnapshot, StorageContainer};

fn unreachable_service(what: &str) -> AppError {
    AppError::Upstream(format!("{} unreachable", what))
}

#[derive(Default)]
pub struct FakeContainers {
    pub containers: Vec<StorageContainer>,
    pub error: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeContainers {
    pub fn with_names(names: &[&str]) -> Self {
        Self {
            containers: names.iter().map(|name| container(name, None)).collect(),
            ..Default::default()
        }
    }

    pub fn with_containers(containers: Vec<StorageContainer>) -> Self {
        Self {
            containers,
            ..Default::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

pub fn container(name: &str, description: Option<&str>) -> StorageContainer {
    let mut metadata = HashMap::new();
    if let Some(description) = description {
        metadata.insert("description".to_string(), description.to_string());
    }
    StorageContainer {
        name: name.to_string(),
        last_modified: "Mon, 06 Jan 2025 00:00:00 GMT".to_string(),
        metadata,
        public_access_level: None,
    }
}

#[async_trait]
impl ContainerSource for FakeContainers {
    async fn list_containers(&self) -> Result<Vec<StorageContainer>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(message) => Err(AppError::Configuration(message.clone())),
            None => Ok(self.containers.clone()),
        }
    }
}

/// `None` listings fail as if the service were down.
#[derive(Default)]
pub struct FakeSearch {
    pub indexes: Option<Vec<SearchIndexDescriptor>>,
    pub data_sources: Option<Vec<DataSourceConnection>>,
    pub indexers: Option<Vec<Indexer>>,
    pub calls: AtomicUsize,
}

impl FakeSearch {
    pub fn from_snapshot(snapshot: SearchSnapshot) -> Self {
        Self {
            indexes: Some(snapshot.indexes),
            data_sources: Some(snapshot.data_sources),
            indexers: Some(snapshot.indexers),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchCatalog for FakeSearch {
    async fn list_indexes(&self) -> Result<Vec<SearchIndexDescriptor>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.indexes
            .clone()
            .ok_or_else(|| unreachable_service("Search indexes"))
    }

    async fn list_data_sources(&self) -> Result<Vec<DataSourceConnection>, AppError> {
        self.data_sources
            .clone()
            .ok_or_else(|| unreachable_service("Search data sources"))
    }

    async fn list_indexers(&self) -> Result<Vec<Indexer>, AppError> {
        self.indexers
            .clone()
            .ok_or_else(|| unreachable_service("Search indexers"))
    }
}

/// `subscription: None` fails the whole dashboard fetch.
#[derive(Default)]
pub struct FakeDashboards {
    pub subscription: Option<String>,
    pub rows: Vec<Value>,
}

#[async_trait]
impl DashboardSource for FakeDashboards {
    async fn subscription_name(&self) -> Result<String, AppError> {
        self.subscription
            .clone()
            .ok_or_else(|| AppError::Configuration("AZURE_SUBSCRIPTION_ID is not set".to_string()))
    }

    async fn query_dashboards(&self) -> Result<Vec<Value>, AppError> {
        Ok(self.rows.clone())
    }
}

/// Provider-shaped completion body.
pub fn completion(content: &str, context: Option<Value>) -> Value {
    let mut message = json!({"role": "assistant", "content": content});
    if let Some(context) = context {
        message["context"] = context;
    }
    json!({"choices": [{"index": 0, "message": message}]})
}

/// Replays scripted replies in order, repeating the last one, and records requests.
pub struct FakeChat {
    replies: Mutex<VecDeque<Result<Value, AppError>>>,
    last: Mutex<Option<Result<Value, AppError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl FakeChat {
    pub fn scripted(replies: Vec<Result<Value, AppError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn answering(content: &str) -> Self {
        Self::scripted(vec![Ok(completion(content, None))])
    }

    pub fn failing(message: &str) -> Self {
        Self::scripted(vec![Err(AppError::Upstream(message.to_string()))])
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatCompletion for FakeChat {
    async fn complete(&self, request: &ChatRequest) -> Result<Value, AppError> {
        self.requests.lock().unwrap().push(request.clone());

        let next = self.replies.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(reply) = next {
            *last = Some(reply);
        }
        last.clone()
            .unwrap_or_else(|| Err(AppError::Internal("no scripted reply".to_string())))
    }
}
