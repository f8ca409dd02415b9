//! Grounded-question routing.
//!
//! Decides per question whether to ground the completion on a search index and
//! normalizes whatever the provider returns into a [`ChatAnswer`].

use std::sync::Arc;

use serde_json::Value;

use crate::azure::{ChatCompletion, ChatRequest, GroundingAuth, GroundingSource};
use crate::errors::AppError;
use crate::models::{ChatAnswer, Citation, IndexUsage, StorageContainer};
use crate::resolver::{symmetric_match, IndexResolver};

/// Container label meaning "no container selected".
pub const GENERAL_QUESTION: &str = "general question";
/// Index value meaning "the user opted out of grounding".
pub const NO_INDEX: &str = "NO_INDEX";

/// Decorations appended to container labels.
pub const INDEXED_MARKER: &str = " 🔍";
pub const DESCRIPTION_MARKER: &str = " (";

/// Strip label decorations, leaving the container name.
pub fn extract_container_name(label: &str) -> &str {
    let end = [INDEXED_MARKER, DESCRIPTION_MARKER]
        .iter()
        .filter_map(|marker| label.find(marker))
        .min()
        .unwrap_or(label.len());
    label[..end].trim()
}

/// Label shown for a container: name, index marker, then description.
pub fn container_label(container: &StorageContainer, indexed: bool) -> String {
    let mut label = container.name.clone();
    if indexed {
        label.push_str(INDEXED_MARKER);
    }
    if let Some(description) = container.description() {
        label.push_str(DESCRIPTION_MARKER);
        label.push_str(description);
        label.push(')');
    }
    label
}

/// Selectable container labels, the general-question entry first.
///
/// `indexed_names` are container names referenced by search data sources.
pub fn container_options(containers: &[StorageContainer], indexed_names: &[String]) -> Vec<String> {
    let mut options = Vec::with_capacity(containers.len() + 1);
    options.push(GENERAL_QUESTION.to_string());
    options.extend(containers.iter().map(|container| {
        let indexed = indexed_names
            .iter()
            .any(|name| symmetric_match(&container.name, name));
        container_label(container, indexed)
    }));
    options
}

pub fn is_general_question(label: &str) -> bool {
    let label = label.trim();
    label.is_empty() || label.eq_ignore_ascii_case(GENERAL_QUESTION)
}

/// What to do with one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePlan {
    /// User opted out; plain completion, reported as unused
    OptedOut,
    /// Ground on the index the user picked
    Explicit(String),
    /// Ground on whatever the container resolves to, if anything
    ResolveContainer(String),
    /// Plain completion, grounding never considered
    General,
}

pub fn plan_route(container_label: &str, explicit_index: Option<&str>) -> RoutePlan {
    let explicit = explicit_index.map(str::trim).filter(|i| !i.is_empty());
    match explicit {
        Some(NO_INDEX) => RoutePlan::OptedOut,
        Some(index) => RoutePlan::Explicit(index.to_string()),
        None if is_general_question(container_label) => RoutePlan::General,
        None => RoutePlan::ResolveContainer(extract_container_name(container_label).to_string()),
    }
}

fn citation_from(value: &Value) -> Citation {
    if let Some(text) = value.as_str() {
        return Citation {
            title: Some(text.to_string()),
            url: None,
            id: None,
        };
    }

    Citation {
        title: first_str(value, &["title"]),
        url: first_str(value, &["url", "filepath"]),
        id: first_str(value, &["id", "chunk_id"]),
    }
}

fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Pull the answer text and citations out of a provider response.
///
/// Citations only come from a `context` object on the message.
pub fn normalize_completion(response: &Value) -> Result<(String, Vec<Citation>), AppError> {
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| AppError::Upstream("Chat completion returned no choices".to_string()))?;

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let citations = message
        .get("context")
        .filter(|context| context.is_object())
        .and_then(|context| context.get("citations"))
        .and_then(Value::as_array)
        .map(|items| items.iter().map(citation_from).collect())
        .unwrap_or_default();

    Ok((content, citations))
}

/// Routes questions to the chat-completion service.
pub struct QuestionRouter {
    chat: Arc<dyn ChatCompletion>,
    resolver: Arc<IndexResolver>,
    search_endpoint: Option<String>,
    search_key: Option<String>,
}

impl QuestionRouter {
    pub fn new(
        chat: Arc<dyn ChatCompletion>,
        resolver: Arc<IndexResolver>,
        search_endpoint: Option<String>,
        search_key: Option<String>,
    ) -> Self {
        Self {
            chat,
            resolver,
            search_endpoint,
            search_key,
        }
    }

    fn require_search_endpoint(&self) -> Result<&str, AppError> {
        self.search_endpoint.as_deref().ok_or_else(|| {
            AppError::Configuration(
                "AZURE_SEARCH_ENDPOINT is required for grounded questions".to_string(),
            )
        })
    }

    fn grounding_source(&self, endpoint: &str, index: &str) -> GroundingSource {
        let auth = match &self.search_key {
            Some(key) => GroundingAuth::ApiKey { key: key.clone() },
            None => GroundingAuth::SystemAssignedManagedIdentity,
        };
        GroundingSource::azure_search(endpoint, index, auth)
    }

    /// Answer `query`, grounded or not according to the label and index choice.
    pub async fn ask(
        &self,
        query: &str,
        container_label: &str,
        explicit_index: Option<&str>,
    ) -> Result<ChatAnswer, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Question is required".to_string()));
        }

        let (request, index_used) = match plan_route(container_label, explicit_index) {
            RoutePlan::OptedOut => (ChatRequest::plain(query), Some(IndexUsage::Unused)),
            RoutePlan::General => (ChatRequest::plain(query), None),
            RoutePlan::Explicit(index) => {
                let endpoint = self.require_search_endpoint()?;
                let source = self.grounding_source(endpoint, &index);
                (ChatRequest::grounded(query, source), Some(IndexUsage::Index(index)))
            }
            RoutePlan::ResolveContainer(container) => {
                let endpoint = self.require_search_endpoint()?;
                match self.resolver.index_for_container(&container).await {
                    Some(index) => {
                        tracing::info!("Container {} resolved to index {}", container, index);
                        let source = self.grounding_source(endpoint, &index);
                        (ChatRequest::grounded(query, source), Some(IndexUsage::Index(index)))
                    }
                    None => {
                        tracing::info!("No index for container {}, asking without grounding", container);
                        (ChatRequest::plain(query), None)
                    }
                }
            }
        };

        let response = self.chat.complete(&request).await?;
        let (content, citations) = normalize_completion(&response)?;

        Ok(ChatAnswer {
            content,
            citations,
            index_used,
            container_label: container_label.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSettings, ResourceCatalog};
    use crate::models::{SearchIndexDescriptor, SearchSnapshot};
    use crate::testing::{completion, FakeChat, FakeContainers, FakeDashboards, FakeSearch};
    use serde_json::json;

    fn resolver(search: FakeSearch) -> Arc<IndexResolver> {
        let catalog = Arc::new(ResourceCatalog::new(
            Arc::new(FakeContainers::default()),
            Arc::new(search),
            Arc::new(FakeDashboards::default()),
            CatalogSettings::default(),
        ));
        Arc::new(IndexResolver::new(catalog, None))
    }

    fn docs_search() -> FakeSearch {
        FakeSearch::from_snapshot(SearchSnapshot {
            indexes: vec![SearchIndexDescriptor::new("documents-index", 5)],
            ..Default::default()
        })
    }

    fn router(chat: Arc<FakeChat>, search: FakeSearch, endpoint: Option<&str>) -> QuestionRouter {
        QuestionRouter::new(chat, resolver(search), endpoint.map(str::to_string), None)
    }

    #[test]
    fn test_extract_container_name() {
        assert_eq!(extract_container_name("docs 🔍"), "docs");
        assert_eq!(extract_container_name("docs (Team handbook)"), "docs");
        assert_eq!(extract_container_name("docs 🔍 (Team handbook)"), "docs");
        assert_eq!(extract_container_name("docs 🔍 (2 indexes)"), "docs");
        assert_eq!(extract_container_name("docs"), "docs");
    }

    #[test]
    fn test_container_options_round_trip_names() {
        use crate::testing::container;

        let containers = vec![
            container("documents", Some("Team handbook")),
            container("images", None),
        ];
        let options = container_options(&containers, &["documents".to_string()]);

        assert_eq!(
            options,
            vec![
                GENERAL_QUESTION.to_string(),
                "documents 🔍 (Team handbook)".to_string(),
                "images".to_string(),
            ]
        );
        assert_eq!(extract_container_name(&options[1]), "documents");
        assert_eq!(extract_container_name(&options[2]), "images");
    }

    #[test]
    fn test_plan_route_table() {
        assert_eq!(plan_route("docs", Some(NO_INDEX)), RoutePlan::OptedOut);
        assert_eq!(plan_route(GENERAL_QUESTION, Some(NO_INDEX)), RoutePlan::OptedOut);
        assert_eq!(
            plan_route(GENERAL_QUESTION, Some("code-index")),
            RoutePlan::Explicit("code-index".to_string())
        );
        assert_eq!(
            plan_route("docs 🔍", Some("")),
            RoutePlan::ResolveContainer("docs".to_string())
        );
        assert_eq!(plan_route("docs 🔍", None), RoutePlan::ResolveContainer("docs".to_string()));
        assert_eq!(plan_route(GENERAL_QUESTION, None), RoutePlan::General);
        assert_eq!(plan_route("", Some("  ")), RoutePlan::General);
    }

    #[test]
    fn test_normalize_completion_with_citations() {
        let response = completion(
            "Use logger.info",
            Some(json!({"citations": [
                {"title": "main.py", "url": "https://acct.blob.core.windows.net/code/main.py", "chunk_id": "0"},
                {"title": "util.py", "filepath": "util.py"},
                "raw citation"
            ]})),
        );

        let (content, citations) = normalize_completion(&response).unwrap();
        assert_eq!(content, "Use logger.info");
        assert_eq!(citations.len(), 3);
        assert_eq!(citations[0].id.as_deref(), Some("0"));
        assert_eq!(citations[1].url.as_deref(), Some("util.py"));
        assert_eq!(citations[2].title.as_deref(), Some("raw citation"));
    }

    #[test]
    fn test_normalize_completion_without_context() {
        let (_, citations) = normalize_completion(&completion("hi", None)).unwrap();
        assert!(citations.is_empty());

        let (_, citations) = normalize_completion(&completion("hi", Some(json!("intent text")))).unwrap();
        assert!(citations.is_empty());

        assert!(normalize_completion(&json!({"choices": []})).is_err());
    }

    #[tokio::test]
    async fn test_general_question_not_grounded() {
        let chat = Arc::new(FakeChat::answering("plain answer"));
        let router = router(chat.clone(), docs_search(), Some("https://search.example.net"));

        let answer = router.ask("What is AKS?", GENERAL_QUESTION, Some("")).await.unwrap();
        assert_eq!(answer.content, "plain answer");
        assert_eq!(answer.index_used, None);
        assert_eq!(chat.requests()[0].data_sources, None);
    }

    #[tokio::test]
    async fn test_container_label_grounded_on_resolved_index() {
        let chat = Arc::new(FakeChat::answering("grounded answer"));
        let router = router(chat.clone(), docs_search(), Some("https://search.example.net"));

        let answer = router.ask("Summarize", "documents 🔍", Some("")).await.unwrap();
        assert_eq!(answer.index_used, Some(IndexUsage::Index("documents-index".to_string())));
        assert_eq!(answer.container_label, "documents 🔍");

        let request = &chat.requests()[0];
        assert_eq!(request.grounding_index(), Some("documents-index"));
        let source = &request.data_sources.as_ref().unwrap()[0];
        assert_eq!(source.parameters.endpoint, "https://search.example.net");
        assert_eq!(
            source.parameters.authentication,
            GroundingAuth::SystemAssignedManagedIdentity
        );
    }

    #[tokio::test]
    async fn test_opt_out_reports_unused() {
        let chat = Arc::new(FakeChat::answering("plain"));
        let router = router(chat.clone(), docs_search(), None);

        let answer = router.ask("q", "docs", Some(NO_INDEX)).await.unwrap();
        assert_eq!(answer.index_used, Some(IndexUsage::Unused));
        assert!(chat.requests()[0].data_sources.is_none());
    }

    #[tokio::test]
    async fn test_unresolved_container_falls_back_to_plain() {
        let chat = Arc::new(FakeChat::answering("plain"));
        let router = router(chat.clone(), FakeSearch::default(), Some("https://search.example.net"));

        let answer = router.ask("q", "docs", None).await.unwrap();
        assert_eq!(answer.index_used, None);
        assert!(chat.requests()[0].data_sources.is_none());
    }

    #[tokio::test]
    async fn test_explicit_index_uses_search_key() {
        let chat = Arc::new(FakeChat::answering("ok"));
        let router = QuestionRouter::new(
            chat.clone(),
            resolver(FakeSearch::default()),
            Some("https://search.example.net".to_string()),
            Some("search-key".to_string()),
        );

        router.ask("q", GENERAL_QUESTION, Some("code-index")).await.unwrap();
        let request = &chat.requests()[0];
        assert_eq!(request.grounding_index(), Some("code-index"));
        assert_eq!(
            request.data_sources.as_ref().unwrap()[0].parameters.authentication,
            GroundingAuth::ApiKey {
                key: "search-key".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_search_endpoint_fails_before_network() {
        let chat = Arc::new(FakeChat::answering("never"));
        let search = docs_search();
        let router = router(chat.clone(), search, None);

        let err = router.ask("q", GENERAL_QUESTION, Some("code-index")).await.unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");

        let err = router.ask("q", "docs", None).await.unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");

        assert!(chat.requests().is_empty());
    }

    #[tokio::test]
    async fn test_chat_failure_is_surfaced() {
        let chat = Arc::new(FakeChat::failing("deployment not found"));
        let router = router(chat, docs_search(), None);

        let err = router.ask("q", GENERAL_QUESTION, None).await.unwrap_err();
        assert_eq!(err, AppError::Upstream("deployment not found".to_string()));
    }

    #[tokio::test]
    async fn test_blank_question_rejected() {
        let chat = Arc::new(FakeChat::answering("never"));
        let router = router(chat.clone(), docs_search(), None);

        let err = router.ask("   ", GENERAL_QUESTION, None).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(chat.requests().is_empty());
    }
}
