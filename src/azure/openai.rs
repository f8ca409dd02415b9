//! Azure OpenAI chat completions with the Azure Search grounding extension.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use super::{base_url, read_json, ChatCompletion};
use crate::credential::ServiceAuth;
use crate::errors::AppError;

/// Generation parameters shared by every call site.
pub const MAX_TOKENS: u32 = 1024;
pub const TEMPERATURE: f32 = 0.7;
pub const TOP_P: f32 = 0.95;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// How the grounding extension authenticates against the search service.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GroundingAuth {
    ApiKey { key: String },
    SystemAssignedManagedIdentity,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchParameters {
    pub endpoint: String,
    pub index_name: String,
    pub authentication: GroundingAuth,
}

/// Entry of the `data_sources` extension array.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GroundingSource {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub parameters: SearchParameters,
}

impl GroundingSource {
    pub fn azure_search(endpoint: &str, index_name: &str, auth: GroundingAuth) -> Self {
        Self {
            kind: "azure_search",
            parameters: SearchParameters {
                endpoint: endpoint.to_string(),
                index_name: index_name.to_string(),
                authentication: auth,
            },
        }
    }
}

/// Chat-completion request body.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_sources: Option<Vec<GroundingSource>>,
}

impl ChatRequest {
    /// A single user message, no grounding.
    pub fn plain(query: &str) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: "user",
                content: query.to_string(),
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            data_sources: None,
        }
    }

    /// A single user message grounded on one search index.
    pub fn grounded(query: &str, source: GroundingSource) -> Self {
        Self {
            data_sources: Some(vec![source]),
            ..Self::plain(query)
        }
    }

    /// Index the request is grounded on, if any.
    pub fn grounding_index(&self) -> Option<&str> {
        self.data_sources
            .as_ref()
            .and_then(|sources| sources.first())
            .map(|source| source.parameters.index_name.as_str())
    }
}

/// Azure OpenAI deployment client.
pub struct AzureOpenAiClient {
    http: Client,
    endpoint: Option<String>,
    deployment: String,
    api_version: String,
    auth: ServiceAuth,
}

impl AzureOpenAiClient {
    pub fn new(
        http: Client,
        endpoint: Option<String>,
        deployment: String,
        api_version: String,
        auth: ServiceAuth,
    ) -> Self {
        Self {
            http,
            endpoint,
            deployment,
            api_version,
            auth,
        }
    }
}

#[async_trait]
impl ChatCompletion for AzureOpenAiClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Value, AppError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .ok_or_else(|| AppError::Configuration("AZURE_OPENAI_ENDPOINT is not set".to_string()))?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions",
            base_url(endpoint),
            self.deployment
        );

        tracing::info!(
            deployment = %self.deployment,
            grounded_on = request.grounding_index().unwrap_or("-"),
            "Requesting chat completion"
        );

        let builder = self
            .http
            .post(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .json(request);
        let response = self.auth.apply(builder).await?.send().await?;
        read_json(response, "Chat completion").await
    }
}
