//! Configuration module for the dashboard hub.
//!
//! All configuration is loaded from environment variables (optionally via `.env`).
//! Every Azure setting is optional; features degrade when theirs is missing.

use std::collections::BTreeMap;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Serialize;

use crate::errors::AppError;

/// Chat-completion (Azure OpenAI) settings.
#[derive(Debug, Clone, Default)]
pub struct OpenAiConfig {
    pub endpoint: Option<String>,
    pub deployment: String,
    pub api_version: String,
    pub api_key: Option<String>,
}

/// Azure AI Search settings.
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub endpoint: Option<String>,
    /// Default/fallback index name
    pub default_index: Option<String>,
    pub api_key: Option<String>,
}

/// Identity settings used to pick a credential.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub client_secret: Option<String>,
    /// App Service managed identity endpoint; IMDS is used when absent
    pub msi_endpoint: Option<String>,
    pub msi_header: Option<String>,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub search: SearchConfig,
    pub identity: IdentityConfig,
    /// Required for container enumeration
    pub storage_account: Option<String>,
    /// Required for dashboard enumeration
    pub subscription_id: Option<String>,
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to the notice JSON document
    pub notices_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of the human-readable format
    pub log_json: bool,
}

pub const DEFAULT_DEPLOYMENT: &str = "gpt-4.1-mini";
pub const DEFAULT_API_VERSION: &str = "2024-05-01-preview";

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let openai = OpenAiConfig {
            endpoint: var("AZURE_OPENAI_ENDPOINT").or_else(|| var("ENDPOINT_URL")),
            deployment: var("AZURE_OPENAI_DEPLOYMENT")
                .or_else(|| var("DEPLOYMENT_NAME"))
                .unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string()),
            api_version: var("AZURE_OPENAI_API_VERSION")
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            api_key: var("AZURE_OPENAI_API_KEY"),
        };

        let search = SearchConfig {
            endpoint: var("AZURE_SEARCH_ENDPOINT"),
            default_index: var("AZURE_SEARCH_INDEX"),
            api_key: var("AZURE_SEARCH_KEY"),
        };

        let identity = IdentityConfig {
            client_id: var("AZURE_CLIENT_ID"),
            tenant_id: var("AZURE_TENANT_ID"),
            client_secret: var("AZURE_CLIENT_SECRET"),
            msi_endpoint: var("IDENTITY_ENDPOINT"),
            msi_header: var("IDENTITY_HEADER"),
        };

        let bind_addr = var("HUB_BIND_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|e| AppError::Configuration(format!("Invalid HUB_BIND_ADDR format: {}", e)))?;

        Ok(Self {
            openai,
            search,
            identity,
            storage_account: var("AZURE_STORAGE_ACCOUNT_NAME"),
            subscription_id: var("AZURE_SUBSCRIPTION_ID"),
            api_psk: var("HUB_API_PSK"),
            notices_path: var("HUB_NOTICES_PATH")
                .unwrap_or_else(|| "./data/notices.json".to_string())
                .into(),
            bind_addr,
            log_level: var("HUB_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: var("HUB_LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Which settings are present, never their values.
    pub fn status(&self) -> ConfigStatus {
        let mut variables = BTreeMap::new();
        variables.insert("AZURE_OPENAI_ENDPOINT", self.openai.endpoint.is_some());
        variables.insert("AZURE_OPENAI_API_KEY", self.openai.api_key.is_some());
        variables.insert("AZURE_SEARCH_ENDPOINT", self.search.endpoint.is_some());
        variables.insert("AZURE_SEARCH_INDEX", self.search.default_index.is_some());
        variables.insert("AZURE_SEARCH_KEY", self.search.api_key.is_some());
        variables.insert("AZURE_STORAGE_ACCOUNT_NAME", self.storage_account.is_some());
        variables.insert("AZURE_SUBSCRIPTION_ID", self.subscription_id.is_some());

        let service_principal = self.identity.client_id.is_some()
            && self.identity.tenant_id.is_some()
            && self.identity.client_secret.is_some();

        ConfigStatus {
            variables,
            deployment: self.openai.deployment.clone(),
            api_version: self.openai.api_version.clone(),
            service_principal,
        }
    }
}

/// Presence report for the diagnostics endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigStatus {
    pub variables: BTreeMap<&'static str, bool>,
    pub deployment: String,
    pub api_version: String,
    pub service_principal: bool,
}
