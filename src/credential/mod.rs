//! Credential resolution and token acquisition for Azure services.
//!
//! The credential kind is decided once from configuration; the network is only
//! touched when a token is actually needed.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::IdentityConfig;
use crate::errors::AppError;

pub const COGNITIVE_SERVICES_SCOPE: &str = "https://cognitiveservices.azure.com/.default";
pub const SEARCH_SCOPE: &str = "https://search.azure.com/.default";
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

const IMDS_TOKEN_URL: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Tokens closer than this to expiry are re-acquired.
const EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// Which identity to authenticate as.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    ServicePrincipal {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    ManagedIdentity {
        /// User-assigned identity; system-assigned when `None`
        client_id: Option<String>,
    },
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ServicePrincipal {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
            Credential::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
        }
    }
}

/// Pick a credential from the configured fields alone.
///
/// A complete service-principal triple wins; anything less means managed identity,
/// with a lone client id treated as a user-assigned identity.
pub fn resolve_credential(identity: &IdentityConfig) -> Credential {
    match (
        &identity.tenant_id,
        &identity.client_id,
        &identity.client_secret,
    ) {
        (Some(tenant_id), Some(client_id), Some(client_secret)) => Credential::ServicePrincipal {
            tenant_id: tenant_id.clone(),
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
        },
        _ => Credential::ManagedIdentity {
            client_id: identity.client_id.clone(),
        },
    }
}

/// Authorization handle for one external service.
#[derive(Clone)]
pub enum ServiceAuth {
    /// Pre-shared key sent in the `api-key` header
    ApiKey(String),
    /// Bearer token for `scope`, acquired through the shared provider
    Bearer {
        provider: std::sync::Arc<TokenProvider>,
        scope: &'static str,
    },
}

impl ServiceAuth {
    /// Key auth when a key is configured, token auth otherwise.
    pub fn for_service(
        api_key: Option<&str>,
        provider: &std::sync::Arc<TokenProvider>,
        scope: &'static str,
    ) -> Self {
        match api_key {
            Some(key) => ServiceAuth::ApiKey(key.to_string()),
            None => ServiceAuth::Bearer {
                provider: provider.clone(),
                scope,
            },
        }
    }

    /// Attach credentials to an outgoing request.
    pub async fn apply(&self, request: RequestBuilder) -> Result<RequestBuilder, AppError> {
        match self {
            ServiceAuth::ApiKey(key) => Ok(request.header("api-key", key)),
            ServiceAuth::Bearer { provider, scope } => {
                let token = provider.token(scope).await?;
                Ok(request.bearer_auth(token))
            }
        }
    }
}

impl std::fmt::Debug for ServiceAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceAuth::ApiKey(_) => f.write_str("ApiKey(..)"),
            ServiceAuth::Bearer { scope, .. } => f.debug_struct("Bearer").field("scope", scope).finish(),
        }
    }
}

#[derive(Clone, Debug)]
struct TokenInfo {
    access_token: String,
    expires_at: Instant,
}

/// Acquires and caches access tokens per scope.
pub struct TokenProvider {
    client: Client,
    credential: Credential,
    msi_endpoint: Option<String>,
    msi_header: Option<String>,
    tokens: Mutex<HashMap<String, TokenInfo>>,
}

impl TokenProvider {
    pub fn new(client: Client, identity: &IdentityConfig) -> Self {
        Self {
            client,
            credential: resolve_credential(identity),
            msi_endpoint: identity.msi_endpoint.clone(),
            msi_header: identity.msi_header.clone(),
            tokens: Mutex::new(HashMap::new()),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Get a valid token for `scope`, acquiring one if needed.
    pub async fn token(&self, scope: &str) -> Result<String, AppError> {
        let mut tokens = self.tokens.lock().await;
        if let Some(info) = tokens.get(scope) {
            if info.expires_at > Instant::now() + EXPIRY_BUFFER {
                return Ok(info.access_token.clone());
            }
        }

        let info = self.acquire(scope).await?;
        let token = info.access_token.clone();
        tokens.insert(scope.to_string(), info);
        Ok(token)
    }

    async fn acquire(&self, scope: &str) -> Result<TokenInfo, AppError> {
        let response = match &self.credential {
            Credential::ServicePrincipal {
                tenant_id,
                client_id,
                client_secret,
            } => {
                tracing::debug!("Acquiring service principal token for {}", scope);
                let url = format!(
                    "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
                    tenant_id
                );
                self.client
                    .post(&url)
                    .form(&[
                        ("grant_type", "client_credentials"),
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("scope", scope),
                    ])
                    .send()
                    .await?
            }
            Credential::ManagedIdentity { client_id } => {
                tracing::debug!("Acquiring managed identity token for {}", scope);
                let resource = scope.trim_end_matches("/.default");
                let mut query = vec![("resource", resource.to_string())];
                if let Some(id) = client_id {
                    query.push(("client_id", id.clone()));
                }

                let request = match (&self.msi_endpoint, &self.msi_header) {
                    (Some(endpoint), Some(header)) => {
                        query.push(("api-version", "2019-08-01".to_string()));
                        self.client
                            .get(endpoint)
                            .header("X-IDENTITY-HEADER", header)
                    }
                    _ => {
                        query.push(("api-version", "2018-02-01".to_string()));
                        self.client.get(IMDS_TOKEN_URL).header("Metadata", "true")
                    }
                };
                request.query(&query).send().await?
            }
        };

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            let detail = body
                .get("error_description")
                .or_else(|| body.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("no detail");
            return Err(AppError::Upstream(format!(
                "Token request failed with status {}: {}",
                status, detail
            )));
        }

        parse_token_response(&body)
    }
}

/// `expires_in` is a number from Entra ID but a string from IMDS.
fn parse_token_response(body: &Value) -> Result<TokenInfo, AppError> {
    let access_token = body
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Upstream("Token response has no access_token".to_string()))?;

    let expires_in = match body.get("expires_in") {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
    .unwrap_or(3600);

    Ok(TokenInfo {
        access_token: access_token.to_string(),
        expires_at: Instant::now() + Duration::from_secs(expires_in),
    })
}
