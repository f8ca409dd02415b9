//! Dashboard Hub Backend
//!
//! REST backend for browsing Azure dashboards, storage containers and search
//! indexes, asking grounded questions, and tracking coding-standard notices.

mod api;
mod auth;
mod azure;
mod cache;
mod catalog;
mod config;
mod credential;
mod errors;
mod models;
mod notices;
mod resolver;
mod router;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use azure::{
    AzureOpenAiClient, BlobStorageClient, ChatCompletion, ContainerSource, DashboardSource,
    ResourceGraphClient, SearchCatalog, SearchServiceClient,
};
use catalog::{CatalogSettings, ResourceCatalog};
use config::Config;
use credential::{
    ServiceAuth, TokenProvider, COGNITIVE_SERVICES_SCOPE, MANAGEMENT_SCOPE, SEARCH_SCOPE,
    STORAGE_SCOPE,
};
use notices::NoticeStore;
use resolver::IndexResolver;
use router::QuestionRouter;

/// Upper bound for one outgoing Azure call; grounded completions can be slow.
const HTTP_TIMEOUT_SECS: u64 = 120;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<ResourceCatalog>,
    pub resolver: Arc<IndexResolver>,
    pub router: Arc<QuestionRouter>,
    pub notices: Arc<NoticeStore>,
}

/// The external services the hub talks to.
pub struct ExternalServices {
    pub containers: Arc<dyn ContainerSource>,
    pub search: Arc<dyn SearchCatalog>,
    pub dashboards: Arc<dyn DashboardSource>,
    pub chat: Arc<dyn ChatCompletion>,
}

impl ExternalServices {
    /// Azure REST clients, each authenticated by key or by token.
    fn azure(config: &Config) -> Result<Self, errors::AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        let tokens = Arc::new(TokenProvider::new(http.clone(), &config.identity));
        tracing::info!("Using credential {:?}", tokens.credential());

        let chat_auth = ServiceAuth::for_service(
            config.openai.api_key.as_deref(),
            &tokens,
            COGNITIVE_SERVICES_SCOPE,
        );
        let search_auth =
            ServiceAuth::for_service(config.search.api_key.as_deref(), &tokens, SEARCH_SCOPE);

        Ok(Self {
            containers: Arc::new(BlobStorageClient::new(
                http.clone(),
                config.storage_account.clone(),
                ServiceAuth::for_service(None, &tokens, STORAGE_SCOPE),
            )),
            search: Arc::new(SearchServiceClient::new(
                http.clone(),
                config.search.endpoint.clone(),
                search_auth,
            )),
            dashboards: Arc::new(ResourceGraphClient::new(
                http.clone(),
                config.subscription_id.clone(),
                ServiceAuth::for_service(None, &tokens, MANAGEMENT_SCOPE),
            )),
            chat: Arc::new(AzureOpenAiClient::new(
                http,
                config.openai.endpoint.clone(),
                config.openai.deployment.clone(),
                config.openai.api_version.clone(),
                chat_auth,
            )),
        })
    }
}

/// Wire the components together around `services`.
pub async fn build_state(config: Config, services: ExternalServices) -> AppState {
    let catalog = Arc::new(ResourceCatalog::new(
        services.containers,
        services.search,
        services.dashboards,
        CatalogSettings {
            tenant_id: config.identity.tenant_id.clone(),
            subscription_id: config.subscription_id.clone(),
        },
    ));
    let resolver = Arc::new(IndexResolver::new(
        catalog.clone(),
        config.search.default_index.clone(),
    ));
    let router = Arc::new(QuestionRouter::new(
        services.chat,
        resolver.clone(),
        config.search.endpoint.clone(),
        config.search.api_key.clone(),
    ));
    let notices = Arc::new(NoticeStore::open(config.notices_path.clone()).await);

    AppState {
        config: Arc::new(config),
        catalog,
        resolver,
        router,
        notices,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting Dashboard Hub Backend");
    tracing::info!("Notices path: {:?}", config.notices_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!("Chat deployment: {}", config.openai.deployment);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (HUB_API_PSK). Authentication is disabled!");
    }
    for (name, present) in config.status().variables {
        if !present {
            tracing::warn!("{} is not set; dependent features will be unavailable", name);
        }
    }

    let services = ExternalServices::azure(&config)?;
    let bind_addr = config.bind_addr;
    let state = build_state(config, services).await;

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Dashboards
        .route("/dashboards", get(api::list_dashboards))
        .route("/dashboards/refresh", post(api::refresh_dashboards))
        // Storage containers
        .route("/containers", get(api::list_containers))
        .route("/containers/refresh", post(api::refresh_containers))
        .route("/containers/{name}/indexes", get(api::container_indexes))
        .route("/containers/{name}/default-index", get(api::container_default_index))
        // Search service
        .route("/search/indexes", get(api::list_indexes))
        .route("/search/connections", get(api::list_connections))
        // Questions
        .route("/chat", post(api::ask_question))
        // Notices
        .route("/notices", get(api::list_notices))
        .route("/notices", post(api::create_notice))
        .route("/notices", delete(api::clear_notices))
        .route("/notices/{position}", delete(api::delete_notice))
        .route("/notices/{position}/check", post(api::check_notice))
        // Diagnostics
        .route("/diagnostics", get(api::diagnostics))
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod testing;
