//! Connection diagnostics endpoint.

use axum::extract::State;
use serde::Serialize;

use super::{success, ApiResult};
use crate::config::ConfigStatus;
use crate::models::IndexChain;
use crate::resolver::index_chains;
use crate::AppState;

/// Containers probed for a default index.
const SAMPLE_CONTAINERS: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProbe {
    pub container: String,
    pub default_index: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub config: ConfigStatus,
    pub index_chains: Vec<IndexChain>,
    pub containers: Vec<ContainerProbe>,
    pub warnings: Vec<String>,
}

/// GET /api/diagnostics - Configuration and index linkage overview.
pub async fn diagnostics(State(state): State<AppState>) -> ApiResult<DiagnosticsReport> {
    let mut warnings = Vec::new();

    let chains = match state.catalog.search_snapshot().await {
        Ok(entry) => index_chains(&entry.value),
        Err(e) => {
            warnings.push(format!("Search service: {}", e.message()));
            Vec::new()
        }
    };

    let listing = state.catalog.containers().await;
    if let Some(warning) = listing.warning {
        warnings.push(format!("Storage: {}", warning));
    }

    let mut containers = Vec::new();
    for container in listing.items.iter().take(SAMPLE_CONTAINERS) {
        containers.push(ContainerProbe {
            container: container.name.clone(),
            default_index: state.resolver.index_for_container(&container.name).await,
        });
    }

    success(DiagnosticsReport {
        config: state.config.status(),
        index_chains: chains,
        containers,
        warnings,
    })
}
