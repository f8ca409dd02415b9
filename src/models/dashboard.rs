//! Azure Portal dashboard model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Tag the portal puts on private (unshared) dashboards.
pub const HIDDEN_TITLE_TAG: &str = "hidden-title";

/// A portal dashboard as returned by Resource Graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub resource_group: String,
    pub location: String,
    pub subscription_id: String,
    pub subscription_name: String,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    pub is_shared: bool,
    #[serde(default)]
    pub properties: serde_json::Value,
    pub created: String,
    pub modified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portal_url: Option<String>,
}

/// Share-state filter for dashboard listings.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShareFilter {
    #[default]
    All,
    Shared,
    Private,
}

impl ShareFilter {
    pub fn matches(&self, dashboard: &Dashboard) -> bool {
        match self {
            ShareFilter::All => true,
            ShareFilter::Shared => dashboard.is_shared,
            ShareFilter::Private => !dashboard.is_shared,
        }
    }
}

/// Counts shown above the dashboard table.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total: usize,
    pub shared: usize,
    pub private: usize,
    pub resource_groups: Vec<String>,
}

impl DashboardSummary {
    pub fn of(dashboards: &[Dashboard]) -> Self {
        let shared = dashboards.iter().filter(|d| d.is_shared).count();
        let mut resource_groups: Vec<String> =
            dashboards.iter().map(|d| d.resource_group.clone()).collect();
        resource_groups.sort();
        resource_groups.dedup();

        Self {
            total: dashboards.len(),
            shared,
            private: dashboards.len() - shared,
            resource_groups,
        }
    }
}
