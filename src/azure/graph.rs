//! ARM subscription lookup and Resource Graph dashboard query.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{read_json, DashboardSource};
use crate::credential::ServiceAuth;
use crate::errors::AppError;

const MANAGEMENT_URL: &str = "https://management.azure.com";
const SUBSCRIPTION_API_VERSION: &str = "2022-12-01";
const RESOURCE_GRAPH_API_VERSION: &str = "2021-03-01";

pub const DASHBOARD_QUERY: &str = "Resources | where type =~ 'microsoft.portal/dashboards' \
| project id, name, resourceGroup, location, subscriptionId, tags, properties";

/// Management-plane client scoped to one subscription.
pub struct ResourceGraphClient {
    http: Client,
    subscription_id: Option<String>,
    auth: ServiceAuth,
}

impl ResourceGraphClient {
    pub fn new(http: Client, subscription_id: Option<String>, auth: ServiceAuth) -> Self {
        Self {
            http,
            subscription_id,
            auth,
        }
    }

    fn subscription(&self) -> Result<&str, AppError> {
        self.subscription_id
            .as_deref()
            .ok_or_else(|| AppError::Configuration("AZURE_SUBSCRIPTION_ID is not set".to_string()))
    }
}

#[async_trait]
impl DashboardSource for ResourceGraphClient {
    async fn subscription_name(&self) -> Result<String, AppError> {
        let subscription = self.subscription()?;
        let url = format!("{}/subscriptions/{}", MANAGEMENT_URL, subscription);

        let request = self
            .http
            .get(&url)
            .query(&[("api-version", SUBSCRIPTION_API_VERSION)]);
        let body = read_json(self.auth.apply(request).await?.send().await?, "Subscription").await?;

        Ok(body
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or(subscription)
            .to_string())
    }

    async fn query_dashboards(&self) -> Result<Vec<Value>, AppError> {
        let subscription = self.subscription()?;
        let url = format!("{}/providers/Microsoft.ResourceGraph/resources", MANAGEMENT_URL);

        let mut rows = Vec::new();
        let mut skip_token: Option<String> = None;
        loop {
            let mut body = json!({
                "subscriptions": [subscription],
                "query": DASHBOARD_QUERY,
            });
            if let Some(token) = &skip_token {
                body["options"] = json!({ "$skipToken": token });
            }

            let request = self
                .http
                .post(&url)
                .query(&[("api-version", RESOURCE_GRAPH_API_VERSION)])
                .json(&body);
            let page = read_json(self.auth.apply(request).await?.send().await?, "Resource Graph").await?;

            if let Some(Value::Array(data)) = page.get("data") {
                rows.extend(data.iter().cloned());
            }
            skip_token = page
                .get("$skipToken")
                .and_then(Value::as_str)
                .map(str::to_string);
            if skip_token.is_none() {
                break;
            }
        }

        tracing::debug!("Resource Graph returned {} dashboards", rows.len());
        Ok(rows)
    }
}
