//! Blob Storage container listing.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

use super::ContainerSource;
use crate::credential::ServiceAuth;
use crate::errors::AppError;
use crate::models::StorageContainer;

const STORAGE_API_VERSION: &str = "2021-08-06";

#[derive(Debug, Deserialize)]
struct EnumerationResults {
    #[serde(rename = "Containers", default)]
    containers: ContainerList,
    #[serde(rename = "NextMarker", default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerList {
    #[serde(rename = "Container", default)]
    items: Vec<ContainerEntry>,
}

#[derive(Debug, Deserialize)]
struct ContainerEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Properties")]
    properties: ContainerProperties,
    #[serde(rename = "Metadata", default)]
    metadata: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ContainerProperties {
    #[serde(rename = "Last-Modified", default)]
    last_modified: String,
    #[serde(rename = "PublicAccess", default)]
    public_access: Option<String>,
}

/// One page of a List Containers response and the marker for the next.
fn parse_container_page(xml: &str) -> Result<(Vec<StorageContainer>, Option<String>), AppError> {
    let page: EnumerationResults = quick_xml::de::from_str(xml)?;

    let containers = page
        .containers
        .items
        .into_iter()
        .map(|entry| StorageContainer {
            name: entry.name,
            last_modified: entry.properties.last_modified,
            metadata: entry.metadata,
            public_access_level: entry.properties.public_access.filter(|p| !p.is_empty()),
        })
        .collect();

    let next_marker = page.next_marker.filter(|m| !m.trim().is_empty());
    Ok((containers, next_marker))
}

/// Lists containers through the Blob service REST API.
pub struct BlobStorageClient {
    http: Client,
    account: Option<String>,
    auth: ServiceAuth,
}

impl BlobStorageClient {
    pub fn new(http: Client, account: Option<String>, auth: ServiceAuth) -> Self {
        Self { http, account, auth }
    }
}

#[async_trait]
impl ContainerSource for BlobStorageClient {
    async fn list_containers(&self) -> Result<Vec<StorageContainer>, AppError> {
        let account = self.account.as_deref().ok_or_else(|| {
            AppError::Configuration("AZURE_STORAGE_ACCOUNT_NAME is not set".to_string())
        })?;
        let url = format!("https://{}.blob.core.windows.net/", account);

        let mut containers = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut query = vec![("comp", "list".to_string()), ("include", "metadata".to_string())];
            if let Some(m) = &marker {
                query.push(("marker", m.clone()));
            }

            let request = self
                .http
                .get(&url)
                .query(&query)
                .header("x-ms-version", STORAGE_API_VERSION)
                .header(
                    "x-ms-date",
                    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
                );
            let response = self.auth.apply(request).await?.send().await?;

            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(AppError::Upstream(format!(
                    "Blob storage request failed with status {}",
                    status
                )));
            }

            let (page, next) = parse_container_page(&body)?;
            containers.extend(page);
            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        tracing::debug!("Listed {} containers from {}", containers.len(), account);
        Ok(containers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ServiceEndpoint="https://acct.blob.core.windows.net/">
  <Containers>
    <Container>
      <Name>documents</Name>
      <Properties>
        <Last-Modified>Tue, 30 Sep 2025 08:12:00 GMT</Last-Modified>
        <Etag>"0x8DB"</Etag>
        <PublicAccess>blob</PublicAccess>
      </Properties>
      <Metadata>
        <description>Team handbook</description>
      </Metadata>
    </Container>
    <Container>
      <Name>source-code</Name>
      <Properties>
        <Last-Modified>Wed, 01 Oct 2025 01:00:00 GMT</Last-Modified>
      </Properties>
    </Container>
  </Containers>
  <NextMarker>/acct/source-code</NextMarker>
</EnumerationResults>"#;

    #[test]
    fn test_parse_container_page() {
        let (containers, next) = parse_container_page(PAGE).unwrap();

        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].name, "documents");
        assert_eq!(containers[0].last_modified, "Tue, 30 Sep 2025 08:12:00 GMT");
        assert_eq!(containers[0].public_access_level.as_deref(), Some("blob"));
        assert_eq!(containers[0].description(), Some("Team handbook"));
        assert_eq!(containers[1].name, "source-code");
        assert!(containers[1].metadata.is_empty());
        assert!(containers[1].public_access_level.is_none());
        assert_eq!(next.as_deref(), Some("/acct/source-code"));
    }

    #[test]
    fn test_parse_last_page() {
        let xml = r#"<EnumerationResults><Containers /><NextMarker /></EnumerationResults>"#;
        let (containers, next) = parse_container_page(xml).unwrap();
        assert!(containers.is_empty());
        assert!(next.is_none());
    }
}
