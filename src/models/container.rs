//! Blob Storage container model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A named bucket in the storage account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageContainer {
    pub name: String,
    /// RFC 1123 timestamp as reported by the service
    pub last_modified: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_access_level: Option<String>,
}

impl StorageContainer {
    /// The `description` metadata entry, if set and non-blank.
    pub fn description(&self) -> Option<&str> {
        self.metadata
            .get("description")
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
    }
}
