//! Normalized chat answer model.

use serde::{Deserialize, Serialize};

/// A document the model cited while answering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Whether grounding happened for an answer.
///
/// Absence (`None` on the answer) means grounding was never attempted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum IndexUsage {
    /// The caller opted out of grounding
    Unused,
    /// Grounded on this index
    Index(String),
}

/// One answer from the chat-completion service, whatever path produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatAnswer {
    pub content: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    pub index_used: Option<IndexUsage>,
    pub container_label: String,
}
