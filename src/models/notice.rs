//! Coding-standard notice model.
//!
//! Field names follow the on-disk JSON document so existing notice files load as-is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Citation;

/// One before/after snippet pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeChange {
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
}

impl CodeChange {
    pub fn is_blank(&self) -> bool {
        self.before.trim().is_empty() && self.after.trim().is_empty()
    }
}

/// Outcome classes for a before/after pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceState {
    /// The old pattern is absent, so the rule does not apply
    NotApplicable,
    /// The old pattern is still present alongside the new one
    PartiallyApplied,
    /// The old pattern is present and the new one is nowhere
    NonCompliant,
}

/// Model verdict for a single code change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PairCheckResult {
    /// 1-based position, only set when the notice has several changes
    pub change_index: Option<usize>,
    pub before_code: String,
    pub after_code: String,
    /// Raw model answer, or the failure message
    pub ai_analysis: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ComplianceState>,
}

/// One compliance-check run against a container/index pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceCheckResult {
    pub container: String,
    pub index: String,
    pub timestamp: String,
    pub results: Vec<PairCheckResult>,
}

/// A coding-standard change announcement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    #[serde(rename = "desc", default)]
    pub description: String,
    #[serde(rename = "lang", default = "default_language")]
    pub code_language: String,
    #[serde(default)]
    pub code_changes: Vec<CodeChange>,
    #[serde(default)]
    pub timestamp: String,
    /// Latest result per `container|index` key
    #[serde(
        rename = "ai_check_results_by_env",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub check_results: BTreeMap<String, ComplianceCheckResult>,
    /// Single-pair layout used by older notice files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

fn default_language() -> String {
    "text".to_string()
}

impl Notice {
    /// The recorded pairs, falling back to the legacy single pair.
    pub fn effective_code_changes(&self) -> Vec<CodeChange> {
        if !self.code_changes.is_empty() {
            return self.code_changes.clone();
        }
        match &self.before {
            Some(before) if !before.is_empty() => vec![CodeChange {
                before: before.clone(),
                after: self.after.clone().unwrap_or_default(),
            }],
            _ => Vec::new(),
        }
    }

    /// Whether `other` is the same submission, whatever check results either holds.
    pub fn is_same_submission(&self, other: &Notice) -> bool {
        self.title == other.title
            && self.timestamp == other.timestamp
            && self.description == other.description
            && self.code_language == other.code_language
            && self.code_changes == other.code_changes
            && self.before == other.before
            && self.after == other.after
    }

    /// Key under which a check result for this environment is stored.
    pub fn environment_key(container: &str, index: &str) -> String {
        format!("{}|{}", container, index)
    }
}

/// Request body for submitting a notice.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoticeRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub code_language: Option<String>,
    #[serde(default)]
    pub code_changes: Vec<CodeChange>,
}

/// Request body for running a compliance check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceCheckRequest {
    pub container: String,
    pub index: String,
}
