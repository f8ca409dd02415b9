//! File-backed notice store.
//!
//! The whole list lives in one JSON document that is rewritten on every
//! mutation. Reads are permissive: a missing or unreadable file is an empty list.

pub mod compliance;

use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::fs;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::{ComplianceCheckResult, CreateNoticeRequest, Notice};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock time in the notice timestamp format.
pub fn local_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Validate a submission and turn it into a notice.
pub fn build_notice(request: CreateNoticeRequest) -> Result<Notice, AppError> {
    let title = request.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }

    let code_changes: Vec<_> = request
        .code_changes
        .into_iter()
        .filter(|change| !change.is_blank())
        .collect();
    if code_changes.is_empty() {
        return Err(AppError::Validation(
            "At least one code change with before or after code is required".to_string(),
        ));
    }

    let code_language = request
        .code_language
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
        .unwrap_or_else(|| "text".to_string());

    Ok(Notice {
        title: title.to_string(),
        description: request.description.trim().to_string(),
        code_language,
        code_changes,
        timestamp: local_timestamp(),
        check_results: Default::default(),
        before: None,
        after: None,
    })
}

/// Newest-first notice list backed by a JSON file.
pub struct NoticeStore {
    path: PathBuf,
    notices: RwLock<Vec<Notice>>,
}

impl NoticeStore {
    /// Load the list from `path`; the file is created on the first write.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let notices = load(&path).await;
        tracing::info!("Loaded {} notices from {:?}", notices.len(), path);
        Self {
            path,
            notices: RwLock::new(notices),
        }
    }

    pub async fn list(&self) -> Vec<Notice> {
        self.notices.read().await.clone()
    }

    pub async fn get(&self, position: usize) -> Result<Notice, AppError> {
        self.notices
            .read()
            .await
            .get(position)
            .cloned()
            .ok_or_else(|| not_found(position))
    }

    /// Insert at the front and persist.
    pub async fn append(&self, notice: Notice) -> Result<(), AppError> {
        let mut notices = self.notices.write().await;
        let mut updated = Vec::with_capacity(notices.len() + 1);
        updated.push(notice);
        updated.extend(notices.iter().cloned());

        self.persist(&updated).await?;
        *notices = updated;
        Ok(())
    }

    /// Remove the notice at `position` and persist.
    pub async fn delete(&self, position: usize) -> Result<Notice, AppError> {
        let mut notices = self.notices.write().await;
        if position >= notices.len() {
            return Err(not_found(position));
        }

        let mut updated = notices.clone();
        let removed = updated.remove(position);

        self.persist(&updated).await?;
        *notices = updated;
        Ok(removed)
    }

    pub async fn clear_all(&self) -> Result<(), AppError> {
        let mut notices = self.notices.write().await;
        self.persist(&[]).await?;
        notices.clear();
        Ok(())
    }

    /// Store `result` on `checked` under its `container|index` key, replacing
    /// any earlier one.
    ///
    /// `position` is where `checked` was when the check started. The list may
    /// have shifted since, so the notice is located again by content and a
    /// notice deleted in the meantime is `NotFound`.
    pub async fn record_check_result(
        &self,
        position: usize,
        checked: &Notice,
        result: ComplianceCheckResult,
    ) -> Result<Notice, AppError> {
        let mut notices = self.notices.write().await;
        let current = if notices
            .get(position)
            .is_some_and(|n| n.is_same_submission(checked))
        {
            position
        } else {
            let moved = notices
                .iter()
                .position(|n| n.is_same_submission(checked))
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Notice '{}' was removed before its check finished",
                        checked.title
                    ))
                })?;
            tracing::info!("Notice '{}' moved from {} to {}", checked.title, position, moved);
            moved
        };

        let mut updated = notices.clone();
        let notice = &mut updated[current];

        let key = Notice::environment_key(&result.container, &result.index);
        notice.check_results.insert(key, result);
        let notice = notice.clone();

        self.persist(&updated).await?;
        *notices = updated;
        Ok(notice)
    }

    /// Full rewrite through a sibling temp file.
    async fn persist(&self, notices: &[Notice]) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let body = serde_json::to_vec_pretty(notices)
            .map_err(|e| AppError::Internal(format!("Failed to encode notices: {}", e)))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &self.path).await?;

        tracing::debug!("Persisted {} notices to {:?}", notices.len(), self.path);
        Ok(())
    }
}

fn not_found(position: usize) -> AppError {
    AppError::NotFound(format!("Notice {} not found", position))
}

/// Read the notice list, treating any failure as empty.
pub async fn load(path: &Path) -> Vec<Notice> {
    let body = match fs::read(path).await {
        Ok(body) => body,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read notices from {:?}: {}", path, e);
            }
            return Vec::new();
        }
    };

    serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable notice file {:?}: {}", path, e);
        Vec::new()
    })
}
