use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Preset;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(uuid7::uuid7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    SucceededFallback,
    Canceled,
    Failed
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Queued | JobStatus::Running)
    }

    pub fn is_success(self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::SucceededFallback)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::SucceededFallback => "succeeded_fallback",
            JobStatus::Canceled => "canceled",
            JobStatus::Failed => "failed"
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub url: String,
    pub preset: Preset,
    pub status: JobStatus,
    pub result_path: Option<PathBuf>,
    pub title: Option<String>,
    pub error: Option<String>,
    pub created_at: String
}

impl Job {
    pub fn new(url: impl Into<String>, preset: Preset) -> Self {
        Self {
            id: JobId::generate(),
            url: url.into(),
            preset,
            status: JobStatus::Queued,
            result_path: None,
            title: None,
            error: None,
            created_at: chrono::Utc::now().to_rfc3339()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_is_queued_with_unique_id() {
        let a = Job::new("https://example.com/a", Preset::default());
        let b = Job::new("https://example.com/b", Preset::default());
        assert_eq!(a.status, JobStatus::Queued);
        assert_ne!(a.id, b.id);
        assert!(a.title.is_none());
    }

    #[test]
    fn test_status_classification() {
        assert!(JobStatus::SucceededFallback.is_success());
        assert!(JobStatus::Canceled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert_eq!(
            serde_json::to_string(&JobStatus::SucceededFallback).unwrap(),
            "\"succeeded_fallback\""
        );
    }
}
