use axum::{
    http::StatusCode,
    response::{IntoResponse, Response}
};

use crate::models::PresetError;
use crate::queue::QueueError;

/// Why a single job did not produce its artifact.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("metadata probe failed: {0}")]
    Probe(String),

    #[error("requested format is not available: {0}")]
    FormatBuild(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("merge failed: {0}")]
    Merge(String),

    #[error("rename failed: {0}")]
    Rename(String),

    #[error("cancelled by user")]
    Cancelled
}

impl JobError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }

    pub fn probe(err: &yt_dlp::Error) -> Self {
        JobError::Probe(err.to_string())
    }
}

impl From<yt_dlp::Error> for JobError {
    fn from(err: yt_dlp::Error) -> Self {
        match err {
            yt_dlp::Error::Cancelled => JobError::Cancelled,
            yt_dlp::Error::UnsupportedFormat(message) => JobError::FormatBuild(message),
            yt_dlp::Error::MergeFailed(message) => JobError::Merge(message),
            yt_dlp::Error::DownloadFailed(message) => JobError::Download(message),
            other => JobError::Download(other.to_string())
        }
    }
}

#[derive(Debug)]
pub struct AppError {
    pub message: String,
    pub status: StatusCode
}

impl AppError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::NOT_FOUND
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::BAD_REQUEST
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::CONFLICT
        }
    }

    #[allow(clippy::needless_pass_by_value)]
    pub fn queue(err: QueueError) -> Self {
        match err {
            QueueError::Busy => Self::conflict(err.to_string()),
            QueueError::NotFound(_) => Self::not_found(err.to_string()),
            QueueError::Empty => Self::bad_request(err.to_string()),
            QueueError::Stopped => Self::internal(err.to_string())
        }
    }

    #[allow(clippy::needless_pass_by_value)]
    pub fn preset(err: PresetError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("handler error: {}", self.message);
        (self.status, self.message).into_response()
    }
}

impl<E: std::error::Error> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobId;

    #[test]
    fn test_engine_errors_are_classified() {
        assert_eq!(JobError::from(yt_dlp::Error::Cancelled), JobError::Cancelled);
        assert!(matches!(
            JobError::from(yt_dlp::Error::from_message("Requested format is not available")),
            JobError::FormatBuild(_)
        ));
        assert!(matches!(
            JobError::from(yt_dlp::Error::MergeFailed("ffmpeg exited".to_string())),
            JobError::Merge(_)
        ));
        assert!(matches!(
            JobError::from(yt_dlp::Error::CommandFailed {
                code: 1,
                stderr: "boom".to_string()
            }),
            JobError::Download(_)
        ));
    }

    #[test]
    fn test_queue_errors_map_to_status_codes() {
        assert_eq!(AppError::queue(QueueError::Busy).status, StatusCode::CONFLICT);
        assert_eq!(AppError::queue(QueueError::Empty).status, StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::queue(QueueError::NotFound(JobId::from("x".to_string()))).status,
            StatusCode::NOT_FOUND
        );
    }
}
