use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("yt-dlp binary not executable: {0}")]
    BinaryNotExecutable(PathBuf),

    #[error("failed to execute yt-dlp: {0}")]
    ExecutionFailed(#[from] std::io::Error),

    #[error("yt-dlp command failed with exit code {code}: {stderr}")]
    CommandFailed { code: i32, stderr: String },

    #[error("failed to parse JSON output: {0}")]
    JsonParseFailed(#[from] serde_json::Error),

    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("merge failed: {0}")]
    MergeFailed(String),

    #[error("operation cancelled")]
    Cancelled
}

impl Error {
    /// Sorts a yt-dlp `ERROR:` message into the matching variant.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("requested format is not available") {
            Error::UnsupportedFormat(message)
        } else if lower.contains("postprocessing")
            || lower.contains("merger")
            || lower.contains("ffmpeg")
            || lower.contains("conversion failed")
        {
            Error::MergeFailed(message)
        } else {
            Error::DownloadFailed(message)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_message_classification() {
        assert!(matches!(
            Error::from_message("Requested format is not available. Use --list-formats"),
            Error::UnsupportedFormat(_)
        ));
        assert!(matches!(
            Error::from_message("Postprocessing: Conversion failed!"),
            Error::MergeFailed(_)
        ));
        assert!(matches!(
            Error::from_message("unable to download video data: HTTP Error 403"),
            Error::DownloadFailed(_)
        ));
    }
}
