mod options;
mod progress;
mod video_info;

pub use options::{AudioExtraction, Container, DownloadOptions, OutputFormat};
pub use progress::{DownloadEvent, DownloadProgress, ProgressStatus, format_bytes, format_duration};
pub use video_info::{Format, RequestedDownload, VideoInfo};
