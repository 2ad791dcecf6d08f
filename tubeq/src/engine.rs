use std::ops::ControlFlow;

use async_trait::async_trait;
use tokio::sync::RwLock;
use yt_dlp::{DownloadOptions, DownloadProgress, VideoInfo, YtDlp};

/// The extraction engine the orchestrator drives.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Metadata and selected streams for `url`, without downloading.
    async fn probe(&self, url: &str, options: &DownloadOptions) -> yt_dlp::Result<VideoInfo>;

    /// Downloads `url`. `on_progress` returning `Break` aborts the transfer with
    /// `yt_dlp::Error::Cancelled`.
    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut (dyn for<'p> FnMut(&'p DownloadProgress) -> ControlFlow<()> + Send)
    ) -> yt_dlp::Result<VideoInfo>;
}

#[async_trait]
impl MediaEngine for RwLock<YtDlp> {
    async fn probe(&self, url: &str, options: &DownloadOptions) -> yt_dlp::Result<VideoInfo> {
        let client = self.read().await.clone();
        client.probe(url, options).await
    }

    async fn download(
        &self,
        url: &str,
        options: &DownloadOptions,
        on_progress: &mut (dyn for<'p> FnMut(&'p DownloadProgress) -> ControlFlow<()> + Send)
    ) -> yt_dlp::Result<VideoInfo> {
        let client = self.read().await.clone();
        client.download_with_hook(url, options, on_progress).await
    }
}
