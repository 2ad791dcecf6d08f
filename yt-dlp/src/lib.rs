//! Async Rust wrapper for the yt-dlp CLI.
//!
//! Probes a URL for the streams a format selector resolves to, and runs
//! downloads while streaming structured progress back to the caller.
//!
//! # Example
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use yt_dlp::{DownloadOptions, OutputFormat, YtDlp};
//!
//! #[tokio::main]
//! async fn main() -> yt_dlp::Result<()> {
//!     let client = YtDlp::new();
//!
//!     let version = client.check_binary().await?;
//!     println!("yt-dlp version: {}", version);
//!
//!     let options = DownloadOptions::new()
//!         .format(OutputFormat::Selector("bestvideo+bestaudio/best".to_string()))
//!         .output_template("%(title)s.%(ext)s");
//!
//!     let info = client.probe("https://www.youtube.com/watch?v=dQw4w9WgXcQ", &options).await?;
//!     println!("Title: {}", info.title);
//!
//!     let finished = client
//!         .download_with_hook("https://www.youtube.com/watch?v=dQw4w9WgXcQ", &options, |p| {
//!             println!("{:.1}%", p.percent());
//!             ControlFlow::Continue(())
//!         })
//!         .await?;
//!     println!("Saved to {:?}", finished.artifact_path());
//!
//!     Ok(())
//! }
//! ```

mod client;
mod command;
pub mod error;
pub mod types;

pub use client::YtDlp;
pub use error::{Error, Result};
pub use types::{
    AudioExtraction, Container, DownloadEvent, DownloadOptions, DownloadProgress, Format, OutputFormat,
    ProgressStatus, RequestedDownload, VideoInfo, format_bytes, format_duration
};
