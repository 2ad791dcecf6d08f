use std::ops::ControlFlow;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use futures_core::Stream;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::StreamExt;

use crate::command::CommandBuilder;
use crate::error::{Error, Result};
use crate::types::{DownloadEvent, DownloadOptions, DownloadProgress, ProgressStatus, VideoInfo};

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    cookies_file: Option<PathBuf>,
    extra_args: Vec<String>,
    ffmpeg_location: Option<PathBuf>
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

impl YtDlp {
    pub fn new() -> Self {
        Self::with_binary("yt-dlp")
    }

    pub fn with_binary(path: impl Into<PathBuf>) -> Self {
        Self {
            binary: path.into(),
            cookies_file: None,
            extra_args: Vec::new(),
            ffmpeg_location: None
        }
    }

    pub fn set_binary(&mut self, path: PathBuf) {
        self.binary = path;
    }

    /// Cookie file used when a request does not carry its own.
    pub fn set_cookies_file(&mut self, path: Option<PathBuf>) {
        self.cookies_file = path;
    }

    pub fn set_extra_args(&mut self, args: Vec<String>) {
        self.extra_args = args;
    }

    pub fn set_ffmpeg_location(&mut self, path: Option<PathBuf>) {
        self.ffmpeg_location = path;
    }

    pub async fn check_binary(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(Error::BinaryNotExecutable(self.binary.clone()))
        }
    }

    /// Resolves metadata and the concrete streams `options` would select, without downloading.
    pub async fn probe(&self, url: &str, options: &DownloadOptions) -> Result<VideoInfo> {
        let builder = self.command(options).with_selection(options);
        let builder = if options.playlist {
            builder.single_json_output()
        } else {
            builder.json_output()
        };
        let builder = builder.skip_download().url(url);

        tracing::debug!(args = ?builder.get_args(), "probing with yt-dlp");

        let output = builder.build().output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(Error::CommandFailed {
                code: output.status.code().unwrap_or(-1),
                stderr
            });
        }

        let info: VideoInfo = serde_json::from_slice(&output.stdout)?;
        Ok(info)
    }

    pub fn download_with_progress(
        &self,
        url: &str,
        options: &DownloadOptions
    ) -> Pin<Box<dyn Stream<Item = Result<DownloadEvent>> + Send + 'static>> {
        let url = url.to_string();
        let builder = self
            .command(options)
            .with_options(options)
            .progress_reporting()
            .print_final_info()
            .url(&url);
        let binary = self.binary.clone();

        Box::pin(async_stream::try_stream! {
            yield DownloadEvent::Extracting { url: url.clone() };

            tracing::debug!(
                binary = %binary.display(),
                args = ?builder.get_args(),
                "spawning yt-dlp"
            );

            let mut cmd = builder.build();
            cmd.stdout(Stdio::piped());
            cmd.stderr(Stdio::piped());

            let mut child = cmd.spawn()?;

            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| Error::DownloadFailed("stderr not captured".to_string()))?;
            let stderr_task = tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                let mut last_error: Option<String> = None;
                while let Ok(Some(line)) = reader.next_line().await {
                    tracing::trace!(line = %line, "yt-dlp stderr");
                    if let Some(message) = line.strip_prefix("ERROR:") {
                        last_error = Some(message.trim().to_string());
                    }
                }
                last_error
            });

            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| Error::DownloadFailed("stdout not captured".to_string()))?;
            let mut reader = BufReader::new(stdout).lines();

            while let Some(line) = reader.next_line().await? {
                tracing::trace!(line = %line, "yt-dlp stdout");
                if let Some(event) = parse_output_line(&line) {
                    yield event;
                }
            }

            let status = child.wait().await?;
            let stderr_error = stderr_task.await.ok().flatten();

            if !status.success() {
                yield DownloadEvent::Error {
                    message: stderr_error.unwrap_or_else(|| {
                        format!("yt-dlp exited with code {}", status.code().unwrap_or(-1))
                    })
                };
            }
        })
    }

    /// Runs a download to completion, calling `on_progress` for every progress tick.
    ///
    /// Returning `ControlFlow::Break` from the hook stops the transfer: the child
    /// process is killed and `Error::Cancelled` is returned. Partial files stay on disk.
    pub async fn download_with_hook<F>(
        &self,
        url: &str,
        options: &DownloadOptions,
        mut on_progress: F
    ) -> Result<VideoInfo>
    where
        F: FnMut(&DownloadProgress) -> ControlFlow<()>
    {
        let mut stream = self.download_with_progress(url, options);
        let mut finished: Option<VideoInfo> = None;
        let mut failure: Option<String> = None;

        while let Some(event) = stream.next().await {
            match event? {
                DownloadEvent::Progress(progress) => {
                    if on_progress(&progress).is_break() {
                        tracing::info!(url = %url, "download aborted by progress hook");
                        return Err(Error::Cancelled);
                    }
                }
                DownloadEvent::Finished { info } => finished = Some(*info),
                DownloadEvent::Error { message } => {
                    failure.get_or_insert(message);
                }
                DownloadEvent::Warning { message } => {
                    tracing::warn!(url = %url, "yt-dlp warning: {}", message);
                }
                other => tracing::debug!(url = %url, event = ?other, "yt-dlp event")
            }
        }

        if let Some(message) = failure {
            return Err(Error::from_message(message));
        }

        finished.ok_or_else(|| Error::DownloadFailed("yt-dlp did not report a final file".to_string()))
    }

    fn command(&self, options: &DownloadOptions) -> CommandBuilder {
        let fallback_cookies = if options.cookies_file.is_none() {
            self.cookies_file.as_ref()
        } else {
            None
        };

        let mut builder = CommandBuilder::new(&self.binary)
            .cookies_file_opt(fallback_cookies)
            .args(self.extra_args.iter().map(String::as_str));

        if let Some(ref ffmpeg_path) = self.ffmpeg_location {
            builder = builder.ffmpeg_location(ffmpeg_path);
        }

        builder
    }
}

fn parse_output_line(line: &str) -> Option<DownloadEvent> {
    let line = line.trim();

    if line.is_empty() {
        return None;
    }

    if line.starts_with('{') {
        return match serde_json::from_str::<VideoInfo>(line) {
            Ok(info) => Some(DownloadEvent::Finished {
                info: Box::new(info)
            }),
            Err(e) => {
                tracing::warn!("unparseable info line from yt-dlp: {}", e);
                None
            }
        };
    }

    if let Some(content) = line.strip_prefix("download:") {
        return parse_template_progress(content).map(DownloadEvent::Progress);
    }

    if let Some(filename) = line.strip_prefix("[download] Destination:") {
        return Some(DownloadEvent::DownloadStarted {
            filename: filename.trim().to_string()
        });
    }

    if line.starts_with("[Merger]") || line.contains("Merging formats") {
        return Some(DownloadEvent::MergingFormats);
    }

    if ["[ExtractAudio]", "[VideoRemuxer]", "[EmbedSubtitle]", "[ffmpeg]"]
        .iter()
        .any(|prefix| line.starts_with(prefix))
    {
        return Some(DownloadEvent::PostProcessing {
            status: line.to_string()
        });
    }

    if let Some(message) = line.strip_prefix("WARNING:") {
        return Some(DownloadEvent::Warning {
            message: message.trim().to_string()
        });
    }

    if let Some(message) = line.strip_prefix("ERROR:") {
        return Some(DownloadEvent::Error {
            message: message.trim().to_string()
        });
    }

    None
}

/// Parses `status|downloaded|total|total_estimate|speed|eta` emitted by the progress template.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_template_progress(content: &str) -> Option<DownloadProgress> {
    let parts: Vec<&str> = content.split('|').map(str::trim).collect();
    if parts.len() < 6 {
        return None;
    }

    let total_bytes = parse_number(parts[2])
        .or_else(|| parse_number(parts[3]))
        .map(|b| b as u64);

    Some(DownloadProgress {
        status: ProgressStatus::parse(parts[0]),
        downloaded_bytes: parse_number(parts[1]).map_or(0, |b| b as u64),
        total_bytes,
        speed: parse_number(parts[4]),
        eta: parse_number(parts[5])
    })
}

fn parse_number(s: &str) -> Option<f64> {
    match s {
        "" | "NA" | "None" => None,
        _ => s.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_template_progress() {
        let progress = parse_template_progress("downloading|1048576|4194304|NA|524288.5|6").unwrap();
        assert_eq!(progress.status, ProgressStatus::Downloading);
        assert_eq!(progress.downloaded_bytes, 1_048_576);
        assert_eq!(progress.total_bytes, Some(4_194_304));
        assert_eq!(progress.speed, Some(524_288.5));
        assert_eq!(progress.eta, Some(6.0));
        assert!((progress.percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_template_progress_uses_estimate() {
        let progress = parse_template_progress("downloading|100|NA|400.0|NA|NA").unwrap();
        assert_eq!(progress.total_bytes, Some(400));
        assert_eq!(progress.speed, None);
        assert_eq!(progress.eta, None);
    }

    #[test]
    fn test_parse_template_progress_rejects_short_lines() {
        assert!(parse_template_progress("downloading|100").is_none());
    }

    #[test]
    fn test_parse_output_line_progress() {
        let event = parse_output_line("download:finished|2048|2048|NA|NA|NA");
        assert!(matches!(event, Some(DownloadEvent::Progress(p)) if p.is_finished()));
    }

    #[test]
    fn test_parse_output_line_final_info() {
        let event = parse_output_line(r#"{"id": "xyz", "title": "T", "filepath": "/tmp/T.mp4"}"#);
        match event {
            Some(DownloadEvent::Finished { info }) => {
                assert_eq!(info.id, "xyz");
                assert_eq!(info.artifact_path(), Some(PathBuf::from("/tmp/T.mp4")));
            }
            other => panic!("unexpected event: {other:?}")
        }
    }

    #[test]
    fn test_parse_output_line_destination() {
        let event = parse_output_line("[download] Destination: video.f137.mp4");
        assert!(matches!(event, Some(DownloadEvent::DownloadStarted { filename }) if filename == "video.f137.mp4"));
    }

    #[test]
    fn test_parse_output_line_error() {
        let event = parse_output_line("ERROR: Video unavailable");
        assert!(matches!(event, Some(DownloadEvent::Error { .. })));
    }

    #[test]
    fn test_ytdlp_default() {
        let client = YtDlp::default();
        assert_eq!(client.binary, PathBuf::from("yt-dlp"));
        assert!(client.cookies_file.is_none());
        assert!(client.extra_args.is_empty());
    }

    #[test]
    fn test_request_cookies_override_client_cookies() {
        let mut client = YtDlp::new();
        client.set_cookies_file(Some(PathBuf::from("/data/cookies.txt")));

        let inherited = client.command(&DownloadOptions::new());
        assert_eq!(inherited.get_args(), &["--cookies", "/data/cookies.txt"]);

        let options = DownloadOptions::new().cookies_file(Some(PathBuf::from("/tmp/own.txt")));
        let overridden = client.command(&options).with_selection(&options);
        let args = overridden.get_args();
        assert!(!args.contains(&"/data/cookies.txt".to_string()));
        assert!(args.contains(&"/tmp/own.txt".to_string()));
    }

    #[test]
    fn test_ytdlp_ffmpeg_location() {
        let mut client = YtDlp::new();
        client.set_ffmpeg_location(Some(PathBuf::from("/usr/local/bin/ffmpeg")));
        assert_eq!(client.ffmpeg_location, Some(PathBuf::from("/usr/local/bin/ffmpeg")));
    }
}
