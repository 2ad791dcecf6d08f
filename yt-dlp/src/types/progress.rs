use super::VideoInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Error,
    Other
}

impl ProgressStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "downloading" => Self::Downloading,
            "finished" => Self::Finished,
            "error" => Self::Error,
            _ => Self::Other
        }
    }
}

/// One progress tick, as reported by yt-dlp's progress template.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadProgress {
    pub status: ProgressStatus,
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
    pub speed: Option<f64>,
    pub eta: Option<f64>
}

impl DownloadProgress {
    pub fn downloading(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        Self {
            status: ProgressStatus::Downloading,
            downloaded_bytes,
            total_bytes,
            speed: None,
            eta: None
        }
    }

    pub fn finished(total_bytes: u64) -> Self {
        Self {
            status: ProgressStatus::Finished,
            downloaded_bytes: total_bytes,
            total_bytes: Some(total_bytes),
            speed: None,
            eta: None
        }
    }

    /// Completion in percent. A finished file is always 100 regardless of byte counts.
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        if self.status == ProgressStatus::Finished {
            return 100.0;
        }
        match self.total_bytes {
            Some(total) if total > 0 => (self.downloaded_bytes as f64 / total as f64 * 100.0).min(100.0),
            _ => 0.0
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status == ProgressStatus::Finished
    }

    pub fn format_speed(&self) -> String {
        match self.speed {
            Some(s) if s > 0.0 => format!("{}/s", format_bytes(s)),
            _ => "Unknown B/s".to_string()
        }
    }

    pub fn format_eta(&self) -> String {
        self.eta.map_or_else(|| "Unknown".to_string(), format_duration)
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn format_size(&self) -> String {
        let done = format_bytes(self.downloaded_bytes as f64);
        match self.total_bytes {
            Some(total) if total > 0 => format!("{done} of {}", format_bytes(total as f64)),
            _ => format!("{done} of Unknown")
        }
    }
}

/// Binary-prefixed size with two decimals ("1.50 MB").
pub fn format_bytes(bytes: f64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes.max(0.0);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}

/// `MM:SS`, or `HH:MM:SS` once an hour is reached.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(seconds: f64) -> String {
    let secs = seconds.max(0.0) as u64;
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    if hours > 0 {
        format!("{hours:02}:{mins:02}:{:02}", secs % 60)
    } else {
        format!("{mins:02}:{:02}", secs % 60)
    }
}

#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Extracting { url: String },
    DownloadStarted { filename: String },
    Progress(DownloadProgress),
    MergingFormats,
    PostProcessing { status: String },
    Finished { info: Box<VideoInfo> },
    Warning { message: String },
    Error { message: String }
}

impl DownloadEvent {
    pub fn is_finished(&self) -> bool {
        matches!(self, DownloadEvent::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_from_bytes() {
        let progress = DownloadProgress::downloading(512, Some(2048));
        assert!((progress.percent() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_percent_unknown_total() {
        let progress = DownloadProgress::downloading(512, None);
        assert!(progress.percent().abs() < f64::EPSILON);
    }

    #[test]
    fn test_finished_is_full() {
        let mut progress = DownloadProgress::finished(10);
        progress.downloaded_bytes = 3;
        assert!((progress.percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512.0), "512.00 B");
        assert_eq!(format_bytes(1536.0), "1.50 KB");
        assert_eq!(format_bytes(3.0 * 1024.0 * 1024.0), "3.00 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(75.0), "01:15");
        assert_eq!(format_duration(3725.0), "01:02:05");
    }

    #[test]
    fn test_format_size_without_total() {
        let progress = DownloadProgress::downloading(2048, None);
        assert_eq!(progress.format_size(), "2.00 KB of Unknown");
        assert_eq!(progress.format_speed(), "Unknown B/s");
        assert_eq!(progress.format_eta(), "Unknown");
    }
}
