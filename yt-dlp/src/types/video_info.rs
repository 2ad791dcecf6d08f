use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "_type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub webpage_url: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(rename = "_filename", default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub playlist_index: Option<u32>,
    #[serde(default)]
    pub entries: Vec<VideoInfo>,
    #[serde(default)]
    pub formats: Vec<Format>,
    #[serde(default)]
    pub requested_formats: Vec<Format>,
    #[serde(default)]
    pub requested_downloads: Vec<RequestedDownload>,
    #[serde(default)]
    pub subtitles: BTreeMap<String, serde_json::Value>
}

impl VideoInfo {
    pub fn is_playlist(&self) -> bool {
        matches!(self.kind.as_deref(), Some("playlist" | "multi_video")) || !self.entries.is_empty()
    }

    /// Playlist entries, or the info itself for a single video.
    pub fn flatten_entries(&self) -> Vec<&VideoInfo> {
        if self.is_playlist() && !self.entries.is_empty() {
            self.entries.iter().collect()
        } else {
            vec![self]
        }
    }

    pub fn channel_name(&self) -> Option<&str> {
        self.channel.as_deref().or(self.uploader.as_deref())
    }

    /// Video and audio streams picked by the selector. Empty when the selector
    /// fell through to a single muxed stream.
    pub fn selected_formats(&self) -> (Option<&Format>, Option<&Format>) {
        let mut video = None;
        let mut audio = None;
        for format in &self.requested_formats {
            if format.has_video() && video.is_none() {
                video = Some(format);
            } else if format.has_audio() && audio.is_none() {
                audio = Some(format);
            }
        }
        (video, audio)
    }

    /// Where the engine left the final file.
    pub fn artifact_path(&self) -> Option<PathBuf> {
        self.requested_downloads
            .iter()
            .find_map(|d| d.filepath.as_deref())
            .or(self.filepath.as_deref())
            .or(self.filename.as_deref())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Format {
    #[serde(default)]
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub abr: Option<f64>,
    #[serde(default)]
    pub tbr: Option<f64>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
    #[serde(default)]
    pub language: Option<String>
}

impl Format {
    pub fn has_video(&self) -> bool {
        self.vcodec.as_ref().is_some_and(|v| v != "none")
    }

    pub fn has_audio(&self) -> bool {
        self.acodec.as_ref().is_some_and(|a| a != "none")
    }

    pub fn estimated_size(&self) -> Option<u64> {
        self.filesize_approx.or(self.filesize)
    }

    pub fn container_ext(&self) -> Option<&str> {
        self.ext.as_deref().or(self.container.as_deref())
    }
}

/// Per-file record yt-dlp attaches after the download step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestedDownload {
    #[serde(default)]
    pub filepath: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub acodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_merged_download() {
        let json = r#"{
            "id": "abc123",
            "title": "Some Clip",
            "ext": "mkv",
            "requested_formats": [
                {"format_id": "399", "vcodec": "av01.0.08M.08", "acodec": "none", "height": 1080, "ext": "mp4"},
                {"format_id": "251", "vcodec": "none", "acodec": "opus", "ext": "webm", "language": "en"}
            ],
            "requested_downloads": [
                {"filepath": "/tmp/Some Clip.mkv", "vcodec": "av01.0.08M.08", "acodec": "opus", "height": 1080}
            ],
            "subtitles": {"en": [], "de": []}
        }"#;

        let info: VideoInfo = serde_json::from_str(json).unwrap();
        assert!(!info.is_playlist());
        assert_eq!(info.artifact_path(), Some(PathBuf::from("/tmp/Some Clip.mkv")));

        let (video, audio) = info.selected_formats();
        assert_eq!(video.map(|f| f.format_id.as_str()), Some("399"));
        assert_eq!(audio.and_then(|f| f.language.as_deref()), Some("en"));
        assert_eq!(info.subtitles.keys().collect::<Vec<_>>(), vec!["de", "en"]);
    }

    #[test]
    fn test_playlist_flattening() {
        let json = r#"{
            "id": "PL1",
            "title": "List",
            "_type": "playlist",
            "entries": [{"id": "a", "title": "A"}, {"id": "b", "title": "B"}]
        }"#;

        let info: VideoInfo = serde_json::from_str(json).unwrap();
        assert!(info.is_playlist());
        let ids: Vec<&str> = info.flatten_entries().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_artifact_path_falls_back_to_filename() {
        let info = VideoInfo {
            filename: Some("/tmp/x.webm".to_string()),
            ..VideoInfo::default()
        };
        assert_eq!(info.artifact_path(), Some(PathBuf::from("/tmp/x.webm")));
    }
}
