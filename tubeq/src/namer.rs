use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::JobError;

pub const SAFE_MAX_PATH: usize = 240;
pub const MIN_TITLE_LEN: usize = 20;
/// Shortest title that can still carry an ellipsis.
pub const MIN_TITLE_FLOOR: usize = 2;
pub const MAX_DISPLAY_TITLE: usize = 80;

const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replaces characters illegal in paths with spaces, collapses whitespace and
/// trims surrounding spaces and dots.
pub fn sanitize_title(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| if ILLEGAL_CHARS.contains(&c) { ' ' } else { c })
        .collect();

    replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches([' ', '.'])
        .to_string()
}

/// Shortens `s` to `max_len` characters by cutting out the middle.
///
/// About 60% of the kept characters come from the start, the rest from the end.
pub fn ellipsize(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if max_len <= 1 || chars.len() <= max_len {
        return s.to_string();
    }

    let keep = max_len - 1;
    let left = keep * 3 / 5;
    let right = keep - left;

    let head: String = chars[..left].iter().collect();
    let tail: String = chars[chars.len() - right..].iter().collect();
    format!("{head}…{tail}")
}

pub fn short_vcodec(codec: Option<&str>) -> String {
    let Some(codec) = codec.filter(|c| !c.is_empty()) else {
        return "?".to_string();
    };
    let lower = codec.to_lowercase();
    if lower.starts_with("av01") {
        "av01".to_string()
    } else if lower.starts_with("vp09") || lower == "vp9" {
        "vp9".to_string()
    } else if lower.starts_with("avc1") || lower.starts_with("h264") {
        "h264".to_string()
    } else {
        codec.to_string()
    }
}

pub fn short_acodec(codec: Option<&str>) -> String {
    let Some(codec) = codec.filter(|c| !c.is_empty()) else {
        return "?".to_string();
    };
    let lower = codec.to_lowercase();
    if lower.starts_with("mp4a") || lower == "aac" {
        "aac".to_string()
    } else if lower.starts_with("opus") {
        "opus".to_string()
    } else if lower.starts_with("vorbis") {
        "vorbis".to_string()
    } else {
        codec.to_string()
    }
}

/// What the final name is built from.
#[derive(Debug, Clone, Default)]
pub struct ArtifactName {
    pub video_tag: String,
    pub audio_tag: String,
    pub height: Option<u32>,
    pub title: Option<String>,
    pub id: Option<String>,
    pub ext: Option<String>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NamingPolicy {
    pub safe_max_path: usize,
    pub min_title_len: usize
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            safe_max_path: SAFE_MAX_PATH,
            min_title_len: MIN_TITLE_LEN
        }
    }
}

impl NamingPolicy {
    /// File name `<video>_<audio>_<height>_<Title>.<ext>` for an artifact in `folder`.
    ///
    /// Empty tag parts are dropped. When the full path would exceed the budget only
    /// the title is shortened, and never below `min_title_len` characters.
    pub fn compose(&self, folder: &Path, source_stem: &str, name: &ArtifactName, ext: &str) -> String {
        let mut title = sanitize_title(name.title.as_deref().unwrap_or_default());
        if title.is_empty() {
            title = sanitize_title(source_stem);
        }

        let suffix = format!(".{ext}");
        if title.len() > suffix.len() {
            let cut = title.len() - suffix.len();
            if title.is_char_boundary(cut) && title[cut..].eq_ignore_ascii_case(&suffix) {
                title.truncate(cut);
                title = title.trim_end_matches([' ', '.']).to_string();
            }
        }

        if title.is_empty() {
            title = match name.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
                Some(id) => format!("video_{id}"),
                None => format!("video_{}", chrono::Utc::now().timestamp())
            };
        }

        let height = name.height.map(|h| h.to_string()).unwrap_or_default();
        let prefix = [name.video_tag.as_str(), name.audio_tag.as_str(), height.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_");

        let file_name = |title: &str| {
            if prefix.is_empty() {
                format!("{title}.{ext}")
            } else {
                format!("{prefix}_{title}.{ext}")
            }
        };

        let candidate = file_name(&title);
        let length = folder.join(&candidate).to_string_lossy().chars().count();
        if length <= self.safe_max_path {
            return candidate;
        }

        let excess = length - self.safe_max_path;
        let allowed = title
            .chars()
            .count()
            .saturating_sub(excess)
            .max(self.min_title_len.max(MIN_TITLE_FLOOR));
        file_name(&ellipsize(&title, allowed))
    }

    /// Moves `source` to its canonical name, appending `(1)`, `(2)`, … on collisions.
    ///
    /// Returns the final path. On error the source is left where it was.
    pub async fn rename(&self, source: &Path, name: &ArtifactName) -> Result<PathBuf, JobError> {
        let metadata = tokio::fs::metadata(source)
            .await
            .map_err(|e| JobError::Rename(format!("{}: {e}", source.display())))?;
        if !metadata.is_file() {
            return Err(JobError::Rename(format!("{} is not a file", source.display())));
        }

        let folder = source.parent().unwrap_or_else(|| Path::new(""));
        let source_stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = name
            .ext
            .clone()
            .filter(|e| !e.is_empty())
            .or_else(|| source.extension().map(|e| e.to_string_lossy().to_string()))
            .unwrap_or_else(|| "mkv".to_string())
            .to_lowercase();

        let file_name = self.compose(folder, &source_stem, name, &ext);
        let stem = file_name
            .strip_suffix(&format!(".{ext}"))
            .unwrap_or(&file_name)
            .to_string();

        let mut target = folder.join(&file_name);
        let mut counter = 1;
        loop {
            if target == source {
                return Ok(target);
            }
            let taken = tokio::fs::try_exists(&target)
                .await
                .map_err(|e| JobError::Rename(format!("{}: {e}", target.display())))?;
            if !taken {
                break;
            }
            target = folder.join(format!("{stem}({counter}).{ext}"));
            counter += 1;
        }

        tokio::fs::rename(source, &target)
            .await
            .map_err(|e| JobError::Rename(format!("{} -> {}: {e}", source.display(), target.display())))?;

        Ok(target)
    }
}
