use std::collections::BTreeSet;

use serde::Serialize;
use yt_dlp::VideoInfo;

const IGNORED_AUDIO_TAGS: [&str; 4] = ["", "und", "none", "orig"];

/// Audio and subtitle languages seen in probe results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KnownLanguages {
    /// Always starts with `orig`.
    pub audio: Vec<String>,
    pub subtitles: Vec<String>
}

impl Default for KnownLanguages {
    fn default() -> Self {
        Self {
            audio: vec!["orig".to_string()],
            subtitles: Vec::new()
        }
    }
}

impl KnownLanguages {
    /// Replaces the audio set when the info carries any audio language, and adds
    /// to the subtitle set.
    pub fn update_from(&mut self, info: &VideoInfo) {
        let mut audio = BTreeSet::new();
        let mut subtitles: BTreeSet<String> = self.subtitles.iter().cloned().collect();

        for entry in info.flatten_entries() {
            for format in &entry.formats {
                if let Some(lang) = format.language.as_deref() {
                    audio.insert(lang.to_lowercase());
                }
            }
            subtitles.extend(entry.subtitles.keys().filter(|k| !k.is_empty()).cloned());
        }

        if !audio.is_empty() {
            self.audio = std::iter::once("orig".to_string())
                .chain(
                    audio
                        .into_iter()
                        .filter(|lang| !IGNORED_AUDIO_TAGS.contains(&lang.as_str()))
                )
                .collect();
        }
        self.subtitles = subtitles.into_iter().collect();
    }

    pub fn summary(&self) -> String {
        let preview = |langs: &[String]| {
            if langs.is_empty() {
                "-".to_string()
            } else {
                langs.iter().take(6).cloned().collect::<Vec<_>>().join(", ")
            }
        };
        format!(
            "audio tracks: {} | subtitles: {}",
            preview(&self.audio),
            preview(&self.subtitles)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(json: &str) -> VideoInfo {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_update_from_single_video() {
        let mut known = KnownLanguages::default();
        known.update_from(&info(
            r#"{
                "id": "a",
                "formats": [
                    {"format_id": "1", "language": "EN"},
                    {"format_id": "2", "language": "de"},
                    {"format_id": "3", "language": "und"},
                    {"format_id": "4"}
                ],
                "subtitles": {"fr": [], "en": []}
            }"#
        ));

        assert_eq!(known.audio, vec!["orig", "de", "en"]);
        assert_eq!(known.subtitles, vec!["en", "fr"]);
    }

    #[test]
    fn test_subtitles_accumulate_and_audio_is_kept_without_tags() {
        let mut known = KnownLanguages::default();
        known.update_from(&info(r#"{"id": "a", "formats": [{"format_id": "1", "language": "ja"}], "subtitles": {"ja": []}}"#));
        known.update_from(&info(r#"{"id": "b", "formats": [{"format_id": "1"}], "subtitles": {"ko": []}}"#));

        assert_eq!(known.audio, vec!["orig", "ja"]);
        assert_eq!(known.subtitles, vec!["ja", "ko"]);
    }

    #[test]
    fn test_playlist_entries_are_scanned() {
        let mut known = KnownLanguages::default();
        known.update_from(&info(
            r#"{
                "id": "PL",
                "_type": "playlist",
                "entries": [
                    {"id": "a", "formats": [{"format_id": "1", "language": "es"}]},
                    {"id": "b", "formats": [{"format_id": "1", "language": "pt"}]}
                ]
            }"#
        ));
        assert_eq!(known.audio, vec!["orig", "es", "pt"]);
    }
}
