use crate::models::{AudioCodec, AudioLanguage, Container, Height, Preset, VideoCodec};

/// Selector expression plus the codecs it was built for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub selector: String,
    pub video: VideoCodec,
    pub audio: AudioCodec,
    pub warnings: Vec<String>
}

impl Resolution {
    /// All correction warnings as one line.
    pub fn combined_warning(&self) -> Option<String> {
        if self.warnings.is_empty() {
            None
        } else {
            Some(self.warnings.join(" "))
        }
    }
}

/// Substitutes codecs the container cannot hold.
///
/// mp4 takes h264 + aac only; webm rejects h264 and aac. Every substitution
/// produces a warning, including ones made on behalf of `auto`.
pub fn correct_for_container(
    video: VideoCodec,
    audio: AudioCodec,
    container: Container
) -> (VideoCodec, AudioCodec, Vec<String>) {
    let mut warnings = Vec::new();
    let (mut eff_video, mut eff_audio) = (video, audio);

    match container {
        Container::Mp4 => {
            if video != VideoCodec::H264 {
                warnings.push(format!("MP4: video codec {} corrected to h264.", video.as_str()));
                eff_video = VideoCodec::H264;
            }
            if audio != AudioCodec::Aac {
                warnings.push(format!("MP4: audio codec {} corrected to aac.", audio.as_str()));
                eff_audio = AudioCodec::Aac;
            }
        }
        Container::Webm => {
            if video == VideoCodec::H264 {
                warnings.push("WEBM: video codec h264 corrected to vp9.".to_string());
                eff_video = VideoCodec::Vp9;
            }
            if audio == AudioCodec::Aac {
                warnings.push("WEBM: audio codec aac corrected to opus.".to_string());
                eff_audio = AudioCodec::Opus;
            }
        }
        Container::Mkv | Container::Auto => {}
    }

    (eff_video, eff_audio, warnings)
}

fn video_filter(height: Height, codec: VideoCodec) -> String {
    let codec_filter = match codec {
        VideoCodec::Auto => "",
        VideoCodec::Av1 => "[vcodec^=av01]",
        VideoCodec::Vp9 => "[vcodec~='^vp0?9']",
        VideoCodec::H264 => "[vcodec^=avc1]"
    };
    format!("bestvideo[height<=?{}]{codec_filter}", height.get())
}

fn audio_filter(codec: AudioCodec, language: &AudioLanguage) -> String {
    let codec_filter = match codec {
        AudioCodec::Auto => "",
        AudioCodec::Aac => "[acodec^=mp4a]",
        AudioCodec::Opus => "[acodec=opus]",
        AudioCodec::Vorbis => "[acodec=vorbis]"
    };
    let mut filter = format!("bestaudio{codec_filter}");
    if let Some(code) = language.code() {
        filter.push_str(&format!("[language^={code}]"));
    }
    filter
}

/// `bestaudio`, preferring the requested language when there is one.
pub fn audio_selector(language: &AudioLanguage) -> String {
    match language.code() {
        Some(code) => format!("bestaudio[language^={code}]/bestaudio"),
        None => "bestaudio".to_string()
    }
}

/// Builds the selector for a preset. Deterministic in its input.
pub fn resolve(preset: &Preset) -> Resolution {
    if preset.audio_only {
        return Resolution {
            selector: audio_selector(&preset.audio_lang),
            video: VideoCodec::Auto,
            audio: AudioCodec::Auto,
            warnings: Vec::new()
        };
    }

    let (video, audio, warnings) = correct_for_container(preset.vcodec, preset.acodec, preset.container);
    let selector = format!(
        "{}+{}/best[height<=?{}]",
        video_filter(preset.height, video),
        audio_filter(audio, &preset.audio_lang),
        preset.height.get()
    );

    Resolution {
        selector,
        video,
        audio,
        warnings
    }
}

/// Human-readable summary of what a preset asks for.
pub fn describe(preset: &Preset, resolution: &Resolution) -> String {
    if let Some(audio) = preset.audio_only() {
        return format!(
            "mode: audio only {} | audio language: {} | quality: {}",
            audio.format.label(),
            preset.audio_lang,
            audio.quality_label()
        );
    }
    format!(
        "target: up to {}p | video codec: {} | audio codec: {} | audio language: {} | container: {}",
        preset.height.get(),
        resolution.video.as_str(),
        resolution.audio.as_str(),
        preset.audio_lang,
        preset.container.as_str()
    )
}
