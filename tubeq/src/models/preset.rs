use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const HEIGHT_LADDER: [u32; 6] = [480, 720, 1080, 1440, 2160, 4320];
pub const DEFAULT_AUDIO_BITRATE: u32 = 192;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresetError {
    #[error("height {0} is not one of 480, 720, 1080, 1440, 2160, 4320")]
    InvalidHeight(u32),

    #[error("{bitrate} kbps is not offered for {format}")]
    InvalidBitrate { format: AudioFormat, bitrate: u32 },

    #[error("invalid audio language: {0:?}")]
    InvalidLanguage(String),

    #[error("invalid filename template: {0}")]
    InvalidTemplate(String)
}

/// Upper bound on the video height, restricted to the fixed ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Height(u32);

impl Height {
    pub const DEFAULT: Height = Height(1080);

    pub fn new(value: u32) -> Result<Self, PresetError> {
        if HEIGHT_LADDER.contains(&value) {
            Ok(Self(value))
        } else {
            Err(PresetError::InvalidHeight(value))
        }
    }

    /// Accepts `1080`, `1080p` and labels such as `2160p (4K)`.
    pub fn parse(s: &str) -> Result<Self, PresetError> {
        let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
        let value = digits
            .parse::<u32>()
            .map_err(|_| PresetError::InvalidHeight(0))?;
        Self::new(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn label(self) -> String {
        match self.0 {
            1440 => "1440p (2K)".to_string(),
            2160 => "2160p (4K)".to_string(),
            4320 => "4320p (8K)".to_string(),
            h => format!("{h}p")
        }
    }

    pub fn ladder() -> impl Iterator<Item = Height> {
        HEIGHT_LADDER.into_iter().map(Height)
    }
}

impl Default for Height {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u32> for Height {
    type Error = PresetError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Height> for u32 {
    fn from(height: Height) -> Self {
        height.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    Auto,
    Av1,
    Vp9,
    H264
}

impl VideoCodec {
    /// Lenient reading of stored or user-entered values. Anything unknown is `Auto`.
    pub fn normalize(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        if s.starts_with("av1") || s.starts_with("av01") {
            Self::Av1
        } else if s.starts_with("vp9") || s.starts_with("vp09") {
            Self::Vp9
        } else if s.starts_with("h264") || s.starts_with("h.264") || s.starts_with("avc") {
            Self::H264
        } else {
            Self::Auto
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Av1 => "av1",
            Self::Vp9 => "vp9",
            Self::H264 => "h264"
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Auto,
    Opus,
    Aac,
    Vorbis
}

impl AudioCodec {
    pub fn normalize(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        if s.starts_with("opus") {
            Self::Opus
        } else if s.starts_with("aac") || s.starts_with("mp4a") {
            Self::Aac
        } else if s.starts_with("vorbis") {
            Self::Vorbis
        } else {
            Self::Auto
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::Vorbis => "vorbis"
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    #[default]
    Auto,
    Mp4,
    Mkv,
    Webm
}

impl Container {
    pub fn normalize(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "mp4" => Self::Mp4,
            "mkv" => Self::Mkv,
            "webm" => Self::Webm,
            _ => Self::Auto
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm"
        }
    }

    /// Extension of a forced container; `None` for auto.
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Auto => None,
            other => Some(other.as_str())
        }
    }

    pub fn to_engine(self) -> yt_dlp::Container {
        match self {
            Self::Auto => yt_dlp::Container::Default,
            Self::Mp4 => yt_dlp::Container::Mp4,
            Self::Mkv => yt_dlp::Container::Mkv,
            Self::Webm => yt_dlp::Container::Webm
        }
    }
}

/// Preferred audio track: the original one, or one whose language tag starts with a code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AudioLanguage {
    #[default]
    Original,
    Code(String)
}

impl AudioLanguage {
    pub fn parse(s: &str) -> Result<Self, PresetError> {
        let code = s.trim().to_lowercase();
        if code.is_empty() || code == "orig" {
            return Ok(Self::Original);
        }
        let valid = code.len() <= 16
            && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self::Code(code))
        } else {
            Err(PresetError::InvalidLanguage(s.to_string()))
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Original => None,
            Self::Code(code) => Some(code)
        }
    }
}

impl fmt::Display for AudioLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code().unwrap_or("orig"))
    }
}

impl TryFrom<String> for AudioLanguage {
    type Error = PresetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AudioLanguage> for String {
    fn from(lang: AudioLanguage) -> Self {
        lang.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    M4a,
    Opus,
    Vorbis,
    Wav
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 5] = [Self::Mp3, Self::M4a, Self::Opus, Self::Vorbis, Self::Wav];

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "m4a" | "aac" => Some(Self::M4a),
            "opus" => Some(Self::Opus),
            "vorbis" | "ogg" => Some(Self::Vorbis),
            "wav" => Some(Self::Wav),
            _ => None
        }
    }

    /// Value handed to the engine's audio extraction.
    pub fn codec(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Wav => "wav"
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Vorbis => "ogg",
            other => other.codec()
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Mp3 => "MP3",
            Self::M4a => "M4A / AAC",
            Self::Opus => "Opus",
            Self::Vorbis => "Vorbis",
            Self::Wav => "WAV (lossless)"
        }
    }

    /// Offered bitrates in kbps. Empty for lossless formats.
    pub fn bitrates(self) -> &'static [u32] {
        match self {
            Self::Mp3 => &[128, 160, 192, 224, 256, 320],
            Self::M4a => &[128, 192, 256, 320],
            Self::Opus => &[96, 128, 160, 192],
            Self::Vorbis => &[128, 160, 192, 224],
            Self::Wav => &[]
        }
    }

    pub fn is_lossless(self) -> bool {
        self.bitrates().is_empty()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec())
    }
}

/// Sub-format used when a preset is audio-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioOnly {
    pub format: AudioFormat,
    /// kbps; `None` for lossless formats.
    #[serde(default)]
    pub bitrate: Option<u32>
}

impl AudioOnly {
    /// A missing bitrate picks the format's default; lossless formats drop it.
    pub fn new(format: AudioFormat, bitrate: Option<u32>) -> Result<Self, PresetError> {
        if format.is_lossless() {
            return Ok(Self { format, bitrate: None });
        }

        let offered = format.bitrates();
        let bitrate = match bitrate {
            Some(b) if offered.contains(&b) => b,
            Some(b) => return Err(PresetError::InvalidBitrate { format, bitrate: b }),
            None if offered.contains(&DEFAULT_AUDIO_BITRATE) => DEFAULT_AUDIO_BITRATE,
            None => offered[0]
        };

        Ok(Self {
            format,
            bitrate: Some(bitrate)
        })
    }

    pub fn validate(&self) -> Result<(), PresetError> {
        Self::new(self.format, self.bitrate).map(|_| ())
    }

    /// `--audio-quality` argument, e.g. `192K`.
    pub fn quality_arg(&self) -> Option<String> {
        self.bitrate.map(|b| format!("{b}K"))
    }

    pub fn quality_label(&self) -> String {
        self.bitrate
            .map_or_else(|| "lossless".to_string(), |b| format!("{b} kbps"))
    }
}

impl Default for AudioOnly {
    fn default() -> Self {
        Self {
            format: AudioFormat::Mp3,
            bitrate: Some(DEFAULT_AUDIO_BITRATE)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubtitleOptions {
    pub write: bool,
    /// Only honored together with `write`.
    pub embed: bool,
    pub langs: BTreeSet<String>
}

impl SubtitleOptions {
    pub fn embeds(&self) -> bool {
        self.write && self.embed
    }
}

/// Job options captured by value when a job is enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Preset {
    pub height: Height,
    pub vcodec: VideoCodec,
    pub acodec: AudioCodec,
    pub audio_lang: AudioLanguage,
    pub container: Container,
    pub outdir: PathBuf,
    pub outtmpl: String,
    pub cookies: Option<PathBuf>,
    pub audio_only: bool,
    pub audio: AudioOnly,
    pub playlist: bool,
    pub subtitles: SubtitleOptions
}

impl Default for Preset {
    fn default() -> Self {
        Self {
            height: Height::DEFAULT,
            vcodec: VideoCodec::Auto,
            acodec: AudioCodec::Auto,
            audio_lang: AudioLanguage::Original,
            container: Container::Auto,
            outdir: PathBuf::from("./downloads"),
            outtmpl: "%(title)s.%(ext)s".to_string(),
            cookies: None,
            audio_only: false,
            audio: AudioOnly::default(),
            playlist: false,
            subtitles: SubtitleOptions::default()
        }
    }
}

impl Preset {
    /// Checks constraints serde cannot express on its own.
    pub fn validate(&self) -> Result<(), PresetError> {
        self.audio.validate()?;

        let template = self.outtmpl.trim();
        if template.is_empty() {
            return Err(PresetError::InvalidTemplate("template is empty".to_string()));
        }
        if Path::new(template).is_absolute() {
            return Err(PresetError::InvalidTemplate(format!(
                "{template} must be relative to the output directory"
            )));
        }
        if template.split(['/', '\\']).any(|part| part == "..") {
            return Err(PresetError::InvalidTemplate(format!(
                "{template} must not leave the output directory"
            )));
        }

        Ok(())
    }

    /// Output directory joined with the filename template.
    pub fn output_template(&self) -> String {
        self.outdir.join(&self.outtmpl).to_string_lossy().to_string()
    }

    /// Audio-only sub-format, when the preset is in audio-only mode.
    pub fn audio_only(&self) -> Option<&AudioOnly> {
        self.audio_only.then_some(&self.audio)
    }
}
