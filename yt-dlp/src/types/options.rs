use std::path::PathBuf;

/// Format selection passed to `-f`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Default,
    BestAudio,
    Selector(String)
}

impl OutputFormat {
    pub fn as_arg(&self) -> Option<String> {
        match self {
            OutputFormat::Default => None,
            OutputFormat::BestAudio => Some("bestaudio".to_string()),
            OutputFormat::Selector(s) => Some(s.clone())
        }
    }
}

/// Container forced through `--merge-output-format` and `--remux-video`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Container {
    #[default]
    Default,
    Mp4,
    Mkv,
    Webm
}

impl Container {
    pub fn as_str(self) -> Option<&'static str> {
        match self {
            Container::Default => None,
            Container::Mp4 => Some("mp4"),
            Container::Mkv => Some("mkv"),
            Container::Webm => Some("webm")
        }
    }
}

/// Post-download audio extraction (`-x`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioExtraction {
    pub codec: String,
    /// `--audio-quality` value, e.g. `192K`. `None` keeps the source quality.
    pub quality: Option<String>
}

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub format: OutputFormat,
    pub container: Container,
    pub output_template: Option<String>,
    pub extract_audio: Option<AudioExtraction>,
    pub write_subtitles: bool,
    pub embed_subtitles: bool,
    pub subtitles_langs: Vec<String>,
    pub cookies_file: Option<PathBuf>,
    pub playlist: bool,
    pub concurrent_fragments: Option<u32>,
    /// `Some(true)` resumes `.part` files, `Some(false)` restarts them.
    pub continue_partial: Option<bool>,
    pub no_overwrites: bool,
    pub windows_filenames: bool
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }

    pub fn output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(template.into());
        self
    }

    pub fn extract_audio(mut self, codec: impl Into<String>, quality: Option<String>) -> Self {
        self.extract_audio = Some(AudioExtraction {
            codec: codec.into(),
            quality
        });
        self
    }

    pub fn write_subtitles(mut self, write: bool) -> Self {
        self.write_subtitles = write;
        self
    }

    pub fn embed_subtitles(mut self, embed: bool) -> Self {
        self.embed_subtitles = embed;
        self
    }

    pub fn subtitles_langs(mut self, langs: Vec<String>) -> Self {
        self.subtitles_langs = langs;
        self
    }

    pub fn cookies_file(mut self, path: Option<PathBuf>) -> Self {
        self.cookies_file = path;
        self
    }

    pub fn playlist(mut self, playlist: bool) -> Self {
        self.playlist = playlist;
        self
    }

    pub fn concurrent_fragments(mut self, count: u32) -> Self {
        self.concurrent_fragments = Some(count);
        self
    }

    pub fn continue_partial(mut self, resume: bool) -> Self {
        self.continue_partial = Some(resume);
        self
    }

    pub fn no_overwrites(mut self, enabled: bool) -> Self {
        self.no_overwrites = enabled;
        self
    }

    pub fn windows_filenames(mut self, enabled: bool) -> Self {
        self.windows_filenames = enabled;
        self
    }
}
