use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::types::DownloadOptions;

const PROGRESS_TEMPLATE: &str = "download:%(progress.status)s|%(progress.downloaded_bytes)s|%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s";

pub struct CommandBuilder {
    binary: PathBuf,
    args: Vec<String>
}

impl CommandBuilder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn url(self, url: impl Into<String>) -> Self {
        self.arg("--").arg(url)
    }

    pub fn json_output(self) -> Self {
        self.arg("--dump-json")
    }

    pub fn single_json_output(self) -> Self {
        self.arg("--dump-single-json")
    }

    pub fn skip_download(self) -> Self {
        self.arg("--skip-download")
    }

    /// Prints the full info dict as JSON once the file reached its final name.
    pub fn print_final_info(self) -> Self {
        self.arg("--no-simulate").arg("--print").arg("after_move:%()j")
    }

    pub fn format(self, format: impl Into<String>) -> Self {
        self.arg("-f").arg(format)
    }

    pub fn merge_output_format(self, format: impl Into<String>) -> Self {
        self.arg("--merge-output-format").arg(format)
    }

    pub fn remux_video(self, format: impl Into<String>) -> Self {
        self.arg("--remux-video").arg(format)
    }

    pub fn extract_audio(self, codec: impl Into<String>) -> Self {
        self.arg("-x").arg("--audio-format").arg(codec)
    }

    pub fn audio_quality(self, quality: impl Into<String>) -> Self {
        self.arg("--audio-quality").arg(quality)
    }

    pub fn output_template(self, template: impl Into<String>) -> Self {
        self.arg("-o").arg(template)
    }

    pub fn write_subtitles(self) -> Self {
        self.arg("--write-subs")
    }

    pub fn embed_subtitles(self) -> Self {
        self.arg("--embed-subs")
    }

    pub fn subtitles_langs(self, langs: &[String]) -> Self {
        if langs.is_empty() {
            self
        } else {
            self.arg("--sub-langs").arg(langs.join(","))
        }
    }

    pub fn cookies_file(self, path: impl AsRef<Path>) -> Self {
        self.arg("--cookies").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn cookies_file_opt(self, path: Option<&PathBuf>) -> Self {
        match path {
            Some(p) => self.cookies_file(p),
            None => self
        }
    }

    pub fn playlist(self, whole: bool) -> Self {
        if whole {
            self.arg("--yes-playlist")
        } else {
            self.arg("--no-playlist")
        }
    }

    pub fn concurrent_fragments(self, count: u32) -> Self {
        self.arg("--concurrent-fragments").arg(count.to_string())
    }

    pub fn continue_partial(self, resume: bool) -> Self {
        if resume {
            self.arg("--continue")
        } else {
            self.arg("--no-continue")
        }
    }

    pub fn progress_reporting(self) -> Self {
        self.arg("--progress")
            .arg("--newline")
            .arg("--progress-template")
            .arg(PROGRESS_TEMPLATE)
    }

    pub fn ffmpeg_location(self, path: impl AsRef<Path>) -> Self {
        self.arg("--ffmpeg-location").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Flags that decide which streams a probe or download resolves to.
    pub fn with_selection(mut self, options: &DownloadOptions) -> Self {
        if let Some(format_arg) = options.format.as_arg() {
            self = self.format(format_arg);
        }

        if let Some(ref path) = options.cookies_file {
            self = self.cookies_file(path);
        }

        self.playlist(options.playlist)
    }

    pub fn with_options(mut self, options: &DownloadOptions) -> Self {
        self = self.with_selection(options);

        if let Some(container) = options.container.as_str() {
            self = self.merge_output_format(container).remux_video(container);
        }

        if let Some(ref extraction) = options.extract_audio {
            self = self.extract_audio(extraction.codec.clone());
            if let Some(ref quality) = extraction.quality {
                self = self.audio_quality(quality.clone());
            }
        }

        if let Some(ref template) = options.output_template {
            self = self.output_template(template.clone());
        }

        if options.write_subtitles {
            self = self.write_subtitles().subtitles_langs(&options.subtitles_langs);
            if options.embed_subtitles {
                self = self.embed_subtitles();
            }
        }

        if let Some(count) = options.concurrent_fragments {
            self = self.concurrent_fragments(count);
        }

        if let Some(resume) = options.continue_partial {
            self = self.continue_partial(resume);
        }

        if options.no_overwrites {
            self = self.arg("--no-overwrites");
        }

        if options.windows_filenames {
            self = self.arg("--windows-filenames");
        }

        self
    }

    pub fn build(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args);
        cmd.kill_on_drop(true);
        cmd
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }
}
