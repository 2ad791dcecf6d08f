use std::ops::ControlFlow;
use std::time::Instant;

use yt_dlp::{DownloadOptions, DownloadProgress, OutputFormat, VideoInfo};

use crate::cancel::CancelFlag;
use crate::engine::MediaEngine;
use crate::error::JobError;
use crate::events::EventBus;
use crate::models::{Container, JobId, Preset};
use crate::progress::ProgressReporter;

const CONCURRENT_FRAGMENTS: u32 = 5;

/// Engine options for one attempt.
///
/// `container` is the container of this attempt, which differs from the preset's
/// on the fallback run. `resume` controls whether `.part` files are continued.
pub fn build_options(preset: &Preset, selector: &str, container: Container, resume: bool) -> DownloadOptions {
    let mut options = DownloadOptions::new()
        .format(OutputFormat::Selector(selector.to_string()))
        .output_template(preset.output_template())
        .cookies_file(preset.cookies.clone())
        .playlist(preset.playlist)
        .concurrent_fragments(CONCURRENT_FRAGMENTS)
        .continue_partial(resume)
        .no_overwrites(true)
        .windows_filenames(true);

    if let Some(audio) = preset.audio_only() {
        return options.extract_audio(audio.format.codec(), audio.quality_arg());
    }

    options = options.container(container.to_engine());
    if preset.subtitles.write {
        options = options
            .write_subtitles(true)
            .embed_subtitles(preset.subtitles.embeds())
            .subtitles_langs(preset.subtitles.langs.iter().cloned().collect());
    }
    options
}

/// Runs one download, checking the cancel flag at every progress tick.
pub async fn execute(
    engine: &dyn MediaEngine,
    events: &EventBus,
    cancel: &CancelFlag,
    job: &JobId,
    url: &str,
    options: &DownloadOptions
) -> Result<VideoInfo, JobError> {
    let mut reporter = ProgressReporter::default();
    let mut on_progress = |progress: &DownloadProgress| {
        if cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        if reporter.should_emit(progress.percent(), progress.is_finished(), Instant::now()) {
            events.progress(job, progress);
        }
        ControlFlow::Continue(())
    };

    engine
        .download(url, options, &mut on_progress)
        .await
        .map_err(JobError::from)
}

/// Codecs and height that ended up in the artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinalStreams {
    pub video: Option<String>,
    pub audio: Option<String>,
    pub height: Option<u32>
}

fn real_codec(value: Option<&str>) -> Option<String> {
    value
        .filter(|c| !c.is_empty() && *c != "none")
        .map(str::to_string)
}

/// Looks in per-file download records first, then the selected formats of the
/// final and the probed info, then the generic info fields.
pub fn final_streams(info: &VideoInfo, probed: Option<&VideoInfo>) -> FinalStreams {
    let mut video = info
        .requested_downloads
        .iter()
        .find_map(|d| real_codec(d.vcodec.as_deref()));
    let mut audio = info
        .requested_downloads
        .iter()
        .find_map(|d| real_codec(d.acodec.as_deref()));
    let mut height = info.requested_downloads.iter().find_map(|d| d.height);

    for source in std::iter::once(info).chain(probed) {
        let (v, a) = source.selected_formats();
        video = video.or_else(|| v.and_then(|f| real_codec(f.vcodec.as_deref())));
        audio = audio.or_else(|| a.and_then(|f| real_codec(f.acodec.as_deref())));
        height = height.or_else(|| v.and_then(|f| f.height));
    }

    FinalStreams {
        video: video.or_else(|| real_codec(info.vcodec.as_deref())),
        audio: audio.or_else(|| real_codec(info.acodec.as_deref())),
        height: height.or(info.height)
    }
}

/// Extension of the finished artifact.
pub fn final_extension(preset: &Preset, container: Container, info: &VideoInfo) -> String {
    if let Some(audio) = preset.audio_only() {
        return audio.format.extension().to_string();
    }
    if let Some(ext) = container.extension() {
        return ext.to_string();
    }
    info.ext
        .as_deref()
        .filter(|ext| !ext.is_empty())
        .map_or_else(|| "mkv".to_string(), str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::engine::testing::{FakeEngine, Outcome};
    use crate::events::JobEvent;
    use crate::models::{AudioFormat, AudioOnly};
    use crate::resolver::resolve;

    #[test]
    fn test_video_options() {
        let mut preset = Preset {
            container: Container::Mp4,
            outdir: PathBuf::from("/media"),
            cookies: Some(PathBuf::from("/c.txt")),
            ..Preset::default()
        };
        preset.subtitles.embed = true;

        let resolution = resolve(&preset);
        let options = build_options(&preset, &resolution.selector, preset.container, true);
        assert_eq!(options.format, OutputFormat::Selector(resolution.selector.clone()));
        assert_eq!(options.container, yt_dlp::Container::Mp4);
        assert_eq!(options.output_template.as_deref(), Some("/media/%(title)s.%(ext)s"));
        assert_eq!(options.cookies_file, Some(PathBuf::from("/c.txt")));
        assert_eq!(options.concurrent_fragments, Some(5));
        assert_eq!(options.continue_partial, Some(true));
        assert!(options.no_overwrites && options.windows_filenames);
        assert!(!options.write_subtitles && !options.embed_subtitles);
        assert!(options.extract_audio.is_none());
    }

    #[test]
    fn test_fallback_options_restart_in_mkv() {
        let preset = Preset {
            container: Container::Mp4,
            ..Preset::default()
        };
        let options = build_options(&preset, "best", Container::Mkv, false);
        assert_eq!(options.container, yt_dlp::Container::Mkv);
        assert_eq!(options.continue_partial, Some(false));
    }

    #[test]
    fn test_audio_only_options() {
        let preset = Preset {
            audio_only: true,
            audio: AudioOnly::new(AudioFormat::Vorbis, Some(160)).unwrap(),
            container: Container::Mp4,
            ..Preset::default()
        };
        let options = build_options(&preset, "bestaudio", preset.container, true);
        let extraction = options.extract_audio.unwrap();
        assert_eq!(extraction.codec, "vorbis");
        assert_eq!(extraction.quality.as_deref(), Some("160K"));
        assert_eq!(options.container, yt_dlp::Container::Default);
        assert_eq!(final_extension(&preset, preset.container, &VideoInfo::default()), "ogg");
    }

    #[test]
    fn test_final_streams_priority() {
        let info: VideoInfo = serde_json::from_str(
            r#"{
                "id": "x",
                "vcodec": "generic-v",
                "acodec": "generic-a",
                "height": 360,
                "requested_formats": [
                    {"format_id": "1", "vcodec": "vp09.00", "acodec": "none", "height": 720}
                ],
                "requested_downloads": [{"acodec": "opus"}]
            }"#
        )
        .unwrap();
        let probed: VideoInfo = serde_json::from_str(
            r#"{"id": "x", "requested_formats": [{"format_id": "2", "vcodec": "avc1", "acodec": "none", "height": 1080}]}"#
        )
        .unwrap();

        let streams = final_streams(&info, Some(&probed));
        assert_eq!(streams.video.as_deref(), Some("vp09.00"));
        assert_eq!(streams.audio.as_deref(), Some("opus"));
        assert_eq!(streams.height, Some(720));

        let bare: VideoInfo = serde_json::from_str(r#"{"id": "y", "vcodec": "avc1.4d", "acodec": "mp4a.40.2", "height": 480}"#).unwrap();
        let streams = final_streams(&bare, Some(&probed));
        assert_eq!(streams.video.as_deref(), Some("avc1"));
        assert_eq!(streams.audio.as_deref(), Some("mp4a.40.2"));
        assert_eq!(streams.height, Some(1080));
    }

    #[test]
    fn test_final_extension() {
        let preset = Preset::default();
        let info = VideoInfo {
            ext: Some("WEBM".to_string()),
            ..VideoInfo::default()
        };
        assert_eq!(final_extension(&preset, Container::Auto, &info), "webm");
        assert_eq!(final_extension(&preset, Container::Mkv, &info), "mkv");
        assert_eq!(final_extension(&preset, Container::Auto, &VideoInfo::default()), "mkv");
    }

    #[tokio::test]
    async fn test_execute_reports_progress() {
        let cancel = CancelFlag::new();
        let engine = FakeEngine::new(cancel.clone()).then(Outcome::Produce(VideoInfo::default()));
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let job = JobId::from("j".to_string());

        let info = execute(&engine, &events, &cancel, &job, "u", &DownloadOptions::new()).await;
        assert!(info.is_ok());

        let mut percents = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let JobEvent::Progress { percent, .. } = event {
                percents.push(percent);
            }
        }
        // 0% passes as the first tick, 50% is throttled, 100% always passes.
        assert_eq!(percents, vec![0.0, 100.0]);
    }

    #[tokio::test]
    async fn test_execute_aborts_on_cancel() {
        let cancel = CancelFlag::new();
        let engine = FakeEngine::new(cancel.clone()).then(Outcome::CancelMidway);
        let events = EventBus::default();
        let job = JobId::from("j".to_string());

        let err = execute(&engine, &events, &cancel, &job, "u", &DownloadOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err, JobError::Cancelled);
    }
}
