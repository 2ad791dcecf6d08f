use std::time::Duration;

use tokio::sync::RwLock;
use yt_dlp::{DownloadOptions, Format, VideoInfo, format_bytes, format_duration};

use crate::engine::MediaEngine;
use crate::error::JobError;
use crate::events::EventBus;
use crate::languages::KnownLanguages;
use crate::models::{Container, Job, JobId, Preset};
use crate::namer::{MAX_DISPLAY_TITLE, ellipsize, short_acodec, short_vcodec};
use crate::queue::SharedQueue;

/// Upper bound for one metadata lookup. The engine child is killed when it is exceeded.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(90);

/// What the probe found out about a job before the transfer.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub info: VideoInfo,
    pub expected_ext: String
}

fn stream_from_info(info: &VideoInfo) -> Format {
    Format {
        format_id: info.id.clone(),
        ext: info.ext.clone(),
        height: info.height,
        vcodec: info.vcodec.clone(),
        acodec: info.acodec.clone(),
        ..Format::default()
    }
}

/// Chosen video and audio streams. A single muxed result counts as both.
pub fn selected_streams(info: &VideoInfo) -> (Option<Format>, Option<Format>) {
    if !info.requested_formats.is_empty() {
        let (video, audio) = info.selected_formats();
        return (video.cloned(), audio.cloned());
    }
    let muxed = stream_from_info(info);
    let video = muxed.has_video().then(|| muxed.clone());
    let audio = muxed.has_audio().then_some(muxed);
    (video, audio)
}

/// Container the artifact is expected to end up in.
pub fn expected_container(preset: &Preset, video: Option<&Format>, audio: Option<&Format>) -> String {
    if let Some(audio_only) = preset.audio_only() {
        return audio_only.format.extension().to_string();
    }
    if let Some(ext) = preset.container.extension() {
        return ext.to_string();
    }
    match (
        video.and_then(Format::container_ext),
        audio.and_then(Format::container_ext)
    ) {
        (Some(v), Some(a)) if v == a && matches!(v, "mp4" | "webm" | "mkv") => v.to_string(),
        _ => "mkv".to_string()
    }
}

/// `V:<video> A:<audio> → <EXT>`
pub fn status_summary(video: Option<&str>, audio: Option<&str>, ext: &str) -> String {
    format!(
        "V:{} A:{} → {}",
        short_vcodec(video),
        short_acodec(audio),
        ext.to_uppercase()
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
fn size_estimate(format: &Format) -> String {
    match (format.estimated_size(), format.tbr) {
        (Some(size), _) => format!("~{}", format_bytes(size as f64)),
        (None, Some(tbr)) => format!("{} kbps", tbr as u64),
        (None, None) => "?".to_string()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn video_line(format: &Format) -> String {
    let resolution = format.height.map_or_else(|| "?".to_string(), |h| format!("{h}p"));
    let fps = format.fps.map(|fps| format!("@{}fps", fps as u32)).unwrap_or_default();
    format!(
        "video: id={} | {resolution}{fps} | vcodec={} | container={} | {}",
        format.format_id,
        format.vcodec.as_deref().unwrap_or("none"),
        format.container_ext().unwrap_or("?"),
        size_estimate(format)
    )
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn audio_line(format: &Format) -> String {
    let bitrate = format
        .abr
        .or(format.tbr)
        .map_or_else(|| "?".to_string(), |kbps| format!("{} kbps", kbps as u32));
    format!(
        "audio: id={} | acodec={} | container={} | {bitrate}",
        format.format_id,
        format.acodec.as_deref().unwrap_or("none"),
        format.container_ext().unwrap_or("?")
    )
}

fn headline(info: &VideoInfo) -> String {
    let title = if info.title.is_empty() { "untitled" } else { info.title.as_str() };
    let id = if info.id.is_empty() { "?" } else { info.id.as_str() };
    format!(
        "now downloading: «{}» [{}] | channel: {} | duration: {}",
        ellipsize(title, MAX_DISPLAY_TITLE),
        id,
        info.channel_name().unwrap_or("?"),
        info.duration.map_or_else(|| "?".to_string(), format_duration)
    )
}

async fn record_title(queue: &SharedQueue, events: &EventBus, job: &JobId, info: &VideoInfo) {
    let title = info.title.trim();
    if title.is_empty() {
        return;
    }
    if queue.write().await.set_title_if_missing(job, title) {
        events.title(job, title);
    }
}

async fn bounded_probe(
    engine: &dyn MediaEngine,
    url: &str,
    options: &DownloadOptions,
    limit: Duration
) -> Result<VideoInfo, JobError> {
    match tokio::time::timeout(limit, engine.probe(url, options)).await {
        Ok(result) => result.map_err(|e| JobError::probe(&e)),
        Err(_) => Err(JobError::Probe(format!("no answer within {limit:?}")))
    }
}

/// Probes the job's URL ahead of the download. Failures and timeouts are logged
/// and yield `None`.
pub async fn probe_job(
    engine: &dyn MediaEngine,
    events: &EventBus,
    languages: &RwLock<KnownLanguages>,
    queue: &SharedQueue,
    job: &Job,
    options: &DownloadOptions,
    limit: Duration
) -> Option<ProbeReport> {
    let info = match bounded_probe(engine, &job.url, options, limit).await {
        Ok(info) => info,
        Err(err) => {
            events.warn(Some(&job.id), format!("could not determine formats in advance: {err}"));
            return None;
        }
    };

    events.info(Some(&job.id), headline(&info));
    languages.write().await.update_from(&info);
    record_title(queue, events, &job.id, &info).await;

    let (video, audio) = selected_streams(&info);
    if let Some(format) = &video {
        events.info(Some(&job.id), video_line(format));
    }
    if let Some(format) = &audio {
        events.info(Some(&job.id), audio_line(format));
    }
    if video.is_none() && audio.is_none() {
        events.info(
            Some(&job.id),
            "selected formats are not known in advance, continuing with the download"
        );
    }

    let expected_ext = expected_container(&job.preset, video.as_ref(), audio.as_ref());
    let mode = if job.preset.container == Container::Auto { "auto" } else { "forced" };
    events.info(
        Some(&job.id),
        format!("expected container: {} ({mode})", expected_ext.to_uppercase())
    );

    events.info(
        Some(&job.id),
        status_summary(
            video.as_ref().and_then(|f| f.vcodec.as_deref()),
            audio.as_ref().and_then(|f| f.acodec.as_deref()),
            &expected_ext
        )
    );

    Some(ProbeReport { info, expected_ext })
}

/// Minimal options for a metadata-only lookup.
pub fn lookup_options(preset: &Preset) -> DownloadOptions {
    DownloadOptions::new()
        .cookies_file(preset.cookies.clone())
        .playlist(preset.playlist)
}

/// Fills in a freshly enqueued job's title. Errors are only traced.
pub async fn fill_title(
    engine: &dyn MediaEngine,
    events: &EventBus,
    queue: &SharedQueue,
    job: &JobId,
    url: &str,
    options: &DownloadOptions
) {
    match bounded_probe(engine, url, options, PROBE_TIMEOUT).await {
        Ok(info) => record_title(queue, events, job, &info).await,
        Err(e) => tracing::debug!(job = job.as_str(), "title probe failed: {}", e)
    }
}

/// Probes `url` only to refresh the known language sets.
pub async fn analyze(
    engine: &dyn MediaEngine,
    events: &EventBus,
    languages: &RwLock<KnownLanguages>,
    url: &str,
    options: &DownloadOptions
) -> Result<KnownLanguages, JobError> {
    let info = bounded_probe(engine, url, options, PROBE_TIMEOUT).await?;

    let mut known = languages.write().await;
    known.update_from(&info);
    events.info(None, format!("analyzed «{}»: {}", ellipsize(&info.title, MAX_DISPLAY_TITLE), known.summary()));
    Ok(known.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelFlag;
    use crate::engine::testing::FakeEngine;
    use crate::events::{JobEvent, LogLevel};
    use crate::models::{AudioOnly, Preset};
    use crate::queue::JobQueue;

    fn probed() -> VideoInfo {
        serde_json::from_str(
            r#"{
                "id": "abc",
                "title": "Lecture 1",
                "channel": "Uni",
                "duration": 3725,
                "requested_formats": [
                    {"format_id": "137", "ext": "mp4", "vcodec": "avc1.640028", "acodec": "none", "height": 1080, "fps": 30, "filesize": 1048576},
                    {"format_id": "140", "ext": "m4a", "vcodec": "none", "acodec": "mp4a.40.2", "abr": 129.5}
                ],
                "formats": [
                    {"format_id": "140", "acodec": "mp4a.40.2", "vcodec": "none", "language": "en"},
                    {"format_id": "141", "acodec": "mp4a.40.2", "vcodec": "none", "language": "de"}
                ],
                "subtitles": {"fr": []}
            }"#
        )
        .unwrap()
    }

    #[test]
    fn test_expected_container() {
        let video = Format {
            ext: Some("webm".to_string()),
            ..Format::default()
        };
        let audio = video.clone();
        let m4a = Format {
            ext: Some("m4a".to_string()),
            ..Format::default()
        };
        let auto = Preset::default();

        assert_eq!(expected_container(&auto, Some(&video), Some(&audio)), "webm");
        assert_eq!(expected_container(&auto, Some(&video), Some(&m4a)), "mkv");
        assert_eq!(expected_container(&auto, None, None), "mkv");

        let forced = Preset {
            container: Container::Mp4,
            ..Preset::default()
        };
        assert_eq!(expected_container(&forced, Some(&video), Some(&audio)), "mp4");

        let audio_only = Preset {
            audio_only: true,
            audio: AudioOnly::default(),
            ..Preset::default()
        };
        assert_eq!(expected_container(&audio_only, None, None), "mp3");
    }

    #[test]
    fn test_stream_lines() {
        let info = probed();
        let (video, audio) = selected_streams(&info);
        assert_eq!(
            video_line(&video.unwrap()),
            "video: id=137 | 1080p@30fps | vcodec=avc1.640028 | container=mp4 | ~1.00 MB"
        );
        assert_eq!(
            audio_line(&audio.unwrap()),
            "audio: id=140 | acodec=mp4a.40.2 | container=m4a | 129 kbps"
        );
        assert_eq!(status_summary(Some("avc1.640028"), Some("mp4a.40.2"), "mkv"), "V:h264 A:aac → MKV");
    }

    #[test]
    fn test_muxed_result_counts_as_both_streams() {
        let info = VideoInfo {
            id: "x".to_string(),
            vcodec: Some("vp9".to_string()),
            acodec: Some("opus".to_string()),
            ..VideoInfo::default()
        };
        let (video, audio) = selected_streams(&info);
        assert_eq!(video.unwrap().vcodec.as_deref(), Some("vp9"));
        assert_eq!(audio.unwrap().acodec.as_deref(), Some("opus"));
    }

    #[tokio::test]
    async fn test_probe_updates_title_and_languages() {
        let engine = FakeEngine::new(CancelFlag::new()).with_probe(probed());
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let languages = RwLock::new(KnownLanguages::default());
        let queue = JobQueue::shared();
        let job = Job::new("https://example.com/v", Preset::default());
        queue.write().await.add(job.clone()).unwrap();

        let report = probe_job(&engine, &events, &languages, &queue, &job, &DownloadOptions::new(), PROBE_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(report.expected_ext, "mkv");

        assert_eq!(queue.read().await.get(&job.id).unwrap().title.as_deref(), Some("Lecture 1"));
        let known = languages.read().await.clone();
        assert_eq!(known.audio, vec!["orig", "de", "en"]);
        assert_eq!(known.subtitles, vec!["fr"]);

        let mut saw_title = false;
        while let Ok(event) = rx.try_recv() {
            if let JobEvent::Title { title, .. } = event {
                saw_title = title == "Lecture 1";
            }
        }
        assert!(saw_title);
    }

    #[tokio::test]
    async fn test_probe_failure_is_not_fatal() {
        let engine = FakeEngine::new(CancelFlag::new());
        let events = EventBus::default();
        let languages = RwLock::new(KnownLanguages::default());
        let queue = JobQueue::shared();
        let job = Job::new("https://example.com/v", Preset::default());

        let report = probe_job(&engine, &events, &languages, &queue, &job, &DownloadOptions::new(), PROBE_TIMEOUT).await;
        assert!(report.is_none());
        assert_eq!(*languages.read().await, KnownLanguages::default());
    }

    #[tokio::test]
    async fn test_stalled_probe_times_out() {
        let engine = FakeEngine::new(CancelFlag::new()).with_probe(probed()).stalling_probe();
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let languages = RwLock::new(KnownLanguages::default());
        let queue = JobQueue::shared();
        let job = Job::new("https://example.com/v", Preset::default());

        let limit = Duration::from_millis(20);
        let report = probe_job(&engine, &events, &languages, &queue, &job, &DownloadOptions::new(), limit).await;
        assert!(report.is_none());

        let mut warned = false;
        while let Ok(event) = rx.try_recv() {
            if let JobEvent::Log { level, message, .. } = event {
                warned |= level == LogLevel::Warn && message.contains("no answer within");
            }
        }
        assert!(warned);
    }

    #[tokio::test]
    async fn test_title_is_not_overwritten() {
        let engine = FakeEngine::new(CancelFlag::new()).with_probe(probed());
        let events = EventBus::default();
        let queue = JobQueue::shared();
        let mut job = Job::new("https://example.com/v", Preset::default());
        job.title = Some("Mine".to_string());
        let id = queue.write().await.add(job).unwrap();

        fill_title(&engine, &events, &queue, &id, "https://example.com/v", &DownloadOptions::new()).await;
        assert_eq!(queue.read().await.get(&id).unwrap().title.as_deref(), Some("Mine"));
    }

    #[tokio::test]
    async fn test_analyze_refreshes_languages() {
        let engine = FakeEngine::new(CancelFlag::new()).with_probe(probed());
        let languages = RwLock::new(KnownLanguages::default());
        let known = analyze(&engine, &EventBus::default(), &languages, "u", &DownloadOptions::new())
            .await
            .unwrap();
        assert!(known.audio.contains(&"en".to_string()));
    }
}
