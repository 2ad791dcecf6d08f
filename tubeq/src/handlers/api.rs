use std::collections::HashMap;
use std::path::PathBuf;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json}
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::languages::KnownLanguages;
use crate::models::{AudioFormat, Height, Job, JobId, Preset, Settings};
use crate::namer::MIN_TITLE_FLOOR;
use crate::queue::RunState;
use crate::state::AppState;
use crate::workers::probe::{analyze, fill_title, lookup_options};

const COOKIES_PATH: &str = "./data/cookies.txt";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobRequest {
    url: String,
    #[serde(default)]
    preset: Option<Preset>
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchRequest {
    urls_text: String,
    #[serde(default)]
    preset: Option<Preset>
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    ytdlp_path: Option<String>,
    ffmpeg_path: Option<String>,
    extractor_args: Option<String>,
    safe_max_path: Option<usize>,
    min_title_len: Option<usize>
}

impl EngineSettings {
    fn validate(&self) -> Result<(), AppError> {
        if self.min_title_len.is_some_and(|min| min < MIN_TITLE_FLOOR) {
            return Err(AppError::bad_request(format!(
                "min_title_len must be at least {MIN_TITLE_FLOOR}"
            )));
        }
        if self.safe_max_path == Some(0) {
            return Err(AppError::bad_request("safe_max_path must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct QueueView {
    run: RunState,
    count: usize,
    jobs: Vec<Job>,
    last_single: Option<Job>
}

fn validated_url(url: &str) -> Result<String, AppError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::bad_request("URL is empty"));
    }
    Ok(url.to_string())
}

/// Explicit presets are validated; a missing one means the stored default.
async fn preset_or_default(state: &AppState, preset: Option<Preset>) -> Result<Preset, AppError> {
    match preset {
        Some(preset) => {
            preset.validate().map_err(AppError::preset)?;
            Ok(preset)
        }
        None => Ok(Settings::load_preset(&state.pool).await?)
    }
}

fn spawn_title_probe(state: &AppState, job: &Job) {
    let engine = state.engine.clone();
    let events = state.events.clone();
    let queue = state.queue.clone();
    let id = job.id.clone();
    let url = job.url.clone();
    let options = lookup_options(&job.preset);

    tokio::spawn(async move {
        fill_title(engine.as_ref(), &events, &queue, &id, &url, &options).await;
    });
}

/// URLs from a newline-separated list. Blank lines and `#` comments are skipped.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<QueueView> {
    let queue = state.queue.read().await;
    Json(QueueView {
        run: queue.run_state(),
        count: queue.len(),
        jobs: queue.jobs().to_vec(),
        last_single: queue.last_single().cloned()
    })
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<Job>, AppError> {
    let id = JobId::from(id);
    state
        .queue
        .read()
        .await
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("job {id} not found")))
}

#[tracing::instrument(skip(state))]
pub async fn enqueue(
    State(state): State<AppState>,
    Json(input): Json<JobRequest>
) -> Result<impl IntoResponse, AppError> {
    let url = validated_url(&input.url)?;
    let preset = preset_or_default(&state, input.preset).await?;
    let job = Job::new(url, preset);

    state
        .queue
        .write()
        .await
        .add(job.clone())
        .map_err(AppError::queue)?;
    state.events.info(Some(&job.id), format!("queued: {}", job.url));
    spawn_title_probe(&state, &job);

    Ok((StatusCode::CREATED, Json(job)))
}

#[tracing::instrument(skip(state))]
pub async fn enqueue_batch(
    State(state): State<AppState>,
    Json(input): Json<BatchRequest>
) -> Result<impl IntoResponse, AppError> {
    let urls = parse_url_list(&input.urls_text);
    if urls.is_empty() {
        return Err(AppError::bad_request("no URLs in the list"));
    }
    let preset = preset_or_default(&state, input.preset).await?;
    let jobs: Vec<Job> = urls
        .into_iter()
        .map(|url| Job::new(url, preset.clone()))
        .collect();

    let ids = state
        .queue
        .write()
        .await
        .add_many(jobs.clone())
        .map_err(AppError::queue)?;
    state.events.info(None, format!("added to queue: {}", ids.len()));
    for job in &jobs {
        spawn_title_probe(&state, job);
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "added": ids.len(), "ids": ids }))
    ))
}

#[tracing::instrument(skip(state))]
pub async fn edit_job_preset(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(preset): Json<Preset>
) -> Result<impl IntoResponse, AppError> {
    preset.validate().map_err(AppError::preset)?;
    let id = JobId::from(id);
    state
        .queue
        .write()
        .await
        .edit_preset(&id, preset)
        .map_err(AppError::queue)?;
    state.events.info(Some(&id), "preset updated");
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state))]
pub async fn remove_job(
    State(state): State<AppState>,
    Path(id): Path<String>
) -> Result<Json<Job>, AppError> {
    let id = JobId::from(id);
    let job = state
        .queue
        .write()
        .await
        .remove(&id)
        .map_err(AppError::queue)?;
    state.events.info(Some(&id), "removed from queue");
    Ok(Json(job))
}

#[tracing::instrument(skip(state))]
pub async fn clear_jobs(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let removed = state.queue.write().await.clear().map_err(AppError::queue)?;
    state.events.info(None, format!("queue cleared ({removed} removed)"));
    Ok(Json(serde_json::json!({ "removed": removed })))
}

#[tracing::instrument(skip(state))]
pub async fn start_queue(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let count = state
        .orchestrator
        .start_queue()
        .await
        .map_err(AppError::queue)?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "jobs": count }))))
}

#[tracing::instrument(skip(state))]
pub async fn cancel(State(state): State<AppState>) -> impl IntoResponse {
    if state.queue.read().await.is_running() {
        state.events.warn(None, "cancel requested");
    }
    state.orchestrator.cancel();
    StatusCode::ACCEPTED
}

#[tracing::instrument(skip(state))]
pub async fn download_once(
    State(state): State<AppState>,
    Json(input): Json<JobRequest>
) -> Result<impl IntoResponse, AppError> {
    let url = validated_url(&input.url)?;
    let preset = preset_or_default(&state, input.preset).await?;
    let id = state
        .orchestrator
        .start_single(Job::new(url, preset))
        .await
        .map_err(AppError::queue)?;
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "id": id }))))
}

#[tracing::instrument(skip(state))]
pub async fn analyze_url(
    State(state): State<AppState>,
    Json(input): Json<JobRequest>
) -> Result<Json<KnownLanguages>, AppError> {
    let url = validated_url(&input.url)?;
    let preset = preset_or_default(&state, input.preset).await?;
    let known = analyze(
        state.engine.as_ref(),
        &state.events,
        &state.languages,
        &url,
        &lookup_options(&preset)
    )
    .await
    .map_err(|e| AppError::bad_request(e.to_string()))?;
    Ok(Json(known))
}

/// Choices a client can offer when building a preset.
pub async fn preset_options() -> Json<serde_json::Value> {
    let heights: Vec<_> = Height::ladder()
        .map(|h| serde_json::json!({ "value": h.get(), "label": h.label() }))
        .collect();
    let audio_formats: Vec<_> = AudioFormat::ALL
        .iter()
        .map(|f| {
            serde_json::json!({
                "value": f.codec(),
                "label": f.label(),
                "extension": f.extension(),
                "bitrates": f.bitrates()
            })
        })
        .collect();
    Json(serde_json::json!({
        "heights": heights,
        "default_height": Height::DEFAULT.get(),
        "video_codecs": ["auto", "av1", "vp9", "h264"],
        "audio_codecs": ["auto", "opus", "aac", "vorbis"],
        "containers": ["auto", "mp4", "mkv", "webm"],
        "audio_formats": audio_formats
    }))
}

pub async fn languages(State(state): State<AppState>) -> Json<KnownLanguages> {
    Json(state.languages.read().await.clone())
}

pub async fn get_default_preset(State(state): State<AppState>) -> Result<Json<Preset>, AppError> {
    Ok(Json(Settings::load_preset(&state.pool).await?))
}

#[tracing::instrument(skip(state))]
pub async fn put_default_preset(
    State(state): State<AppState>,
    Json(preset): Json<Preset>
) -> Result<Json<Preset>, AppError> {
    preset.validate().map_err(AppError::preset)?;
    Settings::save_preset(&state.pool, &preset).await?;
    tracing::info!("Saved default preset");
    Ok(Json(preset))
}

pub async fn get_settings(
    State(state): State<AppState>
) -> Result<Json<HashMap<String, String>>, AppError> {
    Ok(Json(Settings::get_all(&state.pool).await?))
}

/// Extractor args and the ffmpeg path apply to the next engine call. The binary
/// path and naming limits are read at startup.
#[tracing::instrument(skip(state))]
pub async fn update_engine_settings(
    State(state): State<AppState>,
    Json(input): Json<EngineSettings>
) -> Result<Json<HashMap<String, String>>, AppError> {
    input.validate()?;

    if let Some(ref args_str) = input.extractor_args {
        Settings::set(&state.pool, "extractor_args", args_str).await?;
        let parsed = parse_extractor_args(args_str);
        let mut yt_dlp = state.yt_dlp.write().await;
        yt_dlp.set_extra_args(parsed);
    }

    if let Some(ref path) = input.ffmpeg_path {
        Settings::set(&state.pool, "ffmpeg_path", path).await?;
        let mut yt_dlp = state.yt_dlp.write().await;
        if path.trim().is_empty() {
            yt_dlp.set_ffmpeg_location(None);
        } else {
            yt_dlp.set_ffmpeg_location(Some(PathBuf::from(path.trim())));
        }
    }

    if let Some(ref path) = input.ytdlp_path {
        Settings::set(&state.pool, "ytdlp_path", path).await?;
        tracing::info!("yt-dlp path stored, it takes effect after a restart");
    }

    if let Some(limit) = input.safe_max_path {
        Settings::set(&state.pool, "safe_max_path", &limit.to_string()).await?;
    }
    if let Some(min) = input.min_title_len {
        Settings::set(&state.pool, "min_title_len", &min.to_string()).await?;
    }

    tracing::info!("Updated engine settings");
    Ok(Json(Settings::get_all(&state.pool).await?))
}

#[tracing::instrument(skip(state, multipart))]
pub async fn upload_cookies(
    State(state): State<AppState>,
    mut multipart: Multipart
) -> Result<impl IntoResponse, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Invalid upload: {e}")))?
    {
        if field.name() == Some("cookies_file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request(format!("Failed to read file: {e}")))?;

            if data.is_empty() {
                return Err(AppError::bad_request("Empty file"));
            }

            let cookies_path = PathBuf::from(COOKIES_PATH);
            if let Some(dir) = cookies_path.parent() {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| AppError::internal(format!("Failed to create data dir: {e}")))?;
            }
            tokio::fs::write(&cookies_path, &data)
                .await
                .map_err(|e| AppError::internal(format!("Failed to save cookies: {e}")))?;

            let path_str = cookies_path.to_string_lossy().to_string();
            Settings::set(&state.pool, "cookies_file", &path_str).await?;

            let mut yt_dlp = state.yt_dlp.write().await;
            yt_dlp.set_cookies_file(Some(cookies_path));

            tracing::info!("Cookies file uploaded");
            return Ok((StatusCode::OK, Json(serde_json::json!({ "cookies_file": path_str }))));
        }
    }

    Err(AppError::bad_request("No cookies file in upload"))
}

#[tracing::instrument(skip(state))]
pub async fn delete_cookies(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let cookies_path = PathBuf::from(COOKIES_PATH);
    if tokio::fs::try_exists(&cookies_path).await.unwrap_or(false) {
        tokio::fs::remove_file(&cookies_path)
            .await
            .map_err(|e| AppError::internal(format!("Failed to delete cookies: {e}")))?;
    }

    Settings::set(&state.pool, "cookies_file", "").await?;

    let mut yt_dlp = state.yt_dlp.write().await;
    yt_dlp.set_cookies_file(None);

    tracing::info!("Cookies file deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// One `--extractor-args` pair from newline-separated entries.
pub fn parse_extractor_args(input: &str) -> Vec<String> {
    let entries: Vec<&str> = input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if entries.is_empty() {
        return Vec::new();
    }
    vec!["--extractor-args".to_string(), entries.join(";")]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extractor_args() {
        let input = "  youtube:player-client=default,mweb  \n\n  youtube:po_token=abc  ";
        assert_eq!(parse_extractor_args(input), vec![
            "--extractor-args",
            "youtube:player-client=default,mweb;youtube:po_token=abc"
        ]);
        assert!(parse_extractor_args("  \n  ").is_empty());
    }

    #[test]
    fn test_parse_url_list_skips_blanks_and_comments() {
        let text = "https://a.example/1\n\n   # later\nhttps://a.example/2  \n#https://skip\n";
        assert_eq!(parse_url_list(text), vec!["https://a.example/1", "https://a.example/2"]);
        assert!(parse_url_list("\n# only comments\n").is_empty());
    }

    #[test]
    fn test_job_request_rejects_unknown_preset_keys() {
        let ok: JobRequest = serde_json::from_str(
            r#"{"url": "u", "preset": {"height": 720, "container": "mkv"}}"#
        )
        .unwrap();
        assert_eq!(ok.preset.unwrap().height.get(), 720);

        let bad = serde_json::from_str::<JobRequest>(r#"{"url": "u", "preset": {"resolution": 720}}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_engine_settings_reject_tiny_title_len() {
        let tiny: EngineSettings = serde_json::from_str(r#"{"min_title_len": 1}"#).unwrap();
        assert!(tiny.validate().is_err());
        let ok: EngineSettings = serde_json::from_str(r#"{"min_title_len": 2, "safe_max_path": 200}"#).unwrap();
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_empty_url_is_rejected() {
        assert!(validated_url("   ").is_err());
        assert_eq!(validated_url(" https://x ").unwrap(), "https://x");
    }

    #[tokio::test]
    async fn test_preset_options_lists_ladder_and_formats() {
        let Json(options) = preset_options().await;
        assert_eq!(options["heights"][0]["value"], 480);
        assert_eq!(options["heights"][4]["label"], "2160p (4K)");
        assert_eq!(options["default_height"], 1080);

        let wav = &options["audio_formats"][4];
        assert_eq!(wav["value"], "wav");
        assert!(wav["bitrates"].as_array().unwrap().is_empty());
        assert_eq!(options["audio_formats"][3]["extension"], "ogg");
    }
}
