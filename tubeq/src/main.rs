mod cancel;
mod db;
mod engine;
mod error;
mod events;
mod handlers;
mod languages;
mod models;
mod namer;
mod progress;
mod queue;
mod resolver;
mod state;
mod workers;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put}
};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yt_dlp::YtDlp;

use cancel::CancelFlag;
use engine::MediaEngine;
use events::EventBus;
use handlers::{api, events as event_stream};
use languages::KnownLanguages;
use models::Settings;
use queue::JobQueue;
use state::AppState;
use workers::orchestrator::Orchestrator;

/// First line of `<binary> <flag>`, if the program runs at all.
async fn tool_version(binary: &str, flag: &str) -> Option<String> {
    let output = tokio::process::Command::new(binary)
        .arg(flag)
        .output()
        .await
        .ok()?;
    if output.status.success() {
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    } else {
        None
    }
}

async fn configure_engine(pool: &db::DbPool) -> YtDlp {
    let mut yt_dlp = YtDlp::new();

    if let Ok(Some(ytdlp_path)) = Settings::get_nonempty(pool, "ytdlp_path").await {
        yt_dlp.set_binary(PathBuf::from(&ytdlp_path));
        tracing::info!("Using custom yt-dlp path: {}", ytdlp_path);
    }

    if let Ok(args_str) = Settings::get_extractor_args(pool).await {
        let parsed = api::parse_extractor_args(&args_str);
        if !parsed.is_empty() {
            yt_dlp.set_extra_args(parsed);
        }
    }

    if let Ok(Some(cookies_path)) = Settings::get_cookies_file(pool).await {
        if cookies_path.exists() {
            tracing::info!("Using cookies file: {}", cookies_path.display());
            yt_dlp.set_cookies_file(Some(cookies_path));
        } else {
            tracing::warn!("Configured cookies file {} does not exist", cookies_path.display());
        }
    }

    if let Ok(Some(ffmpeg_path)) = Settings::get_nonempty(pool, "ffmpeg_path").await {
        yt_dlp.set_ffmpeg_location(Some(PathBuf::from(&ffmpeg_path)));
        tracing::info!("Using custom ffmpeg path: {}", ffmpeg_path);
    }

    match yt_dlp.check_binary().await {
        Ok(version) => tracing::info!("yt-dlp version: {}", version),
        Err(e) => tracing::warn!("yt-dlp not found or not executable: {}", e)
    }

    yt_dlp
}

async fn check_ffmpeg(pool: &db::DbPool) {
    let binary = match Settings::get_nonempty(pool, "ffmpeg_path").await {
        Ok(Some(path)) if PathBuf::from(&path).is_dir() => {
            PathBuf::from(path).join("ffmpeg").to_string_lossy().to_string()
        }
        Ok(Some(path)) => path,
        _ => "ffmpeg".to_string()
    };

    match tool_version(&binary, "-version").await {
        Some(version) => tracing::info!("{}", version),
        None => tracing::warn!("ffmpeg not found at {}; merging and audio extraction will fail", binary)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubeq=info,yt_dlp=info,tower_http=debug".into())
        )
        .init();

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./tubeq.db".to_string());

    let pool = db::init_pool(&database_path).await?;
    tracing::info!("Database initialized at {}", database_path);

    let yt_dlp = Arc::new(RwLock::new(configure_engine(&pool).await));
    check_ffmpeg(&pool).await;

    let naming = Settings::naming_policy(&pool).await.unwrap_or_else(|e| {
        tracing::warn!("Failed to read naming settings, using defaults: {}", e);
        namer::NamingPolicy::default()
    });

    let engine: Arc<dyn MediaEngine> = yt_dlp.clone();
    let queue = JobQueue::shared();
    let events = EventBus::default();
    let languages = Arc::new(RwLock::new(KnownLanguages::default()));

    let (orchestrator, handle) = Orchestrator::new(
        engine.clone(),
        queue.clone(),
        events.clone(),
        CancelFlag::new(),
        languages.clone(),
        naming
    );

    tokio::spawn(async move {
        orchestrator.run().await;
    });

    let state = AppState {
        pool,
        yt_dlp,
        engine,
        queue,
        orchestrator: handle,
        events,
        languages
    };

    let app = Router::new()
        .route("/api/jobs", get(api::list_jobs).post(api::enqueue).delete(api::clear_jobs))
        .route("/api/jobs/batch", post(api::enqueue_batch))
        .route("/api/jobs/{id}", get(api::get_job).delete(api::remove_job))
        .route("/api/jobs/{id}/preset", put(api::edit_job_preset))
        .route("/api/queue/start", post(api::start_queue))
        .route("/api/cancel", post(api::cancel))
        .route("/api/download", post(api::download_once))
        .route("/api/analyze", post(api::analyze_url))
        .route("/api/languages", get(api::languages))
        .route("/api/options", get(api::preset_options))
        .route("/api/events", get(event_stream::stream_events))
        .route("/api/settings", get(api::get_settings))
        .route("/api/settings/engine", put(api::update_engine_settings))
        .route(
            "/api/settings/preset",
            get(api::get_default_preset).put(api::put_default_preset)
        )
        .route(
            "/api/settings/cookies",
            post(api::upload_cookies).delete(api::delete_cookies)
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8000".to_string());
    let addr = format!("0.0.0.0:{port}");
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
