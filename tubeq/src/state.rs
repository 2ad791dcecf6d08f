use std::sync::Arc;

use tokio::sync::RwLock;
use yt_dlp::YtDlp;

use crate::db::DbPool;
use crate::engine::MediaEngine;
use crate::events::EventBus;
use crate::languages::KnownLanguages;
use crate::queue::SharedQueue;
use crate::workers::orchestrator::OrchestratorHandle;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    /// Engine defaults (cookies, extractor args, ffmpeg) that settings handlers update.
    pub yt_dlp: Arc<RwLock<YtDlp>>,
    /// The same engine, as the orchestrator sees it.
    pub engine: Arc<dyn MediaEngine>,
    pub queue: SharedQueue,
    pub orchestrator: OrchestratorHandle,
    pub events: EventBus,
    pub languages: Arc<RwLock<KnownLanguages>>
}
