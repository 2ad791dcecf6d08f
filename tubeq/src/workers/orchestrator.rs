use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use yt_dlp::VideoInfo;

use super::executor::{build_options, execute, final_extension, final_streams};
use super::fallback::{Decision, FallbackPolicy};
use super::probe::{PROBE_TIMEOUT, ProbeReport, probe_job, status_summary};
use crate::cancel::CancelFlag;
use crate::engine::MediaEngine;
use crate::events::{EventBus, RunKind};
use crate::languages::KnownLanguages;
use crate::models::{Container, Job, JobId, JobStatus};
use crate::namer::{ArtifactName, NamingPolicy, short_acodec, short_vcodec};
use crate::queue::{JobReport, QueueError, SharedQueue};
use crate::resolver::{describe, resolve};

#[derive(Debug)]
pub enum OrchestratorCommand {
    RunQueue(Vec<JobId>),
    RunSingle(JobId)
}

/// Controller side of the orchestrator. Starting a run claims the queue's run
/// marker first, so a second start is rejected instead of waiting.
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<OrchestratorCommand>,
    queue: SharedQueue,
    cancel: CancelFlag
}

impl OrchestratorHandle {
    async fn dispatch(&self, command: OrchestratorCommand) -> Result<(), QueueError> {
        if self.tx.send(command).await.is_err() {
            self.queue.write().await.end_run();
            return Err(QueueError::Stopped);
        }
        Ok(())
    }

    /// Starts draining the queue. Returns the number of jobs in the run.
    pub async fn start_queue(&self) -> Result<usize, QueueError> {
        let ids = self.queue.write().await.begin_queue_run()?;
        self.cancel.reset();
        let count = ids.len();
        self.dispatch(OrchestratorCommand::RunQueue(ids)).await?;
        Ok(count)
    }

    /// Runs one job outside the queue.
    pub async fn start_single(&self, job: Job) -> Result<JobId, QueueError> {
        let id = self.queue.write().await.begin_single(job)?;
        self.cancel.reset();
        self.dispatch(OrchestratorCommand::RunSingle(id.clone())).await?;
        Ok(id)
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Executes jobs strictly one after another.
pub struct Orchestrator {
    engine: Arc<dyn MediaEngine>,
    queue: SharedQueue,
    events: EventBus,
    cancel: CancelFlag,
    languages: Arc<RwLock<KnownLanguages>>,
    naming: NamingPolicy,
    probe_timeout: Duration,
    rx: mpsc::Receiver<OrchestratorCommand>
}

impl Orchestrator {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        queue: SharedQueue,
        events: EventBus,
        cancel: CancelFlag,
        languages: Arc<RwLock<KnownLanguages>>,
        naming: NamingPolicy
    ) -> (Self, OrchestratorHandle) {
        let (tx, rx) = mpsc::channel(16);
        let handle = OrchestratorHandle {
            tx,
            queue: queue.clone(),
            cancel: cancel.clone()
        };
        let orchestrator = Self {
            engine,
            queue,
            events,
            cancel,
            languages,
            naming,
            probe_timeout: PROBE_TIMEOUT,
            rx
        };
        (orchestrator, handle)
    }

    pub async fn run(mut self) {
        tracing::info!("Orchestrator started");

        while let Some(command) = self.rx.recv().await {
            let (kind, aborted) = match command {
                OrchestratorCommand::RunQueue(ids) => (RunKind::Queue, self.run_queue(&ids).await),
                OrchestratorCommand::RunSingle(id) => {
                    let status = self.run_job(&id).await;
                    (RunKind::Single, status == Some(JobStatus::Canceled))
                }
            };
            self.queue.write().await.end_run();
            self.events.run_finished(kind, aborted);
        }

        tracing::info!("Orchestrator stopped");
    }

    /// Returns whether the run was aborted by a cancellation.
    async fn run_queue(&self, ids: &[JobId]) -> bool {
        let total = ids.len();
        self.events.info(None, format!("queue started: {total} job(s)"));

        for (index, id) in ids.iter().enumerate() {
            if self.cancel.is_cancelled() {
                self.events.warn(None, "queue stopped by user");
                return true;
            }
            self.events.info(Some(id), format!("[{}/{}] starting", index + 1, total));

            if self.run_job(id).await == Some(JobStatus::Canceled) {
                self.events.warn(None, "queue stopped by user");
                return true;
            }
        }

        self.events.info(None, "queue finished");
        false
    }

    async fn run_job(&self, id: &JobId) -> Option<JobStatus> {
        let Some(job) = self.queue.write().await.mark_running(id) else {
            self.events.warn(Some(id), "job disappeared before it could start");
            return None;
        };
        self.events.status(id, JobStatus::Running);

        let report = self.process(&job).await;
        let status = report.status;
        if let Some(path) = &report.result_path {
            self.events.info(Some(id), format!("result: {}", path.display()));
        }

        self.queue.write().await.finish(id, report);
        self.events.status(id, status);
        Some(status)
    }

    async fn process(&self, job: &Job) -> JobReport {
        let preset = &job.preset;
        let resolution = resolve(preset);

        self.events.info(Some(&job.id), format!("url: {}", job.url));
        self.events.info(Some(&job.id), describe(preset, &resolution));
        if let Some(warning) = resolution.combined_warning() {
            self.events.warn(Some(&job.id), warning);
        }
        self.events.info(Some(&job.id), format!("format selector: {}", resolution.selector));
        if let Some(cookies) = &preset.cookies {
            self.events.info(Some(&job.id), format!("using cookie file: {}", cookies.display()));
        }

        if let Err(e) = tokio::fs::create_dir_all(&preset.outdir).await {
            let message = format!("cannot create output folder {}: {e}", preset.outdir.display());
            self.events.error(Some(&job.id), message.clone());
            return JobReport {
                status: JobStatus::Failed,
                result_path: None,
                error: Some(message)
            };
        }

        let mut policy = if preset.audio_only {
            FallbackPolicy::disabled()
        } else {
            FallbackPolicy::new()
        };

        let probe_options = build_options(preset, &resolution.selector, preset.container, true);
        let probed = probe_job(
            self.engine.as_ref(),
            &self.events,
            &self.languages,
            &self.queue,
            job,
            &probe_options,
            self.probe_timeout
        )
        .await;

        loop {
            let container = policy.container(preset.container);
            if policy.is_fallback() {
                self.events.warn(
                    Some(&job.id),
                    format!("retrying as {} from scratch", container.as_str().to_uppercase())
                );
            }
            let options = build_options(preset, &resolution.selector, container, policy.resumes_partial());

            match execute(self.engine.as_ref(), &self.events, &self.cancel, &job.id, &job.url, &options).await {
                Ok(info) => {
                    let result_path = self
                        .finalize(job, &info, probed.as_ref(), container)
                        .await;
                    let status = policy.success_status();
                    self.events.info(Some(&job.id), format!("download complete ({status})"));
                    return JobReport {
                        status,
                        result_path,
                        error: None
                    };
                }
                Err(err) => match policy.on_failure(&err, self.cancel.is_cancelled()) {
                    Decision::RetryInFallback => {
                        self.events.warn(Some(&job.id), format!("attempt failed: {err}"));
                    }
                    Decision::GiveUp(status) => {
                        if status == JobStatus::Canceled {
                            self.events.warn(Some(&job.id), "download cancelled by user");
                        } else {
                            self.events.error(Some(&job.id), format!("download error: {err}"));
                        }
                        return JobReport {
                            status,
                            result_path: None,
                            error: Some(err.to_string())
                        };
                    }
                }
            }
        }
    }

    /// Renames the artifact to its canonical name. Naming problems never fail the job.
    async fn finalize(
        &self,
        job: &Job,
        info: &VideoInfo,
        probed: Option<&ProbeReport>,
        container: Container
    ) -> Option<PathBuf> {
        let expected_ext = probed.map(|p| p.expected_ext.as_str());
        let probed = probed.map(|p| &p.info);
        let preset = &job.preset;
        let ext = final_extension(preset, container, info);
        if let Some(expected) = expected_ext.filter(|expected| *expected != ext) {
            self.events.info(
                Some(&job.id),
                format!("container is {} instead of the expected {}", ext.to_uppercase(), expected.to_uppercase())
            );
        }

        let (video_tag, audio_tag, height) = match preset.audio_only() {
            Some(audio) => {
                let codec = audio.format.codec().to_string();
                self.events.info(
                    Some(&job.id),
                    format!("A:{} → {}", codec.to_uppercase(), ext.to_uppercase())
                );
                ("audio".to_string(), codec, None)
            }
            None => {
                let streams = final_streams(info, probed);
                self.events.info(
                    Some(&job.id),
                    status_summary(streams.video.as_deref(), streams.audio.as_deref(), &ext)
                );
                (
                    short_vcodec(streams.video.as_deref()),
                    short_acodec(streams.audio.as_deref()),
                    streams.height
                )
            }
        };

        if preset.playlist || info.is_playlist() {
            self.events.info(Some(&job.id), "playlist: keeping the engine's file names");
            self.queue.write().await.set_result_path(&job.id, preset.outdir.clone());
            return Some(preset.outdir.clone());
        }

        let Some(source) = info.artifact_path() else {
            self.events.warn(Some(&job.id), "the engine did not report the output file");
            return None;
        };
        self.queue.write().await.set_result_path(&job.id, source.clone());

        let name = ArtifactName {
            video_tag,
            audio_tag,
            height,
            title: Some(info.title.clone())
                .filter(|t| !t.trim().is_empty())
                .or_else(|| job.title.clone()),
            id: Some(info.id.clone()),
            ext: Some(ext)
        };

        match self.naming.rename(&source, &name).await {
            Ok(target) => {
                if target != source {
                    self.events.info(
                        Some(&job.id),
                        format!(
                            "renamed: {} → {}",
                            display_name(&source),
                            display_name(&target)
                        )
                    );
                }
                Some(target)
            }
            Err(e) => {
                self.events.warn(Some(&job.id), format!("could not rename the result: {e}"));
                Some(source)
            }
        }
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().to_string())
}
