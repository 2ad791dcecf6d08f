use serde::Serialize;
use tokio::sync::broadcast;
use yt_dlp::DownloadProgress;

use crate::models::{JobId, JobStatus};
use crate::progress::progress_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Queue,
    Single
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Log {
        job: Option<JobId>,
        level: LogLevel,
        message: String
    },
    Progress {
        job: JobId,
        percent: f64,
        downloaded_bytes: u64,
        total_bytes: Option<u64>,
        speed: Option<f64>,
        eta: Option<f64>,
        line: String
    },
    Status {
        job: JobId,
        status: JobStatus
    },
    Title {
        job: JobId,
        title: String
    },
    RunFinished {
        kind: RunKind,
        aborted: bool
    }
}

/// Fan-out channel from the orchestrator to observers.
///
/// Sending never blocks; a subscriber that falls behind skips the events it missed.
/// Every log line is mirrored to `tracing`.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<JobEvent>
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn log(&self, job: Option<&JobId>, level: LogLevel, message: impl Into<String>) {
        let message = message.into();
        let job_id = job.map_or("-", JobId::as_str);
        match level {
            LogLevel::Info => tracing::info!(job = job_id, "{}", message),
            LogLevel::Warn => tracing::warn!(job = job_id, "{}", message),
            LogLevel::Error => tracing::error!(job = job_id, "{}", message)
        }
        self.publish(JobEvent::Log {
            job: job.cloned(),
            level,
            message
        });
    }

    pub fn info(&self, job: Option<&JobId>, message: impl Into<String>) {
        self.log(job, LogLevel::Info, message);
    }

    pub fn warn(&self, job: Option<&JobId>, message: impl Into<String>) {
        self.log(job, LogLevel::Warn, message);
    }

    pub fn error(&self, job: Option<&JobId>, message: impl Into<String>) {
        self.log(job, LogLevel::Error, message);
    }

    pub fn progress(&self, job: &JobId, progress: &DownloadProgress) {
        let line = progress_line(progress);
        tracing::debug!(job = job.as_str(), "{}", line);
        self.publish(JobEvent::Progress {
            job: job.clone(),
            percent: progress.percent(),
            downloaded_bytes: progress.downloaded_bytes,
            total_bytes: progress.total_bytes,
            speed: progress.speed,
            eta: progress.eta,
            line
        });
    }

    pub fn status(&self, job: &JobId, status: JobStatus) {
        if status.is_terminal() {
            tracing::info!(job = job.as_str(), "status: {}", status);
        } else {
            tracing::debug!(job = job.as_str(), "status: {}", status);
        }
        self.publish(JobEvent::Status {
            job: job.clone(),
            status
        });
    }

    pub fn title(&self, job: &JobId, title: &str) {
        self.publish(JobEvent::Title {
            job: job.clone(),
            title: title.to_string()
        });
    }

    pub fn run_finished(&self, kind: RunKind, aborted: bool) {
        tracing::info!(?kind, aborted, "run finished");
        self.publish(JobEvent::RunFinished { kind, aborted });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let job = JobId::from("job-1".to_string());

        bus.status(&job, JobStatus::Running);
        bus.info(Some(&job), "starting");
        bus.progress(&job, &DownloadProgress::downloading(50, Some(100)));
        bus.status(&job, JobStatus::Succeeded);

        assert!(matches!(rx.recv().await.unwrap(), JobEvent::Status { status: JobStatus::Running, .. }));
        assert!(matches!(rx.recv().await.unwrap(), JobEvent::Log { level: LogLevel::Info, .. }));
        match rx.recv().await.unwrap() {
            JobEvent::Progress { percent, .. } => assert!((percent - 50.0).abs() < f64::EPSILON),
            other => panic!("unexpected event: {other:?}")
        }
        assert!(matches!(rx.recv().await.unwrap(), JobEvent::Status { status: JobStatus::Succeeded, .. }));
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.run_finished(RunKind::Queue, false);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = JobEvent::Title {
            job: JobId::from("j".to_string()),
            title: "Clip".to_string()
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "title");
        assert_eq!(json["job"], "j");
        assert_eq!(json["title"], "Clip");
    }
}
