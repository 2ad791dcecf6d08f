use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::models::{Job, JobId, JobStatus, Preset};

pub type SharedQueue = Arc<RwLock<JobQueue>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("a download is running; cancel it or wait before changing the queue")]
    Busy,

    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("the queue is empty")]
    Empty,

    #[error("the download worker is not running")]
    Stopped
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Queue,
    Single
}

/// Terminal result the orchestrator records for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub status: JobStatus,
    pub result_path: Option<PathBuf>,
    pub error: Option<String>
}

/// Ordered FIFO of jobs plus the single-flight run marker.
///
/// Composition changes are only accepted while idle; they fail with
/// `QueueError::Busy` during a run instead of waiting.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Vec<Job>,
    run: RunState,
    last_single: Option<Job>
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedQueue {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn run_state(&self) -> RunState {
        self.run
    }

    pub fn is_running(&self) -> bool {
        self.run != RunState::Idle
    }

    /// Latest one-off job, kept for inspection after it finished.
    pub fn last_single(&self) -> Option<&Job> {
        self.last_single.as_ref()
    }

    pub fn get(&self, id: &JobId) -> Option<&Job> {
        self.jobs
            .iter()
            .chain(self.last_single.iter())
            .find(|job| &job.id == id)
    }

    fn job_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.jobs
            .iter_mut()
            .chain(self.last_single.iter_mut())
            .find(|job| &job.id == id)
    }

    fn ensure_idle(&self) -> Result<(), QueueError> {
        if self.is_running() {
            Err(QueueError::Busy)
        } else {
            Ok(())
        }
    }

    pub fn add(&mut self, job: Job) -> Result<JobId, QueueError> {
        self.ensure_idle()?;
        let id = job.id.clone();
        self.jobs.push(job);
        Ok(id)
    }

    pub fn add_many(&mut self, jobs: Vec<Job>) -> Result<Vec<JobId>, QueueError> {
        self.ensure_idle()?;
        let ids = jobs.iter().map(|job| job.id.clone()).collect();
        self.jobs.extend(jobs);
        Ok(ids)
    }

    pub fn remove(&mut self, id: &JobId) -> Result<Job, QueueError> {
        self.ensure_idle()?;
        let index = self
            .jobs
            .iter()
            .position(|job| &job.id == id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        Ok(self.jobs.remove(index))
    }

    /// Replaces the preset of one queued job. Other jobs keep theirs.
    pub fn edit_preset(&mut self, id: &JobId, preset: Preset) -> Result<(), QueueError> {
        self.ensure_idle()?;
        let job = self
            .jobs
            .iter_mut()
            .find(|job| &job.id == id)
            .ok_or_else(|| QueueError::NotFound(id.clone()))?;
        job.preset = preset;
        Ok(())
    }

    pub fn clear(&mut self) -> Result<usize, QueueError> {
        self.ensure_idle()?;
        let removed = self.jobs.len();
        self.jobs.clear();
        Ok(removed)
    }

    /// Marks a queue run as active and returns the ids to process, in order.
    pub fn begin_queue_run(&mut self) -> Result<Vec<JobId>, QueueError> {
        self.ensure_idle()?;
        if self.is_empty() {
            return Err(QueueError::Empty);
        }
        self.run = RunState::Queue;
        Ok(self.jobs.iter().map(|job| job.id.clone()).collect())
    }

    pub fn begin_single(&mut self, job: Job) -> Result<JobId, QueueError> {
        self.ensure_idle()?;
        self.run = RunState::Single;
        let id = job.id.clone();
        self.last_single = Some(job);
        Ok(id)
    }

    pub fn end_run(&mut self) {
        self.run = RunState::Idle;
    }

    /// Moves a job to `Running` and returns a snapshot to execute.
    pub fn mark_running(&mut self, id: &JobId) -> Option<Job> {
        let job = self.job_mut(id)?;
        job.status = JobStatus::Running;
        job.error = None;
        Some(job.clone())
    }

    /// Records a resolved title unless one is already known.
    pub fn set_title_if_missing(&mut self, id: &JobId, title: &str) -> bool {
        match self.job_mut(id) {
            Some(job) if job.title.is_none() => {
                job.title = Some(title.to_string());
                true
            }
            _ => false
        }
    }

    pub fn set_result_path(&mut self, id: &JobId, path: PathBuf) {
        if let Some(job) = self.job_mut(id) {
            job.result_path = Some(path);
        }
    }

    /// Stores the terminal state. Successful queue jobs leave the queue.
    pub fn finish(&mut self, id: &JobId, report: JobReport) -> Option<Job> {
        let job = self.job_mut(id)?;
        job.status = report.status;
        job.error = report.error;
        if report.result_path.is_some() {
            job.result_path = report.result_path;
        }
        let finished = job.clone();

        if finished.status.is_success() {
            self.jobs.retain(|job| &job.id != id);
        }
        Some(finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(url: &str) -> Job {
        Job::new(url, Preset::default())
    }

    fn report(status: JobStatus) -> JobReport {
        JobReport {
            status,
            result_path: None,
            error: None
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = JobQueue::new();
        let a = queue.add(job("a")).unwrap();
        let b = queue.add(job("b")).unwrap();
        let c = queue.add(job("c")).unwrap();
        assert_eq!(queue.begin_queue_run().unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_mutations_rejected_while_running() {
        let mut queue = JobQueue::new();
        let a = queue.add(job("a")).unwrap();
        queue.begin_queue_run().unwrap();

        assert_eq!(queue.add(job("b")), Err(QueueError::Busy));
        assert_eq!(queue.remove(&a).unwrap_err(), QueueError::Busy);
        assert_eq!(queue.edit_preset(&a, Preset::default()), Err(QueueError::Busy));
        assert_eq!(queue.clear(), Err(QueueError::Busy));
        assert_eq!(queue.begin_single(job("c")), Err(QueueError::Busy));
        assert_eq!(queue.len(), 1);

        queue.end_run();
        assert!(queue.add(job("b")).is_ok());
    }

    #[test]
    fn test_empty_queue_cannot_start() {
        let mut queue = JobQueue::new();
        assert_eq!(queue.begin_queue_run(), Err(QueueError::Empty));
        assert!(!queue.is_running());
    }

    #[test]
    fn test_success_removes_exactly_one_job() {
        let mut queue = JobQueue::new();
        let a = queue.add(job("a")).unwrap();
        queue.add(job("b")).unwrap();

        queue.mark_running(&a).unwrap();
        queue.finish(&a, report(JobStatus::SucceededFallback)).unwrap();
        assert_eq!(queue.len(), 1);
        assert!(queue.get(&a).is_none());
    }

    #[test]
    fn test_failure_and_cancel_keep_the_job() {
        let mut queue = JobQueue::new();
        let a = queue.add(job("a")).unwrap();
        let b = queue.add(job("b")).unwrap();

        queue.finish(&a, JobReport {
            status: JobStatus::Failed,
            result_path: None,
            error: Some("boom".to_string())
        });
        queue.finish(&b, report(JobStatus::Canceled));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get(&a).unwrap().error.as_deref(), Some("boom"));
        assert_eq!(queue.get(&b).unwrap().status, JobStatus::Canceled);
    }

    #[test]
    fn test_edit_preset_touches_only_one_job() {
        let mut queue = JobQueue::new();
        let a = queue.add(job("a")).unwrap();
        let b = queue.add(job("b")).unwrap();

        let mut preset = Preset::default();
        preset.playlist = true;
        queue.edit_preset(&a, preset).unwrap();

        assert!(queue.get(&a).unwrap().preset.playlist);
        assert!(!queue.get(&b).unwrap().preset.playlist);
        assert!(matches!(
            queue.edit_preset(&JobId::from("nope".to_string()), Preset::default()),
            Err(QueueError::NotFound(_))
        ));
    }

    #[test]
    fn test_single_job_is_kept_for_inspection() {
        let mut queue = JobQueue::new();
        let id = queue.begin_single(job("one-off")).unwrap();
        assert_eq!(queue.run_state(), RunState::Single);

        queue.mark_running(&id).unwrap();
        queue.finish(&id, report(JobStatus::Succeeded));
        queue.end_run();

        assert_eq!(queue.last_single().unwrap().status, JobStatus::Succeeded);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_title_is_set_once() {
        let mut queue = JobQueue::new();
        let a = queue.add(job("a")).unwrap();
        assert!(queue.set_title_if_missing(&a, "First"));
        assert!(!queue.set_title_if_missing(&a, "Second"));
        assert_eq!(queue.get(&a).unwrap().title.as_deref(), Some("First"));
    }
}
