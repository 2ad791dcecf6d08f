use crate::error::JobError;
use crate::models::{Container, JobStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Primary,
    Fallback
}

/// What to do after an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    RetryInFallback,
    GiveUp(JobStatus)
}

/// One retry in mkv after a failed primary attempt, never after a cancellation.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    attempt: Attempt,
    enabled: bool
}

impl FallbackPolicy {
    pub const FALLBACK_CONTAINER: Container = Container::Mkv;

    pub fn new() -> Self {
        Self {
            attempt: Attempt::Primary,
            enabled: true
        }
    }

    /// Audio-only jobs get no second attempt.
    pub fn disabled() -> Self {
        Self {
            attempt: Attempt::Primary,
            enabled: false
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.attempt == Attempt::Fallback
    }

    /// Container for the current attempt.
    pub fn container(&self, preferred: Container) -> Container {
        match self.attempt {
            Attempt::Primary => preferred,
            Attempt::Fallback => Self::FALLBACK_CONTAINER
        }
    }

    /// Fallback downloads start over instead of resuming primary fragments.
    pub fn resumes_partial(&self) -> bool {
        self.attempt == Attempt::Primary
    }

    pub fn on_failure(&mut self, error: &JobError, cancel_requested: bool) -> Decision {
        if cancel_requested || error.is_cancellation() {
            return Decision::GiveUp(JobStatus::Canceled);
        }
        if self.enabled && self.attempt == Attempt::Primary {
            self.attempt = Attempt::Fallback;
            return Decision::RetryInFallback;
        }
        Decision::GiveUp(JobStatus::Failed)
    }

    pub fn success_status(&self) -> JobStatus {
        match self.attempt {
            Attempt::Primary => JobStatus::Succeeded,
            Attempt::Fallback => JobStatus::SucceededFallback
        }
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn download_error() -> JobError {
        JobError::Download("HTTP Error 403".to_string())
    }

    #[test]
    fn test_primary_failure_retries_once_in_mkv() {
        let mut policy = FallbackPolicy::new();
        assert_eq!(policy.container(Container::Mp4), Container::Mp4);
        assert!(policy.resumes_partial());

        assert_eq!(policy.on_failure(&download_error(), false), Decision::RetryInFallback);
        assert_eq!(policy.container(Container::Mp4), Container::Mkv);
        assert!(!policy.resumes_partial());
        assert_eq!(policy.success_status(), JobStatus::SucceededFallback);

        assert_eq!(
            policy.on_failure(&JobError::Merge("again".to_string()), false),
            Decision::GiveUp(JobStatus::Failed)
        );
    }

    #[test]
    fn test_cancellation_always_wins() {
        let mut policy = FallbackPolicy::new();
        assert_eq!(policy.on_failure(&JobError::Cancelled, false), Decision::GiveUp(JobStatus::Canceled));

        let mut policy = FallbackPolicy::new();
        assert_eq!(policy.on_failure(&download_error(), true), Decision::GiveUp(JobStatus::Canceled));
        assert!(!policy.is_fallback());
    }

    #[test]
    fn test_disabled_policy_gives_up() {
        let mut policy = FallbackPolicy::disabled();
        assert_eq!(policy.on_failure(&download_error(), false), Decision::GiveUp(JobStatus::Failed));
        assert_eq!(policy.success_status(), JobStatus::Succeeded);
    }
}
