use std::time::{Duration, Instant};

use yt_dlp::DownloadProgress;

const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_MIN_STEP: f64 = 0.5;

/// Throttle for human-facing progress lines.
///
/// The first tick and completion ticks always pass. Anything in between needs
/// both the interval to have elapsed and the percentage to have moved by the step.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    interval: Duration,
    min_step: f64,
    last: Option<(Instant, f64)>
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_MIN_STEP)
    }
}

impl ProgressReporter {
    pub fn new(interval: Duration, min_step: f64) -> Self {
        Self {
            interval,
            min_step,
            last: None
        }
    }

    pub fn should_emit(&mut self, percent: f64, finished: bool, now: Instant) -> bool {
        let emit = match self.last {
            None => true,
            Some(_) if finished || percent >= 100.0 => true,
            Some((at, last_percent)) => {
                now.saturating_duration_since(at) >= self.interval
                    && (percent - last_percent).abs() >= self.min_step
            }
        };

        if emit {
            self.last = Some((now, percent));
        }
        emit
    }
}

/// One-line rendering of a progress tick, in the engine's own log style.
pub fn progress_line(progress: &DownloadProgress) -> String {
    format!(
        "[download] {:5.1}% of {} at {} ETA {}",
        progress.percent(),
        progress.format_size(),
        progress.format_speed(),
        progress.format_eta()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_tick_always_passes() {
        let mut reporter = ProgressReporter::default();
        assert!(reporter.should_emit(0.0, false, Instant::now()));
    }

    #[test]
    fn test_intermediate_ticks_are_throttled() {
        let mut reporter = ProgressReporter::default();
        let start = Instant::now();
        assert!(reporter.should_emit(1.0, false, start));

        // Enough progress, too soon.
        assert!(!reporter.should_emit(5.0, false, start + Duration::from_millis(100)));
        // Enough time, too little progress.
        assert!(!reporter.should_emit(1.2, false, start + Duration::from_millis(900)));
        // Both.
        assert!(reporter.should_emit(5.0, false, start + Duration::from_millis(600)));
    }

    #[test]
    fn test_completion_is_never_suppressed() {
        let mut reporter = ProgressReporter::default();
        let start = Instant::now();
        assert!(reporter.should_emit(99.9, false, start));
        assert!(reporter.should_emit(100.0, true, start + Duration::from_millis(1)));
        assert!(reporter.should_emit(100.0, true, start + Duration::from_millis(2)));
    }

    #[test]
    fn test_progress_line() {
        let line = progress_line(&DownloadProgress::downloading(1024, Some(4096)));
        assert_eq!(line, "[download]  25.0% of 1.00 KB of 4.00 KB at Unknown B/s ETA Unknown");
    }
}
