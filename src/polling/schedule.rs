//! Poll interval selection.

use std::time::Duration;
use tokio::time::Instant;

/// Which interval the poller is currently using.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    /// Nothing is processing; no requests are issued.
    Idle,
    /// Short interval right after processing started.
    Fast,
    /// Long interval once the fast window has elapsed.
    Slow,
}

/// Fast-then-slow polling schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub fast_interval: Duration,
    pub fast_window: Duration,
    pub slow_interval: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            fast_interval: Duration::from_secs(5),
            fast_window: Duration::from_secs(120),
            slow_interval: Duration::from_secs(30),
        }
    }
}

impl From<&crate::config::PollingConfig> for PollSchedule {
    fn from(config: &crate::config::PollingConfig) -> Self {
        Self {
            fast_interval: Duration::from_secs(config.fast_interval_secs),
            fast_window: Duration::from_secs(config.fast_window_secs),
            slow_interval: Duration::from_secs(config.slow_interval_secs),
        }
    }
}

impl PollSchedule {
    /// Phase for a poller whose oldest in-flight diagnostic was first seen
    /// processing at `processing_since`.
    pub fn phase(&self, processing_since: Option<Instant>, now: Instant) -> PollPhase {
        match processing_since {
            None => PollPhase::Idle,
            Some(since) if now.saturating_duration_since(since) < self.fast_window => {
                PollPhase::Fast
            }
            Some(_) => PollPhase::Slow,
        }
    }

    /// Delay until the next status check, or `None` when idle.
    pub fn next_delay(&self, processing_since: Option<Instant>, now: Instant) -> Option<Duration> {
        match self.phase(processing_since, now) {
            PollPhase::Idle => None,
            PollPhase::Fast => Some(self.fast_interval),
            PollPhase::Slow => Some(self.slow_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_without_processing() {
        let schedule = PollSchedule::default();
        assert_eq!(schedule.next_delay(None, Instant::now()), None);
    }

    #[test]
    fn test_fast_then_slow() {
        let schedule = PollSchedule::default();
        let start = Instant::now();

        assert_eq!(
            schedule.next_delay(Some(start), start),
            Some(Duration::from_secs(5))
        );
        assert_eq!(
            schedule.phase(Some(start), start + Duration::from_secs(119)),
            PollPhase::Fast
        );
        assert_eq!(
            schedule.phase(Some(start), start + Duration::from_secs(120)),
            PollPhase::Slow
        );
        assert_eq!(
            schedule.next_delay(Some(start), start + Duration::from_secs(600)),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_from_config() {
        let config = crate::config::PollingConfig {
            fast_interval_secs: 2,
            fast_window_secs: 10,
            slow_interval_secs: 60,
        };
        let schedule = PollSchedule::from(&config);
        assert_eq!(schedule.fast_interval, Duration::from_secs(2));
        assert_eq!(schedule.fast_window, Duration::from_secs(10));
        assert_eq!(schedule.slow_interval, Duration::from_secs(60));
    }
}
