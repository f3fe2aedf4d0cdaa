//! Scheduler configuration.

use kiln_config::SchedulerSettings;
use std::time::Duration;

/// Default sleep between ticks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Runtime settings for [`JobScheduler`](crate::JobScheduler).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between the end of one tick and the start of the next.
    pub poll_interval: Duration,
    /// `source` field stamped on published events.
    pub event_source: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            event_source: "scheduler".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            ..Self::default()
        }
    }
}
