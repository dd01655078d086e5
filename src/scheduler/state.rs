use chrono::{DateTime, FixedOffset};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum SchedulerStatus {
    #[default]
    Idle,
    Waiting {
        next_mark: DateTime<FixedOffset>,
    },
    Firing,
    Stopped,
}

impl SchedulerStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Waiting { .. } | Self::Firing)
    }
}

/// Why a job is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Mark(DateTime<FixedOffset>),
}
