use std::sync::Arc;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::SharedClock;

use super::loop_worker::aligned_loop;
use super::{CycleJob, SchedulerStatus};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Runs a job once on start, then on every quarter-hour mark of `tz`.
pub struct AlignedScheduler {
    job: Arc<dyn CycleJob>,
    clock: SharedClock,
    tz: Tz,
    status: Arc<watch::Sender<SchedulerStatus>>,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl AlignedScheduler {
    pub fn new(job: Arc<dyn CycleJob>, clock: SharedClock, tz: Tz) -> Self {
        let (status, _) = watch::channel(SchedulerStatus::Idle);
        Self {
            job,
            clock,
            tz,
            status: Arc::new(status),
            handle: None,
            cancel_token: None,
        }
    }

    /// Spawns the wake chain. Returns false without spawning when one is
    /// already live.
    pub fn start(&mut self) -> bool {
        if let Some(handle) = &self.handle {
            if !handle.is_finished() {
                log_info!("{} scheduler already running, start ignored", self.job.name());
                return false;
            }
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(aligned_loop(
            self.job.clone(),
            self.clock.clone(),
            self.tz,
            self.status.clone(),
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!("{} scheduler started", self.job.name());
        true
    }

    /// Cancels the pending wake (or the run in progress) and waits for the
    /// loop task to exit.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let joined = match self.handle.take() {
            Some(handle) => handle
                .await
                .with_context(|| format!("{} scheduler task failed to join", self.job.name())),
            None => Ok(()),
        };
        self.status.send_replace(SchedulerStatus::Stopped);
        joined
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.borrow().clone()
    }
}
