use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::clock::SharedClock;

use super::alignment::{is_on_mark, until_next_mark};
use super::{CycleJob, SchedulerStatus, Trigger};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

pub(super) async fn aligned_loop(
    job: Arc<dyn CycleJob>,
    clock: SharedClock,
    tz: Tz,
    status: Arc<watch::Sender<SchedulerStatus>>,
    cancel_token: CancellationToken,
) {
    let name = job.name().to_string();

    status.send_replace(SchedulerStatus::Firing);
    if !fire(&job, Trigger::Startup, &cancel_token).await {
        log_info!("{} scheduler cancelled during startup run", name);
        return;
    }

    loop {
        let now = clock.now_local(tz);
        let delay = until_next_mark(&now);
        let next_mark = (now + ChronoDuration::milliseconds(delay.as_millis() as i64)).fixed_offset();
        status.send_replace(SchedulerStatus::Waiting { next_mark });

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel_token.cancelled() => {
                log_info!("{} scheduler shutting down", name);
                break;
            }
        }

        let woke_at = clock.now_local(tz);
        if !is_on_mark(&woke_at) {
            log_warn!(
                "{} scheduler woke off-mark at {}, skipping",
                name,
                woke_at.format("%H:%M:%S%.3f")
            );
            continue;
        }

        status.send_replace(SchedulerStatus::Firing);
        if !fire(&job, Trigger::Mark(woke_at.fixed_offset()), &cancel_token).await {
            log_info!("{} scheduler cancelled mid-run", name);
            break;
        }
    }
}

/// Returns false when cancellation interrupted the run.
async fn fire(job: &Arc<dyn CycleJob>, trigger: Trigger, cancel_token: &CancellationToken) -> bool {
    tokio::select! {
        result = job.run(trigger) => {
            if let Err(err) = result {
                log_error!("{} run failed ({:?}): {err:#}", job.name(), trigger);
            }
            true
        }
        _ = cancel_token.cancelled() => false,
    }
}
