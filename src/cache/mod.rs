pub mod series;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    RwLock,
};

use chrono::{DateTime, Utc};

use crate::{clock::SharedClock, db::Database};

pub use series::{derive_aggregate, fold_by_key, CachedAggregate, PeakRecord, SeriesPoint};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

#[derive(Debug, Clone, Default)]
struct CacheState {
    aggregate: CachedAggregate,
    refreshed_at: Option<DateTime<Utc>>,
}

/// What readers get: the held aggregate plus how old it is.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheView {
    pub aggregate: CachedAggregate,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub age_ms: Option<i64>,
}

impl CacheView {
    pub fn age_minutes(&self) -> Option<i64> {
        self.age_ms.map(|ms| ms / 60_000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    AlreadyRunning,
    Failed,
}

/// Clears the in-flight flag however the refresh ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Read-through view of persisted building totals. Readers never touch the
/// store; refreshes re-derive everything from it.
pub struct PatronCache {
    db: Database,
    clock: SharedClock,
    state: RwLock<CacheState>,
    refreshing: AtomicBool,
}

impl PatronCache {
    pub fn new(db: Database, clock: SharedClock) -> Self {
        Self {
            db,
            clock,
            state: RwLock::new(CacheState::default()),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn get(&self) -> CacheView {
        let state = match self.state.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let age_ms = state
            .refreshed_at
            .map(|at| (self.clock.now_utc() - at).num_milliseconds().max(0));
        CacheView {
            aggregate: state.aggregate,
            refreshed_at: state.refreshed_at,
            age_ms,
        }
    }

    /// Re-derives the aggregate from the store. A call made while another is
    /// in flight returns immediately; a failure keeps the stale value.
    pub async fn refresh(&self) -> RefreshOutcome {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log_info!("patron cache refresh already in progress, skipping");
            return RefreshOutcome::AlreadyRunning;
        }
        let _in_flight = InFlight(&self.refreshing);

        match self.db.list_patron_totals().await {
            Ok(totals) => {
                let aggregate = derive_aggregate(&totals);
                let refreshed_at = self.clock.now_utc();
                let mut guard = match self.state.write() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                *guard = CacheState {
                    aggregate,
                    refreshed_at: Some(refreshed_at),
                };
                log_info!(
                    "patron cache refreshed from {} snapshots at {}",
                    totals.len(),
                    refreshed_at.to_rfc3339()
                );
                RefreshOutcome::Refreshed
            }
            Err(err) => {
                log_error!("patron cache refresh failed, serving stale data: {err:#}");
                RefreshOutcome::Failed
            }
        }
    }

    /// Refreshes now and returns whatever the cache then holds.
    pub async fn force_refresh(&self) -> CacheView {
        self.refresh().await;
        self.get()
    }
}
