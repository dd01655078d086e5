use std::{
    collections::BTreeSet,
    sync::{Arc, RwLock},
};

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;

use super::{aggregate_floor, FilterRules, FloorMembership, Zone};
use crate::{clock::SharedClock, db::models::snapshot::saturating_u32, upstream::ObservationSource};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Latest secondary-site count. Memory only; replaced every cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecAggregate {
    pub time_stamp: Option<DateTime<FixedOffset>>,
    pub patrons: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Same shape as the building pass over two zones, reporting only the
/// combined unique count.
pub struct RecAggregator {
    zones: Vec<Zone>,
    rules: FilterRules,
    source: Arc<dyn ObservationSource>,
    clock: SharedClock,
    tz: Tz,
    unique: BTreeSet<String>,
}

impl RecAggregator {
    pub fn new(
        zones: Vec<Zone>,
        rules: FilterRules,
        source: Arc<dyn ObservationSource>,
        clock: SharedClock,
        tz: Tz,
    ) -> Self {
        Self {
            zones,
            rules,
            source,
            clock,
            tz,
            unique: BTreeSet::new(),
        }
    }

    pub async fn collect(&mut self) -> RecAggregate {
        self.unique.clear();

        for zone in &self.zones {
            match self.source.fetch_zone(zone).await {
                Ok(batch) => {
                    let mut membership = FloorMembership::new();
                    aggregate_floor(batch.observations, &zone.bounds, &self.rules, &mut membership);
                    self.unique.extend(membership.identities().cloned());
                }
                Err(err) => {
                    log_error!("{} fetch failed, counting it as empty: {err:#}", zone.display_name);
                }
            }
        }

        let aggregate = RecAggregate {
            time_stamp: Some(self.clock.now_local(self.tz).fixed_offset()),
            patrons: saturating_u32(self.unique.len()),
            last_updated: Some(self.clock.now_utc()),
        };
        log_info!("rec site: {} unique patrons", aggregate.patrons);
        aggregate
    }
}

/// Owns the aggregator and the last value it produced.
pub struct RecService {
    aggregator: Mutex<RecAggregator>,
    latest: RwLock<RecAggregate>,
}

impl RecService {
    pub fn new(aggregator: RecAggregator) -> Self {
        Self {
            aggregator: Mutex::new(aggregator),
            latest: RwLock::new(RecAggregate::default()),
        }
    }

    pub fn latest(&self) -> RecAggregate {
        match self.latest.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Runs one pass and replaces the held value. Concurrent callers queue on
    /// the aggregator lock.
    pub async fn refresh(&self) -> RecAggregate {
        let aggregate = self.aggregator.lock().await.collect().await;
        let mut guard = match self.latest.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = aggregate.clone();
        aggregate
    }
}
