use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    cache::PatronCache,
    occupancy::{BuildingAggregator, GateOutcome, RecService},
};

use super::{CycleJob, Trigger};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// One full collection: the building pass and the secondary site side by
/// side. A persisted building snapshot triggers a cache refresh.
pub struct CollectionJob {
    building: Mutex<BuildingAggregator>,
    rec: Arc<RecService>,
    cache: Arc<PatronCache>,
}

impl CollectionJob {
    pub fn new(building: BuildingAggregator, rec: Arc<RecService>, cache: Arc<PatronCache>) -> Self {
        Self {
            building: Mutex::new(building),
            rec,
            cache,
        }
    }
}

#[async_trait]
impl CycleJob for CollectionJob {
    fn name(&self) -> &str {
        "collection"
    }

    async fn run(&self, trigger: Trigger) -> Result<()> {
        log_debug!("collection triggered by {:?}", trigger);
        let building = async { self.building.lock().await.run_cycle().await };
        let (report, _) = tokio::join!(building, self.rec.refresh());

        let report = report?;
        if let GateOutcome::Persisted { .. } = report.outcome {
            self.cache.refresh().await;
        }
        Ok(())
    }
}

pub struct CacheRefreshJob {
    cache: Arc<PatronCache>,
}

impl CacheRefreshJob {
    pub fn new(cache: Arc<PatronCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl CycleJob for CacheRefreshJob {
    fn name(&self) -> &str {
        "patron cache"
    }

    async fn run(&self, _trigger: Trigger) -> Result<()> {
        self.cache.refresh().await;
        Ok(())
    }
}
