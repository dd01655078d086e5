use std::{collections::BTreeSet, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use uuid::Uuid;

use super::{
    aggregate_floor, FilterRules, Floor, FloorTally, GateOutcome, SnapshotGate, Zone,
};
use crate::{
    clock::SharedClock,
    db::{
        models::{snapshot::saturating_u32, FloorMembers},
        OccupancySnapshot,
    },
    upstream::ObservationSource,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

/// Result of one building pass, before the gate sees it.
#[derive(Debug, Clone)]
pub struct BuildingCycle {
    pub cycle_id: String,
    pub taken_at: DateTime<FixedOffset>,
    pub members: FloorMembers,
    pub unique: BTreeSet<String>,
    pub tallies: Vec<(Floor, FloorTally)>,
    pub failed_floors: Vec<Floor>,
}

impl BuildingCycle {
    pub fn patrons(&self) -> u32 {
        saturating_u32(self.unique.len())
    }

    pub fn count_by_floor(&self) -> [u32; 4] {
        self.members.counts()
    }

    pub fn to_snapshot(&self) -> OccupancySnapshot {
        OccupancySnapshot {
            id: None,
            cycle_id: self.cycle_id.clone(),
            taken_at: self.taken_at,
            patrons: self.patrons(),
            unique_total: self.unique.iter().cloned().collect(),
            floor_members: self.members.clone(),
            count_by_floor: self.count_by_floor(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: BuildingCycle,
    pub outcome: GateOutcome,
}

/// Drives one building aggregation end to end. Cycle state lives on the
/// instance and is reset at the start of every cycle; `&mut self` keeps
/// two cycles from interleaving.
pub struct BuildingAggregator {
    floors: Vec<(Floor, Zone)>,
    rules: FilterRules,
    source: Arc<dyn ObservationSource>,
    clock: SharedClock,
    tz: Tz,
    gate: Option<SnapshotGate>,
    members: FloorMembers,
    unique: BTreeSet<String>,
}

impl BuildingAggregator {
    pub fn new(
        floors: Vec<(Floor, Zone)>,
        rules: FilterRules,
        source: Arc<dyn ObservationSource>,
        clock: SharedClock,
        tz: Tz,
    ) -> Self {
        Self {
            floors,
            rules,
            source,
            clock,
            tz,
            gate: None,
            members: FloorMembers::default(),
            unique: BTreeSet::new(),
        }
    }

    pub fn with_gate(mut self, gate: SnapshotGate) -> Self {
        self.gate = Some(gate);
        self
    }

    fn reset(&mut self) {
        self.members = FloorMembers::default();
        self.unique.clear();
    }

    /// Fetches and aggregates every floor in order. A failed fetch leaves that
    /// floor empty and the pass continues.
    pub async fn collect(&mut self) -> BuildingCycle {
        self.reset();
        let cycle_id = Uuid::new_v4().to_string();
        let mut tallies = Vec::with_capacity(self.floors.len());
        let mut failed_floors = Vec::new();

        for (floor, zone) in &self.floors {
            match self.source.fetch_zone(zone).await {
                Ok(batch) => {
                    let membership = self.members.get_mut(*floor);
                    let tally = aggregate_floor(batch.observations, &zone.bounds, &self.rules, membership);
                    self.unique.extend(membership.identities().cloned());
                    log_info!(
                        "cycle {}: {} received {}, admitted {}, invalid {}, out of bounds {}, duplicates {}",
                        cycle_id,
                        zone.display_name,
                        tally.received,
                        tally.admitted,
                        tally.invalid,
                        tally.out_of_bounds,
                        tally.duplicates
                    );
                    tallies.push((*floor, tally));
                }
                Err(err) => {
                    log_error!(
                        "cycle {}: {} fetch failed, counting it as empty: {err:#}",
                        cycle_id,
                        zone.display_name
                    );
                    failed_floors.push(*floor);
                }
            }
        }

        let cycle = BuildingCycle {
            cycle_id,
            taken_at: self.clock.now_local(self.tz).fixed_offset(),
            members: self.members.clone(),
            unique: self.unique.clone(),
            tallies,
            failed_floors,
        };

        log_info!(
            "cycle {}: {} unique patrons, by floor {:?}",
            cycle.cycle_id,
            cycle.patrons(),
            cycle.count_by_floor()
        );
        cycle
    }

    /// One full cycle: collect, then hand the snapshot to the gate.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let cycle = self.collect().await;
        let Some(gate) = self.gate.as_ref() else {
            anyhow::bail!("building aggregator has no snapshot gate configured");
        };
        let outcome = gate.submit(&cycle.to_snapshot()).await?;
        Ok(CycleReport { cycle, outcome })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedSource;
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::Database;
    use crate::occupancy::floor::test_support::{patron, with_rssi};
    use crate::settings::{Environment, Settings};
    use chrono::TimeZone;

    fn aggregator(source: Arc<ScriptedSource>) -> BuildingAggregator {
        let settings = Settings::default();
        let clock = ManualClock::new(chrono::Utc.with_ymd_and_hms(2026, 10, 14, 16, 0, 0).unwrap());
        BuildingAggregator::new(
            settings.floor_zones(),
            settings.filter.clone(),
            source,
            Arc::new(clock),
            chrono_tz::America::New_York,
        )
    }

    #[tokio::test]
    async fn unions_floors_and_orders_counts() {
        let source = Arc::new(
            ScriptedSource::default()
                .with(
                    "ground",
                    vec![
                        patron("g1", 20.0, 40.0),
                        patron("g2", 50.0, 50.0),
                        patron("g3", 300.0, 180.0),
                        patron("far", 500.0, 50.0),
                        with_rssi(patron("weak", 50.0, 50.0), -85),
                    ],
                )
                .with("first", vec![patron("f1", 20.0, 40.0), patron("f2", 20.0, 40.0)])
                .with("second", vec![])
                .with("third", vec![]),
        );
        let mut aggregator = aggregator(source.clone());

        let cycle = aggregator.collect().await;

        assert_eq!(cycle.patrons(), 5);
        assert_eq!(cycle.count_by_floor(), [3, 2, 0, 0]);
        assert!(cycle.failed_floors.is_empty());
        assert_eq!(
            cycle.tallies[0],
            (
                Floor::Ground,
                FloorTally {
                    received: 5,
                    invalid: 1,
                    out_of_bounds: 1,
                    duplicates: 0,
                    admitted: 3,
                }
            )
        );
        assert_eq!(cycle.tallies[1].1.admitted, 2);
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec!["ground", "first", "second", "third"]
        );
        assert_eq!(cycle.taken_at.to_rfc3339(), "2026-10-14T12:00:00-04:00");
    }

    #[tokio::test]
    async fn same_device_on_two_floors_is_one_patron() {
        let source = Arc::new(
            ScriptedSource::default()
                .with("ground", vec![patron("roamer", 20.0, 40.0)])
                .with("first", vec![patron("ROAMER", 30.0, 40.0)])
                .with("second", vec![])
                .with("third", vec![]),
        );
        let cycle = aggregator(source).collect().await;
        assert_eq!(cycle.count_by_floor(), [1, 1, 0, 0]);
        assert_eq!(cycle.patrons(), 1);
    }

    #[tokio::test]
    async fn failed_floor_does_not_abort_cycle() {
        let source = Arc::new(
            ScriptedSource::default()
                .with("ground", vec![patron("a", 20.0, 40.0)])
                .with("third", vec![patron("b", 20.0, 40.0)]),
        );
        let cycle = aggregator(source.clone()).collect().await;

        assert_eq!(cycle.count_by_floor(), [1, 0, 0, 1]);
        assert_eq!(cycle.failed_floors, vec![Floor::First, Floor::Second]);
        assert_eq!(source.calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn state_does_not_carry_over_between_cycles() {
        let first = Arc::new(
            ScriptedSource::default()
                .with("ground", vec![patron("early", 20.0, 40.0)]),
        );
        let mut aggregator = aggregator(first);
        assert_eq!(aggregator.collect().await.patrons(), 1);

        let empty: Arc<dyn ObservationSource> = Arc::new(ScriptedSource::default());
        aggregator.source = empty;
        let cycle = aggregator.collect().await;
        assert_eq!(cycle.patrons(), 0);
        assert!(cycle.members.get(Floor::Ground).is_empty());
    }

    #[tokio::test]
    async fn run_cycle_persists_first_snapshot() {
        let db = Database::in_memory().unwrap();
        let source = Arc::new(
            ScriptedSource::default().with("ground", vec![patron("a", 20.0, 40.0)]),
        );
        let base = aggregator(source);
        let gate = SnapshotGate::new(
            db.clone(),
            Environment::Local,
            base.clock.clone(),
            base.tz,
        );
        let mut aggregator = base.with_gate(gate);

        let report = aggregator.run_cycle().await.unwrap();
        assert!(matches!(report.outcome, GateOutcome::Persisted { .. }));

        let stored = db.latest_snapshot().await.unwrap().unwrap();
        assert_eq!(stored.patrons, 1);
        assert_eq!(stored.unique_total, vec!["a".to_string()]);
        assert_eq!(stored.cycle_id, report.cycle.cycle_id);

        let again = aggregator.run_cycle().await.unwrap();
        assert!(matches!(again.outcome, GateOutcome::Skipped(_)));
        assert_eq!(db.snapshot_count().await.unwrap(), 1);
    }
}
