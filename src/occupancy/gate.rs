use std::ops::RangeInclusive;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, Timelike};
use chrono_tz::Tz;

use crate::{
    clock::SharedClock,
    db::{Database, OccupancySnapshot},
    settings::Environment,
};

const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Candidates this close to the last snapshot are treated as a re-trigger.
pub const DUPLICATE_WINDOW_MS: i64 = 30_000;

/// Civil hours (inclusive) during which routine writes are suppressed.
pub const QUIET_HOURS: RangeInclusive<u32> = 2..=6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistReason {
    FirstSnapshot,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DuplicateTrigger { delta_ms: i64 },
    QuietHours { hour: u32 },
    NonProduction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Persist(PersistReason),
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Persisted { id: i64, reason: PersistReason },
    Skipped(SkipReason),
}

/// An empty store always accepts. Otherwise the duplicate window is checked
/// first, then quiet hours at `decision_hour`, then the environment.
pub fn decide(
    candidate: &DateTime<FixedOffset>,
    prior: Option<&DateTime<FixedOffset>>,
    decision_hour: u32,
    environment: Environment,
) -> GateDecision {
    let Some(prior) = prior else {
        return GateDecision::Persist(PersistReason::FirstSnapshot);
    };

    let delta_ms = candidate.signed_duration_since(*prior).num_milliseconds();
    if delta_ms <= DUPLICATE_WINDOW_MS {
        return GateDecision::Skip(SkipReason::DuplicateTrigger { delta_ms });
    }
    if QUIET_HOURS.contains(&decision_hour) {
        return GateDecision::Skip(SkipReason::QuietHours {
            hour: decision_hour,
        });
    }
    if !environment.is_production() {
        return GateDecision::Skip(SkipReason::NonProduction);
    }
    GateDecision::Persist(PersistReason::Scheduled)
}

/// Conditional write path for building snapshots. The read of the prior
/// snapshot and the insert are not transactional; a single scheduler drives writes.
#[derive(Clone)]
pub struct SnapshotGate {
    db: Database,
    environment: Environment,
    clock: SharedClock,
    tz: Tz,
}

impl SnapshotGate {
    pub fn new(db: Database, environment: Environment, clock: SharedClock, tz: Tz) -> Self {
        Self {
            db,
            environment,
            clock,
            tz,
        }
    }

    pub async fn submit(&self, candidate: &OccupancySnapshot) -> Result<GateOutcome> {
        let prior = self
            .db
            .latest_snapshot()
            .await
            .context("failed to read latest snapshot")?;
        let hour = self.clock.now_local(self.tz).hour();

        let decision = decide(
            &candidate.taken_at,
            prior.as_ref().map(|snapshot| &snapshot.taken_at),
            hour,
            self.environment,
        );

        match decision {
            GateDecision::Persist(reason) => {
                let id = self
                    .db
                    .insert_snapshot(candidate)
                    .await
                    .context("failed to persist snapshot")?;
                log_info!(
                    "cycle {}: persisted snapshot {} ({} patrons, {:?})",
                    candidate.cycle_id,
                    id,
                    candidate.patrons,
                    reason
                );
                Ok(GateOutcome::Persisted { id, reason })
            }
            GateDecision::Skip(reason) => {
                log_info!(
                    "cycle {}: snapshot not persisted ({:?})",
                    candidate.cycle_id,
                    reason
                );
                Ok(GateOutcome::Skipped(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::models::FloorMembers;
    use chrono::Duration;
    use std::sync::Arc;

    fn at(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    fn candidate(taken_at: DateTime<FixedOffset>) -> OccupancySnapshot {
        OccupancySnapshot {
            id: None,
            cycle_id: "test".into(),
            taken_at,
            patrons: 3,
            unique_total: vec!["a".into(), "b".into(), "c".into()],
            floor_members: FloorMembers::default(),
            count_by_floor: [3, 0, 0, 0],
        }
    }

    fn gate_at(db: &Database, env: Environment, local: &str) -> SnapshotGate {
        let clock = ManualClock::new(at(local).with_timezone(&chrono::Utc));
        SnapshotGate::new(db.clone(), env, Arc::new(clock), chrono_tz::America::New_York)
    }

    #[test]
    fn empty_store_accepts_anywhere() {
        let now = at("2026-10-14T03:00:00-04:00");
        assert_eq!(
            decide(&now, None, 3, Environment::Local),
            GateDecision::Persist(PersistReason::FirstSnapshot)
        );
    }

    #[test]
    fn duplicate_window_beats_hour_and_environment() {
        let prior = at("2026-10-14T12:00:00-04:00");
        for offset_ms in [0, 1, 15_000, 30_000] {
            let candidate = prior + Duration::milliseconds(offset_ms);
            for env in [Environment::Production, Environment::Local] {
                for hour in [0, 4, 12] {
                    assert_eq!(
                        decide(&candidate, Some(&prior), hour, env),
                        GateDecision::Skip(SkipReason::DuplicateTrigger { delta_ms: offset_ms })
                    );
                }
            }
        }
        let earlier = prior - Duration::minutes(5);
        assert!(matches!(
            decide(&earlier, Some(&prior), 12, Environment::Production),
            GateDecision::Skip(SkipReason::DuplicateTrigger { .. })
        ));
    }

    #[test]
    fn quiet_hours_and_environment_gate_later_writes() {
        let prior = at("2026-10-14T12:00:00-04:00");
        let candidate = prior + Duration::milliseconds(30_001);

        assert_eq!(
            decide(&candidate, Some(&prior), 12, Environment::Production),
            GateDecision::Persist(PersistReason::Scheduled)
        );
        assert_eq!(
            decide(&candidate, Some(&prior), 12, Environment::Local),
            GateDecision::Skip(SkipReason::NonProduction)
        );
        for hour in 2..=6 {
            assert_eq!(
                decide(&candidate, Some(&prior), hour, Environment::Production),
                GateDecision::Skip(SkipReason::QuietHours { hour })
            );
        }
        for hour in [0, 1, 7, 23] {
            assert_eq!(
                decide(&candidate, Some(&prior), hour, Environment::Production),
                GateDecision::Persist(PersistReason::Scheduled)
            );
        }
    }

    #[tokio::test]
    async fn seeded_store_requires_production_context() {
        let db = Database::in_memory().unwrap();
        db.insert_snapshot(&candidate(at("2026-10-14T03:00:00-04:00")))
            .await
            .unwrap();
        let next = candidate(at("2026-10-14T03:00:40-04:00"));

        let local = gate_at(&db, Environment::Local, "2026-10-14T12:00:00-04:00");
        assert_eq!(
            local.submit(&next).await.unwrap(),
            GateOutcome::Skipped(SkipReason::NonProduction)
        );

        let production_overnight =
            gate_at(&db, Environment::Production, "2026-10-14T03:00:40-04:00");
        assert_eq!(
            production_overnight.submit(&next).await.unwrap(),
            GateOutcome::Skipped(SkipReason::QuietHours { hour: 3 })
        );

        let production = gate_at(&db, Environment::Production, "2026-10-14T12:00:00-04:00");
        assert!(matches!(
            production.submit(&next).await.unwrap(),
            GateOutcome::Persisted {
                reason: PersistReason::Scheduled,
                ..
            }
        ));
        assert_eq!(db.snapshot_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn first_snapshot_is_written_even_locally_overnight() {
        let db = Database::in_memory().unwrap();
        let gate = gate_at(&db, Environment::Local, "2026-10-14T03:00:00-04:00");
        let outcome = gate
            .submit(&candidate(at("2026-10-14T03:00:00-04:00")))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            GateOutcome::Persisted {
                reason: PersistReason::FirstSnapshot,
                ..
            }
        ));
    }
}
