use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Row};

use crate::db::{
    helpers::{from_json, parse_datetime, to_i64, to_json, to_u32},
    models::{FloorCountRecord, OccupancySnapshot, PatronTotal},
    Database,
};

fn row_to_snapshot(row: &Row) -> Result<OccupancySnapshot> {
    let taken_at: String = row.get("taken_at")?;
    let patrons: i64 = row.get("patrons")?;
    let unique_total: String = row.get("unique_total")?;
    let floor_members: String = row.get("floor_members")?;
    let count_by_floor: String = row.get("count_by_floor")?;

    Ok(OccupancySnapshot {
        id: Some(row.get("id")?),
        cycle_id: row.get("cycle_id")?,
        taken_at: parse_datetime(&taken_at, "taken_at")?,
        patrons: to_u32(patrons, "patrons")?,
        unique_total: from_json(&unique_total, "unique_total")?,
        floor_members: from_json(&floor_members, "floor_members")?,
        count_by_floor: from_json(&count_by_floor, "count_by_floor")?,
    })
}

impl Database {
    /// Appends a snapshot and returns its row id. Rows are never updated.
    pub async fn insert_snapshot(&self, snapshot: &OccupancySnapshot) -> Result<i64> {
        let record = snapshot.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO snapshots (cycle_id, taken_at, patrons, unique_total, floor_members, count_by_floor, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.cycle_id,
                    record.taken_at.to_rfc3339(),
                    to_i64(u64::from(record.patrons))?,
                    to_json(&record.unique_total, "unique_total")?,
                    to_json(&record.floor_members, "floor_members")?,
                    to_json(&record.count_by_floor, "count_by_floor")?,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Most recently inserted snapshot.
    pub async fn latest_snapshot(&self) -> Result<Option<OccupancySnapshot>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, cycle_id, taken_at, patrons, unique_total, floor_members, count_by_floor
                 FROM snapshots
                 ORDER BY id DESC
                 LIMIT 1",
            )?;

            let mut rows = stmt.query([])?;
            let snapshot = match rows.next()? {
                Some(row) => Some(row_to_snapshot(row)?),
                None => None,
            };
            Ok(snapshot)
        })
        .await
    }

    /// Every snapshot's total, newest first.
    pub async fn list_patron_totals(&self) -> Result<Vec<PatronTotal>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, taken_at, patrons
                 FROM snapshots
                 ORDER BY id DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut totals = Vec::new();
            while let Some(row) = rows.next()? {
                let taken_at: String = row.get("taken_at")?;
                let patrons: i64 = row.get("patrons")?;
                totals.push(PatronTotal {
                    id: row.get("id")?,
                    taken_at: parse_datetime(&taken_at, "taken_at")?,
                    patrons: to_u32(patrons, "patrons")?,
                });
            }
            Ok(totals)
        })
        .await
    }

    /// Every snapshot's per-floor counts, newest first.
    pub async fn list_floor_counts(&self) -> Result<Vec<FloorCountRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT taken_at, count_by_floor
                 FROM snapshots
                 ORDER BY id DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                let taken_at: String = row.get("taken_at")?;
                let counts: String = row.get("count_by_floor")?;
                records.push(FloorCountRecord {
                    taken_at: parse_datetime(&taken_at, "taken_at")?,
                    count_by_floor: from_json(&counts, "count_by_floor")?,
                });
            }
            Ok(records)
        })
        .await
    }

    pub async fn snapshot_count(&self) -> Result<u64> {
        self.execute(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM snapshots", [], |row| row.get(0))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::FloorMembers;
    use crate::occupancy::{Coordinate, Floor};
    use chrono::DateTime;

    fn snapshot_at(raw: &str, patrons: u32) -> OccupancySnapshot {
        OccupancySnapshot {
            id: None,
            cycle_id: format!("cycle-{raw}"),
            taken_at: DateTime::parse_from_rfc3339(raw).unwrap(),
            patrons,
            unique_total: Vec::new(),
            floor_members: FloorMembers::default(),
            count_by_floor: [patrons, 0, 0, 0],
        }
    }

    #[tokio::test]
    async fn round_trips_full_snapshot() {
        let db = Database::in_memory().unwrap();
        let mut snapshot = snapshot_at("2026-10-14T10:15:00-04:00", 2);
        snapshot.unique_total = vec!["a".into(), "b".into()];
        snapshot
            .floor_members
            .get_mut(Floor::First)
            .admit("a".into(), Coordinate::new(20.5, 40.0));

        let id = db.insert_snapshot(&snapshot).await.unwrap();
        let stored = db.latest_snapshot().await.unwrap().unwrap();

        assert_eq!(stored.id, Some(id));
        assert_eq!(stored.taken_at, snapshot.taken_at);
        assert_eq!(stored.taken_at.offset(), snapshot.taken_at.offset());
        assert_eq!(stored.floor_members, snapshot.floor_members);
        assert_eq!(stored.unique_total, snapshot.unique_total);
    }

    #[tokio::test]
    async fn listings_are_newest_first() {
        let db = Database::in_memory().unwrap();
        assert!(db.latest_snapshot().await.unwrap().is_none());

        for (at, n) in [
            ("2026-10-14T10:00:00-04:00", 5),
            ("2026-10-14T10:15:00-04:00", 9),
            ("2026-10-14T10:30:00-04:00", 7),
        ] {
            db.insert_snapshot(&snapshot_at(at, n)).await.unwrap();
        }

        let totals: Vec<u32> = db
            .list_patron_totals()
            .await
            .unwrap()
            .iter()
            .map(|t| t.patrons)
            .collect();
        assert_eq!(totals, vec![7, 9, 5]);

        let floors = db.list_floor_counts().await.unwrap();
        assert_eq!(floors[0].count_by_floor, [7, 0, 0, 0]);
        assert_eq!(db.snapshot_count().await.unwrap(), 3);
        assert_eq!(db.latest_snapshot().await.unwrap().unwrap().patrons, 7);
    }
}
