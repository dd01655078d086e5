//! Persisted occupancy snapshot and the narrow projections read back from it.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::occupancy::{Floor, FloorMembership};

/// Per-floor membership maps, one field per floor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FloorMembers {
    pub ground: FloorMembership,
    pub first: FloorMembership,
    pub second: FloorMembership,
    pub third: FloorMembership,
}

impl FloorMembers {
    pub fn get(&self, floor: Floor) -> &FloorMembership {
        match floor {
            Floor::Ground => &self.ground,
            Floor::First => &self.first,
            Floor::Second => &self.second,
            Floor::Third => &self.third,
        }
    }

    pub fn get_mut(&mut self, floor: Floor) -> &mut FloorMembership {
        match floor {
            Floor::Ground => &mut self.ground,
            Floor::First => &mut self.first,
            Floor::Second => &mut self.second,
            Floor::Third => &mut self.third,
        }
    }

    /// Counts ordered ground, first, second, third.
    pub fn counts(&self) -> [u32; 4] {
        Floor::ALL.map(|floor| saturating_u32(self.get(floor).len()))
    }
}

/// One accepted aggregation cycle. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancySnapshot {
    pub id: Option<i64>,
    pub cycle_id: String,
    /// Building-local civil time, offset included.
    pub taken_at: DateTime<FixedOffset>,
    pub patrons: u32,
    /// Sorted building-wide identities.
    pub unique_total: Vec<String>,
    pub floor_members: FloorMembers,
    pub count_by_floor: [u32; 4],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatronTotal {
    pub id: i64,
    pub taken_at: DateTime<FixedOffset>,
    pub patrons: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorCountRecord {
    pub taken_at: DateTime<FixedOffset>,
    pub count_by_floor: [u32; 4],
}

/// en-US style civil timestamp, e.g. `10/14/2026, 3:15:00 PM`.
pub fn display_timestamp(at: &DateTime<FixedOffset>) -> String {
    at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

pub(crate) fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
