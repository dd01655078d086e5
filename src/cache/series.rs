use std::{collections::HashMap, hash::Hash};

use serde::{Serialize, Serializer};

use crate::db::models::{display_timestamp, PatronTotal};

/// How many recent snapshots the display list carries.
pub const LAST_TEN: usize = 10;

/// Folds entries into unique keys. A repeated key keeps the position of its
/// first occurrence and the value of its last.
pub fn fold_by_key<K, V, I>(entries: I) -> Vec<(K, V)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = (K, V)>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut folded: Vec<(K, V)> = Vec::new();
    for (key, value) in entries {
        match index.get(&key) {
            Some(&position) => folded[position].1 = value,
            None => {
                index.insert(key.clone(), folded.len());
                folded.push((key, value));
            }
        }
    }
    folded
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub time: String,
    pub total: u32,
}

/// Snapshot with the highest total. Serialized as `[time, "  ", patrons]`,
/// or `[]` when there is none.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakRecord {
    pub time: String,
    pub patrons: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAggregate {
    pub patrons: u32,
    pub time_map: Vec<SeriesPoint>,
    #[serde(serialize_with = "serialize_peak")]
    pub find_max: Option<PeakRecord>,
    pub last_ten: Vec<String>,
}

fn serialize_peak<S: Serializer>(peak: &Option<PeakRecord>, serializer: S) -> Result<S::Ok, S::Error> {
    match peak {
        Some(peak) => (&peak.time, "  ", peak.patrons).serialize(serializer),
        None => Vec::<()>::new().serialize(serializer),
    }
}

/// Builds the cached view from totals ordered newest first.
pub fn derive_aggregate(totals: &[PatronTotal]) -> CachedAggregate {
    let patrons = totals.first().map(|total| total.patrons).unwrap_or(0);

    let time_map = fold_by_key(
        totals
            .iter()
            .map(|total| (display_timestamp(&total.taken_at), total.patrons)),
    )
    .into_iter()
    .map(|(time, total)| SeriesPoint { time, total })
    .collect();

    // Ties go to the oldest snapshot.
    let find_max = totals
        .iter()
        .fold(None::<&PatronTotal>, |best, candidate| match best {
            Some(best) if best.patrons > candidate.patrons => Some(best),
            _ => Some(candidate),
        })
        .map(|peak| PeakRecord {
            time: display_timestamp(&peak.taken_at),
            patrons: peak.patrons,
        });

    let last_ten = totals
        .iter()
        .take(LAST_TEN)
        .map(|total| format!("{}  {}", display_timestamp(&total.taken_at), total.patrons))
        .collect();

    CachedAggregate {
        patrons,
        time_map,
        find_max,
        last_ten,
    }
}
