use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Bounds, Coordinate, FilterRules};
use crate::upstream::RawObservation;

/// Devices counted on one floor during one cycle, keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloorMembership(BTreeMap<String, Coordinate>);

impl FloorMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains_key(identity)
    }

    pub fn get(&self, identity: &str) -> Option<&Coordinate> {
        self.0.get(identity)
    }

    pub fn identities(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Inserts unless the identity is already present. Returns whether it was new.
    pub fn admit(&mut self, identity: String, at: Coordinate) -> bool {
        match self.0.entry(identity) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(at);
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// What happened to each record of one floor batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FloorTally {
    pub received: usize,
    pub invalid: usize,
    pub out_of_bounds: usize,
    pub duplicates: usize,
    pub admitted: usize,
}

/// Filters one floor batch into `membership`. First-seen coordinate wins; nothing
/// already in the accumulator is ever removed or overwritten.
pub fn aggregate_floor(
    batch: Vec<RawObservation>,
    bounds: &Bounds,
    rules: &FilterRules,
    membership: &mut FloorMembership,
) -> FloorTally {
    let mut tally = FloorTally {
        received: batch.len(),
        ..FloorTally::default()
    };

    for observation in batch {
        if !rules.is_valid(&observation) {
            tally.invalid += 1;
            continue;
        }
        let (Some(identity), Some(at)) = (observation.identity(), observation.coordinate()) else {
            tally.invalid += 1;
            continue;
        };
        if !bounds.contains(at) {
            tally.out_of_bounds += 1;
            continue;
        }
        if membership.admit(identity, at) {
            tally.admitted += 1;
        } else {
            tally.duplicates += 1;
        }
    }

    tally
}
