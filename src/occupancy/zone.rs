use serde::Serialize;

use super::Bounds;

/// The four building floors, in the order they are fetched and reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Floor {
    Ground,
    First,
    Second,
    Third,
}

impl Floor {
    pub const ALL: [Floor; 4] = [Floor::Ground, Floor::First, Floor::Second, Floor::Third];
}

/// One upstream endpoint plus the rectangle that counts as "inside" for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub key: String,
    pub display_name: String,
    pub path: String,
    pub bounds: Bounds,
}
