pub mod snapshot;

pub use snapshot::{display_timestamp, FloorCountRecord, FloorMembers, OccupancySnapshot, PatronTotal};
