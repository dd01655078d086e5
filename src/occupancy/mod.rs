pub mod bounds;
pub mod building;
pub mod filter;
pub mod floor;
pub mod gate;
pub mod rec;
pub mod zone;

pub use bounds::{Bounds, Coordinate};
pub use building::{BuildingAggregator, BuildingCycle, CycleReport};
pub use filter::{FilterRules, Rejection};
pub use floor::{aggregate_floor, FloorMembership, FloorTally};
pub use gate::{GateDecision, GateOutcome, PersistReason, SkipReason, SnapshotGate};
pub use rec::{RecAggregate, RecAggregator, RecService};
pub use zone::{Floor, Zone};
