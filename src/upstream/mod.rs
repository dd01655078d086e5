pub mod client;
pub mod models;

use anyhow::Result;
use async_trait::async_trait;

use crate::occupancy::Zone;

pub use client::PresenceClient;
pub use models::{ObservationBatch, RawObservation};

/// Per-zone device feed.
#[async_trait]
pub trait ObservationSource: Send + Sync + 'static {
    async fn fetch_zone(&self, zone: &Zone) -> Result<ObservationBatch>;
}
