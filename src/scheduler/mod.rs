pub mod alignment;
mod controller;
pub mod jobs;
mod loop_worker;
mod state;

use anyhow::Result;
use async_trait::async_trait;

pub use controller::AlignedScheduler;
pub use jobs::{CacheRefreshJob, CollectionJob};
pub use state::{SchedulerStatus, Trigger};

/// Work an [`AlignedScheduler`] fires. Errors are logged by the loop and never
/// stop the wake chain.
#[async_trait]
pub trait CycleJob: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run(&self, trigger: Trigger) -> Result<()>;
}
