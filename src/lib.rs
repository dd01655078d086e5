pub mod api;
pub mod cache;
pub mod clock;
pub mod db;
pub mod occupancy;
pub mod scheduler;
pub mod settings;
pub mod upstream;
pub mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info};

use api::AppState;
use cache::PatronCache;
use clock::{SharedClock, SystemClock};
use db::Database;
use occupancy::{BuildingAggregator, RecAggregator, RecService, SnapshotGate};
use scheduler::{AlignedScheduler, CacheRefreshJob, CollectionJob};
use settings::Settings;
use upstream::{ObservationSource, PresenceClient};

pub async fn run() -> Result<()> {
    // RUST_LOG overrides the default level.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("crowd-index starting up...");

    let settings = Settings::load_from_env()?;
    let tz = settings.tz()?;
    let clock: SharedClock = Arc::new(SystemClock);

    let db = Database::new(settings.database.path.clone())?;
    let source: Arc<dyn ObservationSource> = Arc::new(PresenceClient::new(&settings.upstream)?);

    let gate = SnapshotGate::new(db.clone(), settings.environment, clock.clone(), tz);
    let building = BuildingAggregator::new(
        settings.floor_zones(),
        settings.filter.clone(),
        source.clone(),
        clock.clone(),
        tz,
    )
    .with_gate(gate);
    let rec = Arc::new(RecService::new(RecAggregator::new(
        settings.rec.zones().to_vec(),
        settings.filter.clone(),
        source,
        clock.clone(),
        tz,
    )));
    let cache = Arc::new(PatronCache::new(db.clone(), clock.clone()));

    let mut collection = AlignedScheduler::new(
        Arc::new(CollectionJob::new(building, rec.clone(), cache.clone())),
        clock.clone(),
        tz,
    );
    let mut cache_refresh =
        AlignedScheduler::new(Arc::new(CacheRefreshJob::new(cache.clone())), clock, tz);
    collection.start();
    cache_refresh.start();

    let router = api::build_router(AppState { cache, rec, db });
    let listener = tokio::net::TcpListener::bind(&settings.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", settings.server.bind))?;
    info!("HTTP API listening on {}", listener.local_addr()?);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("shutting down schedulers");
    if let Err(err) = collection.stop().await {
        error!("{err:#}");
    }
    if let Err(err) = cache_refresh.stop().await {
        error!("{err:#}");
    }

    served.context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl-C: {err}");
    }
}
