mod error;
mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use crate::{cache::PatronCache, db::Database, occupancy::RecService};

pub use error::ApiError;

/// Shared handles behind every route.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<PatronCache>,
    pub rec: Arc<RecService>,
    pub db: Database,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/patronapi", get(handlers::patron_api))
        .route("/recapi", get(handlers::rec_api))
        .route("/count_by_floor", get(handlers::count_by_floor))
        .with_state(state)
        .layer(CorsLayer::permissive())
}
