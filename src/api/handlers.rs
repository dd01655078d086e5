use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{error::ApiError, AppState};
use crate::{cache::fold_by_key, db::models::display_timestamp, scheduler::alignment::MARK_INTERVAL_MINUTES};

fn refresh_interval() -> String {
    format!("{MARK_INTERVAL_MINUTES} minutes")
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "success": true }))
}

pub async fn patron_api(State(state): State<AppState>) -> Json<Value> {
    let view = state.cache.get();
    Json(json!({
        "success": true,
        "data": view.aggregate,
        "metadata": {
            "cached": true,
            "cacheAgeMinutes": view.age_minutes(),
            "source": "building snapshot store",
            "refreshInterval": refresh_interval(),
        }
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct RecQuery {
    #[serde(default)]
    pub live: bool,
}

pub async fn rec_api(State(state): State<AppState>, Query(query): Query<RecQuery>) -> Json<Value> {
    let (aggregate, source) = if query.live {
        (state.rec.refresh().await, "secondary site live aggregation")
    } else {
        (state.rec.latest(), "secondary site memory cache")
    };

    Json(json!({
        "success": true,
        "data": {
            "timeStamp": aggregate.time_stamp.as_ref().map(display_timestamp),
            "patrons": aggregate.patrons,
        },
        "metadata": {
            "cached": !query.live,
            "lastUpdated": aggregate.last_updated,
            "source": source,
            "refreshInterval": refresh_interval(),
            "note": "This data is not stored in the database",
        }
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPoint {
    pub time: String,
    pub count_by_floor: [u32; 4],
}

pub async fn count_by_floor(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let records = state
        .db
        .list_floor_counts()
        .await
        .map_err(|err| ApiError::new("Failed to retrieve floor counts", err))?;

    let floor_map: Vec<FloorPoint> = fold_by_key(
        records
            .iter()
            .map(|record| (display_timestamp(&record.taken_at), record.count_by_floor)),
    )
    .into_iter()
    .map(|(time, count_by_floor)| FloorPoint {
        time,
        count_by_floor,
    })
    .collect();

    Ok(Json(json!({ "floorMap": floor_map })))
}
