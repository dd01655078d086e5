#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Body,
    extract::{Query, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

/// A device record in the presence API's wire shape, seen one minute before
/// the server clock.
pub fn device(id: &str, x: f64, y: f64) -> Value {
    json!({
        "username": id,
        "macAddress": format!("00:11:22:33:44:{:02x}", id.len()),
        "ssid": "campus-secure",
        "guestUser": false,
        "lastSeen": "2026-10-14T15:59:00.000+0000",
        "statistics": { "currentServerTime": "2026-10-14T16:00:00.000+0000" },
        "maxDetectedRssi": { "rssi": -55 },
        "locationCoordinate": { "x": x, "y": y, "unit": "FEET" }
    })
}

pub fn with_field(mut record: Value, pointer: &str, value: Value) -> Value {
    if let Some(slot) = record.pointer_mut(pointer) {
        *slot = value;
    }
    record
}

async fn clients(
    State(floors): State<Arc<HashMap<String, Value>>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let floor = query.get("floorRefId").cloned().unwrap_or_default();
    match floors.get(&floor) {
        Some(body) => Json(body.clone()).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "floor offline").into_response(),
    }
}

/// Serves canned per-floor batches on an ephemeral port and returns its base
/// URL. Floors without a batch answer 503.
pub async fn spawn_upstream(floors: Vec<(&str, Value)>) -> String {
    let floors: HashMap<String, Value> = floors
        .into_iter()
        .map(|(floor, body)| (floor.to_string(), body))
        .collect();
    let app = Router::new()
        .route("/api/location/v2/clients", get(clients))
        .with_state(Arc::new(floors));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}
