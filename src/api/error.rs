use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

const ENABLE_LOGS: bool = true;

use crate::log_error;

/// Handler failure rendered as `500 { success: false, error, message }`.
#[derive(Debug)]
pub struct ApiError {
    error: &'static str,
    source: anyhow::Error,
}

impl ApiError {
    pub fn new(error: &'static str, source: anyhow::Error) -> Self {
        Self { error, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log_error!("{}: {:#}", self.error, self.source);
        let body = Json(json!({
            "success": false,
            "error": self.error,
            "message": format!("{:#}", self.source),
        }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
