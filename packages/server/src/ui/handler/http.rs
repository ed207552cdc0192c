//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;

use crate::ui::state::AppState;

/// ヘルスチェックのレスポンス
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub server_id: String,
    /// Unix 時刻（ミリ秒）
    pub timestamp: i64,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        server_id: state.node_id.to_string(),
        timestamp: state.clock.now().timestamp_millis(),
    })
}
