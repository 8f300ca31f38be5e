use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::info;

use crate::AppState;

/// Kick off a manual pipeline run. Returns immediately; the run bypasses the
/// polling window and may overlap a scheduled tick (the store's dedup gate
/// handles the race).
pub async fn trigger_monitor(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let monitor = state.monitor.clone();
    tokio::spawn(async move {
        let stats = monitor.run_once().await;
        info!(%stats, "Manual monitor run finished");
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"status": "monitor run started"})),
    )
}

pub async fn trigger_scrape(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let monitor = state.monitor.clone();
    tokio::spawn(async move {
        let stats = monitor.scrape_site().await;
        info!(%stats, "Manual site scrape finished");
    });

    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({"status": "site scrape started"})),
    )
}

/// One delivery attempt for every pending coupon, inline.
pub async fn send_pending(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (attempted, delivered) = state.monitor.send_pending().await;
    Json(serde_json::json!({
        "attempted": attempted,
        "delivered": delivered,
    }))
}

#[derive(Deserialize)]
pub struct ExtractTestRequest {
    image_url: String,
}

/// Run the extraction adapter against an arbitrary image URL.
pub async fn test_extraction(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExtractTestRequest>,
) -> impl IntoResponse {
    let image_url = body.image_url.trim();
    if image_url.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "image_url is required"})),
        )
            .into_response();
    }

    let extraction = state.monitor.test_extraction(image_url).await;
    Json(extraction).into_response()
}
