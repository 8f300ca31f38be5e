pub mod runs;

pub use runs::{send_pending, test_extraction, trigger_monitor, trigger_scrape};

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use couponwatch_common::{CouponOrigin, NewCoupon};

use crate::AppState;

#[derive(Deserialize)]
pub struct CouponsQuery {
    limit: Option<u32>,
    origin: Option<String>,
}

#[derive(Deserialize)]
pub struct AddCouponRequest {
    code: String,
    valid_time: Option<String>,
    source_image_url: Option<String>,
    description: Option<String>,
    discount_value: Option<String>,
    valid_until: Option<DateTime<Utc>>,
}

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "app": "couponwatch",
        "status": "online",
        "time": Utc::now().to_rfc3339(),
    }))
}

pub async fn list_coupons(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CouponsQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(50).min(200);
    let origin = params.origin.as_deref().map(CouponOrigin::from_str_loose);

    match state.store.latest(limit, origin).await {
        Ok(coupons) => Json(serde_json::json!({ "coupons": coupons })).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to list coupons");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn add_coupon(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AddCouponRequest>,
) -> impl IntoResponse {
    let code = body.code.trim().to_string();
    if code.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "code is required"})),
        )
            .into_response();
    }

    let mut new = NewCoupon::new(code, CouponOrigin::Manual);
    new.valid_time = body.valid_time;
    new.source_image_url = body.source_image_url;
    new.description = body.description;
    new.discount_value = body.discount_value;
    new.valid_until = body.valid_until;

    match state.store.save(&new).await {
        Ok(Some(coupon)) => (StatusCode::CREATED, Json(serde_json::json!({ "coupon": coupon })))
            .into_response(),
        Ok(None) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": "coupon already exists"})),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to save manual coupon");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let window = state.monitor.window();

    Json(serde_json::json!({
        "status": "online",
        "scheduler": {
            "started_at": state.scheduler.started_at.to_rfc3339(),
            "last_tick": state.scheduler.last_tick().await.map(|t| t.to_rfc3339()),
            "ticks": state.scheduler.ticks(),
            "interval_minutes": state.poll_interval_minutes,
        },
        "polling_window": {
            "enabled": window.enabled(),
            "timezone": window.timezone().name(),
            "open_now": window.is_open(),
        },
        "current_time": Utc::now().to_rfc3339(),
    }))
}
