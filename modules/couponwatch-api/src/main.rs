use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use couponwatch_common::Config;
use couponwatch_monitor::{scheduler, Monitor, SchedulerStatus};
use couponwatch_store::CouponStore;

mod rest;

pub struct AppState {
    pub store: CouponStore,
    pub monitor: Arc<Monitor>,
    pub scheduler: Arc<SchedulerStatus>,
    pub poll_interval_minutes: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("couponwatch=info".parse()?))
        .init();

    info!("couponwatch starting...");

    let config = Config::from_env();
    config.log_redacted();

    let store = CouponStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let monitor = Arc::new(Monitor::from_config(&config, store.clone())?);

    let scheduler_status = Arc::new(SchedulerStatus::new());
    let _poller = scheduler::start(
        monitor.clone(),
        Duration::from_secs(config.poll_interval_minutes * 60),
        scheduler_status.clone(),
    );

    let state = Arc::new(AppState {
        store,
        monitor,
        scheduler: scheduler_status,
        poll_interval_minutes: config.poll_interval_minutes,
    });

    let app = Router::new()
        .route("/", get(rest::root))
        .route("/coupons", get(rest::list_coupons).post(rest::add_coupon))
        .route("/coupons/send-pending", post(rest::send_pending))
        .route("/monitor/run", post(rest::trigger_monitor))
        .route("/scrape/run", post(rest::trigger_scrape))
        .route("/extract/test", post(rest::test_extraction))
        .route("/status", get(rest::status))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!(addr = %addr, "couponwatch API listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
