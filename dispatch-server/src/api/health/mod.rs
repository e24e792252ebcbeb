//! Health check routes
//!
//! # Routes
//!
//! | path | method | description | auth |
//! |------|--------|-------------|------|
//! | /health | GET | simple health check | none |
//! | /health/detailed | GET | detailed health check | none |
//!
//! # Response example
//!
//! ```json
//! {
//!   "status": "ok",
//!   "version": "0.1.0"
//! }
//! ```

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use std::time::SystemTime;

use crate::core::ServerState;

/// Health routes - public (no auth)
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/detailed", get(detailed_health))
}

/// Simple health check response
#[derive(Serialize)]
pub struct HealthResponse {
    /// Status (ok | error)
    status: &'static str,
    /// Version
    version: &'static str,
}

/// Detailed health check response
#[derive(Serialize)]
pub struct DetailedHealthResponse {
    status: &'static str,
    version: &'static str,
    /// Uptime in seconds
    uptime_seconds: u64,
    environment: String,
    /// Store sizes
    stores: StoreSizes,
    /// Registered background task check
    checks: HealthChecks,
}

#[derive(Serialize)]
pub struct StoreSizes {
    orders: usize,
    groups: usize,
    assignments: usize,
}

#[derive(Serialize)]
pub struct HealthChecks {
    engine: CheckResult,
}

/// Single check result
#[derive(Serialize)]
pub struct CheckResult {
    /// Status (ok | error)
    status: &'static str,
    message: Option<String>,
}

impl CheckResult {
    fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }
}

// Server start time (lazily initialized)
static START_TIME: std::sync::OnceLock<SystemTime> = std::sync::OnceLock::new();

fn get_uptime_seconds() -> u64 {
    let start = START_TIME.get_or_init(SystemTime::now);
    SystemTime::now()
        .duration_since(*start)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Record the start time; called once at boot so uptime is accurate
pub fn mark_started() {
    let _ = START_TIME.get_or_init(SystemTime::now);
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn detailed_health(State(state): State<ServerState>) -> Json<DetailedHealthResponse> {
    let (orders, groups, assignments) = state.engine.store_sizes();
    Json(DetailedHealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: get_uptime_seconds(),
        environment: state.config.environment.clone(),
        stores: StoreSizes {
            orders,
            groups,
            assignments,
        },
        checks: HealthChecks {
            engine: CheckResult::ok(),
        },
    })
}
