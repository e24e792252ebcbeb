//! Order API Module
//!
//! # Routes
//!
//! | path | method | description |
//! |------|--------|-------------|
//! | /api/orders | POST | submit an order (runs consolidation) |
//! | /api/orders/{id} | GET | order detail |
//! | /api/orders/track/{tracking_id} | GET | customer-facing tracking lookup |
//! | /api/orders/{id}/cancel | POST | cancel an order |
//! | /api/orders/{id}/status | PATCH | restaurant or delivery progress |

mod handler;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/track/{tracking_id}", get(handler::track))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/cancel", post(handler::cancel))
        .route("/{id}/status", patch(handler::update_status))
}
