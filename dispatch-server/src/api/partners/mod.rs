//! Delivery Partner API Module
//!
//! # Routes
//!
//! | path | method | description |
//! |------|--------|-------------|
//! | /api/partners | POST | register or refresh a partner |
//! | /api/partners/{id} | GET | partner detail |
//! | /api/partners/{id}/location | POST | location ping |
//! | /api/partners/{id}/offer | POST | accept or decline a pending offer |
//! | /api/assignments/{id} | GET | delivery assignment detail |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Partner router
pub fn router() -> Router<ServerState> {
    Router::new()
        .nest("/api/partners", routes())
        // Assignments are read through the delivery side of the API
        .route("/api/assignments/{id}", get(handler::get_assignment))
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::upsert))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/location", post(handler::update_location))
        .route("/{id}/offer", post(handler::reply_offer))
}
