//! Restaurant API Module
//!
//! # Routes
//!
//! | path | method | description |
//! |------|--------|-------------|
//! | /api/restaurants | POST | register or refresh a restaurant |
//! | /api/restaurants/{id} | GET | restaurant detail |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Restaurant router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/restaurants", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::upsert))
        .route("/{id}", get(handler::get_by_id))
}
