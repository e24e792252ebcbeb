//! Group Order API Module
//!
//! # Routes
//!
//! | path | method | description |
//! |------|--------|-------------|
//! | /api/groups/{id} | GET | group status with member snapshots |
//! | /api/groups/{id}/pickup | POST | partner picked the batch up |
//! | /api/groups/{id}/transit | POST | batch is out for delivery |
//! | /api/groups/{id}/delivered | POST | all drop-offs done |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

/// Group router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/groups", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/pickup", post(handler::pickup))
        .route("/{id}/transit", post(handler::transit))
        .route("/{id}/delivered", post(handler::delivered))
}
