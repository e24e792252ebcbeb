//! API routing module
//!
//! # Structure
//!
//! - [`health`] - health checks
//! - [`orders`] - order intake, tracking and progress
//! - [`groups`] - group order status and delivery milestones
//! - [`partners`] - partner registry and offer replies
//! - [`restaurants`] - restaurant registry

use axum::Router;
use http::HeaderName;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::core::ServerState;

pub mod groups;
pub mod health;
pub mod orders;
pub mod partners;
pub mod restaurants;

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        http::HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(orders::router())
        .merge(groups::router())
        .merge(partners::router())
        .merge(restaurants::router())
        // Health API - public route
        .merge(health::router())
}

/// Build a fully configured application with all middleware and state
pub fn build_app(state: &ServerState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");
    build_router()
        // CORS - Handle cross-origin requests
        .layer(CorsLayer::permissive())
        // Request logging
        .layer(TraceLayer::new_for_http())
        // Request ID - generated first, propagated to the response
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, XRequestId))
        .with_state(state.clone())
}
