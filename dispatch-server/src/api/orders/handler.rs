//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use crate::core::ServerState;
use crate::engine::SubmitOrder;
use crate::utils::{AppError, AppResult};
use shared::geo::GeoPoint;
use shared::models::{Order, OrderItem, OrderStatus};

/// Order submission payload
///
/// `id` is optional; resubmitting with the same id is idempotent.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub id: Option<String>,
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1))]
    pub restaurant_id: String,
    pub delivery_address: GeoPoint,
    #[validate(length(min = 1, message = "order must contain at least one item"))]
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub delivery_fee: Option<Decimal>,
    pub special_instructions: Option<String>,
}

/// Submit an order; the merge decision happens before the response
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<Order>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let order = state
        .engine
        .submit_order(SubmitOrder {
            id: payload.id,
            user_id: payload.user_id,
            restaurant_id: payload.restaurant_id,
            delivery_address: payload.delivery_address,
            items: payload.items,
            total_amount: payload.total_amount,
            delivery_fee: payload.delivery_fee,
            special_instructions: payload.special_instructions,
        })
        .await?;
    Ok(Json(order))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.engine.get_order(&id)?))
}

/// Customer-facing lookup by tracking id
pub async fn track(
    State(state): State<ServerState>,
    Path(tracking_id): Path<String>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.engine.track_order(&tracking_id)?))
}

/// Cancel an order
pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.engine.cancel_order(&id).await?))
}

/// Status update payload
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Advance an order's status.
///
/// Restaurant stages (CONFIRMED, PREPARING, READY) go through the
/// lifecycle machine directly; delivery stages are only valid for lone
/// orders, grouped orders progress via the group milestone routes.
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<Order>> {
    let order = if payload.status.is_delivery_stage() {
        state
            .engine
            .mark_order_delivery_progress(&id, payload.status)
            .await?
    } else {
        state.engine.update_order_status(&id, payload.status)?
    };
    Ok(Json(order))
}
