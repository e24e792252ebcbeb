//! Restaurant API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use validator::Validate;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};
use shared::geo::GeoPoint;
use shared::models::RestaurantRecord;

/// Restaurant registration payload
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertRestaurantRequest {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub location: GeoPoint,
    pub is_open: bool,
    pub accepts_online_orders: bool,
}

/// Register or refresh a restaurant.
///
/// Closing a restaurant removes its orders from merge eligibility on
/// the next consolidation pass.
pub async fn upsert(
    State(state): State<ServerState>,
    Json(payload): Json<UpsertRestaurantRequest>,
) -> AppResult<Json<RestaurantRecord>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let record = RestaurantRecord {
        id: payload.id,
        name: payload.name,
        location: payload.location,
        is_open: payload.is_open,
        accepts_online_orders: payload.accepts_online_orders,
    };
    state.engine.upsert_restaurant(record.clone()).await?;
    Ok(Json(record))
}

/// Restaurant detail
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<RestaurantRecord>> {
    Ok(Json(state.restaurants.get(&id).await?))
}
