//! Delivery Partner API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use chrono::Utc;
use serde::Deserialize;
use validator::Validate;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};
use shared::error::ErrorCode;
use shared::geo::GeoPoint;
use shared::models::{DeliveryAssignment, DispatchSubject, PartnerRecord};

/// Partner registration payload
///
/// Busy state and availability are server-owned; a re-registration
/// refreshes the profile without clobbering them.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertPartnerRequest {
    #[validate(length(min = 1))]
    pub id: String,
    #[validate(length(min = 1))]
    pub name: String,
    pub current_location: GeoPoint,
    pub capacity: u32,
}

/// Register or refresh a partner
pub async fn upsert(
    State(state): State<ServerState>,
    Json(payload): Json<UpsertPartnerRequest>,
) -> AppResult<Json<PartnerRecord>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;
    let now = Utc::now();
    let (busy, available_since) = match state.partners.get(&payload.id).await {
        Ok(existing) => (existing.busy, existing.available_since),
        Err(e) if e.code == ErrorCode::PartnerNotFound => (false, now),
        Err(e) => return Err(e),
    };
    let record = PartnerRecord {
        id: payload.id,
        name: payload.name,
        current_location: payload.current_location,
        capacity: payload.capacity,
        busy,
        available_since,
        updated_at: now,
    };
    state.engine.upsert_partner(record.clone()).await?;
    Ok(Json(record))
}

/// Partner detail
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<PartnerRecord>> {
    Ok(Json(state.partners.get(&id).await?))
}

/// Location ping payload
#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub location: GeoPoint,
}

/// Location ping; re-indexes the partner for proximity search
pub async fn update_location(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<LocationRequest>,
) -> AppResult<Json<PartnerRecord>> {
    let record = state
        .engine
        .update_partner_location(&id, payload.location)
        .await?;
    Ok(Json(record))
}

/// Offer reply payload: which subject the reply is for, and the verdict
#[derive(Debug, Deserialize)]
pub struct OfferReplyRequest {
    pub subject: DispatchSubject,
    pub accept: bool,
}

/// Accept or decline the offer pending for a subject
pub async fn reply_offer(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<OfferReplyRequest>,
) -> AppResult<Json<shared::error::ApiResponse<()>>> {
    state
        .engine
        .on_partner_offer(&id, &payload.subject, payload.accept)?;
    Ok(Json(shared::error::ApiResponse::ok()))
}

/// Delivery assignment detail
pub async fn get_assignment(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<DeliveryAssignment>> {
    Ok(Json(state.engine.get_assignment(&id)?))
}
