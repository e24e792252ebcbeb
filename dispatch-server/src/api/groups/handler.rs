//! Group Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core::ServerState;
use crate::engine::GroupView;
use crate::utils::AppResult;

/// Group status with member snapshots
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<GroupView>> {
    Ok(Json(state.engine.group_status(&id)?))
}

/// Partner picked the batch up; every member must be READY
pub async fn pickup(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<GroupView>> {
    Ok(Json(state.engine.mark_group_picked_up(&id).await?))
}

/// The consolidated route is under way
pub async fn transit(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<GroupView>> {
    Ok(Json(state.engine.mark_group_in_transit(&id).await?))
}

/// All drop-offs done; completes the assignment and frees the partner
pub async fn delivered(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<GroupView>> {
    Ok(Json(state.engine.mark_group_delivered(&id).await?))
}
