// Channel procedures: list, getBySlug, create.
//
// Channels carry no separate slug column; lookups by slug match the name.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use colloquy_common::types::Channel;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::jwt::Identity, store::ChannelRecord, validation::ValidatedJson};

use super::{validate_channel_description, validate_channel_name, ApiError, ApiState};

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct CreateChannelRequest {
    pub name: String,
    pub description: Option<String>,
}

pub(crate) async fn list_channels(
    State(state): State<ApiState>,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<Vec<Channel>>, ApiError> {
    let records = state
        .store
        .list_channels(workspace_id)
        .await
        .map_err(|error| ApiError::store("Failed to list channels", error))?;

    Ok(Json(records.into_iter().map(ChannelRecord::into_channel).collect()))
}

pub(crate) async fn get_channel_by_slug(
    State(state): State<ApiState>,
    Path((workspace_id, slug)): Path<(Uuid, String)>,
) -> Result<Json<Channel>, ApiError> {
    let record = state
        .store
        .get_channel_by_name(workspace_id, &slug)
        .await
        .map_err(|error| ApiError::store("Failed to load channel", error))?
        .ok_or_else(|| ApiError::not_found("Channel not found"))?;

    Ok(Json(record.into_channel()))
}

pub(crate) async fn create_channel(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_id): Path<Uuid>,
    ValidatedJson(payload): ValidatedJson<CreateChannelRequest>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    validate_channel_name(&payload.name)?;
    if let Some(description) = payload.description.as_deref() {
        validate_channel_description(description)?;
    }

    let record = state
        .store
        .insert_channel(workspace_id, &payload.name, payload.description.as_deref(), identity.user_id)
        .await
        .map_err(|error| ApiError::store("Failed to create channel", error))?;

    Ok((StatusCode::CREATED, Json(record.into_channel())))
}
