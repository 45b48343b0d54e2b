// Workspace procedures: list, getById, create.
//
// Creation is a sequence of three independently checked writes (user upsert,
// workspace insert, admin membership insert) followed by a best-effort
// remote call that seeds the default agent participants. The writes are not
// wrapped in a transaction; a failure partway through leaves earlier writes
// committed.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use colloquy_common::types::{MemberRole, Workspace};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{auth::jwt::Identity, store::WorkspaceRecord, validation::ValidatedJson};

use super::{validate_workspace_name, validate_workspace_slug, ApiError, ApiState};

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct CreateWorkspaceRequest {
    pub name: String,
    pub slug: String,
}

pub(crate) async fn list_workspaces(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<Vec<Workspace>>, ApiError> {
    let records = state
        .store
        .list_workspaces_for_member(identity.user_id)
        .await
        .map_err(|error| ApiError::store("Failed to list workspaces", error))?;

    Ok(Json(records.into_iter().map(WorkspaceRecord::into_workspace).collect()))
}

pub(crate) async fn get_workspace(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    Path(workspace_id): Path<Uuid>,
) -> Result<Json<Workspace>, ApiError> {
    let record = state
        .store
        .get_workspace_for_member(identity.user_id, workspace_id)
        .await
        .map_err(|error| ApiError::store("Failed to load workspace", error))?
        .ok_or_else(|| ApiError::not_found("Workspace not found"))?;

    Ok(Json(record.into_workspace()))
}

pub(crate) async fn create_workspace(
    State(state): State<ApiState>,
    Extension(identity): Extension<Identity>,
    ValidatedJson(payload): ValidatedJson<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<Workspace>), ApiError> {
    validate_workspace_name(&payload.name)?;
    validate_workspace_slug(&payload.slug)?;

    // Ensure a user row mirroring the auth record exists before it is
    // referenced by the workspace and membership writes.
    state
        .store
        .upsert_user(identity.user_id)
        .await
        .map_err(|error| ApiError::store("Failed to ensure user record", error))?;

    let workspace = state
        .store
        .insert_workspace(&payload.name, &payload.slug, identity.user_id)
        .await
        .map_err(|error| ApiError::store("Failed to create workspace", error))?;

    state
        .store
        .insert_workspace_member(workspace.id, identity.user_id, MemberRole::Admin)
        .await
        .map_err(|error| ApiError::store("Failed to add workspace member", error))?;

    // Agent seeding is best-effort: workspace creation succeeds even if it
    // fails, and the failure is recorded in the log.
    if let Err(error) = state.store.seed_workspace_agents(workspace.id).await {
        tracing::warn!(
            workspace_id = %workspace.id,
            error = ?error,
            "failed to seed workspace agents"
        );
    }

    Ok((StatusCode::CREATED, Json(workspace.into_workspace())))
}
