// Declared stubs: thread replies, dives, agents, search.
//
// These procedures validate their inputs and sit behind the auth gate like
// everything else, but return their declared empty shapes until the
// corresponding subsystems land.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use colloquy_common::types::Dive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::validation::ValidatedJson;

use super::{validate_dive_title, ApiError, ApiState};

const SEARCH_LIMIT_DEFAULT: usize = 20;
const SEARCH_LIMIT_MAX: usize = 50;

#[derive(Debug, Deserialize)]
pub(crate) struct RepliesQuery {
    cursor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RepliesPage {
    pub replies: Vec<Value>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateDiveRequest {
    pub source_message_id: Uuid,
    pub title: String,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InvokeAgentRequest {
    pub message_id: Uuid,
    pub channel_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchQuery {
    q: String,
    workspace_id: Uuid,
    limit: Option<usize>,
}

pub(crate) async fn get_thread_replies(
    State(_state): State<ApiState>,
    Path(_message_id): Path<Uuid>,
    Query(_query): Query<RepliesQuery>,
) -> Json<RepliesPage> {
    Json(RepliesPage { replies: Vec::new(), next_cursor: None })
}

pub(crate) async fn create_dive(
    State(_state): State<ApiState>,
    ValidatedJson(payload): ValidatedJson<CreateDiveRequest>,
) -> Result<Json<Value>, ApiError> {
    validate_dive_title(&payload.title)?;
    Ok(Json(Value::Null))
}

pub(crate) async fn list_dives(
    State(_state): State<ApiState>,
    Path(_channel_id): Path<Uuid>,
) -> Json<Vec<Dive>> {
    Json(Vec::new())
}

pub(crate) async fn publish_dive(
    State(_state): State<ApiState>,
    Path(_dive_id): Path<Uuid>,
) -> Json<Value> {
    Json(Value::Null)
}

pub(crate) async fn list_agents(State(_state): State<ApiState>) -> Json<Vec<Value>> {
    Json(Vec::new())
}

pub(crate) async fn invoke_agent(
    State(_state): State<ApiState>,
    Path(_agent_id): Path<Uuid>,
    ValidatedJson(_payload): ValidatedJson<InvokeAgentRequest>,
) -> Json<Value> {
    Json(Value::Null)
}

pub(crate) async fn search(
    State(_state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Value>>, ApiError> {
    if query.q.is_empty() {
        return Err(ApiError::validation("q must not be empty"));
    }
    let _limit = query.limit.unwrap_or(SEARCH_LIMIT_DEFAULT).clamp(1, SEARCH_LIMIT_MAX);

    Ok(Json(Vec::new()))
}
