// The externally callable procedure surface.
//
// Routes are assembled by explicit construction from injected parts (store
// adapter + token service); every `/v1` route sits behind the bearer-auth
// gate. Handlers follow one pattern: validate → resolve → map storage records
// to the public shape.

pub mod channel;
pub mod message;
pub mod stubs;
pub mod workspace;

use std::{env, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};

use crate::{
    auth::{jwt::JwtAccessTokenService, middleware::require_bearer_auth},
    db::{
        migrations::run_migrations,
        pool::{check_pool_health, create_pg_pool, PoolConfig},
    },
    error::{ErrorCode, ServerError},
    store::{Store, StoreError},
};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 100;

/// Channel names are capped at 80 at this entry point; the shared schema in
/// `colloquy_common::validation` allows 100.
const CHANNEL_NAME_ROUTE_MAX: usize = 80;

const DIVE_TITLE_MAX: usize = 200;

#[derive(Clone)]
pub(crate) struct ApiState {
    pub(crate) store: Store,
}

#[derive(Debug)]
pub(crate) enum ApiError {
    Validation { message: String },
    NotFound { message: &'static str },
    Store { context: &'static str, source: anyhow::Error },
}

impl ApiError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub(crate) fn not_found(message: &'static str) -> Self {
        Self::NotFound { message }
    }

    pub(crate) fn store(context: &'static str, error: StoreError) -> Self {
        Self::Store { context, source: error.0 }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation { message } => {
                ServerError::new(ErrorCode::ValidationFailed, message).into_response()
            }
            Self::NotFound { message } => {
                ServerError::new(ErrorCode::NotFound, message).into_response()
            }
            Self::Store { context, source } => {
                tracing::error!(context, error = ?source, "store operation failed");
                ServerError::new(ErrorCode::StoreFailure, format!("{context}: {source}"))
                    .into_response()
            }
        }
    }
}

pub async fn build_router_from_env(jwt_service: Arc<JwtAccessTokenService>) -> Result<Router> {
    let database_url = env::var("COLLOQUY_SERVER_DATABASE_URL")
        .context("COLLOQUY_SERVER_DATABASE_URL must be set for the RPC surface")?;

    let pool = create_pg_pool(&database_url, PoolConfig::from_env())
        .await
        .context("failed to initialize PostgreSQL pool for the RPC surface")?;
    check_pool_health(&pool).await.context("PostgreSQL health check failed")?;
    run_migrations(&pool).await?;

    Ok(build_router_with_store(Store::Postgres(pool), jwt_service))
}

pub(crate) fn build_router_with_store(
    store: Store,
    jwt_service: Arc<JwtAccessTokenService>,
) -> Router {
    let state = ApiState { store };

    Router::new()
        .route(
            "/v1/workspaces",
            post(workspace::create_workspace).get(workspace::list_workspaces),
        )
        .route("/v1/workspaces/{id}", get(workspace::get_workspace))
        .route(
            "/v1/workspaces/{workspace_id}/channels",
            get(channel::list_channels).post(channel::create_channel),
        )
        .route(
            "/v1/workspaces/{workspace_id}/channels/{slug}",
            get(channel::get_channel_by_slug),
        )
        .route(
            "/v1/channels/{channel_id}/messages",
            get(message::list_messages).post(message::send_message),
        )
        .route("/v1/messages/{message_id}/replies", get(stubs::get_thread_replies))
        .route("/v1/dives", post(stubs::create_dive))
        .route("/v1/channels/{channel_id}/dives", get(stubs::list_dives))
        .route("/v1/dives/{dive_id}/publish", post(stubs::publish_dive))
        .route("/v1/agents", get(stubs::list_agents))
        .route("/v1/agents/{agent_id}/invoke", post(stubs::invoke_agent))
        .route("/v1/search", get(stubs::search))
        .with_state(state)
        .route_layer(middleware::from_fn_with_state(jwt_service, require_bearer_auth))
}

// ── Shared helpers ───────────────────────────────────────────────────────────

pub(crate) fn normalize_limit(limit: Option<usize>) -> usize {
    match limit {
        Some(0) => DEFAULT_PAGE_SIZE,
        Some(value) => value.min(MAX_PAGE_SIZE),
        None => DEFAULT_PAGE_SIZE,
    }
}

/// Parse an opaque history cursor: the RFC 3339 creation timestamp of the
/// last row of the previous page.
pub(crate) fn parse_cursor(value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| ApiError::validation("cursor timestamp is invalid"))
}

pub(crate) fn encode_cursor(created_at: DateTime<Utc>) -> String {
    created_at.to_rfc3339()
}

pub(crate) fn validate_workspace_name(name: &str) -> Result<(), ApiError> {
    colloquy_common::validation::validate_workspace_name(name)
        .map_err(|error| ApiError::validation(error.to_string()))
}

pub(crate) fn validate_workspace_slug(slug: &str) -> Result<(), ApiError> {
    colloquy_common::validation::validate_workspace_slug(slug)
        .map_err(|error| ApiError::validation(error.to_string()))
}

pub(crate) fn validate_channel_name(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    if name.chars().count() > CHANNEL_NAME_ROUTE_MAX {
        return Err(ApiError::validation(format!(
            "name must be at most {CHANNEL_NAME_ROUTE_MAX} characters"
        )));
    }
    Ok(())
}

pub(crate) fn validate_channel_description(description: &str) -> Result<(), ApiError> {
    colloquy_common::validation::validate_channel_description(description)
        .map_err(|error| ApiError::validation(error.to_string()))
}

pub(crate) fn validate_message_content(content: &str) -> Result<(), ApiError> {
    colloquy_common::validation::validate_message_content(content)
        .map_err(|error| ApiError::validation(error.to_string()))
}

pub(crate) fn validate_dive_title(title: &str) -> Result<(), ApiError> {
    if title.is_empty() {
        return Err(ApiError::validation("title must not be empty"));
    }
    if title.chars().count() > DIVE_TITLE_MAX {
        return Err(ApiError::validation(format!(
            "title must be at most {DIVE_TITLE_MAX} characters"
        )));
    }
    Ok(())
}
