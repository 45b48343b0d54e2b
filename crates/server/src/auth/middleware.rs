// The authorization gate wrapping every protected procedure.
//
// A request without a valid caller identity is rejected here; the handler
// body never runs and no store access occurs. With a valid identity the
// request passes through unchanged, carrying `Identity` as an extension.

use crate::{
    auth::jwt::{Identity, JwtAccessTokenService},
    error::{ErrorCode, ServerError},
};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub async fn require_bearer_auth(
    State(jwt_service): State<Arc<JwtAccessTokenService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
    {
        Some(token) => token,
        None => return unauthorized_response("Unauthorized: missing bearer token"),
    };

    let identity: Identity = match jwt_service.validate_access_token(token) {
        Ok(identity) => identity,
        Err(_) => return unauthorized_response("Unauthorized: invalid bearer token"),
    };

    request.extensions_mut().insert(identity);

    next.run(request).await
}

fn extract_bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(token)
}

fn unauthorized_response(message: &'static str) -> Response {
    ServerError::new(ErrorCode::Unauthorized, message).into_response()
}
