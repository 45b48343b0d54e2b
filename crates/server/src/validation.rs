// Input validation for request bodies.
//
// `ValidatedJson<T>` extractor: content-type check + serde decoding with a
// structured `VALIDATION_FAILED` envelope on failure. Field-level bounds are
// applied by the route handlers before any store access.

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{ErrorCode, ServerError};

/// A JSON body extractor that returns a structured `ServerError` on failure.
///
/// Use this instead of `axum::Json<T>` in handlers to get consistent
/// VALIDATION_FAILED error responses instead of plain-text Axum rejections.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ValidatedJson(value)),
            Err(rejection) => {
                let message = classify_json_rejection(&rejection);
                Err(ServerError::new(ErrorCode::ValidationFailed, message).into_response())
            }
        }
    }
}

/// Classify a JSON rejection into a human-readable message.
fn classify_json_rejection(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(e) => format!("invalid JSON payload: {e}"),
        JsonRejection::JsonSyntaxError(e) => format!("malformed JSON: {e}"),
        JsonRejection::MissingJsonContentType(_) => {
            "expected Content-Type: application/json".to_string()
        }
        JsonRejection::BytesRejection(e) => format!("request body error: {e}"),
        other => format!("request body error: {other}"),
    }
}
