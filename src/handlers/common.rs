//! Shared handler plumbing: the authenticated-user extractor and response
//! helpers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Header carrying the authenticated user id, set by the upstream gateway
/// after it has validated the session.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated customer making the request.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("missing {USER_ID_HEADER} header"))
            })?;
        let user_id = Uuid::parse_str(raw).map_err(|_| {
            ServiceError::Unauthorized(format!("malformed {USER_ID_HEADER} header"))
        })?;
        Ok(CurrentUser(user_id))
    }
}

/// Uniform success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse { success: true, data })).into_response()
}

pub fn created<T: Serialize>(data: T) -> Response {
    (
        StatusCode::CREATED,
        Json(ApiResponse { success: true, data }),
    )
        .into_response()
}
