use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::Json,
};
use tracing::warn;
use uuid::Uuid;
use crate::api::ErrorResponse;

/// Header carrying the caller identity verified by the upstream auth layer.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Caller identity for routes that act on behalf of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok());

        match user_id {
            Some(user_id) => Ok(Self { user_id }),
            None => {
                warn!("Rejected request to {} without a valid {} header", parts.uri.path(), USER_ID_HEADER);
                Err((
                    StatusCode::UNAUTHORIZED,
                    Json(ErrorResponse {
                        error: "Unauthorized".to_string(),
                    }),
                ))
            }
        }
    }
}
