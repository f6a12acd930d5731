use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::config::OWNER_HEADER;
use crate::error::AppError;

/// Owner id supplied by the upstream auth layer. Trusted as-is; no authorization
/// happens here beyond scoping every query to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Owner
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Owner(v.to_string()))
            .ok_or_else(|| AppError::Unauthorized(format!("missing {OWNER_HEADER} header")))
    }
}
