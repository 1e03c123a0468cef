//! Bearer-token gate for the private group.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use usergate_types::{AppError, Claims, TokenKind};

use super::respond::ApiError;
pub use crate::tokens::{JwtError, JwtService};

/// Extracts the token from an `Authorization: Bearer <token>` header.
fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// JWT middleware. Admits access tokens only and stores their [`Claims`]
/// in the request extensions.
pub async fn jwt_middleware(
    State(jwt): State<Arc<JwtService>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        return ApiError(AppError::Unauthorized("missing token".into())).into_response();
    };

    let claims = match jwt.parse(token) {
        Ok(claims) if claims.kind == TokenKind::Access => claims,
        Ok(_) => {
            tracing::debug!("refresh token presented to the access gate");
            return ApiError(AppError::Unauthorized("invalid token".into())).into_response();
        }
        Err(reason) => {
            tracing::debug!(%reason, "bearer token rejected");
            return ApiError(AppError::Unauthorized("invalid token".into())).into_response();
        }
    };

    request.extensions_mut().insert(claims);
    next.run(request).await
}

/// The claims of the authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError(AppError::Unauthorized("missing token".into())))
    }
}
