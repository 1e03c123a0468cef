//! Envelope responders: every body the server writes is an [`Envelope`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use usergate_types::{AppError, Envelope};

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<usergate_types::RepoError> for ApiError {
    fn from(err: usergate_types::RepoError) -> Self {
        ApiError(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::TokenMissing => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self.0 {
            AppError::Internal(detail) => tracing::error!(error = %detail, "internal error"),
            AppError::UnsupportedMediaType(media) => {
                tracing::debug!(media_type = %media, "unsupported media type")
            }
            _ => {}
        }

        failure(self.status(), self.0.public_message(), self.0.code())
    }
}

/// A failure envelope with an explicit status, message and code.
pub fn failure(status: StatusCode, message: impl Into<String>, code: &str) -> Response {
    let body: Envelope = Envelope::failure(message, code);
    (status, Json(body)).into_response()
}

/// A `200` success envelope.
#[derive(Debug)]
pub struct Success<T> {
    message: String,
    result: Option<T>,
}

impl<T> Success<T> {
    pub fn ok(result: T) -> Self {
        Self::with_message("Success", result)
    }

    pub fn with_message(message: impl Into<String>, result: T) -> Self {
        Self {
            message: message.into(),
            result: Some(result),
        }
    }
}

impl Success<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            result: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            Json(Envelope::success(self.message, self.result)),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_internal_error_is_generic() {
        let response = ApiError(AppError::Internal("db exploded".into())).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"s": 0, "m": "Internal Server Error", "c": "INTERNAL_ERROR"})
        );
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::TokenMissing, StatusCode::UNAUTHORIZED),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED),
            (AppError::MethodNotAllowed, StatusCode::METHOD_NOT_ALLOWED),
            (
                AppError::UnsupportedMediaType("text/plain".into()),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (AppError::TooManyRequests, StatusCode::TOO_MANY_REQUESTS),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = Success::ok(vec![1, 2]).into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"s": 1, "m": "Success", "r": [1, 2]})
        );
    }

    #[tokio::test]
    async fn test_message_only_success() {
        let body = body_json(Success::message("pong").into_response()).await;

        assert_eq!(body, serde_json::json!({"s": 1, "m": "pong"}));
    }
}
