//! HTTP request handlers.

use std::sync::Arc;

use axum::{extract::State, http::Uri};

use usergate_types::{
    AppError, HealthResponse, LoginRequest, PaginationQuery, SignUpRequest, User,
    UserRepository, UserWithStats,
};

use super::bind::{Bound, BoundQuery};
use super::jwt::CurrentUser;
use super::respond::{ApiError, Success};
use crate::AccountService;

/// Application state shared across handlers.
pub struct AppState<R: UserRepository> {
    pub service: AccountService<R>,
}

/// Home page.
pub async fn home() -> Success<&'static str> {
    Success::ok("Welcome to the Home Page!")
}

/// Health check endpoint.
pub async fn health() -> Success<HealthResponse> {
    Success::ok(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

#[tracing::instrument(skip_all)]
pub async fn login<R: UserRepository>(
    State(state): State<Arc<AppState<R>>>,
    Bound(req): Bound<LoginRequest>,
) -> Result<Success<User>, ApiError> {
    let user = state.service.login(req).await?;
    Ok(Success::ok(user))
}

#[tracing::instrument(skip_all)]
pub async fn sign_up<R: UserRepository>(
    State(state): State<Arc<AppState<R>>>,
    Bound(req): Bound<SignUpRequest>,
) -> Result<Success<User>, ApiError> {
    let user = state.service.sign_up(req).await?;
    Ok(Success::ok(user))
}

/// One page of users.
#[tracing::instrument(skip_all, fields(caller = caller.0.user_id))]
pub async fn get_list<R: UserRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: CurrentUser,
    BoundQuery(page): BoundQuery<PaginationQuery>,
) -> Result<Success<Vec<User>>, ApiError> {
    let users = state.service.list_users(page).await?;
    Ok(Success::ok(users))
}

/// One page of users merged with their login stats.
#[tracing::instrument(skip_all, fields(caller = caller.0.user_id))]
pub async fn get_full_list<R: UserRepository>(
    State(state): State<Arc<AppState<R>>>,
    caller: CurrentUser,
    BoundQuery(page): BoundQuery<PaginationQuery>,
) -> Result<Success<Vec<UserWithStats>>, ApiError> {
    let users = state.service.list_users_with_stats(page).await?;
    Ok(Success::ok(users))
}

// ─────────────────────────────────────────────────────────────────────────────
// Fallbacks
// ─────────────────────────────────────────────────────────────────────────────

fn not_found(uri: &Uri, message: &str) -> ApiError {
    tracing::debug!(path = %uri.path(), "no route");
    ApiError(AppError::NotFound(message.into()))
}

pub async fn root_not_found(uri: Uri) -> ApiError {
    not_found(&uri, "Oops! This endpoint doesn't exist.")
}

pub async fn api_not_found(uri: Uri) -> ApiError {
    not_found(&uri, "Invalid API endpoint")
}

pub async fn public_not_found(uri: Uri) -> ApiError {
    not_found(&uri, "Public route not found")
}

pub async fn private_not_found(uri: Uri) -> ApiError {
    not_found(&uri, "Private route not found")
}

pub async fn method_not_allowed() -> ApiError {
    ApiError(AppError::MethodNotAllowed)
}
