//! HTTP Server configuration and startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use usergate_types::UserRepository;

use super::bind::MAX_MULTIPART_BYTES;
use super::chain;
use super::handlers::{self, AppState};
use super::jwt::JwtService;
use super::rate_limit::{RateLimiterState, spawn_sweeper};
use super::service_key::ServiceKeyGate;
use crate::AccountService;

/// HTTP Server for the usergate API.
pub struct HttpServer<R: UserRepository> {
    state: Arc<AppState<R>>,
    jwt: Arc<JwtService>,
    service_key: Arc<ServiceKeyGate>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: UserRepository> HttpServer<R> {
    /// Creates a new HTTP server with the default rate limit (100 requests
    /// per minute per address).
    pub fn new(service: AccountService<R>, service_key: ServiceKeyGate) -> Self {
        Self::with_rate_limit(service, service_key, RateLimiterState::default())
    }

    pub fn with_rate_limit(
        service: AccountService<R>,
        service_key: ServiceKeyGate,
        rate_limiter: RateLimiterState,
    ) -> Self {
        Self {
            jwt: Arc::new(service.jwt().clone()),
            state: Arc::new(AppState { service }),
            service_key: Arc::new(service_key),
            rate_limiter: Arc::new(rate_limiter),
        }
    }

    pub fn rate_limiter(&self) -> Arc<RateLimiterState> {
        self.rate_limiter.clone()
    }

    /// Builds the Axum router with all routes.
    ///
    /// ```text
    /// /                                   home
    /// /health                             health
    /// /api/v1                             service-key gate
    ///   /public  (public preset)          auth/login, auth/sign-up
    ///   /private (private preset)         user/get-list, user/get-full-list
    /// ```
    pub fn router(&self) -> Router {
        chain::install_panic_hook();

        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        let public = chain::public(
            Router::new()
                .route("/auth/login", post(handlers::login::<R>))
                .route("/auth/sign-up", post(handlers::sign_up::<R>))
                .method_not_allowed_fallback(handlers::method_not_allowed)
                .fallback(handlers::public_not_found),
            self.rate_limiter.clone(),
        );

        let private = chain::private(
            Router::new()
                .route("/user/get-list", get(handlers::get_list::<R>))
                .route("/user/get-full-list", get(handlers::get_full_list::<R>))
                .method_not_allowed_fallback(handlers::method_not_allowed)
                .fallback(handlers::private_not_found),
            self.rate_limiter.clone(),
            self.jwt.clone(),
        );

        let api = chain::protected(
            Router::new()
                .nest("/public", public)
                .nest("/private", private)
                .fallback(handlers::api_not_found),
            self.service_key.clone(),
        );

        Router::new()
            .route("/", get(handlers::home))
            .route("/health", get(handlers::health))
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .nest("/api/v1", api)
            .fallback(handlers::root_not_found)
            .layer(metrics)
            .layer(DefaultBodyLimit::max(MAX_MULTIPART_BYTES))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address until SIGINT/SIGTERM, then gives
    /// in-flight requests up to `grace` to finish.
    pub async fn run(self, addr: &str, grace: Duration) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let sweeper = spawn_sweeper(self.rate_limiter.clone());
        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = stop_rx.await;
                })
                .await
        });

        tokio::select! {
            finished = &mut server => {
                sweeper.abort();
                finished??;
                return Ok(());
            }
            _ = shutdown_signal() => {}
        }

        let _ = stop_tx.send(());
        match tokio::time::timeout(grace, &mut server).await {
            Ok(finished) => finished??,
            Err(_) => {
                tracing::warn!(?grace, "grace period elapsed, dropping open connections");
                server.abort();
            }
        }
        sweeper.abort();

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
