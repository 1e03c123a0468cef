//! Fixed-window rate limiting per client address.
//!
//! Each address gets `ceiling` requests. The counter only resets once the
//! address has been quiet for longer than a window, so a client that keeps
//! knocking while blocked stays blocked. Entries idle for more than a window
//! are evicted by [`RateLimiterState::sweep`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use usergate_types::AppError;

use super::respond::ApiError;

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    count: u32,
    last_seen: Instant,
}

/// Rate limiter state shared across requests.
#[derive(Debug)]
pub struct RateLimiterState {
    clients: DashMap<String, ClientWindow>,
    ceiling: u32,
    window: Duration,
}

impl Default for RateLimiterState {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(60))
    }
}

impl RateLimiterState {
    /// # Arguments
    /// * `ceiling` - Requests allowed per window
    /// * `window` - Window length
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self {
            clients: DashMap::new(),
            ceiling,
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if the request is allowed, false if rate limited.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self
            .clients
            .entry(key.to_string())
            .or_insert(ClientWindow {
                count: 0,
                last_seen: now,
            });

        let client = entry.value_mut();
        if now.saturating_duration_since(client.last_seen) > self.window {
            client.count = 0;
        }
        client.count += 1;
        client.last_seen = now;

        client.count <= self.ceiling
    }

    /// Evicts clients not seen for more than one window. Returns how many were dropped.
    pub fn sweep(&self, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients
            .retain(|_, client| now.saturating_duration_since(client.last_seen) <= self.window);
        before.saturating_sub(self.clients.len())
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// Runs [`RateLimiterState::sweep`] once per window until the task is aborted.
pub fn spawn_sweeper(limiter: Arc<RateLimiterState>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.window());
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = limiter.sweep(Instant::now());
            if evicted > 0 {
                tracing::debug!(evicted, remaining = limiter.tracked_clients(), "rate limiter sweep");
            }
        }
    })
}

/// The client address as seen by the listener, or `"unknown"`.
pub fn client_ip(request: &Request<Body>) -> String {
    let extensions = request.extensions();
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .or_else(|| {
            extensions
                .get::<axum::extract::connect_info::MockConnectInfo<SocketAddr>>()
                .map(|mock| mock.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rate limiting middleware.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_ip(&request);

    if !limiter.check(&key) {
        tracing::warn!(client = %key, "rate limit exceeded");
        return ApiError(AppError::TooManyRequests).into_response();
    }

    next.run(request).await
}
