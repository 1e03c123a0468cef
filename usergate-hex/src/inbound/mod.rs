//! HTTP Inbound Adapter
//!
//! Axum-based HTTP server that drives the application layer: request
//! binders, the middleware chain and its gates, handlers and the router.

pub mod bind;
pub mod chain;
mod handlers;
pub mod jwt;
pub mod rate_limit;
pub mod respond;
mod server;
pub mod service_key;

pub use bind::{Bound, BoundQuery};
pub use jwt::CurrentUser;
pub use rate_limit::RateLimiterState;
pub use respond::{ApiError, Success};
pub use server::HttpServer;
pub use service_key::ServiceKeyGate;
