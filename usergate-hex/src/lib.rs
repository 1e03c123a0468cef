//! # Usergate Hex
//!
//! Application service layer and HTTP adapter for the usergate service.
//!
//! ## Architecture
//!
//! - `service` - Application service (login, sign-up, user listing)
//! - `tokens` - access/refresh token issuing and verification
//! - `uploads` - local storage for multipart files
//! - `inbound/` - HTTP adapter (Axum server, middleware chain)
//!
//! The service is generic over `R: UserRepository`, allowing
//! different repository implementations to be injected.

pub mod inbound;
pub mod service;
pub mod tokens;
pub mod uploads;


pub use service::AccountService;
pub use tokens::{JwtError, JwtService};
