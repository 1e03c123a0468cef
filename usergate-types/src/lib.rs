//! # Usergate Types
//!
//! Domain types, wire records and port traits for the usergate service.
//! No IO lives here: only data structures, the structural binder and the
//! traits adapters implement.
//!
//! ## Layout
//!
//! - `binding/` - field descriptors, binding plans, assignment and validation
//! - `domain/` - users, stats and token claims
//! - `dto` - request records and response shapes
//! - `envelope` - the `{s, m, r, c}` response wrapper
//! - `error` - repository and application error types
//! - `ports/` - trait definitions that adapters must implement

pub mod binding;
pub mod domain;
pub mod dto;
pub mod envelope;
pub mod error;
pub mod ports;

pub use binding::{BindError, PlanCache, Record, Source, SourceValue, UploadedFile};
pub use domain::{
    Claims, Identity, NewUser, TokenKind, User, UserCredentials, UserStats, UserWithStats,
};
pub use dto::*;
pub use envelope::Envelope;
pub use error::{AppError, RepoError};
pub use ports::UserRepository;
