//! Domain types.

mod claims;
mod user;

pub use claims::{Claims, Identity, TokenKind};
pub use user::{
    NewUser, ROLE_ADMIN, ROLE_USER, STATUS_ACTIVE, STATUS_BANNED, STATUS_INACTIVE, STATUS_PENDING,
    User, UserCredentials, UserStats, UserWithStats,
};
