//! Account Application Service
//!
//! Orchestrates login, sign-up and user listing through the repository port.

use std::collections::HashMap;
use std::path::PathBuf;

use usergate_repo::security::{hash_password, verify_password};
use usergate_types::{
    AppError, Identity, LoginRequest, PaginationQuery, SignUpRequest, User, UserRepository,
    UserStats, UserWithStats,
    domain::{NewUser, ROLE_USER},
};

use crate::tokens::JwtService;
use crate::uploads::{discard, save_single};

/// Avatars land in `<upload_root>/users/avatar`.
pub const AVATAR_DIR: &str = "users/avatar";

/// Application service for account operations.
///
/// Generic over `R: UserRepository` - the adapter is injected at compile time.
pub struct AccountService<R: UserRepository> {
    repo: R,
    jwt: JwtService,
    upload_root: PathBuf,
    demo_stats: bool,
}

impl<R: UserRepository> AccountService<R> {
    pub fn new(repo: R, jwt: JwtService, upload_root: impl Into<PathBuf>) -> Self {
        Self {
            repo,
            jwt,
            upload_root: upload_root.into(),
            demo_stats: false,
        }
    }

    /// Fill in synthetic stats for users that have none.
    pub fn with_demo_stats(mut self, enabled: bool) -> Self {
        self.demo_stats = enabled;
        self
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Auth
    // ─────────────────────────────────────────────────────────────────────────────

    /// Checks the password against the stored hash and returns the user with
    /// a fresh token pair.
    pub async fn login(&self, req: LoginRequest) -> Result<User, AppError> {
        let invalid = || AppError::Unauthorized("invalid credentials".into());

        let Some(credentials) = self.repo.find_credentials(&req.email).await? else {
            return Err(invalid());
        };

        let hash = credentials.password_hash;
        let password = req.password;
        let matches = tokio::task::spawn_blocking(move || verify_password(&hash, &password))
            .await
            .map_err(|e| AppError::Internal(format!("password check: {e}")))?;
        if !matches {
            tracing::debug!(user_id = credentials.user.id, "password mismatch");
            return Err(invalid());
        }

        let mut user = credentials.user;
        let now = chrono::Utc::now().to_rfc3339();
        self.repo.record_login(user.id, &now).await?;

        self.attach_tokens(&mut user)?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok(user)
    }

    /// Stores the avatar (if any), creates the user and signs them in.
    ///
    /// A stored avatar is removed again when any later step fails.
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<User, AppError> {
        let stored = match &req.avatar {
            Some(file) => {
                let folder = self.upload_root.join(AVATAR_DIR);
                Some(save_single(file, &folder, &["image/"]).await?)
            }
            None => None,
        };
        let avatar = stored
            .as_ref()
            .map(|stored| format!("{AVATAR_DIR}/{}", stored.name));

        let created = self
            .register(req.username, req.email, req.password, avatar)
            .await;
        if let (Err(_), Some(stored)) = (&created, &stored) {
            discard(stored).await;
        }
        created
    }

    async fn register(
        &self,
        username: String,
        email: String,
        password: String,
        avatar: Option<String>,
    ) -> Result<User, AppError> {
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AppError::Internal(format!("password hashing: {e}")))?
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let mut user = self
            .repo
            .create_user(NewUser {
                uuid: uuid::Uuid::new_v4().to_string(),
                username,
                email,
                password_hash,
                avatar,
            })
            .await?;

        self.attach_tokens(&mut user)?;
        tracing::info!(user_id = user.id, "user signed up");
        Ok(user)
    }

    fn attach_tokens(&self, user: &mut User) -> Result<(), AppError> {
        let pair = self
            .jwt
            .generate(&Identity {
                user_id: user.id,
                email: user.email.clone(),
                role: ROLE_USER.to_string(),
                uuid: user.uuid.clone(),
            })
            .map_err(|e| AppError::Internal(e.to_string()))?;

        user.token = pair.access_token;
        user.refresh_token = pair.refresh_token;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────────────────────────

    pub async fn list_users(&self, page: PaginationQuery) -> Result<Vec<User>, AppError> {
        self.repo
            .list_users(page.limit, page.offset)
            .await
            .map_err(Into::into)
    }

    /// A page of users, each merged with its stats. Stats are fetched for
    /// the whole page in one query.
    pub async fn list_users_with_stats(
        &self,
        page: PaginationQuery,
    ) -> Result<Vec<UserWithStats>, AppError> {
        let users = self.repo.list_users(page.limit, page.offset).await?;
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();

        let mut stats: HashMap<i64, UserStats> = self
            .repo
            .stats_for_users(&ids)
            .await?
            .into_iter()
            .map(|s| (s.user_id, s))
            .collect();

        Ok(users
            .into_iter()
            .map(|user| {
                let found = stats.remove(&user.id);
                let stats = match found {
                    None if self.demo_stats => Some(synthetic_stats(user.id)),
                    other => other,
                };
                UserWithStats { user, stats }
            })
            .collect())
    }
}

fn synthetic_stats(user_id: i64) -> UserStats {
    UserStats {
        user_id,
        last_login: None,
        login_count: i32::try_from(user_id.saturating_mul(5)).unwrap_or(i32::MAX),
    }
}
