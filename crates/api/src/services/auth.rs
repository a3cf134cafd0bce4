//! Admin authentication: sign-in, session lookup and sign-out.
//!
//! Sessions are JWT access tokens whose `jti` is tracked in `admin_sessions`,
//! so a sign-out revokes the token before it expires.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use persistence::entities::{AdminSessionEntity, AdminUserEntity};
use persistence::repositories::AdminRepository;
use serde::Serialize;
use shared::jwt::{JwtConfig, JwtError};
use shared::password::{hash_password, verify_password, PasswordError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Session has been signed out")]
    SessionRevoked,

    #[error("Token error: {0}")]
    TokenError(#[from] JwtError),

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Admin account storage used by [`AuthService`].
#[async_trait]
pub trait AdminAccounts: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<AdminUserEntity>, sqlx::Error>;

    async fn create_if_absent(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<AdminUserEntity>, sqlx::Error>;

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), sqlx::Error>;

    async fn create_session(
        &self,
        jti: &str,
        admin_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<AdminSessionEntity, sqlx::Error>;

    async fn find_session(&self, jti: &str) -> Result<Option<AdminSessionEntity>, sqlx::Error>;

    async fn revoke_session(&self, jti: &str) -> Result<bool, sqlx::Error>;
}

#[async_trait]
impl AdminAccounts for AdminRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<AdminUserEntity>, sqlx::Error> {
        AdminRepository::find_by_email(self, email).await
    }

    async fn create_if_absent(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<AdminUserEntity>, sqlx::Error> {
        AdminRepository::create_if_absent(self, email, password_hash).await
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        AdminRepository::touch_last_login(self, id, at).await
    }

    async fn create_session(
        &self,
        jti: &str,
        admin_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<AdminSessionEntity, sqlx::Error> {
        AdminRepository::create_session(self, jti, admin_id, expires_at).await
    }

    async fn find_session(&self, jti: &str) -> Result<Option<AdminSessionEntity>, sqlx::Error> {
        AdminRepository::find_session(self, jti).await
    }

    async fn revoke_session(&self, jti: &str) -> Result<bool, sqlx::Error> {
        AdminRepository::revoke_session(self, jti).await
    }
}

/// An authenticated admin session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminSession {
    pub admin_id: Uuid,
    pub email: String,
    #[serde(skip)]
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful sign-in.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub access_token: String,
    pub expires_in: i64,
    pub session: AdminSession,
}

/// Session changes, observed by long-lived admin streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn { admin_id: Uuid, jti: String },
    SignedOut { admin_id: Uuid, jti: String },
}

pub struct AuthService {
    accounts: Arc<dyn AdminAccounts>,
    jwt: JwtConfig,
    events: broadcast::Sender<AuthEvent>,
}

impl AuthService {
    pub fn new(accounts: Arc<dyn AdminAccounts>, jwt: JwtConfig) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            accounts,
            jwt,
            events,
        }
    }

    /// Verifies credentials and opens a new session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedIn, AuthError> {
        let admin = self
            .accounts
            .find_by_email(email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &admin.password_hash)? {
            tracing::warn!(admin_id = %admin.id, "Admin sign-in rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let issued = self.jwt.issue(admin.id, &admin.email)?;
        self.accounts
            .create_session(&issued.jti, admin.id, issued.expires_at)
            .await?;
        self.accounts.touch_last_login(admin.id, Utc::now()).await?;

        tracing::info!(admin_id = %admin.id, "Admin signed in");
        let _ = self.events.send(AuthEvent::SignedIn {
            admin_id: admin.id,
            jti: issued.jti.clone(),
        });

        Ok(SignedIn {
            access_token: issued.token,
            expires_in: self.jwt.token_expiry_secs,
            session: AdminSession {
                admin_id: admin.id,
                email: admin.email,
                jti: issued.jti,
                expires_at: issued.expires_at,
            },
        })
    }

    /// Resolves a bearer token to its live session.
    pub async fn current_session(&self, token: &str) -> Result<AdminSession, AuthError> {
        let claims = self.jwt.validate(token).map_err(|e| match e {
            JwtError::TokenExpired | JwtError::InvalidToken | JwtError::DecodingError(_) => {
                AuthError::InvalidToken
            }
            other => AuthError::TokenError(other),
        })?;
        let admin_id = claims.admin_id().map_err(|_| AuthError::InvalidToken)?;

        let session = self
            .accounts
            .find_session(&claims.jti)
            .await?
            .filter(|s| s.admin_id == admin_id)
            .ok_or(AuthError::InvalidToken)?;

        if !session.is_active(Utc::now()) {
            return Err(AuthError::SessionRevoked);
        }

        Ok(AdminSession {
            admin_id,
            email: claims.email,
            jti: session.jti,
            expires_at: session.expires_at,
        })
    }

    /// Revokes the session. Signing out twice is not an error.
    pub async fn sign_out(&self, session: &AdminSession) -> Result<(), AuthError> {
        if self.accounts.revoke_session(&session.jti).await? {
            tracing::info!(admin_id = %session.admin_id, "Admin signed out");
        }
        let _ = self.events.send(AuthEvent::SignedOut {
            admin_id: session.admin_id,
            jti: session.jti.clone(),
        });
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Creates the admin account unless the email is already registered.
    /// Returns `true` when an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        if self.accounts.find_by_email(email).await?.is_some() {
            return Ok(false);
        }
        let password_hash = hash_password(password)?;
        Ok(self
            .accounts
            .create_if_absent(email, &password_hash)
            .await?
            .is_some())
    }
}
