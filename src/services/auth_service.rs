//! Domain service for token authentication.
//!
//! Exchanges credentials for an opaque token, revokes it, and resolves a
//! presented token back to its account.

use thiserror::Error;

use crate::domain::CurrentUser;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unable to log in with provided credentials")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies email and password and returns the user's token, issuing
    /// one if the user has none.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown email or a
    /// wrong password.
    async fn login(&self, email: &str, password: &str) -> Result<String, AuthError>;

    /// Revokes the user's token.
    async fn logout(&self, user_id: i32) -> Result<(), AuthError>;

    /// Resolves a presented token. `None` means the token is unknown.
    async fn resolve_token(&self, key: &str) -> Result<Option<CurrentUser>, AuthError>;
}
