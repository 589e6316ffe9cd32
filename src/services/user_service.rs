//! Domain service for accounts and subscriptions.
//!
//! Handles registration, profile reads and writes, password changes and the
//! follower/author relationship between users.

use thiserror::Error;

use crate::db::UserChanges;
use crate::domain::views::{SubscriptionView, UserView};
use crate::domain::{PageRequest, Paged, Viewer};

/// Errors specific to user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("User {0} not found")]
    NotFound(i32),

    #[error("Invalid page")]
    InvalidPage,

    #[error("{0}")]
    Validation(String),

    #[error("You are already subscribed to this author")]
    AlreadySubscribed,

    #[error("You cannot subscribe to yourself")]
    SelfSubscription,

    #[error("You are not subscribed to this author")]
    NotSubscribed,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for UserError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for UserError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A validated sign-up request.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Domain service trait for user management.
#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    /// Creates a regular (non-admin) account.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Validation`] when the email or username is taken.
    async fn register(&self, registration: Registration) -> Result<UserView, UserError>;

    /// Lists users ordered by id.
    async fn list(&self, viewer: &Viewer, page: PageRequest)
    -> Result<Paged<UserView>, UserError>;

    async fn get(&self, viewer: &Viewer, id: i32) -> Result<UserView, UserError>;

    /// Overwrites the given profile fields.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Validation`] when the new email or username
    /// belongs to another account.
    async fn update(
        &self,
        viewer: &Viewer,
        id: i32,
        changes: UserChanges,
    ) -> Result<UserView, UserError>;

    async fn delete(&self, id: i32) -> Result<(), UserError>;

    /// Changes the password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Validation`] when the current password is wrong
    /// or the new password equals it.
    async fn set_password(
        &self,
        user_id: i32,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserError>;

    /// Follows `author_id`. The result previews at most `recipes_limit`
    /// recipes when a limit is given.
    async fn subscribe(
        &self,
        user_id: i32,
        author_id: i32,
        recipes_limit: Option<u64>,
    ) -> Result<SubscriptionView, UserError>;

    async fn unsubscribe(&self, user_id: i32, author_id: i32) -> Result<(), UserError>;

    /// Authors the user follows, most recently followed first.
    async fn subscriptions(
        &self,
        user_id: i32,
        page: PageRequest,
        recipes_limit: Option<u64>,
    ) -> Result<Paged<SubscriptionView>, UserError>;
}
