//! `SeaORM` implementation of the `AuthService` trait.

use crate::db::Store;
use crate::domain::CurrentUser;
use crate::services::auth_service::{AuthError, AuthService};
use async_trait::async_trait;

pub struct SeaOrmAuthService {
    store: Store,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let user = self
            .store
            .user_repo()
            .verify_credentials(email, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let key = self.store.token_repo().get_or_create(user.id).await?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(key)
    }

    async fn logout(&self, user_id: i32) -> Result<(), AuthError> {
        let revoked = self.store.token_repo().revoke(user_id).await?;
        tracing::info!(user_id, revoked, "User logged out");
        Ok(())
    }

    async fn resolve_token(&self, key: &str) -> Result<Option<CurrentUser>, AuthError> {
        let user = self.store.user_for_token(key).await?;
        Ok(user.map(CurrentUser::from))
    }
}
