use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use super::user::User;
use crate::entities::{auth_tokens, prelude::*};

/// Issues and resolves the opaque tokens clients present in `Authorization`.
pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Returns the user's existing token, or issues a new one.
    pub async fn get_or_create(&self, user_id: i32) -> Result<String> {
        let existing = AuthTokens::find()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query auth token")?;

        if let Some(token) = existing {
            return Ok(token.key);
        }

        let key = generate_token_key();
        auth_tokens::ActiveModel {
            key: Set(key.clone()),
            user_id: Set(user_id),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
        }
        .insert(&self.conn)
        .await
        .context("Failed to insert auth token")?;

        Ok(key)
    }

    pub async fn find_user(&self, key: &str) -> Result<Option<User>> {
        let row = AuthTokens::find_by_id(key.to_string())
            .find_also_related(Users)
            .one(&self.conn)
            .await
            .context("Failed to resolve auth token")?;

        Ok(row.and_then(|(_, user)| user).map(User::from))
    }

    /// Deletes every token held by the user. Returns whether one existed.
    pub async fn revoke(&self, user_id: i32) -> Result<bool> {
        let result = AuthTokens::delete_many()
            .filter(auth_tokens::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }
}

/// 20 random bytes rendered as 40 lowercase hex characters.
#[must_use]
pub fn generate_token_key() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 20] = rng.random();

    bytes.iter().fold(String::with_capacity(40), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_key_shape() {
        let key = generate_token_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(key, generate_token_key());
    }
}
