use std::collections::HashSet;

use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};

use super::is_unique_violation;
use super::user::User;
use crate::entities::{prelude::*, subscriptions};

pub struct SubscriptionRepository {
    conn: DatabaseConnection,
}

impl SubscriptionRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Returns `false` when the user already follows the author.
    pub async fn create(&self, user_id: i32, author_id: i32) -> Result<bool> {
        let inserted = subscriptions::ActiveModel {
            user_id: Set(user_id),
            author_id: Set(author_id),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await;

        match inserted {
            Ok(_) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err).context("Failed to insert subscription"),
        }
    }

    /// Returns `false` when the user did not follow the author.
    pub async fn delete(&self, user_id: i32, author_id: i32) -> Result<bool> {
        let result = Subscriptions::delete_many()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::AuthorId.eq(author_id))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Subset of `author_ids` the user follows.
    pub async fn followed_among(&self, user_id: i32, author_ids: &[i32]) -> Result<HashSet<i32>> {
        if author_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = Subscriptions::find()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::AuthorId.is_in(author_ids.iter().copied()))
            .all(&self.conn)
            .await?;

        Ok(rows.into_iter().map(|s| s.author_id).collect())
    }

    /// One page of followed authors, most recent subscription first.
    pub async fn authors_page(
        &self,
        user_id: i32,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<User>, u64)> {
        let paginator = Subscriptions::find()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .order_by_desc(subscriptions::Column::Id)
            .paginate(&self.conn, page_size);

        let total = paginator.num_items().await?;
        let rows = paginator
            .fetch_page(page - 1)
            .await
            .context("Failed to fetch subscriptions page")?;

        let author_ids: Vec<i32> = rows.iter().map(|s| s.author_id).collect();
        let authors = Users::find()
            .filter(crate::entities::users::Column::Id.is_in(author_ids.iter().copied()))
            .all(&self.conn)
            .await?;

        // Keep subscription order, not the user table's.
        let ordered = author_ids
            .iter()
            .filter_map(|id| authors.iter().find(|u| u.id == *id).cloned())
            .map(User::from)
            .collect();

        Ok((ordered, total))
    }
}
