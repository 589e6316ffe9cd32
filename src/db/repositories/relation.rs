use std::collections::HashSet;

use anyhow::{Context, Result};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use super::is_unique_violation;
use crate::entities::{favorites, prelude::*, shopping_carts};

/// The two per-user recipe lists backed by (user, recipe) pair tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Favorites => "favorites",
            Self::ShoppingCart => "shopping cart",
        }
    }
}

pub struct RecipeListRepository {
    conn: DatabaseConnection,
}

impl RecipeListRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Subset of `recipe_ids` present in the user's list.
    pub async fn contained(
        &self,
        list: RecipeList,
        user_id: i32,
        recipe_ids: &[i32],
    ) -> Result<HashSet<i32>> {
        if recipe_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let ids = recipe_ids.iter().copied();

        let found = match list {
            RecipeList::Favorites => Favorites::find()
                .filter(favorites::Column::UserId.eq(user_id))
                .filter(favorites::Column::RecipeId.is_in(ids))
                .all(&self.conn)
                .await?
                .into_iter()
                .map(|row| row.recipe_id)
                .collect(),
            RecipeList::ShoppingCart => ShoppingCarts::find()
                .filter(shopping_carts::Column::UserId.eq(user_id))
                .filter(shopping_carts::Column::RecipeId.is_in(ids))
                .all(&self.conn)
                .await?
                .into_iter()
                .map(|row| row.recipe_id)
                .collect(),
        };

        Ok(found)
    }

    /// Inserts the pair. Returns `false` when it was already present.
    pub async fn add(&self, list: RecipeList, user_id: i32, recipe_id: i32) -> Result<bool> {
        let inserted = match list {
            RecipeList::Favorites => Favorites::insert(favorites::ActiveModel {
                user_id: Set(user_id),
                recipe_id: Set(recipe_id),
            })
            .exec(&self.conn)
            .await
            .map(drop),
            RecipeList::ShoppingCart => ShoppingCarts::insert(shopping_carts::ActiveModel {
                user_id: Set(user_id),
                recipe_id: Set(recipe_id),
            })
            .exec(&self.conn)
            .await
            .map(drop),
        };

        match inserted {
            Ok(()) => Ok(true),
            Err(err) if is_unique_violation(&err) => Ok(false),
            Err(err) => Err(err).context("Failed to insert recipe list entry"),
        }
    }

    /// Deletes the pair. Returns `false` when it was not present.
    pub async fn remove(&self, list: RecipeList, user_id: i32, recipe_id: i32) -> Result<bool> {
        let result = match list {
            RecipeList::Favorites => {
                Favorites::delete_many()
                    .filter(favorites::Column::UserId.eq(user_id))
                    .filter(favorites::Column::RecipeId.eq(recipe_id))
                    .exec(&self.conn)
                    .await?
            }
            RecipeList::ShoppingCart => {
                ShoppingCarts::delete_many()
                    .filter(shopping_carts::Column::UserId.eq(user_id))
                    .filter(shopping_carts::Column::RecipeId.eq(recipe_id))
                    .exec(&self.conn)
                    .await?
            }
        };

        Ok(result.rows_affected > 0)
    }
}
