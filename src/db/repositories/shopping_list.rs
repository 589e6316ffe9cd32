use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, JoinType, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait,
};

use super::recipe::cart_of;
use crate::entities::{ingredients, prelude::*, recipe_ingredients};

/// One aggregated line of a shopping list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

pub struct ShoppingListRepository {
    conn: DatabaseConnection,
}

impl ShoppingListRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Sums amounts across every recipe in the user's cart, grouped by
    /// ingredient name and unit, ordered by name.
    pub async fn aggregate(&self, user_id: i32) -> Result<Vec<ShoppingListItem>> {
        let rows: Vec<(String, String, i64)> = RecipeIngredients::find()
            .select_only()
            .column_as(ingredients::Column::Name, "name")
            .column_as(ingredients::Column::MeasurementUnit, "measurement_unit")
            .column_as(recipe_ingredients::Column::Amount.sum(), "total")
            .join(
                JoinType::InnerJoin,
                recipe_ingredients::Relation::Ingredients.def(),
            )
            .filter(recipe_ingredients::Column::RecipeId.in_subquery(cart_of(user_id)))
            .group_by(ingredients::Column::Name)
            .group_by(ingredients::Column::MeasurementUnit)
            .order_by_asc(ingredients::Column::Name)
            .order_by_asc(ingredients::Column::MeasurementUnit)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to aggregate shopping list")?;

        Ok(rows
            .into_iter()
            .map(|(name, measurement_unit, amount)| ShoppingListItem {
                name,
                measurement_unit,
                amount,
            })
            .collect())
    }
}
