use anyhow::{Context, Result};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use crate::entities::{ingredients, prelude::*};

pub use crate::entities::ingredients::Model as Ingredient;

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct IngredientSeed {
    pub name: String,
    pub measurement_unit: String,
}

pub struct IngredientRepository {
    conn: DatabaseConnection,
}

impl IngredientRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// All ingredients ordered by id, optionally narrowed to a name prefix.
    ///
    /// SQLite `LIKE` only folds ASCII case and treats `%` and `_` as
    /// wildcards, so the prefix is matched on Unicode-lowercased names here.
    pub async fn search(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        let all = Ingredients::find()
            .order_by_asc(ingredients::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to search ingredients")?;

        let Some(prefix) = prefix.map(str::trim).filter(|p| !p.is_empty()) else {
            return Ok(all);
        };

        let prefix = prefix.to_lowercase();
        Ok(all
            .into_iter()
            .filter(|ingredient| name_has_prefix(&ingredient.name, &prefix))
            .collect())
    }

    pub async fn get(&self, id: i32) -> Result<Option<Ingredient>> {
        Ingredients::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query ingredient")
    }

    /// Subset of `ids` that name existing ingredients.
    pub async fn existing_ids(&self, ids: &[i32]) -> Result<Vec<i32>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let found = Ingredients::find()
            .filter(ingredients::Column::Id.is_in(ids.iter().copied()))
            .all(&self.conn)
            .await?;

        Ok(found.into_iter().map(|i| i.id).collect())
    }

    /// Inserts every seed whose (name, unit) pair is not stored yet.
    /// Returns the number of rows inserted.
    pub async fn load_seeds(&self, seeds: &[IngredientSeed]) -> Result<usize> {
        let txn = self.conn.begin().await?;
        let mut inserted = 0;

        for seed in seeds {
            let exists = Ingredients::find()
                .filter(ingredients::Column::Name.eq(&seed.name))
                .filter(ingredients::Column::MeasurementUnit.eq(&seed.measurement_unit))
                .one(&txn)
                .await?
                .is_some();

            if exists {
                continue;
            }

            Ingredients::insert(ingredients::ActiveModel {
                name: Set(seed.name.clone()),
                measurement_unit: Set(seed.measurement_unit.clone()),
                ..Default::default()
            })
            .exec(&txn)
            .await
            .with_context(|| format!("Failed to insert ingredient {}", seed.name))?;

            inserted += 1;
        }

        txn.commit().await?;
        Ok(inserted)
    }
}

/// `lowered_prefix` must already be lowercased.
fn name_has_prefix(name: &str, lowered_prefix: &str) -> bool {
    name.to_lowercase().starts_with(lowered_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_folds_unicode_case() {
        assert!(name_has_prefix("Мука", &"мук".to_lowercase()));
        assert!(name_has_prefix("мука", &"МУК".to_lowercase()));
        assert!(name_has_prefix("Flour", "fl"));
        assert!(!name_has_prefix("Сахар", "мук"));
    }

    #[test]
    fn test_prefix_has_no_wildcards() {
        assert!(!name_has_prefix("Flour", "%"));
        assert!(!name_has_prefix("Flour", "_lour"));
        assert!(name_has_prefix("100% juice", "100%"));
    }
}
