//! Domain service for the reference data recipes point at: tags and
//! ingredients.

use thiserror::Error;

use crate::db::IngredientSeed;
use crate::domain::views::{IngredientView, TagView};

/// Errors specific to tag and ingredient operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Tag {0} not found")]
    TagNotFound(i32),

    #[error("Ingredient {0} not found")]
    IngredientNotFound(i32),

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for CatalogError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for CatalogError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Tag fields to write. On update, `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct TagPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

#[async_trait::async_trait]
pub trait CatalogService: Send + Sync {
    /// All tags ordered by name.
    async fn list_tags(&self) -> Result<Vec<TagView>, CatalogError>;

    async fn get_tag(&self, id: i32) -> Result<TagView, CatalogError>;

    /// # Errors
    ///
    /// Returns [`CatalogError::Validation`] when a field is missing or the
    /// name, color or slug is already used.
    async fn create_tag(&self, patch: TagPatch) -> Result<TagView, CatalogError>;

    async fn update_tag(&self, id: i32, patch: TagPatch) -> Result<TagView, CatalogError>;

    async fn delete_tag(&self, id: i32) -> Result<(), CatalogError>;

    /// Ingredients ordered by id, narrowed to a case-insensitive name prefix.
    async fn list_ingredients(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<IngredientView>, CatalogError>;

    async fn get_ingredient(&self, id: i32) -> Result<IngredientView, CatalogError>;

    /// Inserts the seeds not already present; returns how many were added.
    async fn load_ingredients(&self, seeds: &[IngredientSeed]) -> Result<usize, CatalogError>;
}
