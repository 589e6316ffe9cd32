//! `SeaORM` implementation of the `CatalogService` trait.

use async_trait::async_trait;

use crate::db::{IngredientSeed, Store, TagInput};
use crate::domain::views::{IngredientView, TagView};
use crate::services::catalog_service::{CatalogError, CatalogService, TagPatch};

pub struct SeaOrmCatalogService {
    store: Store,
}

impl SeaOrmCatalogService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }

    async fn save_tag(&self, id: Option<i32>, input: TagInput) -> Result<TagView, CatalogError> {
        let repo = self.store.tag_repo();

        if let Some(field) = repo.find_conflict(&input, id).await? {
            return Err(CatalogError::Validation(format!(
                "A tag with this {} already exists",
                field.as_str()
            )));
        }

        let tag = match id {
            Some(id) => repo
                .update(id, input)
                .await?
                .ok_or(CatalogError::TagNotFound(id))?,
            None => repo.create(input).await?,
        };

        Ok(TagView::from(tag))
    }
}

#[async_trait]
impl CatalogService for SeaOrmCatalogService {
    async fn list_tags(&self) -> Result<Vec<TagView>, CatalogError> {
        let tags = self.store.tag_repo().list().await?;
        Ok(tags.into_iter().map(TagView::from).collect())
    }

    async fn get_tag(&self, id: i32) -> Result<TagView, CatalogError> {
        self.store
            .tag_repo()
            .get(id)
            .await?
            .map(TagView::from)
            .ok_or(CatalogError::TagNotFound(id))
    }

    async fn create_tag(&self, patch: TagPatch) -> Result<TagView, CatalogError> {
        let (Some(name), Some(color), Some(slug)) = (patch.name, patch.color, patch.slug) else {
            return Err(CatalogError::Validation(
                "name, color and slug are required".to_string(),
            ));
        };

        let tag = self
            .save_tag(None, TagInput { name, color, slug })
            .await?;
        tracing::info!(tag_id = tag.id, slug = %tag.slug, "Tag created");
        Ok(tag)
    }

    async fn update_tag(&self, id: i32, patch: TagPatch) -> Result<TagView, CatalogError> {
        let current = self
            .store
            .tag_repo()
            .get(id)
            .await?
            .ok_or(CatalogError::TagNotFound(id))?;

        let input = TagInput {
            name: patch.name.unwrap_or(current.name),
            color: patch.color.unwrap_or(current.color),
            slug: patch.slug.unwrap_or(current.slug),
        };

        self.save_tag(Some(id), input).await
    }

    async fn delete_tag(&self, id: i32) -> Result<(), CatalogError> {
        if !self.store.tag_repo().delete(id).await? {
            return Err(CatalogError::TagNotFound(id));
        }
        tracing::info!(tag_id = id, "Tag deleted");
        Ok(())
    }

    async fn list_ingredients(
        &self,
        search: Option<&str>,
    ) -> Result<Vec<IngredientView>, CatalogError> {
        let items = self.store.ingredient_repo().search(search).await?;
        Ok(items.into_iter().map(IngredientView::from).collect())
    }

    async fn get_ingredient(&self, id: i32) -> Result<IngredientView, CatalogError> {
        self.store
            .ingredient_repo()
            .get(id)
            .await?
            .map(IngredientView::from)
            .ok_or(CatalogError::IngredientNotFound(id))
    }

    async fn load_ingredients(&self, seeds: &[IngredientSeed]) -> Result<usize, CatalogError> {
        let inserted = self.store.load_ingredients(seeds).await?;
        tracing::info!(inserted, total = seeds.len(), "Ingredients loaded");
        Ok(inserted)
    }
}
