//! Domain service for recipes, favorites, shopping carts and the
//! aggregated shopping list.

use thiserror::Error;

use crate::db::{RecipeList, ShoppingListItem};
use crate::domain::views::{RecipeSummary, RecipeView};
use crate::domain::{CurrentUser, PageRequest, Paged, Viewer};
use crate::services::image::{ImageError, ImageUpload};

/// Errors specific to recipe operations.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Recipe {0} not found")]
    NotFound(i32),

    #[error("Invalid page")]
    InvalidPage,

    #[error("{0}")]
    Validation(String),

    #[error("Recipe is already in {}", .0.label())]
    AlreadyListed(RecipeList),

    #[error("Recipe is not in {}", .0.label())]
    NotListed(RecipeList),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for RecipeError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for RecipeError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<ImageError> for RecipeError {
    fn from(err: ImageError) -> Self {
        if err.is_client_error() {
            Self::Validation(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

/// List filters as requested by the client.
#[derive(Debug, Clone, Default)]
pub struct RecipeQuery {
    pub author: Option<i32>,
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

/// A shape-validated recipe submission.
#[derive(Debug, Clone)]
pub struct RecipeInput {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub image: ImageUpload,
    pub tags: Vec<i32>,
    /// `(ingredient_id, amount)`
    pub ingredients: Vec<(i32, i32)>,
}

/// A partial update. Tags and ingredients are always replaced.
#[derive(Debug, Clone)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<ImageUpload>,
    pub tags: Vec<i32>,
    pub ingredients: Vec<(i32, i32)>,
}

/// Domain service trait for recipes.
#[async_trait::async_trait]
pub trait RecipeService: Send + Sync {
    /// Lists recipes newest first. Favorite and cart filters are ignored for
    /// anonymous viewers.
    async fn list(
        &self,
        viewer: &Viewer,
        query: RecipeQuery,
        page: PageRequest,
    ) -> Result<Paged<RecipeView>, RecipeError>;

    async fn get(&self, viewer: &Viewer, id: i32) -> Result<RecipeView, RecipeError>;

    /// Author id of the recipe, for ownership checks.
    async fn author_of(&self, id: i32) -> Result<i32, RecipeError>;

    /// Stores the image and creates the recipe with its tags and
    /// ingredients.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError::Validation`] for unknown tag or ingredient ids
    /// or an unacceptable image.
    async fn create(
        &self,
        author: &CurrentUser,
        input: RecipeInput,
    ) -> Result<RecipeView, RecipeError>;

    async fn update(
        &self,
        viewer: &Viewer,
        id: i32,
        patch: RecipePatch,
    ) -> Result<RecipeView, RecipeError>;

    async fn delete(&self, id: i32) -> Result<(), RecipeError>;

    /// Adds the recipe to the user's favorites or cart.
    ///
    /// # Errors
    ///
    /// Returns [`RecipeError::AlreadyListed`] when it is already there.
    async fn add_to_list(
        &self,
        list: RecipeList,
        user_id: i32,
        recipe_id: i32,
    ) -> Result<RecipeSummary, RecipeError>;

    /// # Errors
    ///
    /// Returns [`RecipeError::NotListed`] when the recipe is not there.
    async fn remove_from_list(
        &self,
        list: RecipeList,
        user_id: i32,
        recipe_id: i32,
    ) -> Result<(), RecipeError>;

    /// Ingredients of every recipe in the cart, summed per (name, unit).
    async fn shopping_list(&self, user_id: i32) -> Result<Vec<ShoppingListItem>, RecipeError>;
}
