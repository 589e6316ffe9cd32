//! `SeaORM` implementation of the `RecipeService` trait.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::db::{
    Recipe, RecipeDraft, RecipeFilter, RecipeList, RecipeUpdate, ShoppingListItem, Store,
};
use crate::domain::views::{RecipeIngredientView, RecipeSummary, RecipeView, TagView, UserView};
use crate::domain::{CurrentUser, PageRequest, Paged, Viewer};
use crate::services::image::ImageService;
use crate::services::recipe_service::{
    RecipeError, RecipeInput, RecipePatch, RecipeQuery, RecipeService,
};

pub struct SeaOrmRecipeService {
    store: Store,
    images: ImageService,
}

impl SeaOrmRecipeService {
    #[must_use]
    pub const fn new(store: Store, images: ImageService) -> Self {
        Self { store, images }
    }

    async fn require_recipe(&self, id: i32) -> Result<Recipe, RecipeError> {
        self.store
            .recipe_repo()
            .get(id)
            .await?
            .ok_or(RecipeError::NotFound(id))
    }

    /// Rejects tag or ingredient ids that do not exist.
    async fn check_references(
        &self,
        tag_ids: &[i32],
        ingredients: &[(i32, i32)],
    ) -> Result<(), RecipeError> {
        let known: HashSet<i32> = self
            .store
            .tag_repo()
            .existing_ids(tag_ids)
            .await?
            .into_iter()
            .collect();
        let missing: Vec<String> = tag_ids
            .iter()
            .filter(|id| !known.contains(id))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(RecipeError::Validation(format!(
                "Unknown tag id(s): {}",
                missing.join(", ")
            )));
        }

        let ingredient_ids: Vec<i32> = ingredients.iter().map(|(id, _)| *id).collect();
        let known: HashSet<i32> = self
            .store
            .ingredient_repo()
            .existing_ids(&ingredient_ids)
            .await?
            .into_iter()
            .collect();
        let missing: Vec<String> = ingredient_ids
            .iter()
            .filter(|id| !known.contains(id))
            .map(ToString::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(RecipeError::Validation(format!(
                "Unknown ingredient id(s): {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }

    /// Builds full views for `recipes`, resolving per-viewer flags in bulk.
    async fn assemble(
        &self,
        viewer: &Viewer,
        recipes: Vec<Recipe>,
    ) -> Result<Vec<RecipeView>, RecipeError> {
        let ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();
        let mut author_ids: Vec<i32> = recipes.iter().map(|r| r.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();

        let repo = self.store.recipe_repo();
        let mut tags = repo.tags_for(&ids).await?;
        let mut ingredients = repo.ingredients_for(&ids).await?;

        let authors: HashMap<i32, _> = self
            .store
            .user_repo()
            .get_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let (favorited, in_cart, followed) = match viewer.id() {
            Some(viewer_id) => {
                let lists = self.store.recipe_list_repo();
                (
                    lists
                        .contained(RecipeList::Favorites, viewer_id, &ids)
                        .await?,
                    lists
                        .contained(RecipeList::ShoppingCart, viewer_id, &ids)
                        .await?,
                    self.store
                        .subscription_repo()
                        .followed_among(viewer_id, &author_ids)
                        .await?,
                )
            }
            None => (HashSet::new(), HashSet::new(), HashSet::new()),
        };

        recipes
            .into_iter()
            .map(|recipe| {
                let author = authors.get(&recipe.author_id).cloned().ok_or_else(|| {
                    RecipeError::Internal(format!("Author of recipe {} is missing", recipe.id))
                })?;

                Ok(RecipeView {
                    id: recipe.id,
                    tags: tags
                        .remove(&recipe.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(TagView::from)
                        .collect(),
                    author: UserView::new(author, followed.contains(&recipe.author_id)),
                    ingredients: ingredients
                        .remove(&recipe.id)
                        .unwrap_or_default()
                        .into_iter()
                        .map(RecipeIngredientView::from)
                        .collect(),
                    is_favorited: favorited.contains(&recipe.id),
                    is_in_shopping_cart: in_cart.contains(&recipe.id),
                    image: self.images.public_url(&recipe.image),
                    name: recipe.name,
                    text: recipe.text,
                    cooking_time: recipe.cooking_time,
                })
            })
            .collect()
    }

    async fn view(&self, viewer: &Viewer, recipe: Recipe) -> Result<RecipeView, RecipeError> {
        let id = recipe.id;
        self.assemble(viewer, vec![recipe])
            .await?
            .pop()
            .ok_or(RecipeError::NotFound(id))
    }
}

#[async_trait]
impl RecipeService for SeaOrmRecipeService {
    async fn list(
        &self,
        viewer: &Viewer,
        query: RecipeQuery,
        page: PageRequest,
    ) -> Result<Paged<RecipeView>, RecipeError> {
        let viewer_id = viewer.id();
        let filter = RecipeFilter {
            author_id: query.author,
            tag_slugs: query.tags,
            favorited: viewer_id.zip(query.is_favorited),
            in_cart: viewer_id.zip(query.is_in_shopping_cart),
        };

        let (recipes, total) = self
            .store
            .recipe_repo()
            .list_page(&filter, page.page, page.size)
            .await?;

        if page.is_out_of_range(total) {
            return Err(RecipeError::InvalidPage);
        }

        let items = self.assemble(viewer, recipes).await?;
        Ok(Paged { items, total })
    }

    async fn get(&self, viewer: &Viewer, id: i32) -> Result<RecipeView, RecipeError> {
        let recipe = self.require_recipe(id).await?;
        self.view(viewer, recipe).await
    }

    async fn author_of(&self, id: i32) -> Result<i32, RecipeError> {
        Ok(self.require_recipe(id).await?.author_id)
    }

    async fn create(
        &self,
        author: &CurrentUser,
        input: RecipeInput,
    ) -> Result<RecipeView, RecipeError> {
        self.check_references(&input.tags, &input.ingredients)
            .await?;

        let image = self.images.store(&input.image).await?;

        let draft = RecipeDraft {
            author_id: author.id,
            name: input.name,
            image: image.clone(),
            text: input.text,
            cooking_time: input.cooking_time,
            tag_ids: input.tags,
            ingredients: input.ingredients,
        };

        let recipe = match self.store.recipe_repo().create(draft).await {
            Ok(recipe) => recipe,
            Err(e) => {
                self.images.remove(&image).await;
                return Err(e.into());
            }
        };

        tracing::info!(recipe_id = recipe.id, author_id = author.id, "Recipe created");
        self.view(&Viewer::user(author.clone()), recipe).await
    }

    async fn update(
        &self,
        viewer: &Viewer,
        id: i32,
        patch: RecipePatch,
    ) -> Result<RecipeView, RecipeError> {
        let existing = self.require_recipe(id).await?;
        self.check_references(&patch.tags, &patch.ingredients)
            .await?;

        let new_image = match &patch.image {
            Some(upload) => Some(self.images.store(upload).await?),
            None => None,
        };

        let update = RecipeUpdate {
            name: patch.name,
            image: new_image.clone(),
            text: patch.text,
            cooking_time: patch.cooking_time,
            tag_ids: patch.tags,
            ingredients: patch.ingredients,
        };

        let updated = match self.store.recipe_repo().update(id, update).await {
            Ok(Some(recipe)) => recipe,
            Ok(None) => {
                if let Some(image) = &new_image {
                    self.images.remove(image).await;
                }
                return Err(RecipeError::NotFound(id));
            }
            Err(e) => {
                if let Some(image) = &new_image {
                    self.images.remove(image).await;
                }
                return Err(e.into());
            }
        };

        if new_image.is_some() {
            self.images.remove(&existing.image).await;
        }

        tracing::info!(recipe_id = id, "Recipe updated");
        self.view(viewer, updated).await
    }

    async fn delete(&self, id: i32) -> Result<(), RecipeError> {
        let recipe = self.require_recipe(id).await?;

        if !self.store.recipe_repo().delete(id).await? {
            return Err(RecipeError::NotFound(id));
        }
        self.images.remove(&recipe.image).await;

        tracing::info!(recipe_id = id, "Recipe deleted");
        Ok(())
    }

    async fn add_to_list(
        &self,
        list: RecipeList,
        user_id: i32,
        recipe_id: i32,
    ) -> Result<RecipeSummary, RecipeError> {
        let recipe = self.require_recipe(recipe_id).await?;

        if !self
            .store
            .recipe_list_repo()
            .add(list, user_id, recipe_id)
            .await?
        {
            return Err(RecipeError::AlreadyListed(list));
        }

        tracing::debug!(user_id, recipe_id, list = list.label(), "Recipe listed");
        let url = self.images.public_url(&recipe.image);
        Ok(RecipeSummary::new(recipe, url))
    }

    async fn remove_from_list(
        &self,
        list: RecipeList,
        user_id: i32,
        recipe_id: i32,
    ) -> Result<(), RecipeError> {
        self.require_recipe(recipe_id).await?;

        if !self
            .store
            .recipe_list_repo()
            .remove(list, user_id, recipe_id)
            .await?
        {
            return Err(RecipeError::NotListed(list));
        }

        tracing::debug!(user_id, recipe_id, list = list.label(), "Recipe unlisted");
        Ok(())
    }

    async fn shopping_list(&self, user_id: i32) -> Result<Vec<ShoppingListItem>, RecipeError> {
        Ok(self.store.shopping_list_repo().aggregate(user_id).await?)
    }
}
