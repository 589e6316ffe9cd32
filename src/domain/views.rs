use serde::Serialize;

use crate::db::{Ingredient, Recipe, RecipeIngredientRow, Tag, User};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub email: String,
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserView {
    #[must_use]
    pub fn new(user: User, is_subscribed: bool) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagView {
    pub id: i32,
    pub name: String,
    pub color: String,
    pub slug: String,
}

impl From<Tag> for TagView {
    fn from(tag: Tag) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            color: tag.color,
            slug: tag.slug,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngredientView {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
}

impl From<Ingredient> for IngredientView {
    fn from(ingredient: Ingredient) -> Self {
        Self {
            id: ingredient.id,
            name: ingredient.name,
            measurement_unit: ingredient.measurement_unit,
        }
    }
}

/// An ingredient line of a recipe; `id` is the ingredient's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeIngredientView {
    pub id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeIngredientRow> for RecipeIngredientView {
    fn from(row: RecipeIngredientRow) -> Self {
        Self {
            id: row.ingredient_id,
            name: row.name,
            measurement_unit: row.measurement_unit,
            amount: row.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeView {
    pub id: i32,
    pub tags: Vec<TagView>,
    pub author: UserView,
    pub ingredients: Vec<RecipeIngredientView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Compact recipe used by favorites, carts and subscription previews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeSummary {
    pub id: i32,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeSummary {
    #[must_use]
    pub fn new(recipe: Recipe, image_url: String) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: image_url,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub author: UserView,
    pub recipes: Vec<RecipeSummary>,
    pub recipes_count: u64,
}
