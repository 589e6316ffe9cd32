use std::collections::HashMap;

use anyhow::{Context, Result};
use sea_orm::sea_query::{Expr, Query, SelectStatement};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entities::{
    favorites, prelude::*, recipe_ingredients, recipe_tags, recipes, shopping_carts,
    tags,
};

pub use crate::entities::recipes::Model as Recipe;

/// Narrowing applied to the recipe list. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author_id: Option<i32>,
    /// Slugs OR-combined; a recipe matches when it carries any of them.
    pub tag_slugs: Vec<String>,
    /// `(user_id, wanted)`: keep recipes the user has (or has not) favorited.
    pub favorited: Option<(i32, bool)>,
    /// `(user_id, wanted)`: keep recipes in (or out of) the user's cart.
    pub in_cart: Option<(i32, bool)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeIngredientRow {
    pub ingredient_id: i32,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone)]
pub struct RecipeDraft {
    pub author_id: i32,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub tag_ids: Vec<i32>,
    /// `(ingredient_id, amount)` in submission order
    pub ingredients: Vec<(i32, i32)>,
}

/// Scalar fields left `None` keep their stored value; associations are
/// always replaced wholesale.
#[derive(Debug, Clone)]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub tag_ids: Vec<i32>,
    pub ingredients: Vec<(i32, i32)>,
}

pub struct RecipeRepository {
    conn: DatabaseConnection,
}

impl RecipeRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// One page of recipes, newest first, plus the filtered total.
    pub async fn list_page(
        &self,
        filter: &RecipeFilter,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<Recipe>, u64)> {
        let mut query = Recipes::find().order_by_desc(recipes::Column::Id);

        if let Some(author_id) = filter.author_id {
            query = query.filter(recipes::Column::AuthorId.eq(author_id));
        }

        if !filter.tag_slugs.is_empty() {
            query = query.filter(
                recipes::Column::Id.in_subquery(recipes_with_tag_slugs(&filter.tag_slugs)),
            );
        }

        if let Some((user_id, wanted)) = filter.favorited {
            let sub = favorites_of(user_id);
            query = query.filter(if wanted {
                recipes::Column::Id.in_subquery(sub)
            } else {
                recipes::Column::Id.not_in_subquery(sub)
            });
        }

        if let Some((user_id, wanted)) = filter.in_cart {
            let sub = cart_of(user_id);
            query = query.filter(if wanted {
                recipes::Column::Id.in_subquery(sub)
            } else {
                recipes::Column::Id.not_in_subquery(sub)
            });
        }

        let paginator = query.paginate(&self.conn, page_size);
        let total = paginator.num_items().await?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .context("Failed to fetch recipe page")?;

        Ok((items, total))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Recipe>> {
        Recipes::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query recipe")
    }

    /// Tags per recipe id, each list ordered by tag id.
    pub async fn tags_for(&self, recipe_ids: &[i32]) -> Result<HashMap<i32, Vec<tags::Model>>> {
        let mut out: HashMap<i32, Vec<tags::Model>> = HashMap::new();
        if recipe_ids.is_empty() {
            return Ok(out);
        }

        let rows = RecipeTags::find()
            .filter(recipe_tags::Column::RecipeId.is_in(recipe_ids.iter().copied()))
            .order_by_asc(recipe_tags::Column::TagId)
            .find_also_related(Tags)
            .all(&self.conn)
            .await
            .context("Failed to load recipe tags")?;

        for (link, tag) in rows {
            if let Some(tag) = tag {
                out.entry(link.recipe_id).or_default().push(tag);
            }
        }

        Ok(out)
    }

    /// Ingredient lines per recipe id, in the order they were submitted.
    pub async fn ingredients_for(
        &self,
        recipe_ids: &[i32],
    ) -> Result<HashMap<i32, Vec<RecipeIngredientRow>>> {
        let mut out: HashMap<i32, Vec<RecipeIngredientRow>> = HashMap::new();
        if recipe_ids.is_empty() {
            return Ok(out);
        }

        let rows = RecipeIngredients::find()
            .filter(recipe_ingredients::Column::RecipeId.is_in(recipe_ids.iter().copied()))
            .order_by_asc(recipe_ingredients::Column::Id)
            .find_also_related(Ingredients)
            .all(&self.conn)
            .await
            .context("Failed to load recipe ingredients")?;

        for (line, ingredient) in rows {
            let Some(ingredient) = ingredient else {
                continue;
            };
            out.entry(line.recipe_id)
                .or_default()
                .push(RecipeIngredientRow {
                    ingredient_id: ingredient.id,
                    name: ingredient.name,
                    measurement_unit: ingredient.measurement_unit,
                    amount: line.amount,
                });
        }

        Ok(out)
    }

    pub async fn create(&self, draft: RecipeDraft) -> Result<Recipe> {
        let txn = self.conn.begin().await?;

        let recipe = recipes::ActiveModel {
            author_id: Set(draft.author_id),
            name: Set(draft.name),
            image: Set(draft.image),
            text: Set(draft.text),
            cooking_time: Set(draft.cooking_time),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .context("Failed to insert recipe")?;

        insert_associations(&txn, recipe.id, &draft.tag_ids, &draft.ingredients).await?;

        txn.commit().await?;
        Ok(recipe)
    }

    /// Applies the update and replaces tags and ingredients in one transaction.
    pub async fn update(&self, id: i32, update: RecipeUpdate) -> Result<Option<Recipe>> {
        let txn = self.conn.begin().await?;

        let Some(existing) = Recipes::find_by_id(id).one(&txn).await? else {
            return Ok(None);
        };

        let touches_row = update.name.is_some()
            || update.image.is_some()
            || update.text.is_some()
            || update.cooking_time.is_some();

        let recipe = if touches_row {
            let mut active: recipes::ActiveModel = existing.into();
            if let Some(name) = update.name {
                active.name = Set(name);
            }
            if let Some(image) = update.image {
                active.image = Set(image);
            }
            if let Some(text) = update.text {
                active.text = Set(text);
            }
            if let Some(cooking_time) = update.cooking_time {
                active.cooking_time = Set(cooking_time);
            }
            active.update(&txn).await?
        } else {
            existing
        };

        RecipeTags::delete_many()
            .filter(recipe_tags::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;
        RecipeIngredients::delete_many()
            .filter(recipe_ingredients::Column::RecipeId.eq(id))
            .exec(&txn)
            .await?;

        insert_associations(&txn, id, &update.tag_ids, &update.ingredients).await?;

        txn.commit().await?;
        Ok(Some(recipe))
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = Recipes::delete_by_id(id).exec(&self.conn).await?;
        Ok(result.rows_affected > 0)
    }

    /// Recipe count per author for the given authors. Authors with no
    /// recipes are absent from the map.
    pub async fn count_by_author(&self, author_ids: &[i32]) -> Result<HashMap<i32, u64>> {
        if author_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(i32, i64)> = Recipes::find()
            .select_only()
            .column(recipes::Column::AuthorId)
            .column_as(recipes::Column::Id.count(), "recipe_count")
            .filter(recipes::Column::AuthorId.is_in(author_ids.iter().copied()))
            .group_by(recipes::Column::AuthorId)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to count recipes per author")?;

        Ok(rows
            .into_iter()
            .map(|(author, count)| (author, u64::try_from(count).unwrap_or(0)))
            .collect())
    }

    /// Newest recipes of one author, capped at `limit` when given.
    pub async fn by_author(&self, author_id: i32, limit: Option<u64>) -> Result<Vec<Recipe>> {
        Recipes::find()
            .filter(recipes::Column::AuthorId.eq(author_id))
            .order_by_desc(recipes::Column::Id)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list recipes by author")
    }
}

async fn insert_associations<C>(
    txn: &C,
    recipe_id: i32,
    tag_ids: &[i32],
    ingredients: &[(i32, i32)],
) -> Result<()>
where
    C: sea_orm::ConnectionTrait,
{
    if !tag_ids.is_empty() {
        let links = tag_ids.iter().map(|&tag_id| recipe_tags::ActiveModel {
            recipe_id: Set(recipe_id),
            tag_id: Set(tag_id),
        });
        RecipeTags::insert_many(links)
            .exec(txn)
            .await
            .context("Failed to insert recipe tags")?;
    }

    if !ingredients.is_empty() {
        let lines = ingredients
            .iter()
            .map(|&(ingredient_id, amount)| recipe_ingredients::ActiveModel {
                recipe_id: Set(recipe_id),
                ingredient_id: Set(ingredient_id),
                amount: Set(amount),
                ..Default::default()
            });
        RecipeIngredients::insert_many(lines)
            .exec(txn)
            .await
            .context("Failed to insert recipe ingredients")?;
    }

    Ok(())
}

fn recipes_with_tag_slugs(slugs: &[String]) -> SelectStatement {
    Query::select()
        .column((RecipeTags, recipe_tags::Column::RecipeId))
        .from(RecipeTags)
        .inner_join(
            Tags,
            Expr::col((Tags, tags::Column::Id)).equals((RecipeTags, recipe_tags::Column::TagId)),
        )
        .and_where(Expr::col((Tags, tags::Column::Slug)).is_in(slugs.iter().cloned()))
        .to_owned()
}

fn favorites_of(user_id: i32) -> SelectStatement {
    Query::select()
        .column(favorites::Column::RecipeId)
        .from(Favorites)
        .and_where(favorites::Column::UserId.eq(user_id))
        .to_owned()
}

pub(super) fn cart_of(user_id: i32) -> SelectStatement {
    Query::select()
        .column(shopping_carts::Column::RecipeId)
        .from(ShoppingCarts)
        .and_where(shopping_carts::Column::UserId.eq(user_id))
        .to_owned()
}

