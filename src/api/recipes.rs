use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Query, RawQuery, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::pagination::Pagination;
use super::permissions::{Action, Resource, check_endpoint, check_object};
use super::types::Page;
use super::{ApiError, AppState, validation};
use crate::constants::recipe::MAX_NAME_LENGTH;
use crate::db::RecipeList;
use crate::domain::Viewer;
use crate::domain::views::{RecipeSummary, RecipeView};
use crate::services::{
    ExportFormat, ImageUpload, RecipeError, RecipeInput, RecipePatch, RecipeQuery, export,
};

impl From<RecipeError> for ApiError {
    fn from(err: RecipeError) -> Self {
        match err {
            RecipeError::NotFound(id) => Self::not_found("Recipe", id),
            RecipeError::InvalidPage => Self::invalid_page(),
            RecipeError::Validation(msg) => Self::validation(msg),
            RecipeError::AlreadyListed(_) | RecipeError::NotListed(_) => {
                Self::conflict(err.to_string())
            }
            RecipeError::Database(msg) => Self::DatabaseError(msg),
            RecipeError::Internal(msg) => Self::internal(msg),
        }
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct IngredientAmount {
    pub id: i32,
    pub amount: i32,
}

/// JSON body for recipe writes. Every field is optional here; which ones
/// are required depends on the action.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePayload {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<i32>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

/// Recipe write body decoded from either JSON or `multipart/form-data`.
///
/// In multipart bodies `image` may be a file part or a data-URI text part,
/// `tags` may repeat or hold a JSON array, and `ingredients` holds a JSON
/// array of `{id, amount}`.
#[derive(Debug, Default)]
pub struct RecipeForm {
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub image: Option<ImageUpload>,
    pub tags: Option<Vec<i32>>,
    pub ingredients: Option<Vec<(i32, i32)>>,
}

impl RecipeForm {
    async fn from_request(request: Request, state: &Arc<AppState>) -> Result<Self, ApiError> {
        let is_multipart = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(|e| ApiError::validation(e.body_text()))?;
            Self::from_multipart(multipart).await
        } else {
            let Json(payload) = Json::<RecipePayload>::from_request(request, state)
                .await
                .map_err(|e| ApiError::validation(e.body_text()))?;
            Self::from_payload(payload)
        }
    }

    fn from_payload(payload: RecipePayload) -> Result<Self, ApiError> {
        Ok(Self {
            name: payload.name,
            text: payload.text,
            cooking_time: payload.cooking_time,
            image: payload
                .image
                .as_deref()
                .map(ImageUpload::from_data_uri)
                .transpose()
                .map_err(|e| ApiError::validation(e.to_string()))?,
            tags: payload.tags,
            ingredients: payload
                .ingredients
                .map(|lines| lines.into_iter().map(|l| (l.id, l.amount)).collect()),
        })
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        let bad_part = |e: axum::extract::multipart::MultipartError| {
            ApiError::validation(format!("Malformed multipart body: {}", e.body_text()))
        };

        while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
            let name = field.name().unwrap_or_default().to_string();

            if name == "image"
                && let Some(file_name) = field.file_name().map(str::to_string)
            {
                let bytes = field.bytes().await.map_err(bad_part)?;
                form.image = Some(
                    ImageUpload::from_file(&file_name, bytes.to_vec())
                        .map_err(|e| ApiError::validation(e.to_string()))?,
                );
                continue;
            }

            let value = field.text().await.map_err(bad_part)?;
            match name.as_str() {
                "name" => form.name = Some(value),
                "text" => form.text = Some(value),
                "cooking_time" => {
                    form.cooking_time = Some(value.trim().parse().map_err(|_| {
                        ApiError::validation("cooking_time must be an integer")
                    })?);
                }
                "image" => {
                    form.image = Some(
                        ImageUpload::from_data_uri(&value)
                            .map_err(|e| ApiError::validation(e.to_string()))?,
                    );
                }
                "tags" => {
                    let tags = form.tags.get_or_insert_with(Vec::new);
                    if value.trim_start().starts_with('[') {
                        let parsed: Vec<i32> = serde_json::from_str(&value)
                            .map_err(|_| ApiError::validation("tags must be a list of ids"))?;
                        tags.extend(parsed);
                    } else {
                        tags.push(
                            value
                                .trim()
                                .parse()
                                .map_err(|_| ApiError::validation("tags must be ids"))?,
                        );
                    }
                }
                "ingredients" => {
                    let lines: Vec<IngredientAmount> =
                        serde_json::from_str(&value).map_err(|_| {
                            ApiError::validation("ingredients must be a list of {id, amount}")
                        })?;
                    form.ingredients = Some(lines.into_iter().map(|l| (l.id, l.amount)).collect());
                }
                _ => {}
            }
        }

        Ok(form)
    }

    fn required_lists(
        tags: Option<Vec<i32>>,
        ingredients: Option<Vec<(i32, i32)>>,
    ) -> Result<(Vec<i32>, Vec<(i32, i32)>), ApiError> {
        let tags = tags.ok_or_else(|| ApiError::validation("tags is required"))?;
        let ingredients =
            ingredients.ok_or_else(|| ApiError::validation("ingredients is required"))?;

        validation::validate_tag_ids(&tags)?;
        validation::validate_ingredient_lines(&ingredients)?;
        Ok((tags, ingredients))
    }

    fn into_input(self) -> Result<RecipeInput, ApiError> {
        let (tags, ingredients) = Self::required_lists(self.tags, self.ingredients)?;

        let name = self
            .name
            .ok_or_else(|| ApiError::validation("name is required"))?;
        let text = self
            .text
            .ok_or_else(|| ApiError::validation("text is required"))?;
        let cooking_time = self
            .cooking_time
            .ok_or_else(|| ApiError::validation("cooking_time is required"))?;
        let image = self
            .image
            .ok_or_else(|| ApiError::validation("image is required"))?;

        Ok(RecipeInput {
            name: validation::validate_text("name", &name, MAX_NAME_LENGTH)?,
            text: validation::validate_text("text", &text, usize::MAX)?,
            cooking_time: validation::validate_cooking_time(cooking_time)?,
            image,
            tags,
            ingredients,
        })
    }

    fn into_patch(self) -> Result<RecipePatch, ApiError> {
        let (tags, ingredients) = Self::required_lists(self.tags, self.ingredients)?;

        Ok(RecipePatch {
            name: self
                .name
                .map(|n| validation::validate_text("name", &n, MAX_NAME_LENGTH))
                .transpose()?,
            text: self
                .text
                .map(|t| validation::validate_text("text", &t, usize::MAX))
                .transpose()?,
            cooking_time: self
                .cooking_time
                .map(validation::validate_cooking_time)
                .transpose()?,
            image: self.image,
            tags,
            ingredients,
        })
    }
}

/// Reads the recipe list filters. `tags` may repeat.
fn parse_recipe_query(raw: Option<&str>) -> Result<RecipeQuery, ApiError> {
    let mut query = RecipeQuery::default();

    for (key, value) in url::form_urlencoded::parse(raw.unwrap_or("").as_bytes()) {
        match key.as_ref() {
            "author" => {
                query.author = Some(
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ApiError::validation("author must be a user id"))?,
                );
            }
            "tags" if !value.trim().is_empty() => query.tags.push(value.trim().to_string()),
            "is_favorited" => {
                query.is_favorited = Some(validation::parse_flag("is_favorited", &value)?);
            }
            "is_in_shopping_cart" => {
                query.is_in_shopping_cart =
                    Some(validation::parse_flag("is_in_shopping_cart", &value)?);
            }
            _ => {}
        }
    }

    Ok(query)
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /recipes/
pub async fn list_recipes(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    pagination: Pagination,
    RawQuery(raw): RawQuery,
) -> Result<Json<Page<RecipeView>>, ApiError> {
    check_endpoint(Resource::Recipe, Action::List, &viewer)?;
    let query = parse_recipe_query(raw.as_deref())?;

    let recipes = state
        .recipe_service()
        .list(&viewer, query, pagination.request)
        .await?;

    Ok(Json(pagination.page(recipes)))
}

/// GET /recipes/{id}/
pub async fn get_recipe(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<Json<RecipeView>, ApiError> {
    check_endpoint(Resource::Recipe, Action::Retrieve, &viewer)?;

    let recipe = state.recipe_service().get(&viewer, id).await?;
    Ok(Json(recipe))
}

/// POST /recipes/
pub async fn create_recipe(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    check_endpoint(Resource::Recipe, Action::Create, &viewer)?;
    let author = viewer.current().ok_or_else(ApiError::unauthorized)?;

    let input = RecipeForm::from_request(request, &state)
        .await?
        .into_input()?;

    let recipe = state.recipe_service().create(author, input).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// PATCH /recipes/{id}/
pub async fn update_recipe(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
    request: Request,
) -> Result<Json<RecipeView>, ApiError> {
    check_endpoint(Resource::Recipe, Action::Update, &viewer)?;

    let patch = RecipeForm::from_request(request, &state)
        .await?
        .into_patch()?;

    let author_id = state.recipe_service().author_of(id).await?;
    check_object(Resource::Recipe, Action::Update, &viewer, author_id)?;

    let recipe = state.recipe_service().update(&viewer, id, patch).await?;
    Ok(Json(recipe))
}

/// DELETE /recipes/{id}/
pub async fn delete_recipe(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    check_endpoint(Resource::Recipe, Action::Destroy, &viewer)?;

    let author_id = state.recipe_service().author_of(id).await?;
    check_object(Resource::Recipe, Action::Destroy, &viewer, author_id)?;

    state.recipe_service().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_to_list(
    state: &AppState,
    viewer: &Viewer,
    list: RecipeList,
    action: Action,
    recipe_id: i32,
) -> Result<(StatusCode, Json<RecipeSummary>), ApiError> {
    check_endpoint(Resource::Recipe, action, viewer)?;
    let user_id = viewer.id().ok_or_else(ApiError::unauthorized)?;

    let summary = state
        .recipe_service()
        .add_to_list(list, user_id, recipe_id)
        .await?;

    Ok((StatusCode::CREATED, Json(summary)))
}

async fn remove_from_list(
    state: &AppState,
    viewer: &Viewer,
    list: RecipeList,
    action: Action,
    recipe_id: i32,
) -> Result<StatusCode, ApiError> {
    check_endpoint(Resource::Recipe, action, viewer)?;
    let user_id = viewer.id().ok_or_else(ApiError::unauthorized)?;

    state
        .recipe_service()
        .remove_from_list(list, user_id, recipe_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /recipes/{id}/favorite/
pub async fn favorite(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    add_to_list(&state, &viewer, RecipeList::Favorites, Action::Favorite, id).await
}

/// DELETE /recipes/{id}/favorite/
pub async fn unfavorite(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    remove_from_list(&state, &viewer, RecipeList::Favorites, Action::Favorite, id).await
}

/// POST /recipes/{id}/shopping_cart/
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    add_to_list(
        &state,
        &viewer,
        RecipeList::ShoppingCart,
        Action::ShoppingCart,
        id,
    )
    .await
}

/// DELETE /recipes/{id}/shopping_cart/
pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    remove_from_list(
        &state,
        &viewer,
        RecipeList::ShoppingCart,
        Action::ShoppingCart,
        id,
    )
    .await
}

/// GET /recipes/download_shopping_cart/
pub async fn download_shopping_cart(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    check_endpoint(Resource::Recipe, Action::DownloadShoppingCart, &viewer)?;
    let user_id = viewer.id().ok_or_else(ApiError::unauthorized)?;

    let format = match query.format.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("" | "csv") => ExportFormat::Csv,
        Some("pdf") => ExportFormat::Pdf,
        Some(other) => {
            return Err(ApiError::validation(format!(
                "Unsupported format '{other}', expected csv or pdf"
            )));
        }
    };

    let items = state.recipe_service().shopping_list(user_id).await?;
    let file = export::render(format, &items)?;

    tracing::info!(user_id, lines = items.len(), ?format, "Shopping list exported");

    Ok((
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.body,
    )
        .into_response())
}
