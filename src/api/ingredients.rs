use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::permissions::{Action, Resource, check_endpoint};
use super::{ApiError, AppState};
use crate::domain::Viewer;
use crate::domain::views::IngredientView;

#[derive(Debug, Deserialize)]
pub struct IngredientSearchQuery {
    /// Case-insensitive name prefix.
    pub search: Option<String>,
}

/// GET /ingredients/
pub async fn list_ingredients(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Query(query): Query<IngredientSearchQuery>,
) -> Result<Json<Vec<IngredientView>>, ApiError> {
    check_endpoint(Resource::Ingredient, Action::List, &viewer)?;

    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let ingredients = state.catalog_service().list_ingredients(search).await?;
    Ok(Json(ingredients))
}

/// GET /ingredients/{id}/
pub async fn get_ingredient(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<Json<IngredientView>, ApiError> {
    check_endpoint(Resource::Ingredient, Action::Retrieve, &viewer)?;
    Ok(Json(state.catalog_service().get_ingredient(id).await?))
}
