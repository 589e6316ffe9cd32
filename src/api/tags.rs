use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::permissions::{Action, Resource, check_endpoint};
use super::{ApiError, AppState, validation};
use crate::constants::recipe::MAX_NAME_LENGTH;
use crate::domain::Viewer;
use crate::domain::views::TagView;
use crate::services::{CatalogError, TagPatch};

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::TagNotFound(id) => Self::not_found("Tag", id),
            CatalogError::IngredientNotFound(id) => Self::not_found("Ingredient", id),
            CatalogError::Validation(msg) => Self::validation(msg),
            CatalogError::Database(msg) => Self::DatabaseError(msg),
            CatalogError::Internal(msg) => Self::internal(msg),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub name: Option<String>,
    pub color: Option<String>,
    pub slug: Option<String>,
}

impl TagRequest {
    fn into_patch(self) -> Result<TagPatch, ApiError> {
        Ok(TagPatch {
            name: self
                .name
                .map(|n| validation::validate_text("name", &n, MAX_NAME_LENGTH))
                .transpose()?,
            color: self
                .color
                .as_deref()
                .map(validation::validate_tag_color)
                .transpose()?,
            slug: self
                .slug
                .as_deref()
                .map(validation::validate_tag_slug)
                .transpose()?,
        })
    }
}

/// GET /tags/
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> Result<Json<Vec<TagView>>, ApiError> {
    check_endpoint(Resource::Tag, Action::List, &viewer)?;
    Ok(Json(state.catalog_service().list_tags().await?))
}

/// GET /tags/{id}/
pub async fn get_tag(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<Json<TagView>, ApiError> {
    check_endpoint(Resource::Tag, Action::Retrieve, &viewer)?;
    Ok(Json(state.catalog_service().get_tag(id).await?))
}

/// POST /tags/
pub async fn create_tag(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Json(payload): Json<TagRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_endpoint(Resource::Tag, Action::Create, &viewer)?;

    let tag = state
        .catalog_service()
        .create_tag(payload.into_patch()?)
        .await?;

    Ok((StatusCode::CREATED, Json(tag)))
}

/// PATCH /tags/{id}/
pub async fn update_tag(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
    Json(payload): Json<TagRequest>,
) -> Result<Json<TagView>, ApiError> {
    check_endpoint(Resource::Tag, Action::Update, &viewer)?;

    let tag = state
        .catalog_service()
        .update_tag(id, payload.into_patch()?)
        .await?;

    Ok(Json(tag))
}

/// DELETE /tags/{id}/
pub async fn delete_tag(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    check_endpoint(Resource::Tag, Action::Destroy, &viewer)?;

    state.catalog_service().delete_tag(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
