use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;

use super::pagination::Pagination;
use super::permissions::{Action, Resource, check_endpoint, check_object};
use super::types::Page;
use super::{ApiError, AppState, validation};
use crate::db::UserChanges;
use crate::domain::Viewer;
use crate::domain::views::{SubscriptionView, UserView};
use crate::services::{Registration, UserError};

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound(id) => Self::not_found("User", id),
            UserError::InvalidPage => Self::invalid_page(),
            UserError::Validation(msg) => Self::validation(msg),
            UserError::AlreadySubscribed | UserError::SelfSubscription => {
                Self::conflict(err.to_string())
            }
            UserError::NotSubscribed => Self::NotFound(err.to_string()),
            UserError::Database(msg) => Self::DatabaseError(msg),
            UserError::Internal(msg) => Self::internal(msg),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct RecipesLimitQuery {
    pub recipes_limit: Option<String>,
}

/// GET /users/
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    pagination: Pagination,
) -> Result<Json<Page<UserView>>, ApiError> {
    check_endpoint(Resource::User, Action::List, &viewer)?;

    let users = state
        .user_service()
        .list(&viewer, pagination.request)
        .await?;

    Ok(Json(pagination.page(users)))
}

/// POST /users/
pub async fn register(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_endpoint(Resource::User, Action::Create, &viewer)?;

    validation::validate_password(
        &payload.password,
        state.config().security.min_password_length,
    )?;

    let registration = Registration {
        email: validation::validate_email(&payload.email)?,
        username: validation::validate_username(&payload.username)?,
        first_name: validation::validate_person_name("first_name", &payload.first_name)?,
        last_name: validation::validate_person_name("last_name", &payload.last_name)?,
        password: payload.password,
    };

    let user = state.user_service().register(registration).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/{id}/
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<Json<UserView>, ApiError> {
    check_endpoint(Resource::User, Action::Retrieve, &viewer)?;

    let user = state.user_service().get(&viewer, id).await?;
    Ok(Json(user))
}

/// PUT|PATCH /users/{id}/
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserView>, ApiError> {
    check_endpoint(Resource::User, Action::Update, &viewer)?;

    let changes = UserChanges {
        email: payload
            .email
            .as_deref()
            .map(validation::validate_email)
            .transpose()?,
        username: payload
            .username
            .as_deref()
            .map(validation::validate_username)
            .transpose()?,
        first_name: payload
            .first_name
            .as_deref()
            .map(|v| validation::validate_person_name("first_name", v))
            .transpose()?,
        last_name: payload
            .last_name
            .as_deref()
            .map(|v| validation::validate_person_name("last_name", v))
            .transpose()?,
    };

    // Owner is the account itself; existence is checked by the service.
    check_object(Resource::User, Action::Update, &viewer, id)?;

    let user = state.user_service().update(&viewer, id, changes).await?;
    Ok(Json(user))
}

/// DELETE /users/{id}/
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    check_endpoint(Resource::User, Action::Destroy, &viewer)?;
    check_object(Resource::User, Action::Destroy, &viewer, id)?;

    state.user_service().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/me/
pub async fn me(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> Result<Json<UserView>, ApiError> {
    check_endpoint(Resource::User, Action::Me, &viewer)?;
    let id = viewer.id().ok_or_else(ApiError::unauthorized)?;

    let user = state.user_service().get(&viewer, id).await?;
    Ok(Json(user))
}

/// POST /users/set_password/
pub async fn set_password(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_endpoint(Resource::User, Action::SetPassword, &viewer)?;
    let id = viewer.id().ok_or_else(ApiError::unauthorized)?;

    if payload.current_password.is_empty() {
        return Err(ApiError::validation("current_password is required"));
    }

    state
        .user_service()
        .set_password(id, &payload.current_password, &payload.new_password)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /users/{id}/subscribe/
pub async fn subscribe(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(author_id): Path<i32>,
    Query(query): Query<RecipesLimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    check_endpoint(Resource::User, Action::Subscribe, &viewer)?;
    let id = viewer.id().ok_or_else(ApiError::unauthorized)?;
    let limit = validation::parse_recipes_limit(query.recipes_limit.as_deref())?;

    let subscription = state
        .user_service()
        .subscribe(id, author_id, limit)
        .await?;

    Ok((StatusCode::CREATED, Json(subscription)))
}

/// DELETE /users/{id}/subscribe/
pub async fn unsubscribe(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(author_id): Path<i32>,
) -> Result<impl IntoResponse, ApiError> {
    check_endpoint(Resource::User, Action::Subscribe, &viewer)?;
    let id = viewer.id().ok_or_else(ApiError::unauthorized)?;

    state.user_service().unsubscribe(id, author_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /users/subscriptions/
pub async fn subscriptions(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    pagination: Pagination,
    Query(query): Query<RecipesLimitQuery>,
) -> Result<Json<Page<SubscriptionView>>, ApiError> {
    check_endpoint(Resource::User, Action::Subscriptions, &viewer)?;
    let id = viewer.id().ok_or_else(ApiError::unauthorized)?;
    let limit = validation::parse_recipes_limit(query.recipes_limit.as_deref())?;

    let page = state
        .user_service()
        .subscriptions(id, pagination.request, limit)
        .await?;

    Ok(Json(pagination.page(page)))
}
