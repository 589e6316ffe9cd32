use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::SharedState;

pub mod auth;
mod error;
mod ingredients;
mod observability;
pub mod pagination;
pub mod permissions;
mod recipes;
mod tags;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

use crate::services::{AuthService, CatalogService, RecipeService, UserService};

/// Headroom over the image cap for base64 inflation and the other fields.
const BODY_LIMIT_SLACK: usize = 256 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth_service(&self) -> &Arc<dyn AuthService> {
        &self.shared.auth_service
    }

    #[must_use]
    pub fn user_service(&self) -> &Arc<dyn UserService> {
        &self.shared.user_service
    }

    #[must_use]
    pub fn recipe_service(&self) -> &Arc<dyn RecipeService> {
        &self.shared.recipe_service
    }

    #[must_use]
    pub fn catalog_service(&self) -> &Arc<dyn CatalogService> {
        &self.shared.catalog_service
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let config = state.config();
    let media_path = config.media.media_path.clone();
    let media_prefix = config.media.url_prefix.trim_end_matches('/').to_string();
    let body_limit = config.media.max_image_bytes.saturating_mul(2) + BODY_LIMIT_SLACK;

    let cors_origins = &config.server.cors_allowed_origins;
    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    let api_router = create_api_router(state.clone())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state.clone());

    Router::new()
        .nest("/api", api_router)
        .route(
            "/metrics",
            get(observability::get_metrics).with_state(state),
        )
        .nest_service(&media_prefix, ServeDir::new(media_path))
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(observability::logging_middleware))
                .layer(middleware::from_fn(
                    observability::security_headers_middleware,
                ))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer.allow_methods(Any).allow_headers(Any)),
        )
}

fn create_api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(observability::health))
        .route("/auth/token/login/", post(auth::login))
        .route("/auth/token/logout/", post(auth::logout))
        .route("/users/", get(users::list_users).post(users::register))
        .route("/users/me/", get(users::me))
        .route("/users/set_password/", post(users::set_password))
        .route("/users/subscriptions/", get(users::subscriptions))
        .route(
            "/users/{id}/",
            get(users::get_user)
                .put(users::update_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/users/{id}/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        .route(
            "/recipes/",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/recipes/{id}/",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route(
            "/recipes/{id}/favorite/",
            post(recipes::favorite).delete(recipes::unfavorite),
        )
        .route(
            "/recipes/{id}/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
        .route("/tags/", get(tags::list_tags).post(tags::create_tag))
        .route(
            "/tags/{id}/",
            get(tags::get_tag)
                .patch(tags::update_tag)
                .delete(tags::delete_tag),
        )
        .route("/ingredients/", get(ingredients::list_ingredients))
        .route("/ingredients/{id}/", get(ingredients::get_ingredient))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
