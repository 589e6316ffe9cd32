use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use super::{ApiError, AppState, validation};
use crate::domain::Viewer;
use crate::services::AuthError;

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::validation(err.to_string()),
            AuthError::Database(msg) => Self::DatabaseError(msg),
            AuthError::Internal(msg) => Self::internal(msg),
        }
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub auth_token: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Token <key>` (or `Bearer <key>`) into a
/// [`Viewer`] request extension. Requests without the header continue as
/// anonymous; a header carrying an unknown token is refused here.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let viewer = match extract_token(&headers) {
        Some(key) => {
            let user = state
                .auth_service()
                .resolve_token(&key)
                .await?
                .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

            tracing::Span::current().record("user_id", user.id);
            Viewer::user(user)
        }
        None => Viewer::anonymous(),
    };

    request.extensions_mut().insert(viewer);
    Ok(next.run(request).await)
}

/// Token from the `Authorization` header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    let token = value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))?
        .trim();

    (!token.is_empty()).then(|| token.to_string())
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/token/login/
/// Exchanges email and password for the account's token.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::validation("email is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("password is required"));
    }

    let email = validation::validate_email(&payload.email)?;
    let auth_token = state
        .auth_service()
        .login(&email, &payload.password)
        .await?;

    Ok(Json(LoginResponse { auth_token }))
}

/// POST /auth/token/logout/
pub async fn logout(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
) -> Result<impl IntoResponse, ApiError> {
    let user = viewer.current().ok_or_else(ApiError::unauthorized)?;

    state.auth_service().logout(user.id).await?;

    Ok(StatusCode::NO_CONTENT)
}
