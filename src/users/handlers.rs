use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::instrument;

use super::dto::{PasswordChange, UserResponse};
use super::services;
use crate::{
    auth::{
        extractors::{AuthClaims, CurrentUser},
        services::resolve_current_user,
    },
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(read_users_me))
        .route("/users/me/password", put(update_user_password))
}

/// 404 when the token outlived its user.
#[instrument(skip(state, claims), fields(user_id = ?claims.user_id))]
pub async fn read_users_me(
    State(state): State<AppState>,
    AuthClaims(claims): AuthClaims,
) -> Result<Json<UserResponse>, AppError> {
    let user = resolve_current_user(state.users.as_ref(), &claims).await?;
    Ok(Json(services::get_current_user_details(user)))
}

#[instrument(skip(state, user, change), fields(user_id = %user.id))]
pub async fn update_user_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(change): Json<PasswordChange>,
) -> Result<StatusCode, AppError> {
    services::change_password(state.users.as_ref(), &user, change).await?;
    Ok(StatusCode::NO_CONTENT)
}
