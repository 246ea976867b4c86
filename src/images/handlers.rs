use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{GenerateQuery, ImageResponse, SaveImageRequest, UserImageResponse};
use super::services;
use crate::{
    auth::extractors::{CurrentUser, MaybeAuth},
    error::AppError,
    rate_limit::anonymous_key,
    state::AppState,
};

const SAVE_BODY_LIMIT: usize = 10 * 1024 * 1024;

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/image/generate", get(generate_image))
        .route("/image/me", get(list_my_images))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/image/save", post(save_generated_image))
        .layer(DefaultBodyLimit::max(SAVE_BODY_LIMIT))
}

/// Bearer is optional here; it only decides which rate-limit bucket is used.
#[instrument(skip(state, auth, headers))]
pub async fn generate_image(
    State(state): State<AppState>,
    MaybeAuth(auth): MaybeAuth,
    headers: HeaderMap,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<String>, AppError> {
    let key = auth
        .and_then(|c| c.user_id)
        .map(|id| format!("user:{id}"))
        .unwrap_or_else(|| anonymous_key(&headers));
    state.limits.generate.check(&key)?;

    let image = services::generate_image(&state, &query.prompt).await?;
    Ok(Json(image))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn save_generated_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<SaveImageRequest>,
) -> Result<Json<ImageResponse>, AppError> {
    state.limits.save.check(&format!("user:{}", user.id))?;

    let image = services::save_user_image(&state, user.id, &body.image_base64, body.prompt).await?;
    Ok(Json(image.into()))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_my_images(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<UserImageResponse>>, AppError> {
    state.limits.list.check(&format!("user:{}", user.id))?;

    let images = services::list_user_images(&state, user.id).await?;
    Ok(Json(images))
}
