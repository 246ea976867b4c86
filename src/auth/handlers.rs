use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Form, Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{LoginForm, RegisterRequest, Token},
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/token", post(login))
}

#[instrument(skip(state, payload), fields(username = %payload.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<StatusCode, AppError> {
    services::register(state.users.as_ref(), payload).await?;
    Ok(StatusCode::CREATED)
}

#[instrument(skip(state, form), fields(username = %form.username))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<Token>, AppError> {
    let token = services::login(
        state.users.as_ref(),
        &state.jwt,
        &form.username,
        &form.password,
    )
    .await?;
    Ok(Json(token))
}
