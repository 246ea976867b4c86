use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};

use super::claims::Claims;
use super::jwt::JwtKeys;
use super::repo_types::User;
use super::services::{resolve_current_user, verify_token};
use tracing::warn;

use crate::{error::AppError, state::AppState};

fn bearer_token(parts: &Parts) -> Option<&str> {
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verified token claims; decoded per request and never cached.
pub struct AuthClaims(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthClaims
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::Unauthorized("Not authenticated".into())
        })?;
        let keys = JwtKeys::from_ref(state);
        Ok(AuthClaims(verify_token(&keys, token)?))
    }
}

/// Claims when a valid bearer is present; anything else counts as anonymous.
pub struct MaybeAuth(pub Option<Claims>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuth
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeAuth(None));
        };
        let keys = JwtKeys::from_ref(state);
        Ok(MaybeAuth(verify_token(&keys, token).ok()))
    }
}

/// Token verified and its user re-read from the store. Required by every
/// state-mutating endpoint; a vanished or deactivated user is reported as
/// unauthorized.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthClaims(claims) = AuthClaims::from_request_parts(parts, state).await?;
        match resolve_current_user(state.users.as_ref(), &claims).await {
            Ok(user) if !user.is_active => {
                warn!(user_id = %user.id, "token presented for inactive account");
                Err(AppError::credentials())
            }
            Ok(user) => Ok(CurrentUser(user)),
            Err(AppError::NotFound(_)) => Err(AppError::credentials()),
            Err(e) => Err(e),
        }
    }
}
