use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::claims::Claims;
use super::dto::{RegisterRequest, Token};
use super::jwt::JwtKeys;
use super::password::{dummy_hash, hash_password_async, verify_password_async};
use super::repo::UserRepository;
use super::repo_types::{NewUser, User};
use crate::error::{AppError, RepoError};

pub const TOKEN_TYPE: &str = "bearer";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn validate_password(password: &str) -> Result<(), AppError> {
    let len = password.chars().count();
    if !(8..=100).contains(&len) {
        return Err(AppError::BadRequest(
            "Password must be between 8 and 100 characters.".into(),
        ));
    }
    Ok(())
}

fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let len = req.username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(AppError::BadRequest(
            "Username must be between 3 and 50 characters.".into(),
        ));
    }
    if !is_valid_email(&req.email) {
        return Err(AppError::BadRequest("Invalid email.".into()));
    }
    validate_password(&req.password)
}

pub async fn register(users: &dyn UserRepository, mut req: RegisterRequest) -> Result<User, AppError> {
    req.email = req.email.trim().to_lowercase();
    validate_registration(&req)?;

    let hashed_password = hash_password_async(req.password).await.map_err(|e| {
        error!(error = %e, "hash_password failed");
        AppError::internal(e)
    })?;

    let new_user = NewUser {
        id: Uuid::new_v4(),
        username: req.username,
        email: req.email,
        hashed_password,
    };
    let username = new_user.username.clone();

    match users.insert(new_user).await {
        Ok(user) => {
            info!(user_id = %user.id, username = %user.username, "user registered");
            Ok(user)
        }
        Err(RepoError::Conflict) => {
            warn!(%username, "username or email already registered");
            Err(AppError::Conflict(
                "Username or email already registered.".into(),
            ))
        }
        Err(e) => {
            error!(error = %e, %username, "create user failed");
            Err(AppError::internal(e))
        }
    }
}

/// `Ok(None)` for an unknown user, a wrong password and an inactive account
/// alike, so callers cannot tell them apart.
pub async fn authenticate(
    users: &dyn UserRepository,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let user = match users.find_by_username(username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            // Same argon2 cost as a real check.
            let _ = verify_password_async(password.to_string(), dummy_hash().to_string()).await;
            warn!(%username, "login unknown username");
            return Ok(None);
        }
        Err(e) => {
            error!(error = %e, "find_by_username failed");
            return Err(AppError::internal(e));
        }
    };

    let ok = match verify_password_async(password.to_string(), user.hashed_password.clone()).await {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, user_id = %user.id, "verify_password failed");
            false
        }
    };
    if !ok {
        warn!(%username, user_id = %user.id, "login invalid password");
        return Ok(None);
    }
    if !user.is_active {
        warn!(%username, user_id = %user.id, "login on inactive account");
        return Ok(None);
    }
    Ok(Some(user))
}

pub fn issue_token(keys: &JwtKeys, user: &User) -> Result<Token, AppError> {
    let access_token = keys.sign(&user.email, user.id).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        AppError::internal(e)
    })?;
    Ok(Token {
        access_token,
        token_type: TOKEN_TYPE.to_string(),
    })
}

pub async fn login(
    users: &dyn UserRepository,
    keys: &JwtKeys,
    username: &str,
    password: &str,
) -> Result<Token, AppError> {
    let user = authenticate(users, username, password)
        .await?
        .ok_or_else(AppError::credentials)?;
    let token = issue_token(keys, &user)?;
    info!(user_id = %user.id, "user logged in");
    Ok(token)
}

pub fn verify_token(keys: &JwtKeys, token: &str) -> Result<Claims, AppError> {
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token verification failed");
        AppError::credentials()
    })?;
    if claims.user_uuid().is_none() {
        warn!("token carries no usable user_id");
        return Err(AppError::credentials());
    }
    Ok(claims)
}

/// Re-reads the user a token names. A token can outlive its user, so this
/// runs before anything is trusted or mutated.
pub async fn resolve_current_user(
    users: &dyn UserRepository,
    claims: &Claims,
) -> Result<User, AppError> {
    let user_id = claims.user_uuid().ok_or_else(AppError::credentials)?;
    match users.find_by_id(user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            warn!(%user_id, "token valid but user no longer exists");
            Err(AppError::NotFound("User not found.".into()))
        }
        Err(e) => {
            error!(error = %e, %user_id, "find_by_id failed");
            Err(AppError::internal(e))
        }
    }
}
