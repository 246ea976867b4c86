use tracing::{error, info, warn};

use super::dto::{PasswordChange, UserResponse};
use crate::auth::password::{hash_password_async, verify_password_async};
use crate::auth::repo::UserRepository;
use crate::auth::repo_types::User;
use crate::auth::services::validate_password;
use crate::error::AppError;

pub fn get_current_user_details(user: User) -> UserResponse {
    UserResponse::from(user)
}

/// The stored hash is only replaced once every check has passed.
pub async fn change_password(
    users: &dyn UserRepository,
    user: &User,
    change: PasswordChange,
) -> Result<(), AppError> {
    let matches = verify_password_async(change.current_password, user.hashed_password.clone())
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, user_id = %user.id, "verify_password failed");
            false
        });
    if !matches {
        warn!(user_id = %user.id, username = %user.username, "incorrect current password");
        return Err(AppError::BadRequest("Incorrect current password.".into()));
    }

    if change.new_password != change.new_password_confirm {
        return Err(AppError::BadRequest("New passwords do not match.".into()));
    }
    validate_password(&change.new_password)?;

    let hashed = hash_password_async(change.new_password).await.map_err(|e| {
        error!(error = %e, "hash_password failed");
        AppError::internal(e)
    })?;

    users.update_password(user.id, &hashed).await.map_err(|e| {
        error!(error = %e, user_id = %user.id, "password update failed");
        AppError::internal(e)
    })?;

    info!(user_id = %user.id, username = %user.username, "password changed");
    Ok(())
}
