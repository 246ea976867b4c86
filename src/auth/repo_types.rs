use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                   // unique user ID
    pub username: String,           // unique login name
    pub email: String,              // unique email
    #[serde(skip_serializing)]
    pub hashed_password: String,    // Argon2 hash, not exposed in JSON
    pub is_active: bool,
    pub created_at: OffsetDateTime, // creation timestamp
}

/// Fields supplied when a user is registered; the id is minted by the caller.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
}
