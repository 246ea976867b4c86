use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Saved-image metadata. The bytes live in blob storage under `file_path`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Image {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_path: String,
    pub prompt: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub file_path: String,
    pub prompt: Option<String>,
}
