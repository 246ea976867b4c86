use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Image;

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub prompt: String,
}

/// Request body for saving an image.
#[derive(Debug, Deserialize)]
pub struct SaveImageRequest {
    pub image_base64: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Saved image details; `file_path` is the blob key.
#[derive(Debug, Serialize)]
pub struct ImageResponse {
    pub id: Uuid,
    pub file_path: String,
    pub prompt: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Image> for ImageResponse {
    fn from(img: Image) -> Self {
        Self {
            id: img.id,
            file_path: img.file_path,
            prompt: img.prompt,
            created_at: img.created_at,
        }
    }
}

/// One listed image with its temporary access URL.
#[derive(Debug, Serialize)]
pub struct UserImageResponse {
    pub id: Uuid,
    pub prompt: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub image_url: String,
}
