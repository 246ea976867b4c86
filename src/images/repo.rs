use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use super::repo_types::{Image, NewImage};
use crate::error::RepoError;

#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Inserts and commits one row; rolls back on any failure.
    async fn insert(&self, image: NewImage) -> Result<Image, RepoError>;
    /// All images owned by `user_id`, newest first.
    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Image>, RepoError>;
}

#[derive(Clone)]
pub struct PgImageRepository {
    db: PgPool,
}

impl PgImageRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ImageRepository for PgImageRepository {
    async fn insert(&self, image: NewImage) -> Result<Image, RepoError> {
        let mut tx = self.db.begin().await?;
        let inserted = sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (id, user_id, file_path, prompt)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, file_path, prompt, created_at
            "#,
        )
        .bind(image.id)
        .bind(image.user_id)
        .bind(&image.file_path)
        .bind(&image.prompt)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(row) => {
                tx.commit().await?;
                Ok(row)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    error!(error = %rb, "rollback after failed image insert");
                }
                Err(e.into())
            }
        }
    }

    async fn list_by_owner(&self, user_id: Uuid) -> Result<Vec<Image>, RepoError> {
        let rows = sqlx::query_as::<_, Image>(
            r#"
            SELECT id, user_id, file_path, prompt, created_at
              FROM images
             WHERE user_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
