use async_trait::async_trait;
use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::error::RepoError;

const USER_COLUMNS: &str = "id, username, email, hashed_password, is_active, created_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;
    /// Inserts in its own transaction; a duplicate username or email yields
    /// `RepoError::Conflict` and leaves no row behind.
    async fn insert(&self, user: NewUser) -> Result<User, RepoError>;
    async fn update_password(&self, id: Uuid, hashed_password: &str) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn insert(&self, user: NewUser) -> Result<User, RepoError> {
        let mut tx = self.db.begin().await?;
        let inserted = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, hashed_password)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.hashed_password)
        .fetch_one(&mut *tx)
        .await;

        match inserted {
            Ok(row) => {
                tx.commit().await?;
                Ok(row)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    error!(error = %rb, "rollback after failed user insert");
                }
                Err(e.into())
            }
        }
    }

    async fn update_password(&self, id: Uuid, hashed_password: &str) -> Result<(), RepoError> {
        let mut tx = self.db.begin().await?;
        let updated = sqlx::query("UPDATE users SET hashed_password = $1 WHERE id = $2")
            .bind(hashed_password)
            .bind(id)
            .execute(&mut *tx)
            .await;

        match updated {
            Ok(res) if res.rows_affected() == 1 => {
                tx.commit().await?;
                Ok(())
            }
            Ok(_) => {
                tx.rollback().await?;
                Err(RepoError::Db(sqlx::Error::RowNotFound))
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    error!(error = %rb, "rollback after failed password update");
                }
                Err(e.into())
            }
        }
    }
}
