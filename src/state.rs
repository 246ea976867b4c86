use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{PgUserRepository, UserRepository};
use crate::config::AppConfig;
use crate::images::generator::{GeminiClient, ImageGenerator};
use crate::images::repo::{ImageRepository, PgImageRepository};
use crate::rate_limit::RateLimits;
use crate::storage::{Storage, StorageClient};

/// Process-wide handles, built once at startup and cloned into each request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserRepository>,
    pub images: Arc<dyn ImageRepository>,
    pub storage: Arc<dyn StorageClient>,
    pub generator: Arc<dyn ImageGenerator>,
    pub limits: Arc<RateLimits>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .context("run migrations")?;

        let storage = Arc::new(
            Storage::new(&config.storage)
                .await
                .context("init blob storage")?,
        ) as Arc<dyn StorageClient>;

        let generator = Arc::new(GeminiClient::new(&config.genai).context("init genai client")?)
            as Arc<dyn ImageGenerator>;

        Ok(Self::from_parts(
            config,
            Arc::new(PgUserRepository::new(db.clone())),
            Arc::new(PgImageRepository::new(db)),
            storage,
            generator,
        ))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserRepository>,
        images: Arc<dyn ImageRepository>,
        storage: Arc<dyn StorageClient>,
        generator: Arc<dyn ImageGenerator>,
    ) -> Self {
        Self {
            jwt: JwtKeys::from(&config.jwt),
            config,
            users,
            images,
            storage,
            generator,
            limits: Arc::new(RateLimits::default()),
        }
    }
}
