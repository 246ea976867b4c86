use std::str::FromStr;

use anyhow::Context;
use jsonwebtoken::Algorithm;
use serde::Deserialize;

const DEV_ORIGINS: [&str; 3] = [
    "http://localhost",
    "http://localhost:3000",
    "http://localhost:8080",
];

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub ttl_minutes: i64,
}

/// How the storage client obtains credentials. Exactly one source is used,
/// picked in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Static { access_key: String, secret_key: String },
    Profile(String),
    DefaultChain,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub credentials: CredentialSource,
    pub signed_url_ttl_minutes: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub genai: GenAiConfig,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| get(key).with_context(|| format!("{key} must be set"));

        let database_url = required("DATABASE_URL")?;

        let algorithm = match get("JWT_ALGORITHM") {
            Some(raw) => parse_hmac_algorithm(&raw)?,
            None => Algorithm::HS256,
        };
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            algorithm,
            ttl_minutes: get("ACCESS_TOKEN_EXPIRE_MINUTES")
                .and_then(|v| v.parse::<i64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(30),
        };

        let storage = StorageConfig {
            bucket: required("STORAGE_BUCKET")?,
            region: get("STORAGE_REGION").unwrap_or_else(|| "us-east-1".into()),
            endpoint: get("STORAGE_ENDPOINT").filter(|v| !v.trim().is_empty()),
            credentials: resolve_credentials(&get),
            signed_url_ttl_minutes: get("SIGNED_URL_TTL_MINUTES")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(15),
        };

        let genai = GenAiConfig {
            api_key: required("GENAI_API_KEY")?,
            model: get("GENAI_MODEL")
                .unwrap_or_else(|| "gemini-2.0-flash-exp-image-generation".into()),
            base_url: get("GENAI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com/v1beta".into()),
        };

        let production = get("APP_ENV").as_deref() == Some("production");
        let allowed_origins = allowed_origins(get("ALLOWED_ORIGINS").as_deref(), production);

        Ok(Self {
            database_url,
            jwt,
            storage,
            genai,
            allowed_origins,
        })
    }
}

fn parse_hmac_algorithm(raw: &str) -> anyhow::Result<Algorithm> {
    let alg = Algorithm::from_str(raw.trim())
        .map_err(|e| anyhow::anyhow!("invalid JWT_ALGORITHM {raw:?}: {e}"))?;
    match alg {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(alg),
        other => anyhow::bail!("JWT_ALGORITHM {other:?} needs a key pair; only HS* is supported"),
    }
}

fn resolve_credentials<F>(get: &F) -> CredentialSource
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

    if let (Some(access_key), Some(secret_key)) =
        (non_empty("STORAGE_ACCESS_KEY"), non_empty("STORAGE_SECRET_KEY"))
    {
        return CredentialSource::Static {
            access_key,
            secret_key,
        };
    }
    if let Some(profile) = non_empty("STORAGE_PROFILE") {
        return CredentialSource::Profile(profile);
    }
    CredentialSource::DefaultChain
}

fn allowed_origins(raw: Option<&str>, production: bool) -> Vec<String> {
    let origins: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect();

    if origins.is_empty() && !production {
        tracing::warn!(?DEV_ORIGINS, "ALLOWED_ORIGINS not set; using development origins");
        return DEV_ORIGINS.iter().map(|o| o.to_string()).collect();
    }
    origins
}
