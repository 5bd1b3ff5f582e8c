use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, anyhow};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub secret_key: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub notify_webhook_url: Option<String>,
    pub notify_timeout_secs: u64,
    pub frontend_dist: PathBuf,
}

impl Config {
    /// Reads the environment (after `.env`, if present, has been loaded).
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: try_load("DATABASE_URL", "sqlite://blogger.db")?,
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:8000")?,
            secret_key: env::var("SECRET_KEY")
                .map_err(|_| anyhow!("SECRET_KEY must be set"))?,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", "168")?,
            bcrypt_cost: try_load("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
            notify_webhook_url: env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            notify_timeout_secs: try_load("NOTIFY_TIMEOUT_SECS", "10")?,
            frontend_dist: try_load("FRONTEND_DIST", "frontend/dist")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("{e}"))
        .with_context(|| format!("invalid {key} value: {raw:?}"))
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            secret_key: "test-secret".to_string(),
            token_ttl_hours: 1,
            bcrypt_cost: 4,
            notify_webhook_url: None,
            notify_timeout_secs: 1,
            frontend_dist: PathBuf::from("frontend/dist"),
        }
    }
}
