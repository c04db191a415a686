use dotenvy::dotenv;
use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub port: u16,
    /// Policy switch: whether the elevated role may edit other users'
    /// messages. Deployment policy, not hard-coded behaviour.
    pub allow_elevated_edit: bool,
    pub max_message_len: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| AppError::Config("DATABASE_URL missing".into()))?;
        let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);
        let allow_elevated_edit = env::var("ALLOW_ELEVATED_EDIT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let max_message_len = env::var("MAX_MESSAGE_LEN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8192);

        Ok(Self {
            database_url,
            redis_url,
            port,
            allow_elevated_edit,
            max_message_len,
        })
    }

    pub fn test_defaults() -> Self {
        Self {
            database_url: "postgres://localhost/test".into(),
            redis_url: "redis://127.0.0.1:6379/0".into(),
            port: 3000,
            allow_elevated_edit: false,
            max_message_len: 8192,
        }
    }
}
