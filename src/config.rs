use crate::services::retry::RetryPolicy;
use crate::utils::error::{AppError, AppResult};
use dotenv::dotenv;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub retry: RetryPolicy,
}

impl AppConfig {
    // Load .env first, then read the process environment
    pub fn from_env() -> AppResult<Self> {
        dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).ok_or_else(|| AppError::ValidationError(format!("{} must be set", key)))
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "BOOKING_MAX_ATTEMPTS", defaults.max_attempts)?,
            attempt_timeout: Duration::from_millis(parse_or(
                &lookup,
                "BOOKING_ATTEMPT_TIMEOUT_MS",
                defaults.attempt_timeout.as_millis() as u64,
            )?),
            base_backoff: Duration::from_millis(parse_or(
                &lookup,
                "BOOKING_BACKOFF_MS",
                defaults.base_backoff.as_millis() as u64,
            )?),
        };
        if retry.max_attempts == 0 {
            return Err(AppError::ValidationError(
                "BOOKING_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }

        Ok(AppConfig {
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
                acquire_timeout_secs: parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 3)?,
            },
            jwt: JwtConfig {
                secret: required("JWT_SECRET")?,
            },
            retry,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ValidationError(format!("{} has an invalid value: {}", key, raw))),
        None => Ok(default),
    }
}
