use std::env;
use std::fmt;

use crate::schema::table::MAX_PAGE_SIZE;

/// Longest accepted token lifetime, in days.
pub const MAX_TOKEN_TTL_DAYS: i64 = 365;

/// Service settings, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL, or `memory://` for the in-process store.
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_address: String,
    pub default_page_size: u32,
    pub token_ttl_days: i64,
    pub max_connections: u32,
}

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid(key, value) => {
                write!(f, "{} has an invalid value '{}'", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_vars(|key| env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let default_page_size: u32 = parsed(&lookup, "DEFAULT_PAGE_SIZE", 10)?;
        if default_page_size == 0 || default_page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid("DEFAULT_PAGE_SIZE", default_page_size.to_string()));
        }

        let token_ttl_days: i64 = parsed(&lookup, "TOKEN_TTL_DAYS", 7)?;
        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&token_ttl_days) {
            return Err(ConfigError::Invalid("TOKEN_TTL_DAYS", token_ttl_days.to_string()));
        }

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            default_page_size,
            token_ttl_days,
            max_connections: parsed(&lookup, "MAX_CONNECTIONS", 5)?,
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key, raw)),
    }
}
