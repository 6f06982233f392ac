//! Configuration loaded from environment variables.

use std::env;

use anyhow::{Context, Result, bail};

/// `DATABASE_URL` scheme that selects the in-process store.
pub const MEMORY_URL_SCHEME: &str = "memory://";

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL, or `memory://` for the in-process store.
    pub database_url: String,

    /// Maximum database connections in pool (default: 10).
    pub database_max_connections: u32,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Result limit when a search names none (default: 100).
    pub search_default_limit: i64,

    /// Largest limit a search may request (default: 500).
    pub search_max_limit: i64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = var("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let search_default_limit: i64 = var("SEARCH_DEFAULT_LIMIT")
            .unwrap_or_else(|| "100".to_string())
            .parse()
            .context("SEARCH_DEFAULT_LIMIT must be a valid integer")?;

        let search_max_limit: i64 = var("SEARCH_MAX_LIMIT")
            .unwrap_or_else(|| "500".to_string())
            .parse()
            .context("SEARCH_MAX_LIMIT must be a valid integer")?;

        if !(1..=search_max_limit).contains(&search_default_limit) {
            bail!(
                "SEARCH_DEFAULT_LIMIT must be between 1 and SEARCH_MAX_LIMIT ({search_max_limit})"
            );
        }

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            cors_allowed_origins,
            search_default_limit,
            search_max_limit,
        })
    }

    /// Whether the in-process store was requested.
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with(MEMORY_URL_SCHEME)
    }
}
