//! Runtime configuration parsed from environment variables.
//!
//! All knobs have defaults except `DATABASE_URL`, which is required unless
//! `STORAGE_BACKEND=memory`.

use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_CATALOG_BASE_URL: &str = "https://api.jikan.moe/v4";
pub const DEFAULT_CATALOG_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CATALOG_CONNECT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_SEARCH_LIMIT: u32 = 12;
pub const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 400;
pub const DEFAULT_SEARCH_MIN_QUERY_LEN: usize = 3;
pub const DEFAULT_HOVER_PREVIEW_DELAY_MS: u64 = 400;
pub const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 1800;
pub const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(&'static str),
    #[error("unknown STORAGE_BACKEND: {0} (expected 'postgres' or 'memory')")]
    UnknownStorageBackend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_CATALOG_BASE_URL.to_owned(),
            request_timeout: Duration::from_secs(DEFAULT_CATALOG_REQUEST_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CATALOG_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchConfig {
    /// Results requested per query.
    pub limit: u32,
    /// Idle time after the last keystroke before a query is sent.
    pub debounce: Duration,
    /// Trimmed queries shorter than this (in chars) are never sent.
    pub min_query_len: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            debounce: Duration::from_millis(DEFAULT_SEARCH_DEBOUNCE_MS),
            min_query_len: DEFAULT_SEARCH_MIN_QUERY_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub storage: StorageBackend,
    /// Postgres URL. Required for the postgres backend; enables templates in
    /// memory mode when present.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub catalog: CatalogConfig,
    pub search: SearchConfig,
    pub hover_preview_delay: Duration,
    /// Sessions untouched for this long are dropped from memory.
    pub session_idle_ttl: Duration,
    pub session_sweep_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            storage: StorageBackend::Memory,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            catalog: CatalogConfig::default(),
            search: SearchConfig::default(),
            hover_preview_delay: Duration::from_millis(DEFAULT_HOVER_PREVIEW_DELAY_MS),
            session_idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_TTL_SECS),
            session_sweep_interval: Duration::from_secs(DEFAULT_SESSION_SWEEP_INTERVAL_SECS),
        }
    }
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// - `PORT` (default 3000)
    /// - `STORAGE_BACKEND`: `postgres` (default) or `memory`
    /// - `DATABASE_URL`, `DB_MAX_CONNECTIONS`
    /// - `CATALOG_BASE_URL`, `CATALOG_REQUEST_TIMEOUT_SECS`, `CATALOG_CONNECT_TIMEOUT_SECS`
    /// - `SEARCH_LIMIT`, `SEARCH_DEBOUNCE_MS`, `SEARCH_MIN_QUERY_LEN`
    /// - `HOVER_PREVIEW_DELAY_MS`
    /// - `SESSION_IDLE_TTL_SECS`, `SESSION_SWEEP_INTERVAL_SECS`
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown storage backend or a missing
    /// `DATABASE_URL` with the postgres backend.
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage = parse_storage_backend(std::env::var("STORAGE_BACKEND").ok().as_deref())?;
        let database_url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::MissingVar("DATABASE_URL"));
        }

        let catalog = CatalogConfig {
            base_url: std::env::var("CATALOG_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_CATALOG_BASE_URL.to_owned())
                .trim_end_matches('/')
                .to_owned(),
            request_timeout: Duration::from_secs(env_parse(
                "CATALOG_REQUEST_TIMEOUT_SECS",
                DEFAULT_CATALOG_REQUEST_TIMEOUT_SECS,
            )),
            connect_timeout: Duration::from_secs(env_parse(
                "CATALOG_CONNECT_TIMEOUT_SECS",
                DEFAULT_CATALOG_CONNECT_TIMEOUT_SECS,
            )),
        };
        let search = SearchConfig {
            limit: env_parse("SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT),
            debounce: Duration::from_millis(env_parse("SEARCH_DEBOUNCE_MS", DEFAULT_SEARCH_DEBOUNCE_MS)),
            min_query_len: env_parse("SEARCH_MIN_QUERY_LEN", DEFAULT_SEARCH_MIN_QUERY_LEN),
        };

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT),
            storage,
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            catalog,
            search,
            hover_preview_delay: Duration::from_millis(env_parse(
                "HOVER_PREVIEW_DELAY_MS",
                DEFAULT_HOVER_PREVIEW_DELAY_MS,
            )),
            session_idle_ttl: Duration::from_secs(env_parse("SESSION_IDLE_TTL_SECS", DEFAULT_SESSION_IDLE_TTL_SECS)),
            session_sweep_interval: Duration::from_secs(
                env_parse("SESSION_SWEEP_INTERVAL_SECS", DEFAULT_SESSION_SWEEP_INTERVAL_SECS).max(1),
            ),
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_storage_backend(raw: Option<&str>) -> Result<StorageBackend, ConfigError> {
    match raw.unwrap_or("postgres") {
        "postgres" => Ok(StorageBackend::Postgres),
        "memory" => Ok(StorageBackend::Memory),
        other => Err(ConfigError::UnknownStorageBackend(other.to_owned())),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
