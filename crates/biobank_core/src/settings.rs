//! Store configuration from the process environment.
//!
//! # Responsibility
//! - Resolve where the embedded database lives.
//! - Carry optional logging overrides for hosts that bootstrap logging.
//!
//! # Invariants
//! - `BIOBANK_DATABASE_URL` wins over `DATABASE_URL`; without either the
//!   store is `sqlite://biobank.db`.
//! - Only SQLite locations open a connection; a MySQL URL is reported as
//!   unsupported instead of silently falling back.

use crate::schema::Engine;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DATABASE_URL_VAR: &str = "BIOBANK_DATABASE_URL";
pub const FALLBACK_DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const LOG_LEVEL_VAR: &str = "BIOBANK_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "BIOBANK_LOG_DIR";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://biobank.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    EmptyDatabaseUrl,
    /// URL names an engine that has no connection support here.
    UnsupportedEngine(String),
    UnsupportedScheme(String),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDatabaseUrl => write!(f, "database url cannot be empty"),
            Self::UnsupportedEngine(engine) => write!(
                f,
                "engine `{engine}` has no connection support; render its schema with `biobank schema {engine}`"
            ),
            Self::UnsupportedScheme(url) => write!(f, "unsupported database url `{url}`"),
        }
    }
}

impl Error for SettingsError {}

/// Where the SQLite store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Parses `sqlite::memory:`, `sqlite://path`, `sqlite:path` or a bare path.
    pub fn parse(url: &str) -> Result<Self, SettingsError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(SettingsError::EmptyDatabaseUrl);
        }
        if url == "sqlite::memory:" || url == ":memory:" {
            return Ok(Self::Memory);
        }
        if let Some(path) = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
        {
            if path.is_empty() {
                return Err(SettingsError::EmptyDatabaseUrl);
            }
            return Ok(Self::File(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = url.split_once("://") {
            return Err(match Engine::parse(scheme) {
                Some(engine) => SettingsError::UnsupportedEngine(engine.name().to_string()),
                None => SettingsError::UnsupportedScheme(url.to_string()),
            });
        }
        Ok(Self::File(PathBuf::from(url)))
    }
}

/// Resolved store settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    pub database: DatabaseLocation,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::File(PathBuf::from("biobank.db")),
            log_level: None,
            log_dir: None,
        }
    }
}

impl StoreSettings {
    /// Loads `.env` (if present) and reads settings from the environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        dotenvy::dotenv().unwrap_or_default();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, e.g. a map in tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SettingsError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let url = non_empty(DATABASE_URL_VAR)
            .or_else(|| non_empty(FALLBACK_DATABASE_URL_VAR))
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        Ok(Self {
            database: DatabaseLocation::parse(&url)?,
            log_level: non_empty(LOG_LEVEL_VAR),
            log_dir: non_empty(LOG_DIR_VAR).map(PathBuf::from),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            database: DatabaseLocation::Memory,
            ..Self::default()
        }
    }
}
