use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{CoreError, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_DATASETS_PER_USER: usize = 5;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    /// `None` is only acceptable for the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: SocketAddr,
    pub limits: UploadLimits,
    pub db_max_connections: u32,
}

/// Per-user retention cap and upload size limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_datasets_per_user: usize,
    pub max_upload_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_datasets_per_user: DEFAULT_MAX_DATASETS_PER_USER,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv_if_present();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .or_else(|| lookup("EQVIZ_DATABASE_URL"))
            .filter(|url| !url.trim().is_empty());

        let bind_addr = parse_var(&lookup, "EQVIZ_BIND_ADDR")?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));

        let max_datasets_per_user =
            parse_var(&lookup, "EQVIZ_MAX_DATASETS_PER_USER")?.unwrap_or(DEFAULT_MAX_DATASETS_PER_USER);
        if max_datasets_per_user == 0 {
            return Err(CoreError::Config(
                "EQVIZ_MAX_DATASETS_PER_USER must be at least 1".to_string(),
            ));
        }

        let max_upload_bytes =
            parse_var(&lookup, "EQVIZ_MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let db_max_connections =
            parse_var(&lookup, "EQVIZ_DB_MAX_CONNECTIONS")?.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);

        Ok(Self {
            database_url,
            bind_addr,
            limits: UploadLimits {
                max_datasets_per_user,
                max_upload_bytes,
            },
            db_max_connections,
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url.as_deref().ok_or_else(|| {
            CoreError::Config("DATABASE_URL (or EQVIZ_DATABASE_URL) must be set".to_string())
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| CoreError::Config(format!("{key}='{raw}' is invalid: {err}"))),
    }
}

fn dotenv_if_present() {
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            tracing::warn!("failed to load .env file: {err}");
        }
    }
}
