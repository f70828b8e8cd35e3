// crates/eqviz-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CoreError {
    pub fn dataset_not_found(id: i64) -> Self {
        CoreError::NotFound {
            entity: "dataset",
            id,
        }
    }

    pub fn equipment_not_found(id: i64) -> Self {
        CoreError::NotFound {
            entity: "equipment",
            id,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
