//! Error types for the Postgres store

use fantasy_engine::FantasyError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while setting up the store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<StoreError> for FantasyError {
    fn from(err: StoreError) -> Self {
        FantasyError::infrastructure(err.to_string())
    }
}

/// Map a query failure onto the engine's retryable infrastructure error
pub(crate) fn db_error(err: sqlx::Error) -> FantasyError {
    FantasyError::infrastructure(format!("database: {}", err))
}

/// Whether the error is a unique-constraint violation
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
