//! PostgreSQL persistence for the fantasy engine
//!
//! [`PgRepository`] implements the engine's repository boundary over a sqlx pool.
//! Entry-cap and duplicate-team checks run inside one transaction, score
//! application locks the team row so redelivered matches stay idempotent.

pub mod config;
pub mod error;
pub mod repository;
pub mod rows;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use repository::PgRepository;
