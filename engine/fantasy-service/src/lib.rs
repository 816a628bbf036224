//! Fantasy operator service library
//!
//! Configuration loading, logging setup and the `fantasy-admin` command set that
//! drives the engine against the Postgres store.

use anyhow::{Context, Result};
use std::path::Path;

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;

pub use cli::{Cli, Commands};
pub use commands::AdminHandler;
pub use config::ServiceConfig;
pub use logging::initialize_logging;

/// Load configuration from `.env`, the optional file and environment variables
pub fn load_configuration(file: Option<&Path>) -> Result<ServiceConfig> {
    dotenv::dotenv().ok();
    config::load_config(file).context("Failed to load service configuration")
}
