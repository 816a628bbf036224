//! fantasy-admin
//!
//! Operator entry point: loads configuration, connects to the store and runs one
//! command, printing its JSON result on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use fantasy_engine::{FantasyEngine, SystemClock};
use fantasy_service::{initialize_logging, load_configuration, AdminHandler, Cli, Commands};
use fantasy_store::PgRepository;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_configuration(cli.config.as_deref()).context("Failed to load configuration")?;
    initialize_logging(&config.logging)?;
    info!("Starting fantasy-admin v{}", env!("CARGO_PKG_VERSION"));

    let store = PgRepository::connect(&config.database, config.engine.default_rules.clone())
        .await
        .context("Failed to connect to the fantasy database")?;

    if let Commands::Migrate = cli.command {
        store.migrate().await.context("Failed to apply migrations")?;
        println!("{}", serde_json::json!({ "migrated": true }));
        return Ok(());
    }

    let engine = FantasyEngine::new(&config.engine, Arc::new(store), Arc::new(SystemClock));
    let handler = AdminHandler::new(engine);

    let output = handler.handle_command(cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
