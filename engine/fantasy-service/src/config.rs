//! Service configuration management

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use fantasy_engine::EngineConfig;
use fantasy_store::StoreConfig;

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Scoring, pricing, prize and edit-window settings
    pub engine: EngineConfig,

    /// Database connection settings
    pub database: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "compact".to_string() }
    }
}

/// Load configuration: defaults, then the optional TOML file, then `FANTASY__*` variables
pub fn load_config(file: Option<&Path>) -> Result<ServiceConfig> {
    let mut builder = Config::builder();

    if let Some(path) = file {
        tracing::debug!("Loading configuration from file: {:?}", path);
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("FANTASY")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let mut config: ServiceConfig = builder
        .build()
        .context("Failed to read configuration sources")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    load_from_env(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Conventional variables that sit outside the `FANTASY__` namespace
fn load_from_env(config: &mut ServiceConfig) -> Result<()> {
    if std::env::var("FANTASY__DATABASE__URL").is_err() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }
    }

    config.engine.apply_env().context("Invalid FANTASY_* engine override")?;
    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &ServiceConfig) -> Result<()> {
    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow::anyhow!("Invalid log level: {}", config.logging.level)),
    }

    match config.logging.format.as_str() {
        "json" | "pretty" | "compact" => {}
        _ => return Err(anyhow::anyhow!("Invalid log format: {}", config.logging.format)),
    }

    config.database.clone().validated().context("Invalid database configuration")?;
    config.engine.validate().context("Invalid engine configuration")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fantasy_engine::rules::ChangeFrequency;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_unknown_log_settings() {
        let mut config = ServiceConfig::default();
        config.logging.level = "loud".into();
        assert!(validate_config(&config).is_err());

        let mut config = ServiceConfig::default();
        config.logging.format = "xml".into();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_database_url() {
        let mut config = ServiceConfig::default();
        config.database.url = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "json"

[database]
url = "postgresql://fantasy@db/fantasy"
max_connections = 4

[engine.prizes]
fee_percentage = "5"
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.min_connections, 1);
        assert_eq!(config.engine.prizes.fee_percentage, dec!(5));
        assert_eq!(config.engine.scoring.captain_multiplier, dec!(2.0));
    }

    #[test]
    fn test_camel_case_default_rules_survive_key_folding() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[engine.default_rules]
teamSize = 5
allowTeamChanges = true
changeFrequency = "DAILY"
maxChangesPerDay = 2
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        let rules = &config.engine.default_rules;
        assert_eq!(rules.team_size, 5);
        assert!(rules.allow_team_changes);
        assert_eq!(rules.change_frequency, ChangeFrequency::Daily);
        assert_eq!(rules.max_changes_per_day, Some(2));
        assert_eq!(rules.max_players_to_change, 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
