//! Engine configuration

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::rules::ContestRules;
use crate::scoring::PerformanceSchema;

/// Errors raised while loading engine configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Point values applied by the scoring pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub captain_multiplier: Decimal,
    pub vice_captain_multiplier: Decimal,
    /// Bonus when the losing side scored zero
    pub shutout_bonus: Decimal,
    /// Bonus when the winning margin reaches `margin_threshold`
    pub margin_bonus: Decimal,
    pub margin_threshold: u32,
    pub performance_schema: PerformanceSchema,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            captain_multiplier: dec!(2.0),
            vice_captain_multiplier: dec!(1.5),
            shutout_bonus: dec!(15),
            margin_bonus: dec!(10),
            margin_threshold: 5,
            performance_schema: PerformanceSchema::PointsOnly,
        }
    }
}

/// Rank-derived player pricing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub rank_numerator: Decimal,
    pub floor: Decimal,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self { rank_numerator: dec!(1000), floor: dec!(500) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrizeConfig {
    /// Payment processor fee, in percent of the gross amount
    pub fee_percentage: Decimal,
    /// Allowed distance of a rule set's sum from 100
    pub sum_tolerance: Decimal,
}

impl Default for PrizeConfig {
    fn default() -> Self {
        Self { fee_percentage: dec!(2.36), sum_tolerance: dec!(0.01) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditWindowConfig {
    /// Offset from UTC of the local clock that change windows are expressed in
    pub utc_offset_minutes: i32,
}

/// Timeout and retry policy for persistence calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    pub timeout_ms: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_attempts: 3,
            initial_backoff_ms: 100,
            backoff_multiplier: 2.0,
            max_backoff_ms: 2_000,
        }
    }
}

impl BoundaryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Delay before retry number `attempt` (1-based), capped at `max_backoff_ms`
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let delay = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(delay as u64)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub pricing: PricingConfig,
    pub prizes: PrizeConfig,
    pub edit_window: EditWindowConfig,
    pub boundary: BoundaryConfig,
    pub default_rules: ContestRules,
}

impl EngineConfig {
    /// Load configuration from a TOML file; missing sections keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overridden by `FANTASY_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `FANTASY_*` environment overrides on top of the current values
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(fee) = env_parse::<Decimal>("FANTASY_FEE_PERCENTAGE")? {
            self.prizes.fee_percentage = fee;
        }
        if let Some(offset) = env_parse::<i32>("FANTASY_EDIT_WINDOW_UTC_OFFSET_MINUTES")? {
            self.edit_window.utc_offset_minutes = offset;
        }
        if let Some(schema) = env_parse::<PerformanceSchema>("FANTASY_PERFORMANCE_SCHEMA")? {
            self.scoring.performance_schema = schema;
        }
        if let Some(timeout) = env_parse::<u64>("FANTASY_BOUNDARY_TIMEOUT_MS")? {
            self.boundary.timeout_ms = timeout;
        }
        if let Some(attempts) = env_parse::<u32>("FANTASY_BOUNDARY_MAX_ATTEMPTS")? {
            self.boundary.max_attempts = attempts;
        }
        if let Some(team_size) = env_parse::<u32>("FANTASY_DEFAULT_TEAM_SIZE")? {
            self.default_rules.team_size = team_size;
        }
        if let Some(wallet) = env_parse::<Decimal>("FANTASY_DEFAULT_WALLET_SIZE")? {
            self.default_rules.wallet_size = wallet;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prizes.fee_percentage.is_sign_negative() || self.prizes.fee_percentage >= dec!(100) {
            return Err(invalid("prizes.fee_percentage", self.prizes.fee_percentage));
        }
        if self.boundary.max_attempts == 0 {
            return Err(invalid("boundary.max_attempts", 0));
        }
        if self.default_rules.team_size == 0 {
            return Err(invalid("default_rules.team_size", 0));
        }
        if self.edit_window.utc_offset_minutes.abs() >= 24 * 60 {
            return Err(invalid("edit_window.utc_offset_minutes", self.edit_window.utc_offset_minutes));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: raw }),
        Err(_) => Ok(None),
    }
}
