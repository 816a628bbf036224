//! Fantasy engine - team lifecycle, scoring and prize settlement
//!
//! This crate validates fantasy rosters against contest rules, gates roster edits
//! through the edit-window state machine, turns completed matches into team points,
//! keeps contest rankings current and resolves prize payouts net of fees. Storage
//! is reached only through the [`FantasyRepository`] boundary.

pub mod boundary;
pub mod clock;
pub mod config;
pub mod edit_window;
pub mod error;
pub mod memory;
pub mod pipeline;
pub mod prize;
pub mod ranking;
pub mod repository;
pub mod roster;
pub mod rules;
pub mod scoring;
pub mod service;
pub mod types;


pub use boundary::Boundary;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use edit_window::{EditPolicy, EditWindowState};
pub use error::{FantasyError, Result};
pub use memory::InMemoryRepository;
pub use pipeline::{ScoringPipeline, ScoringReport, TeamScoreOutcome};
pub use prize::{PrizeAllocation, PrizeRule, PrizeScope, PrizeService};
pub use ranking::RankingUpdater;
pub use repository::FantasyRepository;
pub use roster::{PlayerPricing, RankPricing};
pub use rules::{ChangeFrequency, ContestRules};
pub use scoring::{PointsBreakdown, PointsCalculator};
pub use service::TeamService;

use std::sync::Arc;

/// The engine services wired over one repository
pub struct FantasyEngine {
    pub teams: TeamService,
    pub scoring: ScoringPipeline,
    pub ranking: RankingUpdater,
    pub prizes: PrizeService,
}

impl FantasyEngine {
    pub fn new(config: &EngineConfig, repo: Arc<dyn FantasyRepository>, clock: Arc<dyn Clock>) -> Self {
        let boundary = Boundary::new(config.boundary.clone());
        Self {
            teams: TeamService::new(
                repo.clone(),
                Arc::new(RankPricing::new(config.pricing.clone())),
                EditPolicy::new(&config.edit_window),
                boundary.clone(),
                clock.clone(),
            ),
            scoring: ScoringPipeline::new(
                repo.clone(),
                PointsCalculator::new(config.scoring.clone()),
                boundary.clone(),
                clock,
            ),
            ranking: RankingUpdater::new(repo.clone(), boundary.clone()),
            prizes: PrizeService::new(repo, config.prizes.clone(), boundary),
        }
    }
}
