//! Command handling; every command renders a JSON document

use anyhow::{bail, Context, Result};
use fantasy_engine::types::PlayerPerformance;
use fantasy_engine::{FantasyEngine, FantasyError, PrizeRule, ScoringReport, TeamScoreOutcome};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{error, info};

use crate::cli::Commands;

/// Runs operator commands against a wired engine
pub struct AdminHandler {
    engine: FantasyEngine,
}

impl AdminHandler {
    pub fn new(engine: FantasyEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &FantasyEngine {
        &self.engine
    }

    pub async fn handle_command(&self, command: Commands) -> Result<Value> {
        match command {
            Commands::ScoreMatch { match_id, performances } => {
                let performances: Vec<PlayerPerformance> = read_json(&performances)?;
                let report = self
                    .engine
                    .scoring
                    .apply_match_id(match_id, &performances)
                    .await
                    .with_context(|| format!("Failed to score match {}", match_id))?;
                for team_id in report.failed_team_ids() {
                    error!(match_id, team_id, "Team needs reprocessing");
                }
                Ok(report_json(&report))
            }
            Commands::RefreshRanks { contest_id } => {
                let ranks = self.engine.ranking.refresh_ranks(contest_id).await?;
                let ranks: Vec<Value> = ranks
                    .into_iter()
                    .map(|(team_id, rank)| json!({ "team_id": team_id, "rank": rank }))
                    .collect();
                Ok(json!({ "contest_id": contest_id, "ranks": ranks }))
            }
            Commands::SetPrizeRules { scope, id, rules } => {
                let rules: Vec<PrizeRule> = read_json(&rules)?;
                let scope = scope.with_id(id);
                self.engine.prizes.set_prize_rules(scope, rules).await?;
                info!(%scope, "Prize rules replaced");
                let stored = self.engine.prizes.get_prize_rules(scope).await?;
                Ok(json!({ "scope": scope, "rules": stored }))
            }
            Commands::PrizeRules { scope, id } => {
                let scope = scope.with_id(id);
                let rules = self.engine.prizes.get_prize_rules(scope).await?;
                Ok(json!({ "scope": scope, "rules": rules }))
            }
            Commands::ResolvePrizes { contest_id } => {
                let allocations = self.engine.prizes.resolve_prizes(contest_id).await?;
                Ok(json!({ "contest_id": contest_id, "allocations": allocations }))
            }
            Commands::Team { team_id } => {
                let team = self.engine.teams.get_team(team_id).await?;
                let points = self.engine.teams.get_team_points(team_id).await?;
                Ok(json!({ "team": team, "points": points }))
            }
            Commands::Leaderboard { contest_id } => {
                let teams = self.engine.teams.get_leaderboard(contest_id).await?;
                Ok(json!({ "contest_id": contest_id, "teams": teams }))
            }
            Commands::Migrate => bail!("migrate runs against the database store, not the engine"),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn error_json(err: &FantasyError) -> Value {
    json!({ "kind": err.kind(), "message": err.to_string() })
}

fn report_json(report: &ScoringReport) -> Value {
    let teams: Vec<Value> = report
        .teams
        .iter()
        .map(|(team_id, outcome)| match outcome {
            Ok(outcome) => json!({ "team_id": team_id, "result": outcome }),
            Err(e) => json!({ "team_id": team_id, "error": error_json(e) }),
        })
        .collect();
    let failures = |items: &[(i64, FantasyError)]| -> Vec<Value> {
        items
            .iter()
            .map(|(contest_id, e)| json!({ "contest_id": contest_id, "error": error_json(e) }))
            .collect()
    };
    let total_delta: rust_decimal::Decimal = report
        .teams
        .iter()
        .filter_map(|(_, r)| match r {
            Ok(TeamScoreOutcome::Applied { delta }) => Some(*delta),
            _ => None,
        })
        .sum();

    json!({
        "match_id": report.match_id,
        "processed": report.processed,
        "applied": report.applied_count(),
        "total_delta": total_delta,
        "teams": teams,
        "failed_team_ids": report.failed_team_ids(),
        "contests": report.contests,
        "contest_failures": failures(&report.contest_failures),
        "rank_failures": failures(&report.rank_failures),
    })
}
