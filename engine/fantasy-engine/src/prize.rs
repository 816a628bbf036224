//! Prize rules and prize resolution
//!
//! A prize rule assigns a percentage of the contest prize pool to one final rank,
//! optionally gated on a minimum number of participants. Rule sets are validated
//! on write and again before resolution; an invalid set is rejected, never
//! normalised. Amounts are decimal and rounded to cents (midpoint away from zero).

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::boundary::Boundary;
use crate::config::PrizeConfig;
use crate::error::{FantasyError, Result};
use crate::ranking::compute_ranks;
use crate::repository::FantasyRepository;
use crate::types::{ContestId, FantasyTeam, TeamId, TournamentId, UserId};

/// Which entity a prize rule set belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum PrizeScope {
    Contest(ContestId),
    Tournament(TournamentId),
}

impl PrizeScope {
    pub fn kind(&self) -> &'static str {
        match self {
            PrizeScope::Contest(_) => "contest",
            PrizeScope::Tournament(_) => "tournament",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            PrizeScope::Contest(id) | PrizeScope::Tournament(id) => *id,
        }
    }
}

impl fmt::Display for PrizeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeRule {
    pub rank: u32,
    /// Share of the prize pool, in percent
    pub percentage: Decimal,
    #[serde(default, alias = "minPlayers")]
    pub min_players: u32,
}

impl PrizeRule {
    pub fn new(rank: u32, percentage: Decimal) -> Self {
        Self { rank, percentage, min_players: 0 }
    }

    pub fn with_min_players(mut self, min_players: u32) -> Self {
        self.min_players = min_players;
        self
    }
}

/// Payable amount for one ranked team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrizeAllocation {
    pub rank: u32,
    pub team_id: TeamId,
    pub user_id: UserId,
    pub percentage: Decimal,
    pub gross_amount: Decimal,
    pub fee: Decimal,
    pub net_amount: Decimal,
}

/// Reject rule sets that are empty, malformed, or do not sum to 100 within `tolerance`
pub fn validate_rules(rules: &[PrizeRule], tolerance: Decimal) -> Result<()> {
    if rules.is_empty() {
        return Err(FantasyError::PrizeRulesInvalid { total: Decimal::ZERO });
    }

    let mut ranks = HashSet::with_capacity(rules.len());
    for rule in rules {
        if rule.rank == 0 {
            return Err(FantasyError::InvalidPrizeRule {
                rank: rule.rank,
                reason: "ranks start at 1".to_string(),
            });
        }
        if rule.percentage <= Decimal::ZERO || rule.percentage > dec!(100) {
            return Err(FantasyError::InvalidPrizeRule {
                rank: rule.rank,
                reason: format!("percentage {} is outside (0, 100]", rule.percentage),
            });
        }
        if !ranks.insert(rule.rank) {
            return Err(FantasyError::InvalidPrizeRule {
                rank: rule.rank,
                reason: "rank appears more than once".to_string(),
            });
        }
    }

    let total: Decimal = rules.iter().map(|r| r.percentage).sum();
    if (total - dec!(100)).abs() > tolerance {
        return Err(FantasyError::PrizeRulesInvalid { total });
    }
    Ok(())
}

fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Gross, fee and net for one share of the pool
pub fn split_amount(prize_pool: Decimal, percentage: Decimal, fee_percentage: Decimal) -> (Decimal, Decimal, Decimal) {
    let gross = round_cents(prize_pool * percentage / dec!(100));
    let fee = round_cents(gross * fee_percentage / dec!(100));
    (gross, fee, gross - fee)
}

/// Allocate a validated rule set over ranked teams
///
/// `ranks` maps each team to its current rank; the participant count is the
/// number of teams.
pub fn compute_allocations(
    prize_pool: Decimal,
    rules: &[PrizeRule],
    teams: &[FantasyTeam],
    ranks: &[(TeamId, u32)],
    fee_percentage: Decimal,
) -> Vec<PrizeAllocation> {
    let participants = teams.len() as u32;
    let by_id: HashMap<TeamId, &FantasyTeam> = teams.iter().map(|t| (t.id, t)).collect();
    let holder: HashMap<u32, &FantasyTeam> = ranks
        .iter()
        .filter_map(|(team_id, rank)| by_id.get(team_id).map(|t| (*rank, *t)))
        .collect();

    let mut ordered: Vec<&PrizeRule> = rules.iter().collect();
    ordered.sort_by_key(|r| r.rank);

    let mut allocations = Vec::new();
    for rule in ordered {
        if participants < rule.min_players {
            debug!(
                rank = rule.rank,
                participants,
                min_players = rule.min_players,
                "Prize tier not unlocked"
            );
            continue;
        }
        let Some(team) = holder.get(&rule.rank) else {
            warn!(rank = rule.rank, participants, "No team holds prize rank, skipping");
            continue;
        };
        let (gross_amount, fee, net_amount) = split_amount(prize_pool, rule.percentage, fee_percentage);
        allocations.push(PrizeAllocation {
            rank: rule.rank,
            team_id: team.id,
            user_id: team.user_id,
            percentage: rule.percentage,
            gross_amount,
            fee,
            net_amount,
        });
    }
    allocations
}

/// Validate then allocate
pub fn resolve_prizes(
    prize_pool: Decimal,
    rules: &[PrizeRule],
    teams: &[FantasyTeam],
    fee_percentage: Decimal,
    tolerance: Decimal,
) -> Result<Vec<PrizeAllocation>> {
    validate_rules(rules, tolerance)?;
    let ranks = compute_ranks(teams);
    Ok(compute_allocations(prize_pool, rules, teams, &ranks, fee_percentage))
}

/// Prize rule management and settlement against the repository
pub struct PrizeService {
    repo: Arc<dyn FantasyRepository>,
    config: PrizeConfig,
    boundary: Boundary,
}

impl PrizeService {
    pub fn new(repo: Arc<dyn FantasyRepository>, config: PrizeConfig, boundary: Boundary) -> Self {
        Self { repo, config, boundary }
    }

    pub async fn get_prize_rules(&self, scope: PrizeScope) -> Result<Vec<PrizeRule>> {
        let repo = &self.repo;
        let mut rules = self.boundary.call("prize_rules", || repo.prize_rules(scope)).await?;
        rules.sort_by_key(|r| r.rank);
        Ok(rules)
    }

    /// Validate and replace the whole rule set for a scope
    pub async fn set_prize_rules(&self, scope: PrizeScope, rules: Vec<PrizeRule>) -> Result<()> {
        validate_rules(&rules, self.config.sum_tolerance)?;

        let repo = &self.repo;
        if let PrizeScope::Contest(contest_id) = scope {
            self.boundary
                .call("get_contest", || repo.get_contest(contest_id))
                .await?
                .ok_or(FantasyError::ContestNotFound { contest_id })?;
        }

        let rules_ref = &rules[..];
        self.boundary
            .call("replace_prize_rules", || repo.replace_prize_rules(scope, rules_ref))
            .await?;
        info!(%scope, tiers = rules.len(), "Prize rules replaced");
        Ok(())
    }

    /// Contest-scoped rules when any exist, otherwise the tournament defaults
    pub async fn effective_rules(
        &self,
        contest_id: ContestId,
        tournament_id: TournamentId,
    ) -> Result<(PrizeScope, Vec<PrizeRule>)> {
        let contest_scope = PrizeScope::Contest(contest_id);
        let rules = self.get_prize_rules(contest_scope).await?;
        if !rules.is_empty() {
            return Ok((contest_scope, rules));
        }
        let tournament_scope = PrizeScope::Tournament(tournament_id);
        Ok((tournament_scope, self.get_prize_rules(tournament_scope).await?))
    }

    /// Payable amounts for the contest's current standings
    pub async fn resolve_prizes(&self, contest_id: ContestId) -> Result<Vec<PrizeAllocation>> {
        let repo = &self.repo;
        let contest = self
            .boundary
            .call("get_contest", || repo.get_contest(contest_id))
            .await?
            .ok_or(FantasyError::ContestNotFound { contest_id })?;

        let (scope, rules) = self.effective_rules(contest_id, contest.tournament_id).await?;
        let teams: Vec<FantasyTeam> = self
            .boundary
            .call("teams_for_contest", || repo.teams_for_contest(contest_id))
            .await?
            .into_iter()
            .map(|t| t.team)
            .collect();

        let allocations = resolve_prizes(
            contest.prize_pool,
            &rules,
            &teams,
            self.config.fee_percentage,
            self.config.sum_tolerance,
        )?;

        info!(
            contest_id,
            %scope,
            participants = teams.len(),
            payouts = allocations.len(),
            "Resolved prizes"
        );
        Ok(allocations)
    }
}
