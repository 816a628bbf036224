//! Points calculation for a single player in a single match

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::ScoringConfig;
use crate::types::{FantasyTeamPlayer, Match, PlayerId, PlayerPerformance};

/// Which fields of a performance record feed the base points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceSchema {
    /// `points` as recorded
    PointsOnly,
    /// `points + aces + winning_shots - faults`
    ShotAdjusted,
}

impl FromStr for PerformanceSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "points_only" => Ok(PerformanceSchema::PointsOnly),
            "shot_adjusted" => Ok(PerformanceSchema::ShotAdjusted),
            other => Err(format!("unknown performance schema: {}", other)),
        }
    }
}

/// Role a player holds in a roster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RosterRole {
    Captain,
    ViceCaptain,
    Player,
}

impl RosterRole {
    pub fn of(slot: &FantasyTeamPlayer) -> Self {
        if slot.is_captain {
            RosterRole::Captain
        } else if slot.is_vice_captain {
            RosterRole::ViceCaptain
        } else {
            RosterRole::Player
        }
    }
}

impl fmt::Display for RosterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RosterRole::Captain => write!(f, "captain"),
            RosterRole::ViceCaptain => write!(f, "vice_captain"),
            RosterRole::Player => write!(f, "player"),
        }
    }
}

/// Audit breakdown stored with every scored player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsBreakdown {
    pub base: Decimal,
    pub bonus: Decimal,
    pub multiplier: Decimal,
    pub role: RosterRole,
    /// `(base + bonus) * multiplier`
    pub total: Decimal,
}

/// Pure points calculator
#[derive(Debug, Clone, Default)]
pub struct PointsCalculator {
    config: ScoringConfig,
}

impl PointsCalculator {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Base points for the configured schema, floored at zero
    pub fn base_points(&self, performance: &PlayerPerformance) -> Decimal {
        let base = match self.config.performance_schema {
            PerformanceSchema::PointsOnly => performance.points,
            PerformanceSchema::ShotAdjusted => {
                performance.points + Decimal::from(performance.aces)
                    + Decimal::from(performance.winning_shots)
                    - Decimal::from(performance.faults)
            }
        };
        base.max(Decimal::ZERO)
    }

    /// Winning-margin bonus for a player; zero unless the player's side won outright
    pub fn margin_bonus(&self, m: &Match, player_id: PlayerId) -> Decimal {
        let Some((winner, loser)) = m.result() else {
            return Decimal::ZERO;
        };
        if !winner.player_ids.contains(&player_id) {
            return Decimal::ZERO;
        }
        if loser.score == 0 {
            self.config.shutout_bonus
        } else if winner.score - loser.score >= self.config.margin_threshold {
            self.config.margin_bonus
        } else {
            Decimal::ZERO
        }
    }

    pub fn multiplier(&self, role: RosterRole) -> Decimal {
        match role {
            RosterRole::Captain => self.config.captain_multiplier,
            RosterRole::ViceCaptain => self.config.vice_captain_multiplier,
            RosterRole::Player => Decimal::ONE,
        }
    }

    /// Combine base, bonus and role into the final value
    pub fn combine(&self, base: Decimal, bonus: Decimal, role: RosterRole) -> PointsBreakdown {
        let multiplier = self.multiplier(role);
        PointsBreakdown { base, bonus, multiplier, role, total: (base + bonus) * multiplier }
    }

    /// Score one roster slot against its performance in a match
    pub fn score(
        &self,
        m: &Match,
        performance: &PlayerPerformance,
        slot: &FantasyTeamPlayer,
    ) -> PointsBreakdown {
        let base = self.base_points(performance);
        let bonus = self.margin_bonus(m, performance.player_id);
        self.combine(base, bonus, RosterRole::of(slot))
    }
}
