//! Row types and their conversion into engine records

use chrono::{DateTime, NaiveDate, Utc};
use fantasy_engine::prize::{PrizeRule, PrizeScope};
use fantasy_engine::rules::ContestRules;
use fantasy_engine::types::{
    Contest, EditLedger, FantasyTeam, FantasyTeamPlayer, Match, MatchSide, Player, PlayerMatchPoints,
    Status, Tournament,
};
use fantasy_engine::{FantasyError, Result};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::FromRow;
use tracing::error;

/// An unknown status is a data problem, so it surfaces as non-retryable
fn status(entity: &'static str, id: i64, raw: &str) -> Result<Status> {
    raw.parse::<Status>().map_err(|message| {
        error!(entity, id, status = raw, "Unreadable status in stored row");
        FantasyError::CorruptRecord { entity, id, message }
    })
}

fn unsigned(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

#[derive(Debug, FromRow)]
pub struct TournamentRow {
    pub id: i64,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: String,
}

impl TryFrom<TournamentRow> for Tournament {
    type Error = FantasyError;

    fn try_from(row: TournamentRow) -> Result<Self> {
        Ok(Tournament {
            id: row.id,
            name: row.name,
            start_date: row.start_date,
            end_date: row.end_date,
            status: status("tournament", row.id, &row.status)?,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ContestRow {
    pub id: i64,
    pub tournament_id: i64,
    pub name: String,
    pub status: String,
    pub prize_pool: Decimal,
    pub entry_fee: Decimal,
    pub max_entries: i32,
    pub current_entries: i32,
    pub rules: Value,
    pub created_at: DateTime<Utc>,
}

impl ContestRow {
    /// Resolve the rules blob once, against the configured defaults
    pub fn into_contest(self, defaults: &ContestRules) -> Result<Contest> {
        Ok(Contest {
            id: self.id,
            tournament_id: self.tournament_id,
            name: self.name,
            status: status("contest", self.id, &self.status)?,
            prize_pool: self.prize_pool,
            entry_fee: self.entry_fee,
            max_entries: unsigned(self.max_entries),
            current_entries: unsigned(self.current_entries),
            rules: ContestRules::from_blob(&self.rules, defaults),
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PlayerRow {
    pub id: i64,
    pub name: String,
    pub rank: Option<i32>,
    pub price: Option<Decimal>,
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Player {
            id: row.id,
            name: row.name,
            rank: row.rank.and_then(|r| u32::try_from(r).ok()),
            price: row.price,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct MatchRow {
    pub id: i64,
    pub tournament_id: i64,
    pub status: String,
    pub side_a_player_ids: Vec<i64>,
    pub side_a_score: i32,
    pub side_b_player_ids: Vec<i64>,
    pub side_b_score: i32,
}

impl TryFrom<MatchRow> for Match {
    type Error = FantasyError;

    fn try_from(row: MatchRow) -> Result<Self> {
        Ok(Match {
            id: row.id,
            tournament_id: row.tournament_id,
            status: status("match", row.id, &row.status)?,
            side_a: MatchSide { player_ids: row.side_a_player_ids, score: unsigned(row.side_a_score) },
            side_b: MatchSide { player_ids: row.side_b_player_ids, score: unsigned(row.side_b_score) },
        })
    }
}

#[derive(Debug, FromRow)]
pub struct TeamRow {
    pub id: i64,
    pub user_id: i64,
    pub contest_id: i64,
    pub name: String,
    pub total_points: Decimal,
    pub rank: Option<i32>,
    pub live_edit_count: i32,
    pub last_edit_date: Option<NaiveDate>,
    pub edits_on_last_edit_date: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TeamRow> for FantasyTeam {
    fn from(row: TeamRow) -> Self {
        FantasyTeam {
            id: row.id,
            user_id: row.user_id,
            contest_id: row.contest_id,
            name: row.name,
            total_points: row.total_points,
            rank: row.rank.and_then(|r| u32::try_from(r).ok()),
            edits: EditLedger {
                live_edit_count: unsigned(row.live_edit_count),
                last_edit_date: row.last_edit_date,
                edits_on_last_edit_date: unsigned(row.edits_on_last_edit_date),
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct TeamPlayerRow {
    pub team_id: i64,
    pub player_id: i64,
    pub is_captain: bool,
    pub is_vice_captain: bool,
}

impl From<&TeamPlayerRow> for FantasyTeamPlayer {
    fn from(row: &TeamPlayerRow) -> Self {
        FantasyTeamPlayer {
            player_id: row.player_id,
            is_captain: row.is_captain,
            is_vice_captain: row.is_vice_captain,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct PointsRow {
    pub team_id: i64,
    pub player_id: i64,
    pub match_id: i64,
    pub points: Decimal,
    pub breakdown: Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PointsRow> for PlayerMatchPoints {
    type Error = FantasyError;

    fn try_from(row: PointsRow) -> Result<Self> {
        Ok(PlayerMatchPoints {
            team_id: row.team_id,
            player_id: row.player_id,
            match_id: row.match_id,
            points: row.points,
            breakdown: serde_json::from_value(row.breakdown)?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct PrizeRuleRow {
    pub rank: i32,
    pub percentage: Decimal,
    pub min_players: i32,
}

impl From<PrizeRuleRow> for PrizeRule {
    fn from(row: PrizeRuleRow) -> Self {
        PrizeRule {
            rank: unsigned(row.rank),
            percentage: row.percentage,
            min_players: unsigned(row.min_players),
        }
    }
}

/// Column values identifying a prize scope
pub fn scope_columns(scope: PrizeScope) -> (&'static str, i64) {
    (scope.kind(), scope.id())
}
