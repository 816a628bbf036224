//! Domain records shared by the engine and its persistence boundary

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::rules::ContestRules;
use crate::scoring::PointsBreakdown;

pub type ContestId = i64;
pub type TournamentId = i64;
pub type TeamId = i64;
pub type UserId = i64;
pub type PlayerId = i64;
pub type MatchId = i64;

/// Lifecycle status shared by contests, tournaments and matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Upcoming,
    InProgress,
    Completed,
    Cancelled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Upcoming => "UPCOMING",
            Status::InProgress => "IN_PROGRESS",
            Status::Completed => "COMPLETED",
            Status::Cancelled => "CANCELLED",
        }
    }

    /// Completed or cancelled
    pub fn is_closed(&self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "UPCOMING" | "SCHEDULED" => Ok(Status::Upcoming),
            "IN_PROGRESS" | "LIVE" => Ok(Status::InProgress),
            "COMPLETED" => Ok(Status::Completed),
            "CANCELLED" => Ok(Status::Cancelled),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

pub type ContestStatus = Status;
pub type TournamentStatus = Status;
pub type MatchStatus = Status;

/// The real-world tournament a contest is attached to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: TournamentStatus,
}

/// A fantasy competition scoped to one tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub tournament_id: TournamentId,
    pub name: String,
    pub status: ContestStatus,
    pub prize_pool: Decimal,
    pub entry_fee: Decimal,
    pub max_entries: u32,
    pub current_entries: u32,
    /// Resolved once at load time from the contest's rules blob
    pub rules: ContestRules,
    pub created_at: DateTime<Utc>,
}

/// A real-world player that can be picked into a roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub rank: Option<u32>,
    /// Explicit price; when absent the cost is derived from rank
    pub price: Option<Decimal>,
}

/// Counters for roster edits made while the tournament is in progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLedger {
    pub live_edit_count: u32,
    pub last_edit_date: Option<NaiveDate>,
    pub edits_on_last_edit_date: u32,
}

impl EditLedger {
    /// Edits already made on `date`
    pub fn edits_on(&self, date: NaiveDate) -> u32 {
        if self.last_edit_date == Some(date) {
            self.edits_on_last_edit_date
        } else {
            0
        }
    }

    /// Record one in-progress edit made on `date`
    pub fn record(&mut self, date: NaiveDate) {
        self.edits_on_last_edit_date = self.edits_on(date) + 1;
        self.last_edit_date = Some(date);
        self.live_edit_count += 1;
    }
}

/// A user's entry into a contest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FantasyTeam {
    pub id: TeamId,
    pub user_id: UserId,
    pub contest_id: ContestId,
    pub name: String,
    pub total_points: Decimal,
    pub rank: Option<u32>,
    pub edits: EditLedger,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Join record between a team and a selected player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FantasyTeamPlayer {
    pub player_id: PlayerId,
    pub is_captain: bool,
    pub is_vice_captain: bool,
}

/// One candidate roster slot as submitted by a user
pub type RosterSelection = FantasyTeamPlayer;

impl FantasyTeamPlayer {
    pub fn new(player_id: PlayerId) -> Self {
        Self { player_id, is_captain: false, is_vice_captain: false }
    }

    pub fn captain(player_id: PlayerId) -> Self {
        Self { player_id, is_captain: true, is_vice_captain: false }
    }

    pub fn vice_captain(player_id: PlayerId) -> Self {
        Self { player_id, is_captain: false, is_vice_captain: true }
    }
}

/// A team together with its resolved roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamWithRoster {
    pub team: FantasyTeam,
    pub roster: Vec<FantasyTeamPlayer>,
}

impl TeamWithRoster {
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.roster.iter().map(|p| p.player_id).collect()
    }
}

/// One side of a match and its final score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSide {
    pub player_ids: Vec<PlayerId>,
    pub score: u32,
}

/// A real-world match inside a tournament
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub status: MatchStatus,
    pub side_a: MatchSide,
    pub side_b: MatchSide,
}

impl Match {
    /// The winning side and the losing side, or `None` for a draw
    pub fn result(&self) -> Option<(&MatchSide, &MatchSide)> {
        if self.side_a.score > self.side_b.score {
            Some((&self.side_a, &self.side_b))
        } else if self.side_b.score > self.side_a.score {
            Some((&self.side_b, &self.side_a))
        } else {
            None
        }
    }
}

/// Raw per-player statistics for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPerformance {
    pub player_id: PlayerId,
    pub points: Decimal,
    #[serde(default)]
    pub aces: u32,
    #[serde(default)]
    pub winning_shots: u32,
    #[serde(default)]
    pub faults: u32,
}

/// Audit record of one player's scored contribution to one team for one match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMatchPoints {
    pub team_id: TeamId,
    pub player_id: PlayerId,
    pub match_id: MatchId,
    pub points: Decimal,
    pub breakdown: PointsBreakdown,
    pub created_at: DateTime<Utc>,
}

/// Input for an atomic team creation
#[derive(Debug, Clone)]
pub struct NewTeam {
    pub user_id: UserId,
    pub contest_id: ContestId,
    pub name: String,
    pub roster: Vec<FantasyTeamPlayer>,
    pub created_at: DateTime<Utc>,
}

/// Input for an atomic team update; `None` fields are left untouched
#[derive(Debug, Clone)]
pub struct TeamUpdate {
    pub team_id: TeamId,
    pub name: Option<String>,
    pub roster: Option<Vec<FantasyTeamPlayer>>,
    /// Ledger the edit was authorised against; the write fails if it moved
    pub expected_edits: EditLedger,
    pub edits: EditLedger,
    pub updated_at: DateTime<Utc>,
}

/// Everything one team earns from one match, applied as a single write
#[derive(Debug, Clone)]
pub struct TeamMatchScore {
    pub team_id: TeamId,
    pub match_id: MatchId,
    pub delta: Decimal,
    pub records: Vec<PlayerMatchPoints>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(score: u32) -> MatchSide {
        MatchSide { player_ids: vec![], score }
    }

    #[test]
    fn test_status_round_trip_through_db_strings() {
        for status in [Status::Upcoming, Status::InProgress, Status::Completed, Status::Cancelled] {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert_eq!("live".parse::<Status>().unwrap(), Status::InProgress);
        assert!("paused".parse::<Status>().is_err());
    }

    #[test]
    fn test_match_result() {
        let mut m = Match {
            id: 1,
            tournament_id: 1,
            status: Status::Completed,
            side_a: side(11),
            side_b: side(6),
        };
        assert_eq!(m.result().map(|(w, l)| (w.score, l.score)), Some((11, 6)));

        m.side_a.score = 3;
        assert_eq!(m.result().map(|(w, l)| (w.score, l.score)), Some((6, 3)));

        m.side_a.score = 6;
        assert!(m.result().is_none());
    }

    #[test]
    fn test_edit_ledger_resets_per_day() {
        let day1 = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
        let mut ledger = EditLedger::default();

        ledger.record(day1);
        ledger.record(day1);
        assert_eq!(ledger.edits_on(day1), 2);
        assert_eq!(ledger.edits_on(day2), 0);

        ledger.record(day2);
        assert_eq!(ledger.edits_on(day2), 1);
        assert_eq!(ledger.live_edit_count, 3);
    }
}
