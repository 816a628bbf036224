//! Error types for the fantasy engine

use rust_decimal::Decimal;
use thiserror::Error;

use crate::rules::ChangeFrequency;
use crate::types::{ContestId, PlayerId, TeamId, UserId};

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, FantasyError>;

/// Errors surfaced to callers of the engine
///
/// Domain variants describe exactly which rule was violated. `Infrastructure` and
/// `Timeout` come from the persistence boundary and are the only retryable kinds.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FantasyError {
    #[error("Contest not found: {contest_id}")]
    ContestNotFound { contest_id: ContestId },

    #[error("Team not found: {team_id}")]
    TeamNotFound { team_id: TeamId },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: PlayerId },

    #[error("Contest {contest_id} is full ({max_entries} entries)")]
    ContestFull { contest_id: ContestId, max_entries: u32 },

    #[error("User {user_id} already has a team in contest {contest_id}")]
    DuplicateTeam { user_id: UserId, contest_id: ContestId },

    #[error("Roster must contain exactly {expected} players, got {actual}")]
    RosterSizeInvalid { expected: u32, actual: usize },

    #[error("Roster must have exactly one captain, found {found}")]
    CaptainRequired { found: usize },

    #[error("Roster must have exactly one vice-captain, found {found}")]
    ViceCaptainRequired { found: usize },

    #[error("Player {player_id} cannot be both captain and vice-captain")]
    CaptainViceCaptainSame { player_id: PlayerId },

    #[error("Player {player_id} appears more than once in the roster")]
    DuplicatePlayerInRoster { player_id: PlayerId },

    #[error("Roster cost {total_cost} exceeds wallet size {wallet_size}")]
    BudgetExceeded { total_cost: Decimal, wallet_size: Decimal },

    #[error("Team edits are only allowed between {window_start} and {window_end} (now {now})")]
    EditWindowClosed { window_start: String, window_end: String, now: String },

    #[error("Change frequency {frequency} allows no more edits (already made {edits})")]
    EditFrequencyExceeded { frequency: ChangeFrequency, edits: u32 },

    #[error("Edit introduces {changed} new players, at most {max} allowed")]
    EditChangeCountExceeded { changed: usize, max: u32 },

    #[error("Team {team_id} was modified by a concurrent edit")]
    EditConflict { team_id: TeamId },

    #[error("Team changes are disabled for contest {contest_id} while the tournament is running")]
    TeamChangesDisabled { contest_id: ContestId },

    #[error("Tournament has already ended")]
    TournamentAlreadyEnded,

    #[error("Prize percentages must sum to 100, got {total}")]
    PrizeRulesInvalid { total: Decimal },

    #[error("Invalid prize rule for rank {rank}: {reason}")]
    InvalidPrizeRule { rank: u32, reason: String },

    #[error("Infrastructure error: {message}")]
    Infrastructure { message: String },

    /// Stored data the engine cannot interpret; reading it again gives the same answer
    #[error("Corrupt {entity} record {id}: {message}")]
    CorruptRecord { entity: &'static str, id: i64, message: String },

    #[error("Operation {operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },
}

impl FantasyError {
    /// Create a new infrastructure error
    pub fn infrastructure(msg: impl Into<String>) -> Self {
        Self::Infrastructure { message: msg.into() }
    }

    /// Whether the caller may retry the operation unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Infrastructure { .. } | Self::Timeout { .. })
    }

    /// Stable machine-readable kind, used by callers that render or route errors
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ContestNotFound { .. } => "contest_not_found",
            Self::TeamNotFound { .. } => "team_not_found",
            Self::PlayerNotFound { .. } => "player_not_found",
            Self::ContestFull { .. } => "contest_full",
            Self::DuplicateTeam { .. } => "duplicate_team",
            Self::RosterSizeInvalid { .. } => "roster_size_invalid",
            Self::CaptainRequired { .. } => "captain_required",
            Self::ViceCaptainRequired { .. } => "vice_captain_required",
            Self::CaptainViceCaptainSame { .. } => "captain_vice_captain_same",
            Self::DuplicatePlayerInRoster { .. } => "duplicate_player_in_roster",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::EditWindowClosed { .. } => "edit_window_closed",
            Self::EditFrequencyExceeded { .. } => "edit_frequency_exceeded",
            Self::EditChangeCountExceeded { .. } => "edit_change_count_exceeded",
            Self::EditConflict { .. } => "edit_conflict",
            Self::TeamChangesDisabled { .. } => "team_changes_disabled",
            Self::TournamentAlreadyEnded => "tournament_already_ended",
            Self::PrizeRulesInvalid { .. } => "prize_rules_invalid",
            Self::InvalidPrizeRule { .. } => "invalid_prize_rule",
            Self::Infrastructure { .. } => "infrastructure_error",
            Self::Timeout { .. } => "timeout",
            Self::CorruptRecord { .. } => "corrupt_record",
        }
    }

    /// HTTP-equivalent status code for the outer API layer
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ContestNotFound { .. } | Self::TeamNotFound { .. } | Self::PlayerNotFound { .. } => {
                404
            }
            Self::ContestFull { .. } | Self::DuplicateTeam { .. } | Self::EditConflict { .. } => 409,
            Self::EditWindowClosed { .. }
            | Self::EditFrequencyExceeded { .. }
            | Self::EditChangeCountExceeded { .. }
            | Self::TeamChangesDisabled { .. }
            | Self::TournamentAlreadyEnded => 403,
            Self::Infrastructure { .. } | Self::Timeout { .. } => 503,
            Self::CorruptRecord { .. } => 500,
            _ => 422,
        }
    }
}

impl From<serde_json::Error> for FantasyError {
    fn from(err: serde_json::Error) -> Self {
        FantasyError::Infrastructure { message: format!("serialization: {}", err) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_boundary_errors_are_retryable() {
        assert!(FantasyError::infrastructure("connection reset").is_retryable());
        assert!(FantasyError::Timeout { operation: "get_contest".into(), after_ms: 5000 }
            .is_retryable());
        assert!(!FantasyError::TournamentAlreadyEnded.is_retryable());
        assert!(!FantasyError::ContestFull { contest_id: 1, max_entries: 10 }.is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(FantasyError::TeamNotFound { team_id: 3 }.status_code(), 404);
        assert_eq!(FantasyError::DuplicateTeam { user_id: 1, contest_id: 2 }.status_code(), 409);
        assert_eq!(FantasyError::EditConflict { team_id: 2 }.status_code(), 409);
        assert!(!FantasyError::EditConflict { team_id: 2 }.is_retryable());
        assert_eq!(FantasyError::CaptainRequired { found: 0 }.status_code(), 422);
        assert_eq!(FantasyError::TournamentAlreadyEnded.status_code(), 403);
        assert_eq!(FantasyError::infrastructure("down").status_code(), 503);

        let corrupt = FantasyError::CorruptRecord {
            entity: "match",
            id: 4,
            message: "unknown status ON_FIRE".into(),
        };
        assert_eq!(corrupt.status_code(), 500);
        assert_eq!(corrupt.kind(), "corrupt_record");
        assert!(!corrupt.is_retryable());
    }

    #[test]
    fn test_budget_message_names_the_limit() {
        let err = FantasyError::BudgetExceeded {
            total_cost: Decimal::from(120_000),
            wallet_size: Decimal::from(100_000),
        };
        assert_eq!(err.to_string(), "Roster cost 120000 exceeds wallet size 100000");
        assert_eq!(err.kind(), "budget_exceeded");
    }
}
