//! Persistence boundary consumed by the engine

use crate::error::Result;
use crate::prize::{PrizeRule, PrizeScope};
use crate::types::{
    Contest, ContestId, ContestStatus, Match, MatchId, NewTeam, Player, PlayerId, PlayerMatchPoints,
    TeamId, TeamMatchScore, TeamUpdate, TeamWithRoster, Tournament, TournamentId, UserId,
};

/// Storage operations the engine needs
///
/// Implementations must make every multi-record write atomic. Infrastructure
/// failures are reported as `FantasyError::Infrastructure` so the boundary can
/// retry them.
#[async_trait::async_trait]
pub trait FantasyRepository: Send + Sync {
    async fn get_tournament(&self, tournament_id: TournamentId) -> Result<Option<Tournament>>;

    async fn get_contest(&self, contest_id: ContestId) -> Result<Option<Contest>>;

    /// Contests of a tournament, optionally filtered by status
    async fn contests_for_tournament(
        &self,
        tournament_id: TournamentId,
        status: Option<ContestStatus>,
    ) -> Result<Vec<Contest>>;

    /// Players that exist among `player_ids`; unknown ids are omitted
    async fn get_players(&self, player_ids: &[PlayerId]) -> Result<Vec<Player>>;

    async fn get_match(&self, match_id: MatchId) -> Result<Option<Match>>;

    /// Insert the team and its roster and take one contest entry, as one write
    ///
    /// Fails with `ContestNotFound`, `ContestFull` when no entry is left, or
    /// `DuplicateTeam` when the user already owns a team in the contest.
    async fn create_team(&self, team: NewTeam) -> Result<TeamWithRoster>;

    /// Apply a name change and/or full roster replacement with the new edit ledger
    async fn replace_team(&self, update: TeamUpdate) -> Result<TeamWithRoster>;

    async fn get_team(&self, team_id: TeamId) -> Result<Option<TeamWithRoster>>;

    async fn teams_for_user(&self, user_id: UserId) -> Result<Vec<TeamWithRoster>>;

    async fn teams_for_contest(&self, contest_id: ContestId) -> Result<Vec<TeamWithRoster>>;

    /// Insert the points records and increment the team total, as one write
    ///
    /// Returns `false` without writing anything when records for this
    /// (team, match) already exist.
    async fn apply_team_score(&self, score: TeamMatchScore) -> Result<bool>;

    async fn points_for_team(&self, team_id: TeamId) -> Result<Vec<PlayerMatchPoints>>;

    /// Persist the rank of every listed team in the contest
    async fn update_ranks(&self, contest_id: ContestId, ranks: &[(TeamId, u32)]) -> Result<()>;

    async fn prize_rules(&self, scope: PrizeScope) -> Result<Vec<PrizeRule>>;

    /// Replace the whole rule set for a scope
    async fn replace_prize_rules(&self, scope: PrizeScope, rules: &[PrizeRule]) -> Result<()>;
}
