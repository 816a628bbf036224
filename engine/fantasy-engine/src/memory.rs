//! In-memory repository
//!
//! All state sits behind one `tokio::sync::Mutex`, so each trait method is a
//! single serialised critical section and multi-record writes are atomic.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{FantasyError, Result};
use crate::prize::{PrizeRule, PrizeScope};
use crate::repository::FantasyRepository;
use crate::types::{
    Contest, ContestId, ContestStatus, EditLedger, FantasyTeam, FantasyTeamPlayer, Match, MatchId,
    NewTeam, Player, PlayerId, PlayerMatchPoints, TeamId, TeamMatchScore, TeamUpdate,
    TeamWithRoster, Tournament, TournamentId, UserId,
};

#[derive(Default)]
struct State {
    tournaments: HashMap<TournamentId, Tournament>,
    contests: HashMap<ContestId, Contest>,
    players: HashMap<PlayerId, Player>,
    matches: HashMap<MatchId, Match>,
    teams: BTreeMap<TeamId, FantasyTeam>,
    rosters: HashMap<TeamId, Vec<FantasyTeamPlayer>>,
    points: BTreeMap<(TeamId, MatchId, PlayerId), PlayerMatchPoints>,
    prize_rules: HashMap<PrizeScope, Vec<PrizeRule>>,
    next_team_id: TeamId,
    transient_failures: u32,
    failing_score_teams: HashSet<TeamId>,
    failing_rank_contests: HashSet<ContestId>,
}

impl State {
    fn check_fault(&mut self, operation: &str) -> Result<()> {
        if self.transient_failures > 0 {
            self.transient_failures -= 1;
            return Err(FantasyError::infrastructure(format!("injected failure in {}", operation)));
        }
        Ok(())
    }

    fn with_roster(&self, team: &FantasyTeam) -> TeamWithRoster {
        TeamWithRoster {
            team: team.clone(),
            roster: self.rosters.get(&team.id).cloned().unwrap_or_default(),
        }
    }
}

/// Repository kept entirely in process memory
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<State>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_tournament(&self, tournament: Tournament) {
        self.state.lock().await.tournaments.insert(tournament.id, tournament);
    }

    pub async fn insert_contest(&self, contest: Contest) {
        self.state.lock().await.contests.insert(contest.id, contest);
    }

    pub async fn insert_player(&self, player: Player) {
        self.state.lock().await.players.insert(player.id, player);
    }

    pub async fn insert_match(&self, m: Match) {
        self.state.lock().await.matches.insert(m.id, m);
    }

    /// Make the next `count` calls fail with a retryable infrastructure error
    pub async fn fail_next_calls(&self, count: u32) {
        self.state.lock().await.transient_failures = count;
    }

    /// Make every score application for `team_id` fail until cleared
    pub async fn fail_scores_for(&self, team_id: TeamId) {
        self.state.lock().await.failing_score_teams.insert(team_id);
    }

    /// Make every rank update for `contest_id` fail until cleared
    pub async fn fail_rank_updates_for(&self, contest_id: ContestId) {
        self.state.lock().await.failing_rank_contests.insert(contest_id);
    }

    pub async fn clear_failures(&self) {
        let mut state = self.state.lock().await;
        state.transient_failures = 0;
        state.failing_score_teams.clear();
        state.failing_rank_contests.clear();
    }
}

#[async_trait::async_trait]
impl FantasyRepository for InMemoryRepository {
    async fn get_tournament(&self, tournament_id: TournamentId) -> Result<Option<Tournament>> {
        let mut state = self.state.lock().await;
        state.check_fault("get_tournament")?;
        Ok(state.tournaments.get(&tournament_id).cloned())
    }

    async fn get_contest(&self, contest_id: ContestId) -> Result<Option<Contest>> {
        let mut state = self.state.lock().await;
        state.check_fault("get_contest")?;
        Ok(state.contests.get(&contest_id).cloned())
    }

    async fn contests_for_tournament(
        &self,
        tournament_id: TournamentId,
        status: Option<ContestStatus>,
    ) -> Result<Vec<Contest>> {
        let mut state = self.state.lock().await;
        state.check_fault("contests_for_tournament")?;
        let mut contests: Vec<Contest> = state
            .contests
            .values()
            .filter(|c| c.tournament_id == tournament_id)
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        contests.sort_by_key(|c| c.id);
        Ok(contests)
    }

    async fn get_players(&self, player_ids: &[PlayerId]) -> Result<Vec<Player>> {
        let mut state = self.state.lock().await;
        state.check_fault("get_players")?;
        Ok(player_ids.iter().filter_map(|id| state.players.get(id).cloned()).collect())
    }

    async fn get_match(&self, match_id: MatchId) -> Result<Option<Match>> {
        let mut state = self.state.lock().await;
        state.check_fault("get_match")?;
        Ok(state.matches.get(&match_id).cloned())
    }

    async fn create_team(&self, new: NewTeam) -> Result<TeamWithRoster> {
        let mut state = self.state.lock().await;
        state.check_fault("create_team")?;

        let contest = state
            .contests
            .get(&new.contest_id)
            .ok_or(FantasyError::ContestNotFound { contest_id: new.contest_id })?;
        let (max_entries, current_entries) = (contest.max_entries, contest.current_entries);

        if state
            .teams
            .values()
            .any(|t| t.user_id == new.user_id && t.contest_id == new.contest_id)
        {
            return Err(FantasyError::DuplicateTeam { user_id: new.user_id, contest_id: new.contest_id });
        }
        if current_entries >= max_entries {
            return Err(FantasyError::ContestFull { contest_id: new.contest_id, max_entries });
        }

        state.next_team_id += 1;
        let team = FantasyTeam {
            id: state.next_team_id,
            user_id: new.user_id,
            contest_id: new.contest_id,
            name: new.name,
            total_points: Default::default(),
            rank: None,
            edits: EditLedger::default(),
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        if let Some(contest) = state.contests.get_mut(&new.contest_id) {
            contest.current_entries += 1;
        }
        state.rosters.insert(team.id, new.roster.clone());
        state.teams.insert(team.id, team.clone());

        Ok(TeamWithRoster { team, roster: new.roster })
    }

    async fn replace_team(&self, update: TeamUpdate) -> Result<TeamWithRoster> {
        let mut state = self.state.lock().await;
        state.check_fault("replace_team")?;

        let team = state
            .teams
            .get_mut(&update.team_id)
            .ok_or(FantasyError::TeamNotFound { team_id: update.team_id })?;
        if team.edits != update.expected_edits {
            return Err(FantasyError::EditConflict { team_id: update.team_id });
        }
        if let Some(name) = update.name {
            team.name = name;
        }
        team.edits = update.edits;
        team.updated_at = update.updated_at;
        let team = team.clone();

        if let Some(roster) = update.roster {
            state.rosters.insert(team.id, roster);
        }
        Ok(state.with_roster(&team))
    }

    async fn get_team(&self, team_id: TeamId) -> Result<Option<TeamWithRoster>> {
        let mut state = self.state.lock().await;
        state.check_fault("get_team")?;
        Ok(state.teams.get(&team_id).map(|t| state.with_roster(t)))
    }

    async fn teams_for_user(&self, user_id: UserId) -> Result<Vec<TeamWithRoster>> {
        let mut state = self.state.lock().await;
        state.check_fault("teams_for_user")?;
        Ok(state
            .teams
            .values()
            .filter(|t| t.user_id == user_id)
            .map(|t| state.with_roster(t))
            .collect())
    }

    async fn teams_for_contest(&self, contest_id: ContestId) -> Result<Vec<TeamWithRoster>> {
        let mut state = self.state.lock().await;
        state.check_fault("teams_for_contest")?;
        Ok(state
            .teams
            .values()
            .filter(|t| t.contest_id == contest_id)
            .map(|t| state.with_roster(t))
            .collect())
    }

    async fn apply_team_score(&self, score: TeamMatchScore) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.check_fault("apply_team_score")?;
        if state.failing_score_teams.contains(&score.team_id) {
            return Err(FantasyError::infrastructure(format!(
                "injected score failure for team {}",
                score.team_id
            )));
        }
        if !state.teams.contains_key(&score.team_id) {
            return Err(FantasyError::TeamNotFound { team_id: score.team_id });
        }

        let already_applied = state
            .points
            .range((score.team_id, score.match_id, PlayerId::MIN)..=(score.team_id, score.match_id, PlayerId::MAX))
            .next()
            .is_some();
        if already_applied {
            return Ok(false);
        }

        for record in score.records {
            state.points.insert((record.team_id, record.match_id, record.player_id), record);
        }
        if let Some(team) = state.teams.get_mut(&score.team_id) {
            team.total_points += score.delta;
        }
        Ok(true)
    }

    async fn points_for_team(&self, team_id: TeamId) -> Result<Vec<PlayerMatchPoints>> {
        let mut state = self.state.lock().await;
        state.check_fault("points_for_team")?;
        Ok(state
            .points
            .range((team_id, MatchId::MIN, PlayerId::MIN)..=(team_id, MatchId::MAX, PlayerId::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn update_ranks(&self, contest_id: ContestId, ranks: &[(TeamId, u32)]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_fault("update_ranks")?;
        if state.failing_rank_contests.contains(&contest_id) {
            return Err(FantasyError::infrastructure(format!(
                "injected rank failure for contest {}",
                contest_id
            )));
        }
        for (team_id, rank) in ranks {
            if let Some(team) = state.teams.get_mut(team_id).filter(|t| t.contest_id == contest_id) {
                team.rank = Some(*rank);
            }
        }
        Ok(())
    }

    async fn prize_rules(&self, scope: PrizeScope) -> Result<Vec<PrizeRule>> {
        let mut state = self.state.lock().await;
        state.check_fault("prize_rules")?;
        Ok(state.prize_rules.get(&scope).cloned().unwrap_or_default())
    }

    async fn replace_prize_rules(&self, scope: PrizeScope, rules: &[PrizeRule]) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_fault("replace_prize_rules")?;
        state.prize_rules.insert(scope, rules.to_vec());
        Ok(())
    }
}
