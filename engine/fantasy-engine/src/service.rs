//! Team lifecycle operations

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::boundary::Boundary;
use crate::clock::Clock;
use crate::edit_window::EditPolicy;
use crate::error::{FantasyError, Result};
use crate::ranking::leaderboard_order;
use crate::repository::FantasyRepository;
use crate::roster::{validate_roster, PlayerPricing};
use crate::rules::ContestRules;
use crate::types::{
    Contest, ContestId, NewTeam, PlayerId, PlayerMatchPoints, RosterSelection, TeamId, TeamUpdate,
    TeamWithRoster, Tournament, TournamentStatus, UserId,
};

const MAX_EDIT_ATTEMPTS: u32 = 3;

pub struct TeamService {
    repo: Arc<dyn FantasyRepository>,
    pricing: Arc<dyn PlayerPricing>,
    policy: EditPolicy,
    boundary: Boundary,
    clock: Arc<dyn Clock>,
}

impl TeamService {
    pub fn new(
        repo: Arc<dyn FantasyRepository>,
        pricing: Arc<dyn PlayerPricing>,
        policy: EditPolicy,
        boundary: Boundary,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { repo, pricing, policy, boundary, clock }
    }

    /// Validate the roster and enter a new team into the contest
    pub async fn create_team(
        &self,
        user_id: UserId,
        contest_id: ContestId,
        name: impl Into<String>,
        roster: Vec<RosterSelection>,
    ) -> Result<TeamWithRoster> {
        let now = self.clock.now();
        let contest = self.load_contest(contest_id).await?;
        let tournament = self.load_tournament(&contest).await?;

        if contest.status.is_closed()
            || tournament.status == TournamentStatus::Completed
            || now > tournament.end_date
        {
            return Err(FantasyError::TournamentAlreadyEnded);
        }

        let total_cost = self.check_roster(&roster, &contest.rules).await?;

        let new = NewTeam { user_id, contest_id, name: name.into(), roster, created_at: now };
        let repo = &self.repo;
        let created = self.boundary.call("create_team", || repo.create_team(new.clone())).await?;

        info!(
            team_id = created.team.id,
            user_id,
            contest_id,
            %total_cost,
            "Fantasy team created"
        );
        Ok(created)
    }

    /// Rename and/or replace the roster, subject to the edit window
    ///
    /// The write only lands if the team's edit ledger is still the one the edit was
    /// authorised against; on a concurrent change the edit is re-authorised.
    pub async fn update_team(
        &self,
        team_id: TeamId,
        name: Option<String>,
        roster: Option<Vec<RosterSelection>>,
    ) -> Result<TeamWithRoster> {
        let mut team = self.get_team(team_id).await?;
        let contest = self.load_contest(team.team.contest_id).await?;
        let tournament = self.load_tournament(&contest).await?;

        let mut attempt = 1;
        loop {
            let now = self.clock.now();
            let decision =
                self.policy.authorize(now, &tournament, &contest, &team, roster.as_deref())?;
            if decision.roster_changed {
                if let Some(roster) = &roster {
                    self.check_roster(roster, &contest.rules).await?;
                }
            }

            let update = TeamUpdate {
                team_id,
                name: name.clone(),
                roster: roster.clone().filter(|_| decision.roster_changed),
                expected_edits: team.team.edits.clone(),
                edits: decision.edits,
                updated_at: now,
            };
            let repo = &self.repo;
            match self.boundary.call("replace_team", || repo.replace_team(update.clone())).await {
                Ok(updated) => {
                    info!(
                        team_id,
                        contest_id = contest.id,
                        state = %decision.state,
                        roster_changed = decision.roster_changed,
                        "Fantasy team updated"
                    );
                    return Ok(updated);
                }
                Err(FantasyError::EditConflict { .. }) if attempt < MAX_EDIT_ATTEMPTS => {
                    warn!(team_id, attempt, "Team changed during edit, re-authorising");
                    team = self.get_team(team_id).await?;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    pub async fn get_team(&self, team_id: TeamId) -> Result<TeamWithRoster> {
        let repo = &self.repo;
        self.boundary
            .call("get_team", || repo.get_team(team_id))
            .await?
            .ok_or(FantasyError::TeamNotFound { team_id })
    }

    pub async fn get_user_teams(&self, user_id: UserId) -> Result<Vec<TeamWithRoster>> {
        let repo = &self.repo;
        self.boundary.call("teams_for_user", || repo.teams_for_user(user_id)).await
    }

    pub async fn get_contest_teams(&self, contest_id: ContestId) -> Result<Vec<TeamWithRoster>> {
        self.load_contest(contest_id).await?;
        let repo = &self.repo;
        self.boundary.call("teams_for_contest", || repo.teams_for_contest(contest_id)).await
    }

    /// Points audit trail of a team
    pub async fn get_team_points(&self, team_id: TeamId) -> Result<Vec<PlayerMatchPoints>> {
        self.get_team(team_id).await?;
        let repo = &self.repo;
        self.boundary.call("points_for_team", || repo.points_for_team(team_id)).await
    }

    /// Contest teams by persisted rank, unranked teams last
    pub async fn get_leaderboard(&self, contest_id: ContestId) -> Result<Vec<TeamWithRoster>> {
        let mut teams = self.get_contest_teams(contest_id).await?;
        teams.sort_by(|a, b| match (a.team.rank, b.team.rank) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => leaderboard_order(&a.team, &b.team),
        });
        Ok(teams)
    }

    async fn load_contest(&self, contest_id: ContestId) -> Result<Contest> {
        let repo = &self.repo;
        self.boundary
            .call("get_contest", || repo.get_contest(contest_id))
            .await?
            .ok_or(FantasyError::ContestNotFound { contest_id })
    }

    async fn load_tournament(&self, contest: &Contest) -> Result<Tournament> {
        let repo = &self.repo;
        let tournament_id = contest.tournament_id;
        self.boundary
            .call("get_tournament", || repo.get_tournament(tournament_id))
            .await?
            .ok_or_else(|| {
                warn!(contest_id = contest.id, tournament_id, "Contest references a missing tournament");
                FantasyError::infrastructure(format!(
                    "tournament {} of contest {} is missing",
                    tournament_id, contest.id
                ))
            })
    }

    async fn check_roster(&self, roster: &[RosterSelection], rules: &ContestRules) -> Result<Decimal> {
        let mut ids: Vec<PlayerId> = roster.iter().map(|s| s.player_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let repo = &self.repo;
        let ids_ref = &ids[..];
        let players = self.boundary.call("get_players", || repo.get_players(ids_ref)).await?;
        let costs: HashMap<PlayerId, Decimal> =
            players.iter().map(|p| (p.id, self.pricing.cost(p))).collect();

        validate_roster(roster, rules, &costs).into_result()
    }
}
