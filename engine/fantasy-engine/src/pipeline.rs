//! Match-completion scoring pipeline
//!
//! One pass turns a completed match's performances into per-team point deltas,
//! applies each team's delta as a single idempotent write, and refreshes ranks
//! for every contest it touched. Teams are independent: a failure on one team
//! is recorded in the report and the pass moves on.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::boundary::Boundary;
use crate::clock::Clock;
use crate::error::{FantasyError, Result};
use crate::ranking::RankingUpdater;
use crate::repository::FantasyRepository;
use crate::scoring::PointsCalculator;
use crate::types::{
    ContestId, ContestStatus, Match, MatchId, MatchStatus, PlayerId, PlayerMatchPoints,
    PlayerPerformance, TeamId, TeamMatchScore, TeamWithRoster,
};

/// What happened to one team in a scoring pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TeamScoreOutcome {
    Applied { delta: Decimal },
    /// This match was already applied to the team
    AlreadyApplied,
    /// No rostered player has a performance in this match
    NoOverlap,
}

/// Result of one scoring pass
#[derive(Debug, Clone, Default)]
pub struct ScoringReport {
    pub match_id: MatchId,
    /// False when the match was missing or not completed
    pub processed: bool,
    pub teams: Vec<(TeamId, Result<TeamScoreOutcome>)>,
    /// Contests whose teams were loaded and scored
    pub contests: Vec<ContestId>,
    pub contest_failures: Vec<(ContestId, FantasyError)>,
    pub rank_failures: Vec<(ContestId, FantasyError)>,
}

impl ScoringReport {
    fn skipped(match_id: MatchId) -> Self {
        Self { match_id, ..Default::default() }
    }

    /// Teams an external retry should reprocess
    pub fn failed_team_ids(&self) -> Vec<TeamId> {
        self.teams.iter().filter(|(_, r)| r.is_err()).map(|(id, _)| *id).collect()
    }

    pub fn applied_count(&self) -> usize {
        self.teams
            .iter()
            .filter(|(_, r)| matches!(r, Ok(TeamScoreOutcome::Applied { .. })))
            .count()
    }

    pub fn outcome_for(&self, team_id: TeamId) -> Option<&Result<TeamScoreOutcome>> {
        self.teams.iter().find(|(id, _)| *id == team_id).map(|(_, r)| r)
    }
}

pub struct ScoringPipeline {
    repo: Arc<dyn FantasyRepository>,
    calculator: PointsCalculator,
    boundary: Boundary,
    ranking: RankingUpdater,
    clock: Arc<dyn Clock>,
}

impl ScoringPipeline {
    pub fn new(
        repo: Arc<dyn FantasyRepository>,
        calculator: PointsCalculator,
        boundary: Boundary,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ranking = RankingUpdater::new(repo.clone(), boundary.clone());
        Self { repo, calculator, boundary, ranking, clock }
    }

    /// Load the match and score it; a missing or unfinished match is a no-op
    pub async fn apply_match_id(
        &self,
        match_id: MatchId,
        performances: &[PlayerPerformance],
    ) -> Result<ScoringReport> {
        let repo = &self.repo;
        match self.boundary.call("get_match", || repo.get_match(match_id)).await? {
            Some(m) => self.apply_match_result(&m, performances).await,
            None => {
                info!(match_id, "Match not found, nothing to score");
                Ok(ScoringReport::skipped(match_id))
            }
        }
    }

    /// Score every in-progress contest of the match's tournament
    pub async fn apply_match_result(
        &self,
        m: &Match,
        performances: &[PlayerPerformance],
    ) -> Result<ScoringReport> {
        if m.status != MatchStatus::Completed {
            info!(match_id = m.id, status = %m.status, "Match not completed, skipping scoring");
            return Ok(ScoringReport::skipped(m.id));
        }

        let performances = collapse_performances(m.id, performances);
        let repo = &self.repo;
        let contests = self
            .boundary
            .call("contests_for_tournament", || {
                repo.contests_for_tournament(m.tournament_id, Some(ContestStatus::InProgress))
            })
            .await?;

        let mut report = ScoringReport { match_id: m.id, processed: true, ..Default::default() };

        for contest in &contests {
            let contest_id = contest.id;
            let teams = match self
                .boundary
                .call("teams_for_contest", || repo.teams_for_contest(contest_id))
                .await
            {
                Ok(teams) => teams,
                Err(e) => {
                    error!(contest_id, match_id = m.id, "Failed to load teams: {}", e);
                    report.contest_failures.push((contest_id, e));
                    continue;
                }
            };
            report.contests.push(contest_id);

            for team in &teams {
                let outcome = self.score_team(m, &performances, team).await;
                match &outcome {
                    Ok(TeamScoreOutcome::Applied { delta }) => {
                        debug!(team_id = team.team.id, contest_id, %delta, "Applied match points");
                    }
                    Ok(TeamScoreOutcome::AlreadyApplied) => {
                        debug!(team_id = team.team.id, match_id = m.id, "Match already applied");
                    }
                    Ok(TeamScoreOutcome::NoOverlap) => {}
                    Err(e) => {
                        error!(
                            team_id = team.team.id,
                            contest_id,
                            match_id = m.id,
                            "Failed to score team: {}",
                            e
                        );
                    }
                }
                report.teams.push((team.team.id, outcome));
            }
        }

        // redeliveries refresh too, so a failed refresh on an earlier pass heals
        for contest_id in report.contests.clone() {
            if let Err(e) = self.ranking.refresh_ranks(contest_id).await {
                error!(contest_id, "Failed to refresh ranks: {}", e);
                report.rank_failures.push((contest_id, e));
            }
        }

        info!(
            match_id = m.id,
            contests = report.contests.len(),
            teams = report.teams.len(),
            applied = report.applied_count(),
            failed = report.failed_team_ids().len(),
            "Scoring pass complete"
        );
        Ok(report)
    }

    async fn score_team(
        &self,
        m: &Match,
        performances: &HashMap<PlayerId, &PlayerPerformance>,
        team: &TeamWithRoster,
    ) -> Result<TeamScoreOutcome> {
        let team_id = team.team.id;
        let now = self.clock.now();

        let records: Vec<PlayerMatchPoints> = team
            .roster
            .iter()
            .filter_map(|slot| performances.get(&slot.player_id).map(|perf| (slot, *perf)))
            .map(|(slot, perf)| {
                let breakdown = self.calculator.score(m, perf, slot);
                PlayerMatchPoints {
                    team_id,
                    player_id: slot.player_id,
                    match_id: m.id,
                    points: breakdown.total,
                    breakdown,
                    created_at: now,
                }
            })
            .collect();

        if records.is_empty() {
            return Ok(TeamScoreOutcome::NoOverlap);
        }

        let delta: Decimal = records.iter().map(|r| r.points).sum();
        let score = TeamMatchScore { team_id, match_id: m.id, delta, records };
        let repo = &self.repo;
        let applied = self
            .boundary
            .call("apply_team_score", || repo.apply_team_score(score.clone()))
            .await?;

        Ok(if applied { TeamScoreOutcome::Applied { delta } } else { TeamScoreOutcome::AlreadyApplied })
    }
}

/// One performance per player; later duplicates are dropped
fn collapse_performances(
    match_id: MatchId,
    performances: &[PlayerPerformance],
) -> HashMap<PlayerId, &PlayerPerformance> {
    let mut by_player = HashMap::with_capacity(performances.len());
    for perf in performances {
        match by_player.entry(perf.player_id) {
            Entry::Vacant(slot) => {
                slot.insert(perf);
            }
            Entry::Occupied(_) => {
                warn!(match_id, player_id = perf.player_id, "Duplicate performance record ignored");
            }
        }
    }
    by_player
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_duplicate_performances_keep_first() {
        let perfs = vec![
            PlayerPerformance { player_id: 1, points: dec!(5), aces: 0, winning_shots: 0, faults: 0 },
            PlayerPerformance { player_id: 1, points: dec!(50), aces: 0, winning_shots: 0, faults: 0 },
            PlayerPerformance { player_id: 2, points: dec!(3), aces: 0, winning_shots: 0, faults: 0 },
        ];
        let collapsed = collapse_performances(1, &perfs);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[&1].points, dec!(5));
    }

    #[test]
    fn test_report_helpers() {
        let report = ScoringReport {
            match_id: 1,
            processed: true,
            teams: vec![
                (1, Ok(TeamScoreOutcome::Applied { delta: dec!(4) })),
                (2, Err(FantasyError::infrastructure("down"))),
                (3, Ok(TeamScoreOutcome::NoOverlap)),
            ],
            ..Default::default()
        };
        assert_eq!(report.failed_team_ids(), vec![2]);
        assert_eq!(report.applied_count(), 1);
        assert_eq!(report.outcome_for(3), Some(&Ok(TeamScoreOutcome::NoOverlap)));
    }
}
