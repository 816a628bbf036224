//! Contest ranking

use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

use crate::boundary::Boundary;
use crate::error::{FantasyError, Result};
use crate::repository::FantasyRepository;
use crate::types::{ContestId, FantasyTeam, TeamId};

/// Leaderboard order: points descending, then earlier creation, then lower id
pub fn leaderboard_order(a: &FantasyTeam, b: &FantasyTeam) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// 1-based rank for every team, one distinct rank per team
pub fn compute_ranks<'a>(teams: impl IntoIterator<Item = &'a FantasyTeam>) -> Vec<(TeamId, u32)> {
    let mut ordered: Vec<&FantasyTeam> = teams.into_iter().collect();
    ordered.sort_by(|a, b| leaderboard_order(a, b));
    ordered.iter().enumerate().map(|(i, team)| (team.id, i as u32 + 1)).collect()
}

/// Recomputes and persists ranks for a contest
pub struct RankingUpdater {
    repo: Arc<dyn FantasyRepository>,
    boundary: Boundary,
}

impl RankingUpdater {
    pub fn new(repo: Arc<dyn FantasyRepository>, boundary: Boundary) -> Self {
        Self { repo, boundary }
    }

    /// Rewrite the rank of every team in the contest
    pub async fn refresh_ranks(&self, contest_id: ContestId) -> Result<Vec<(TeamId, u32)>> {
        let repo = &self.repo;
        self.boundary
            .call("get_contest", || repo.get_contest(contest_id))
            .await?
            .ok_or(FantasyError::ContestNotFound { contest_id })?;

        let teams = self
            .boundary
            .call("teams_for_contest", || repo.teams_for_contest(contest_id))
            .await?;
        let ranks = compute_ranks(teams.iter().map(|t| &t.team));
        let ranks_ref = &ranks[..];

        self.boundary
            .call("update_ranks", || repo.update_ranks(contest_id, ranks_ref))
            .await?;

        debug!(contest_id, ?ranks, "Persisted ranks");
        info!(contest_id, teams = ranks.len(), "Refreshed contest ranks");
        Ok(ranks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EditLedger;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn team(id: TeamId, points: Decimal, created_at: DateTime<Utc>) -> FantasyTeam {
        FantasyTeam {
            id,
            user_id: id,
            contest_id: 1,
            name: format!("team-{}", id),
            total_points: points,
            rank: None,
            edits: EditLedger::default(),
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn test_ranks_by_points_descending() {
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let teams = vec![team(1, dec!(10), t0), team(2, dec!(30), t0), team(3, dec!(20), t0)];
        assert_eq!(compute_ranks(&teams), vec![(2, 1), (3, 2), (1, 3)]);
    }

    #[test]
    fn test_ties_break_on_creation_then_id() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let teams = vec![
            team(4, dec!(50), late),
            team(9, dec!(50), early),
            team(2, dec!(50), late),
            team(1, dec!(10), early),
        ];
        assert_eq!(compute_ranks(&teams), vec![(9, 1), (2, 2), (4, 3), (1, 4)]);
    }

    #[test]
    fn test_empty_contest() {
        assert!(compute_ranks(&Vec::<FantasyTeam>::new()).is_empty());
    }
}
