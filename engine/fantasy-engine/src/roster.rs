//! Roster validation against contest rules
//!
//! Validation is pure: it receives the candidate roster, the effective rules and the
//! cost of each selected player, and reports every violated constraint.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::PricingConfig;
use crate::error::FantasyError;
use crate::rules::ContestRules;
use crate::types::{Player, PlayerId, RosterSelection};

/// Maps a player to the cost charged against the wallet
pub trait PlayerPricing: Send + Sync {
    fn cost(&self, player: &Player) -> Decimal;
}

/// Explicit price when configured, otherwise `max(numerator / rank, floor)`
#[derive(Debug, Clone)]
pub struct RankPricing {
    config: PricingConfig,
}

impl RankPricing {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }
}

impl Default for RankPricing {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

impl PlayerPricing for RankPricing {
    fn cost(&self, player: &Player) -> Decimal {
        if let Some(price) = player.price {
            return price;
        }
        match player.rank {
            Some(rank) if rank > 0 => {
                (self.config.rank_numerator / Decimal::from(rank)).max(self.config.floor)
            }
            _ => self.config.floor,
        }
    }
}

/// A single violated roster constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RosterViolation {
    Size { expected: u32, actual: usize },
    SingleCaptain { found: usize },
    SingleViceCaptain { found: usize },
    DistinctRoles { player_id: PlayerId },
    Budget { total_cost: Decimal, wallet_size: Decimal },
    DuplicateEntry { player_id: PlayerId },
    UnknownPlayer { player_id: PlayerId },
}

impl RosterViolation {
    /// Name of the violated check
    pub fn kind(&self) -> &'static str {
        match self {
            RosterViolation::Size { .. } => "size",
            RosterViolation::SingleCaptain { .. } => "single-captain",
            RosterViolation::SingleViceCaptain { .. } => "single-vice-captain",
            RosterViolation::DistinctRoles { .. } => "distinct-roles",
            RosterViolation::Budget { .. } => "budget",
            RosterViolation::DuplicateEntry { .. } => "duplicate-entry",
            RosterViolation::UnknownPlayer { .. } => "unknown-player",
        }
    }
}

impl From<RosterViolation> for FantasyError {
    fn from(violation: RosterViolation) -> Self {
        match violation {
            RosterViolation::Size { expected, actual } => {
                FantasyError::RosterSizeInvalid { expected, actual }
            }
            RosterViolation::SingleCaptain { found } => FantasyError::CaptainRequired { found },
            RosterViolation::SingleViceCaptain { found } => {
                FantasyError::ViceCaptainRequired { found }
            }
            RosterViolation::DistinctRoles { player_id } => {
                FantasyError::CaptainViceCaptainSame { player_id }
            }
            RosterViolation::Budget { total_cost, wallet_size } => {
                FantasyError::BudgetExceeded { total_cost, wallet_size }
            }
            RosterViolation::DuplicateEntry { player_id } => {
                FantasyError::DuplicatePlayerInRoster { player_id }
            }
            RosterViolation::UnknownPlayer { player_id } => FantasyError::PlayerNotFound { player_id },
        }
    }
}

/// Outcome of validating one candidate roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterReport {
    pub total_cost: Decimal,
    pub violations: Vec<RosterViolation>,
}

impl RosterReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// The total cost, or the first violation as a typed error
    pub fn into_result(self) -> Result<Decimal, FantasyError> {
        match self.violations.into_iter().next() {
            Some(violation) => Err(violation.into()),
            None => Ok(self.total_cost),
        }
    }
}

/// Check a candidate roster against the contest rules
///
/// `costs` must hold the cost of every selected player; a missing entry is reported
/// as an unknown player rather than priced at zero.
pub fn validate_roster(
    selections: &[RosterSelection],
    rules: &ContestRules,
    costs: &HashMap<PlayerId, Decimal>,
) -> RosterReport {
    let mut violations = Vec::new();

    if selections.len() != rules.team_size as usize {
        violations.push(RosterViolation::Size {
            expected: rules.team_size,
            actual: selections.len(),
        });
    }

    let mut seen = HashSet::with_capacity(selections.len());
    for selection in selections {
        if !seen.insert(selection.player_id) {
            violations.push(RosterViolation::DuplicateEntry { player_id: selection.player_id });
        }
    }

    let captains = selections.iter().filter(|s| s.is_captain).count();
    if captains != 1 {
        violations.push(RosterViolation::SingleCaptain { found: captains });
    }

    let vice_captains = selections.iter().filter(|s| s.is_vice_captain).count();
    if vice_captains != 1 {
        violations.push(RosterViolation::SingleViceCaptain { found: vice_captains });
    }

    for selection in selections.iter().filter(|s| s.is_captain && s.is_vice_captain) {
        violations.push(RosterViolation::DistinctRoles { player_id: selection.player_id });
    }

    let mut total_cost = Decimal::ZERO;
    for player_id in seen {
        match costs.get(&player_id) {
            Some(cost) => total_cost += *cost,
            None => violations.push(RosterViolation::UnknownPlayer { player_id }),
        }
    }
    if total_cost > rules.wallet_size {
        violations.push(RosterViolation::Budget { total_cost, wallet_size: rules.wallet_size });
    }

    RosterReport { total_cost, violations }
}

/// Number of players present in `new` but absent from `old`
pub fn introduced_players(old: &[PlayerId], new: &[RosterSelection]) -> usize {
    let old: HashSet<PlayerId> = old.iter().copied().collect();
    new.iter()
        .map(|s| s.player_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|id| !old.contains(id))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FantasyTeamPlayer;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn rules(team_size: u32, wallet: Decimal) -> ContestRules {
        ContestRules { team_size, wallet_size: wallet, ..Default::default() }
    }

    fn flat_costs(ids: impl IntoIterator<Item = PlayerId>, cost: Decimal) -> HashMap<PlayerId, Decimal> {
        ids.into_iter().map(|id| (id, cost)).collect()
    }

    fn roster(ids: &[PlayerId]) -> Vec<RosterSelection> {
        ids.iter()
            .enumerate()
            .map(|(i, &id)| match i {
                0 => FantasyTeamPlayer::captain(id),
                1 => FantasyTeamPlayer::vice_captain(id),
                _ => FantasyTeamPlayer::new(id),
            })
            .collect()
    }

    #[test]
    fn test_rank_pricing() {
        let pricing = RankPricing::default();
        let player = |rank, price| Player { id: 1, name: "p".into(), rank, price };

        assert_eq!(pricing.cost(&player(Some(1), None)), dec!(1000));
        assert_eq!(pricing.cost(&player(Some(2), None)), dec!(500));
        assert_eq!(pricing.cost(&player(Some(40), None)), dec!(500));
        assert_eq!(pricing.cost(&player(None, None)), dec!(500));
        assert_eq!(pricing.cost(&player(Some(0), None)), dec!(500));
        assert_eq!(pricing.cost(&player(Some(1), Some(dec!(12.5)))), dec!(12.5));
    }

    #[test]
    fn test_valid_roster() {
        let ids = [1, 2, 3, 4, 5, 6, 7];
        let report = validate_roster(&roster(&ids), &rules(7, dec!(7000)), &flat_costs(ids, dec!(1000)));
        assert!(report.is_valid());
        assert_eq!(report.total_cost, dec!(7000));
        assert_eq!(report.into_result().unwrap(), dec!(7000));
    }

    #[test]
    fn test_size_must_match_exactly() {
        let ids = [1, 2, 3];
        let report = validate_roster(&roster(&ids), &rules(7, dec!(100000)), &flat_costs(ids, dec!(1)));
        assert_eq!(report.violations, vec![RosterViolation::Size { expected: 7, actual: 3 }]);
        assert!(matches!(
            report.into_result(),
            Err(FantasyError::RosterSizeInvalid { expected: 7, actual: 3 })
        ));
    }

    #[test]
    fn test_missing_and_double_captains() {
        let ids = [1, 2, 3];
        let mut selections: Vec<_> = ids.iter().map(|&id| FantasyTeamPlayer::new(id)).collect();
        selections[1].is_vice_captain = true;
        let report = validate_roster(&selections, &rules(3, dec!(100)), &flat_costs(ids, dec!(1)));
        assert_eq!(report.violations, vec![RosterViolation::SingleCaptain { found: 0 }]);

        selections[0].is_captain = true;
        selections[2].is_captain = true;
        let report = validate_roster(&selections, &rules(3, dec!(100)), &flat_costs(ids, dec!(1)));
        assert_eq!(report.violations, vec![RosterViolation::SingleCaptain { found: 2 }]);
    }

    #[test]
    fn test_missing_vice_captain() {
        let ids = [1, 2, 3];
        let selections =
            vec![FantasyTeamPlayer::captain(1), FantasyTeamPlayer::new(2), FantasyTeamPlayer::new(3)];
        let report = validate_roster(&selections, &rules(3, dec!(100)), &flat_costs(ids, dec!(1)));
        assert!(matches!(report.into_result(), Err(FantasyError::ViceCaptainRequired { found: 0 })));
    }

    #[test]
    fn test_captain_and_vice_captain_must_differ() {
        let ids = [1, 2, 3];
        let selections = vec![
            FantasyTeamPlayer { player_id: 1, is_captain: true, is_vice_captain: true },
            FantasyTeamPlayer::new(2),
            FantasyTeamPlayer::new(3),
        ];
        let report = validate_roster(&selections, &rules(3, dec!(100)), &flat_costs(ids, dec!(1)));
        assert_eq!(report.violations, vec![RosterViolation::DistinctRoles { player_id: 1 }]);
        assert_eq!(report.violations[0].kind(), "distinct-roles");
    }

    #[test]
    fn test_duplicate_player() {
        let selections = vec![
            FantasyTeamPlayer::captain(1),
            FantasyTeamPlayer::vice_captain(2),
            FantasyTeamPlayer::new(2),
        ];
        let report = validate_roster(&selections, &rules(3, dec!(100)), &flat_costs([1, 2], dec!(1)));
        assert_eq!(report.violations, vec![RosterViolation::DuplicateEntry { player_id: 2 }]);
        assert!(matches!(
            report.into_result(),
            Err(FantasyError::DuplicatePlayerInRoster { player_id: 2 })
        ));
    }

    #[test]
    fn test_budget_exceeded_reports_both_amounts() {
        let ids = [1, 2, 3];
        let report = validate_roster(&roster(&ids), &rules(3, dec!(2999.99)), &flat_costs(ids, dec!(1000)));
        assert_eq!(
            report.violations,
            vec![RosterViolation::Budget { total_cost: dec!(3000), wallet_size: dec!(2999.99) }]
        );
    }

    #[test]
    fn test_budget_is_inclusive() {
        let ids = [1, 2, 3];
        let report = validate_roster(&roster(&ids), &rules(3, dec!(3000)), &flat_costs(ids, dec!(1000)));
        assert!(report.is_valid());
    }

    #[test]
    fn test_unknown_player_is_not_free() {
        let report =
            validate_roster(&roster(&[1, 2, 3]), &rules(3, dec!(100)), &flat_costs([1, 2], dec!(1)));
        assert_eq!(report.violations, vec![RosterViolation::UnknownPlayer { player_id: 3 }]);
        assert!(matches!(report.into_result(), Err(FantasyError::PlayerNotFound { player_id: 3 })));
    }

    #[test]
    fn test_all_violations_are_reported() {
        let selections = vec![FantasyTeamPlayer::new(1), FantasyTeamPlayer::new(1)];
        let report = validate_roster(&selections, &rules(3, dec!(0)), &flat_costs([1], dec!(5)));
        let kinds: Vec<_> = report.violations.iter().map(|v| v.kind()).collect();
        assert_eq!(kinds, vec!["size", "duplicate-entry", "single-captain", "single-vice-captain", "budget"]);
    }

    #[test]
    fn test_introduced_players() {
        let new = roster(&[1, 2, 8, 9]);
        assert_eq!(introduced_players(&[1, 2, 3, 4], &new), 2);
        assert_eq!(introduced_players(&[1, 2, 8, 9], &new), 0);
    }

    proptest! {
        #[test]
        fn prop_accepted_rosters_hold_the_invariant(
            picks in proptest::collection::vec((1i64..20, any::<bool>(), any::<bool>()), 0..9),
            team_size in 1u32..8,
            wallet in 0u32..10_000,
        ) {
            let selections: Vec<RosterSelection> = picks
                .iter()
                .map(|&(id, c, v)| FantasyTeamPlayer { player_id: id, is_captain: c, is_vice_captain: v })
                .collect();
            let costs: HashMap<PlayerId, Decimal> =
                (1i64..20).map(|id| (id, Decimal::from(id * 100))).collect();
            let rules = rules(team_size, Decimal::from(wallet));

            let report = validate_roster(&selections, &rules, &costs);
            if report.is_valid() {
                let captains: Vec<_> = selections.iter().filter(|s| s.is_captain).collect();
                let vices: Vec<_> = selections.iter().filter(|s| s.is_vice_captain).collect();
                prop_assert_eq!(captains.len(), 1);
                prop_assert_eq!(vices.len(), 1);
                prop_assert_ne!(captains[0].player_id, vices[0].player_id);
                prop_assert_eq!(selections.len(), team_size as usize);
                let total: Decimal = selections.iter().map(|s| costs[&s.player_id]).sum();
                prop_assert!(total <= rules.wallet_size);
            }
        }
    }
}
