//! Edit-window state machine
//!
//! Whether a team may change is decided from the wall clock, the tournament's
//! dates and status, the contest's status and its rules:
//!
//! | state               | when                                                    | roster edits |
//! |---------------------|---------------------------------------------------------|--------------|
//! | `OPEN_FULL`         | before the tournament starts                            | any          |
//! | `LOCKED_ENDED`      | tournament over or completed, contest closed            | none         |
//! | `LOCKED_DISALLOWED` | tournament running, `allowTeamChanges = false`          | none         |
//! | `OPEN_LIMITED`      | tournament running, `allowTeamChanges = true`           | gated        |
//!
//! In `OPEN_LIMITED` an edit must fall inside the local change window, respect the
//! change frequency, and introduce at most `maxPlayersToChange` new players.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, info};

use crate::config::EditWindowConfig;
use crate::error::{FantasyError, Result};
use crate::roster::introduced_players;
use crate::rules::ChangeFrequency;
use crate::types::{Contest, EditLedger, RosterSelection, TeamWithRoster, Tournament, TournamentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EditWindowState {
    OpenFull,
    OpenLimited,
    LockedEnded,
    LockedDisallowed,
}

impl fmt::Display for EditWindowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EditWindowState::OpenFull => "OPEN_FULL",
            EditWindowState::OpenLimited => "OPEN_LIMITED",
            EditWindowState::LockedEnded => "LOCKED_ENDED",
            EditWindowState::LockedDisallowed => "LOCKED_DISALLOWED",
        };
        f.write_str(s)
    }
}

/// Current edit state of a contest
pub fn resolve_state(now: DateTime<Utc>, tournament: &Tournament, contest: &Contest) -> EditWindowState {
    if contest.status.is_closed() {
        EditWindowState::LockedEnded
    } else if now < tournament.start_date {
        EditWindowState::OpenFull
    } else if now > tournament.end_date || tournament.status == TournamentStatus::Completed {
        EditWindowState::LockedEnded
    } else if !contest.rules.allow_team_changes {
        EditWindowState::LockedDisallowed
    } else {
        EditWindowState::OpenLimited
    }
}

/// Outcome of an authorised edit
#[derive(Debug, Clone, PartialEq)]
pub struct EditDecision {
    pub state: EditWindowState,
    /// Whether the roster actually changes
    pub roster_changed: bool,
    /// Ledger to persist with the edit
    pub edits: EditLedger,
}

#[derive(Debug, Clone)]
pub struct EditPolicy {
    utc_offset: Duration,
}

impl Default for EditPolicy {
    fn default() -> Self {
        Self::new(&EditWindowConfig::default())
    }
}

impl EditPolicy {
    pub fn new(config: &EditWindowConfig) -> Self {
        Self { utc_offset: Duration::minutes(config.utc_offset_minutes as i64) }
    }

    /// Wall-clock time in the zone change windows are expressed in
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.naive_utc() + self.utc_offset
    }

    /// Decide whether `team` may take `new_roster` (or only a rename when `None`)
    pub fn authorize(
        &self,
        now: DateTime<Utc>,
        tournament: &Tournament,
        contest: &Contest,
        team: &TeamWithRoster,
        new_roster: Option<&[RosterSelection]>,
    ) -> Result<EditDecision> {
        let state = resolve_state(now, tournament, contest);
        let roster_changed = new_roster.map_or(false, |roster| !same_roster(&team.roster, roster));
        let mut edits = team.team.edits.clone();

        debug!(team_id = team.team.id, %state, roster_changed, "Authorising team edit");

        match state {
            EditWindowState::LockedEnded => return Err(FantasyError::TournamentAlreadyEnded),
            _ if !roster_changed => {}
            EditWindowState::OpenFull => {}
            EditWindowState::LockedDisallowed => {
                return Err(FantasyError::TeamChangesDisabled { contest_id: contest.id });
            }
            EditWindowState::OpenLimited => {
                let roster = new_roster.unwrap_or(&[]);
                let local = self.local_time(now);
                self.check_limited(contest, team, roster, local)?;
                edits.record(local.date());
            }
        }

        Ok(EditDecision { state, roster_changed, edits })
    }

    fn check_limited(
        &self,
        contest: &Contest,
        team: &TeamWithRoster,
        roster: &[RosterSelection],
        local: NaiveDateTime,
    ) -> Result<()> {
        let rules = &contest.rules;
        if !rules.window_contains(local.time()) {
            return Err(FantasyError::EditWindowClosed {
                window_start: rules.change_window_start.clone(),
                window_end: rules.change_window_end.clone(),
                now: local.format("%H:%M").to_string(),
            });
        }

        let ledger = &team.team.edits;
        let frequency = rules.change_frequency;
        match frequency {
            ChangeFrequency::None => {
                return Err(FantasyError::EditFrequencyExceeded {
                    frequency,
                    edits: ledger.live_edit_count,
                });
            }
            ChangeFrequency::Once if ledger.live_edit_count >= 1 => {
                return Err(FantasyError::EditFrequencyExceeded {
                    frequency,
                    edits: ledger.live_edit_count,
                });
            }
            ChangeFrequency::Daily => {
                let today = ledger.edits_on(local.date());
                if let Some(max) = rules.max_changes_per_day.filter(|max| today >= *max) {
                    debug!(team_id = team.team.id, today, max, "Daily edit cap reached");
                    return Err(FantasyError::EditFrequencyExceeded { frequency, edits: today });
                }
            }
            ChangeFrequency::Rounds => {
                info!(
                    team_id = team.team.id,
                    contest_id = contest.id,
                    "ROUNDS change frequency is not enforced per round yet, permitting edit"
                );
            }
            ChangeFrequency::Once => {}
        }

        let changed = introduced_players(&team.player_ids(), roster);
        if changed > rules.max_players_to_change as usize {
            return Err(FantasyError::EditChangeCountExceeded {
                changed,
                max: rules.max_players_to_change,
            });
        }
        Ok(())
    }
}

fn same_roster(old: &[RosterSelection], new: &[RosterSelection]) -> bool {
    old.len() == new.len() && old.iter().copied().collect::<HashSet<_>>() == new.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ContestRules;
    use crate::types::{FantasyTeam, FantasyTeamPlayer, Status};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, hour, minute, 0).unwrap()
    }

    fn tournament() -> Tournament {
        Tournament {
            id: 1,
            name: "Summer Open".into(),
            start_date: at(10, 9, 0),
            end_date: at(20, 18, 0),
            status: Status::InProgress,
        }
    }

    fn contest(rules: ContestRules) -> Contest {
        Contest {
            id: 5,
            tournament_id: 1,
            name: "Main".into(),
            status: Status::InProgress,
            prize_pool: dec!(10000),
            entry_fee: dec!(50),
            max_entries: 100,
            current_entries: 1,
            rules,
            created_at: at(1, 0, 0),
        }
    }

    fn limited(frequency: ChangeFrequency) -> ContestRules {
        ContestRules {
            team_size: 3,
            allow_team_changes: true,
            change_frequency: frequency,
            change_window_start: "08:00".into(),
            change_window_end: "20:00".into(),
            max_players_to_change: 1,
            ..Default::default()
        }
    }

    fn team(edits: EditLedger) -> TeamWithRoster {
        TeamWithRoster {
            team: FantasyTeam {
                id: 9,
                user_id: 1,
                contest_id: 5,
                name: "Aces".into(),
                total_points: dec!(0),
                rank: None,
                edits,
                created_at: at(1, 0, 0),
                updated_at: at(1, 0, 0),
            },
            roster: vec![
                FantasyTeamPlayer::captain(1),
                FantasyTeamPlayer::vice_captain(2),
                FantasyTeamPlayer::new(3),
            ],
        }
    }

    fn swap_one() -> Vec<RosterSelection> {
        vec![FantasyTeamPlayer::captain(1), FantasyTeamPlayer::vice_captain(2), FantasyTeamPlayer::new(4)]
    }

    fn swap_two() -> Vec<RosterSelection> {
        vec![FantasyTeamPlayer::captain(1), FantasyTeamPlayer::vice_captain(5), FantasyTeamPlayer::new(4)]
    }

    #[test]
    fn test_state_transitions() {
        let t = tournament();
        let open = contest(limited(ChangeFrequency::Daily));
        let closed_rules = contest(ContestRules::default());

        assert_eq!(resolve_state(at(9, 12, 0), &t, &open), EditWindowState::OpenFull);
        assert_eq!(resolve_state(at(12, 12, 0), &t, &open), EditWindowState::OpenLimited);
        assert_eq!(resolve_state(at(12, 12, 0), &t, &closed_rules), EditWindowState::LockedDisallowed);
        assert_eq!(resolve_state(at(21, 12, 0), &t, &open), EditWindowState::LockedEnded);

        let mut completed = t.clone();
        completed.status = Status::Completed;
        assert_eq!(resolve_state(at(12, 12, 0), &completed, &open), EditWindowState::LockedEnded);

        let mut cancelled = open.clone();
        cancelled.status = Status::Cancelled;
        assert_eq!(resolve_state(at(9, 12, 0), &t, &cancelled), EditWindowState::LockedEnded);
    }

    #[test]
    fn test_open_full_allows_any_edit_without_ledger() {
        let policy = EditPolicy::default();
        let decision = policy
            .authorize(at(9, 3, 0), &tournament(), &contest(ContestRules::default()), &team(EditLedger::default()), Some(&swap_two()))
            .unwrap();
        assert_eq!(decision.state, EditWindowState::OpenFull);
        assert!(decision.roster_changed);
        assert_eq!(decision.edits, EditLedger::default());
    }

    #[test]
    fn test_ended_rejects_everything_regardless_of_rules() {
        let policy = EditPolicy::default();
        for rules in [limited(ChangeFrequency::Daily), ContestRules::default()] {
            let c = contest(rules);
            let err = policy
                .authorize(at(21, 12, 0), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one()))
                .unwrap_err();
            assert_eq!(err, FantasyError::TournamentAlreadyEnded);

            let err = policy
                .authorize(at(21, 12, 0), &tournament(), &c, &team(EditLedger::default()), None)
                .unwrap_err();
            assert_eq!(err, FantasyError::TournamentAlreadyEnded);
        }
    }

    #[test]
    fn test_disallowed_rejects_roster_but_allows_rename() {
        let policy = EditPolicy::default();
        let c = contest(ContestRules::default());
        let err = policy
            .authorize(at(12, 12, 0), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one()))
            .unwrap_err();
        assert_eq!(err, FantasyError::TeamChangesDisabled { contest_id: 5 });

        let decision = policy
            .authorize(at(12, 12, 0), &tournament(), &c, &team(EditLedger::default()), None)
            .unwrap();
        assert!(!decision.roster_changed);
        assert_eq!(decision.state, EditWindowState::LockedDisallowed);
    }

    #[test]
    fn test_unchanged_roster_counts_as_rename() {
        let policy = EditPolicy::default();
        let c = contest(ContestRules::default());
        let mut same = team(EditLedger::default()).roster;
        same.reverse();
        let decision = policy
            .authorize(at(12, 12, 0), &tournament(), &c, &team(EditLedger::default()), Some(&same))
            .unwrap();
        assert!(!decision.roster_changed);
    }

    #[test]
    fn test_limited_window() {
        let policy = EditPolicy::default();
        let c = contest(limited(ChangeFrequency::Daily));
        let err = policy
            .authorize(at(12, 21, 30), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one()))
            .unwrap_err();
        assert_eq!(
            err,
            FantasyError::EditWindowClosed {
                window_start: "08:00".into(),
                window_end: "20:00".into(),
                now: "21:30".into()
            }
        );

        let decision = policy
            .authorize(at(12, 20, 0), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one()))
            .unwrap();
        assert_eq!(decision.state, EditWindowState::OpenLimited);
        assert_eq!(decision.edits.live_edit_count, 1);
    }

    #[test]
    fn test_window_uses_local_offset() {
        let policy = EditPolicy::new(&EditWindowConfig { utc_offset_minutes: 120 });
        let c = contest(limited(ChangeFrequency::Daily));
        // 19:30 UTC is 21:30 local
        assert!(matches!(
            policy.authorize(at(12, 19, 30), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one())),
            Err(FantasyError::EditWindowClosed { .. })
        ));
        // 06:30 UTC is 08:30 local
        assert!(policy
            .authorize(at(12, 6, 30), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one()))
            .is_ok());
    }

    #[test]
    fn test_change_count_cap() {
        let policy = EditPolicy::default();
        let c = contest(limited(ChangeFrequency::Daily));
        let err = policy
            .authorize(at(12, 12, 0), &tournament(), &c, &team(EditLedger::default()), Some(&swap_two()))
            .unwrap_err();
        assert_eq!(err, FantasyError::EditChangeCountExceeded { changed: 2, max: 1 });
    }

    #[test]
    fn test_once_allows_a_single_live_edit() {
        let policy = EditPolicy::default();
        let c = contest(limited(ChangeFrequency::Once));
        let first = policy
            .authorize(at(12, 12, 0), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one()))
            .unwrap();

        let err = policy
            .authorize(at(15, 12, 0), &tournament(), &c, &team(first.edits), Some(&swap_one()))
            .unwrap_err();
        assert_eq!(err, FantasyError::EditFrequencyExceeded { frequency: ChangeFrequency::Once, edits: 1 });
    }

    #[test]
    fn test_none_frequency_blocks_live_edits() {
        let policy = EditPolicy::default();
        let c = contest(limited(ChangeFrequency::None));
        assert!(matches!(
            policy.authorize(at(12, 12, 0), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one())),
            Err(FantasyError::EditFrequencyExceeded { frequency: ChangeFrequency::None, edits: 0 })
        ));
    }

    #[test]
    fn test_daily_is_unlimited_without_cap() {
        let policy = EditPolicy::default();
        let c = contest(limited(ChangeFrequency::Daily));
        let mut ledger = EditLedger::default();
        for _ in 0..5 {
            ledger = policy
                .authorize(at(12, 12, 0), &tournament(), &c, &team(ledger), Some(&swap_one()))
                .unwrap()
                .edits;
        }
        assert_eq!(ledger.live_edit_count, 5);
        assert_eq!(ledger.edits_on(NaiveDate::from_ymd_opt(2026, 6, 12).unwrap()), 5);
    }

    #[test]
    fn test_daily_cap_resets_next_day() {
        let policy = EditPolicy::default();
        let mut rules = limited(ChangeFrequency::Daily);
        rules.max_changes_per_day = Some(1);
        let c = contest(rules);

        let ledger = policy
            .authorize(at(12, 12, 0), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one()))
            .unwrap()
            .edits;
        assert!(matches!(
            policy.authorize(at(12, 13, 0), &tournament(), &c, &team(ledger.clone()), Some(&swap_one())),
            Err(FantasyError::EditFrequencyExceeded { frequency: ChangeFrequency::Daily, edits: 1 })
        ));
        assert!(policy
            .authorize(at(13, 9, 0), &tournament(), &c, &team(ledger), Some(&swap_one()))
            .is_ok());
    }

    #[test]
    fn test_rounds_is_permitted() {
        let policy = EditPolicy::default();
        let c = contest(limited(ChangeFrequency::Rounds));
        assert!(policy
            .authorize(at(12, 12, 0), &tournament(), &c, &team(EditLedger::default()), Some(&swap_one()))
            .is_ok());
    }
}
