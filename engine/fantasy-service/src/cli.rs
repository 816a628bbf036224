//! # Command Line Interface
//!
//! Operator commands for scoring, ranking and prize settlement.

use clap::{Parser, Subcommand, ValueEnum};
use fantasy_engine::types::{ContestId, MatchId, TeamId};
use fantasy_engine::PrizeScope;
use std::path::PathBuf;

/// Fantasy contest operator CLI
#[derive(Parser, Debug)]
#[command(name = "fantasy-admin")]
#[command(about = "Operate fantasy contests: scoring, rankings and prizes")]
#[command(version)]
pub struct Cli {
    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a completed match to every in-progress contest of its tournament
    ScoreMatch {
        #[arg(long)]
        match_id: MatchId,
        /// JSON array of player performances
        #[arg(long)]
        performances: PathBuf,
    },
    /// Recompute and persist the ranks of a contest
    RefreshRanks {
        #[arg(long)]
        contest_id: ContestId,
    },
    /// Replace the prize rules of a scope
    SetPrizeRules {
        #[arg(long, value_enum)]
        scope: ScopeArg,
        #[arg(long)]
        id: i64,
        /// JSON array of prize rules
        #[arg(long)]
        rules: PathBuf,
    },
    /// Show the prize rules of a scope
    PrizeRules {
        #[arg(long, value_enum)]
        scope: ScopeArg,
        #[arg(long)]
        id: i64,
    },
    /// Compute payouts for a contest
    ResolvePrizes {
        #[arg(long)]
        contest_id: ContestId,
    },
    /// Show a team with its roster and points trail
    Team {
        #[arg(long)]
        team_id: TeamId,
    },
    /// Show a contest's teams in rank order
    Leaderboard {
        #[arg(long)]
        contest_id: ContestId,
    },
    /// Apply database migrations
    Migrate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Contest,
    Tournament,
}

impl ScopeArg {
    pub fn with_id(self, id: i64) -> PrizeScope {
        match self {
            ScopeArg::Contest => PrizeScope::Contest(id),
            ScopeArg::Tournament => PrizeScope::Tournament(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score_match() {
        let cli = Cli::try_parse_from([
            "fantasy-admin",
            "score-match",
            "--match-id",
            "42",
            "--performances",
            "perf.json",
        ])
        .unwrap();
        match cli.command {
            Commands::ScoreMatch { match_id, performances } => {
                assert_eq!(match_id, 42);
                assert_eq!(performances, PathBuf::from("perf.json"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_prize_scope() {
        let cli = Cli::try_parse_from([
            "fantasy-admin",
            "--config",
            "fantasy.toml",
            "prize-rules",
            "--scope",
            "tournament",
            "--id",
            "7",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("fantasy.toml")));
        match cli.command {
            Commands::PrizeRules { scope, id } => {
                assert_eq!(scope.with_id(id), PrizeScope::Tournament(7));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_scope() {
        let parsed = Cli::try_parse_from([
            "fantasy-admin",
            "prize-rules",
            "--scope",
            "league",
            "--id",
            "1",
        ]);
        assert!(parsed.is_err());
    }
}
