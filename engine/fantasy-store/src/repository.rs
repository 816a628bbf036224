//! PostgreSQL implementation of the engine's persistence boundary

use fantasy_engine::prize::{PrizeRule, PrizeScope};
use fantasy_engine::rules::ContestRules;
use fantasy_engine::types::{
    Contest, ContestId, ContestStatus, FantasyTeam, FantasyTeamPlayer, Match, MatchId, NewTeam,
    Player, PlayerId, PlayerMatchPoints, TeamId, TeamMatchScore, TeamUpdate, TeamWithRoster,
    Tournament, TournamentId, UserId,
};
use fantasy_engine::{FantasyError, FantasyRepository, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{db_error, is_unique_violation, StoreError};
use crate::rows::{
    scope_columns, ContestRow, MatchRow, PlayerRow, PointsRow, PrizeRuleRow, TeamPlayerRow, TeamRow,
    TournamentRow,
};

const TEAM_COLUMNS: &str = "id, user_id, contest_id, name, total_points, rank, live_edit_count, \
     last_edit_date, edits_on_last_edit_date, created_at, updated_at";

const CONTEST_COLUMNS: &str = "id, tournament_id, name, status, prize_pool, entry_fee, max_entries, \
     current_entries, rules, created_at";

pub struct PgRepository {
    pool: PgPool,
    default_rules: ContestRules,
}

impl PgRepository {
    /// Connect a pool using the store configuration
    pub async fn connect(config: &StoreConfig, default_rules: ContestRules) -> std::result::Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await?;
        info!(max_connections = config.max_connections, "Connected to fantasy database");
        Ok(Self::from_pool(pool, default_rules))
    }

    pub fn from_pool(pool: PgPool, default_rules: ContestRules) -> Self {
        Self { pool, default_rules }
    }

    /// Apply embedded migrations
    pub async fn migrate(&self) -> std::result::Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Fantasy schema migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn rosters_for<'e, E>(
        &self,
        conn: E,
        team_ids: &[TeamId],
    ) -> Result<HashMap<TeamId, Vec<FantasyTeamPlayer>>>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<TeamPlayerRow> = sqlx::query_as(
            "SELECT team_id, player_id, is_captain, is_vice_captain FROM fantasy_team_players \
             WHERE team_id = ANY($1) ORDER BY team_id, is_captain DESC, is_vice_captain DESC, player_id",
        )
        .bind(team_ids)
        .fetch_all(conn)
        .await
        .map_err(db_error)?;

        let mut rosters: HashMap<TeamId, Vec<FantasyTeamPlayer>> = HashMap::new();
        for row in &rows {
            rosters.entry(row.team_id).or_default().push(row.into());
        }
        Ok(rosters)
    }

    async fn with_rosters(&self, rows: Vec<TeamRow>) -> Result<Vec<TeamWithRoster>> {
        let ids: Vec<TeamId> = rows.iter().map(|r| r.id).collect();
        let mut rosters = self.rosters_for(&self.pool, &ids).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let roster = rosters.remove(&row.id).unwrap_or_default();
                TeamWithRoster { team: FantasyTeam::from(row), roster }
            })
            .collect())
    }
}

async fn insert_roster(
    tx: &mut Transaction<'_, Postgres>,
    team_id: TeamId,
    roster: &[FantasyTeamPlayer],
) -> Result<()> {
    for slot in roster {
        sqlx::query(
            "INSERT INTO fantasy_team_players (team_id, player_id, is_captain, is_vice_captain) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(team_id)
        .bind(slot.player_id)
        .bind(slot.is_captain)
        .bind(slot.is_vice_captain)
        .execute(&mut **tx)
        .await
        .map_err(db_error)?;
    }
    Ok(())
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait::async_trait]
impl FantasyRepository for PgRepository {
    async fn get_tournament(&self, tournament_id: TournamentId) -> Result<Option<Tournament>> {
        let row: Option<TournamentRow> = sqlx::query_as(
            "SELECT id, name, start_date, end_date, status FROM tournaments WHERE id = $1",
        )
        .bind(tournament_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(Tournament::try_from).transpose()
    }

    async fn get_contest(&self, contest_id: ContestId) -> Result<Option<Contest>> {
        let row: Option<ContestRow> =
            sqlx::query_as(&format!("SELECT {} FROM contests WHERE id = $1", CONTEST_COLUMNS))
                .bind(contest_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        row.map(|r| r.into_contest(&self.default_rules)).transpose()
    }

    async fn contests_for_tournament(
        &self,
        tournament_id: TournamentId,
        status: Option<ContestStatus>,
    ) -> Result<Vec<Contest>> {
        let rows: Vec<ContestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM contests WHERE tournament_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY id",
            CONTEST_COLUMNS
        ))
        .bind(tournament_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(|r| r.into_contest(&self.default_rules)).collect()
    }

    async fn get_players(&self, player_ids: &[PlayerId]) -> Result<Vec<Player>> {
        let rows: Vec<PlayerRow> =
            sqlx::query_as("SELECT id, name, rank, price FROM players WHERE id = ANY($1) ORDER BY id")
                .bind(player_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(rows.into_iter().map(Player::from).collect())
    }

    async fn get_match(&self, match_id: MatchId) -> Result<Option<Match>> {
        let row: Option<MatchRow> = sqlx::query_as(
            "SELECT id, tournament_id, status, side_a_player_ids, side_a_score, side_b_player_ids, \
             side_b_score FROM matches WHERE id = $1",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.map(Match::try_from).transpose()
    }

    async fn create_team(&self, new: NewTeam) -> Result<TeamWithRoster> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let max_entries: Option<i32> =
            sqlx::query_scalar("SELECT max_entries FROM contests WHERE id = $1")
                .bind(new.contest_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_error)?;
        let max_entries = max_entries.ok_or(FantasyError::ContestNotFound { contest_id: new.contest_id })?;

        let duplicate: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM fantasy_teams WHERE user_id = $1 AND contest_id = $2)",
        )
        .bind(new.user_id)
        .bind(new.contest_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        if duplicate {
            return Err(FantasyError::DuplicateTeam { user_id: new.user_id, contest_id: new.contest_id });
        }

        let taken = sqlx::query(
            "UPDATE contests SET current_entries = current_entries + 1 \
             WHERE id = $1 AND current_entries < max_entries",
        )
        .bind(new.contest_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
        if taken.rows_affected() == 0 {
            return Err(FantasyError::ContestFull {
                contest_id: new.contest_id,
                max_entries: u32::try_from(max_entries).unwrap_or(0),
            });
        }

        let row: TeamRow = sqlx::query_as(&format!(
            "INSERT INTO fantasy_teams (user_id, contest_id, name, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4) RETURNING {}",
            TEAM_COLUMNS
        ))
        .bind(new.user_id)
        .bind(new.contest_id)
        .bind(&new.name)
        .bind(new.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                FantasyError::DuplicateTeam { user_id: new.user_id, contest_id: new.contest_id }
            } else {
                db_error(e)
            }
        })?;

        insert_roster(&mut tx, row.id, &new.roster).await?;
        tx.commit().await.map_err(db_error)?;

        debug!(team_id = row.id, contest_id = new.contest_id, "Inserted fantasy team");
        Ok(TeamWithRoster { team: FantasyTeam::from(row), roster: new.roster })
    }

    async fn replace_team(&self, update: TeamUpdate) -> Result<TeamWithRoster> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // the ledger guard makes authorisation and write one atomic step
        let row: Option<TeamRow> = sqlx::query_as(&format!(
            "UPDATE fantasy_teams SET name = COALESCE($2, name), live_edit_count = $3, \
             last_edit_date = $4, edits_on_last_edit_date = $5, updated_at = $6 \
             WHERE id = $1 AND live_edit_count = $7 \
             AND last_edit_date IS NOT DISTINCT FROM $8 AND edits_on_last_edit_date = $9 \
             RETURNING {}",
            TEAM_COLUMNS
        ))
        .bind(update.team_id)
        .bind(update.name.as_deref())
        .bind(to_i32(update.edits.live_edit_count))
        .bind(update.edits.last_edit_date)
        .bind(to_i32(update.edits.edits_on_last_edit_date))
        .bind(update.updated_at)
        .bind(to_i32(update.expected_edits.live_edit_count))
        .bind(update.expected_edits.last_edit_date)
        .bind(to_i32(update.expected_edits.edits_on_last_edit_date))
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?;

        let row = match row {
            Some(row) => row,
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM fantasy_teams WHERE id = $1)")
                        .bind(update.team_id)
                        .fetch_one(&mut *tx)
                        .await
                        .map_err(db_error)?;
                return Err(if exists {
                    FantasyError::EditConflict { team_id: update.team_id }
                } else {
                    FantasyError::TeamNotFound { team_id: update.team_id }
                });
            }
        };

        if let Some(roster) = &update.roster {
            sqlx::query("DELETE FROM fantasy_team_players WHERE team_id = $1")
                .bind(update.team_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
            insert_roster(&mut tx, update.team_id, roster).await?;
        }

        let mut rosters = self.rosters_for(&mut *tx, &[update.team_id]).await?;
        tx.commit().await.map_err(db_error)?;

        let roster = rosters.remove(&update.team_id).unwrap_or_default();
        Ok(TeamWithRoster { team: FantasyTeam::from(row), roster })
    }

    async fn get_team(&self, team_id: TeamId) -> Result<Option<TeamWithRoster>> {
        let row: Option<TeamRow> =
            sqlx::query_as(&format!("SELECT {} FROM fantasy_teams WHERE id = $1", TEAM_COLUMNS))
                .bind(team_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        match row {
            Some(row) => Ok(self.with_rosters(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn teams_for_user(&self, user_id: UserId) -> Result<Vec<TeamWithRoster>> {
        let rows: Vec<TeamRow> = sqlx::query_as(&format!(
            "SELECT {} FROM fantasy_teams WHERE user_id = $1 ORDER BY id",
            TEAM_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        self.with_rosters(rows).await
    }

    async fn teams_for_contest(&self, contest_id: ContestId) -> Result<Vec<TeamWithRoster>> {
        let rows: Vec<TeamRow> = sqlx::query_as(&format!(
            "SELECT {} FROM fantasy_teams WHERE contest_id = $1 ORDER BY id",
            TEAM_COLUMNS
        ))
        .bind(contest_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        self.with_rosters(rows).await
    }

    async fn apply_team_score(&self, score: TeamMatchScore) -> Result<bool> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // row lock serialises concurrent deliveries for the same team
        let locked: Option<i64> = sqlx::query_scalar("SELECT id FROM fantasy_teams WHERE id = $1 FOR UPDATE")
            .bind(score.team_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_error)?;
        if locked.is_none() {
            return Err(FantasyError::TeamNotFound { team_id: score.team_id });
        }

        let applied: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM player_match_points WHERE team_id = $1 AND match_id = $2)",
        )
        .bind(score.team_id)
        .bind(score.match_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;
        if applied {
            return Ok(false);
        }

        for record in &score.records {
            sqlx::query(
                "INSERT INTO player_match_points (team_id, match_id, player_id, points, breakdown, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(record.team_id)
            .bind(record.match_id)
            .bind(record.player_id)
            .bind(record.points)
            .bind(serde_json::to_value(&record.breakdown)?)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        sqlx::query(
            "UPDATE fantasy_teams SET total_points = total_points + $2 WHERE id = $1",
        )
        .bind(score.team_id)
        .bind(score.delta)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(true)
    }

    async fn points_for_team(&self, team_id: TeamId) -> Result<Vec<PlayerMatchPoints>> {
        let rows: Vec<PointsRow> = sqlx::query_as(
            "SELECT team_id, player_id, match_id, points, breakdown, created_at \
             FROM player_match_points WHERE team_id = $1 ORDER BY match_id, player_id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.into_iter().map(PlayerMatchPoints::try_from).collect()
    }

    async fn update_ranks(&self, contest_id: ContestId, ranks: &[(TeamId, u32)]) -> Result<()> {
        let ids: Vec<i64> = ranks.iter().map(|(id, _)| *id).collect();
        let positions: Vec<i32> = ranks.iter().map(|(_, rank)| to_i32(*rank)).collect();

        sqlx::query(
            "UPDATE fantasy_teams AS t SET rank = r.rank \
             FROM UNNEST($1::bigint[], $2::int[]) AS r(id, rank) \
             WHERE t.id = r.id AND t.contest_id = $3",
        )
        .bind(&ids)
        .bind(&positions)
        .bind(contest_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn prize_rules(&self, scope: PrizeScope) -> Result<Vec<PrizeRule>> {
        let (kind, id) = scope_columns(scope);
        let rows: Vec<PrizeRuleRow> = sqlx::query_as(
            "SELECT rank, percentage, min_players FROM prize_rules \
             WHERE scope = $1 AND scope_id = $2 ORDER BY rank",
        )
        .bind(kind)
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(PrizeRule::from).collect())
    }

    async fn replace_prize_rules(&self, scope: PrizeScope, rules: &[PrizeRule]) -> Result<()> {
        let (kind, id) = scope_columns(scope);
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query("DELETE FROM prize_rules WHERE scope = $1 AND scope_id = $2")
            .bind(kind)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        for rule in rules {
            sqlx::query(
                "INSERT INTO prize_rules (scope, scope_id, rank, percentage, min_players) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(kind)
            .bind(id)
            .bind(to_i32(rule.rank))
            .bind(rule.percentage)
            .bind(to_i32(rule.min_players))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(())
    }
}
