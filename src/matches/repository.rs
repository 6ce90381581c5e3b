use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::models::{
    MatchModel, NewMatch, ParticipationModel, ParticipationRow, RosterEntry,
};
use crate::db::{is_foreign_key_violation, InMemoryDatabase};
use crate::shared::AppError;
use crate::user::repository::ADD_MATCH_PLAYED_SQL;

/// Trait for match persistence
///
/// `create_with_roster` writes the match, one participation per roster entry and
/// the `matches_played` bump for every rostered account as a single unit.
#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn create_with_roster(
        &self,
        new_match: &NewMatch,
        roster: &[RosterEntry],
    ) -> Result<(MatchModel, Vec<ParticipationModel>), AppError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<MatchModel>, AppError>;
    async fn participations_for(&self, match_id: i64)
        -> Result<Vec<ParticipationModel>, AppError>;
}

/// In-memory implementation of MatchRepository for development and testing
pub struct InMemoryMatchRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryMatchRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MatchRepository for InMemoryMatchRepository {
    #[instrument(skip(self, new_match, roster), fields(roster_size = roster.len()))]
    async fn create_with_roster(
        &self,
        new_match: &NewMatch,
        roster: &[RosterEntry],
    ) -> Result<(MatchModel, Vec<ParticipationModel>), AppError> {
        let mut tables = self.db.write().await;

        // Reject before the first write so a failure leaves nothing behind
        if let Some(missing) = roster
            .iter()
            .find(|entry| !tables.accounts.contains_key(&entry.account_id))
        {
            return Err(AppError::Validation(format!(
                "account {} does not exist",
                missing.account_id
            )));
        }

        let match_model = tables.insert_match(new_match.clone().into_model(0, Utc::now()));
        for entry in roster {
            tables.insert_participation(ParticipationModel {
                id: 0,
                account_id: entry.account_id,
                match_id: match_model.id,
                side: entry.side,
            });
        }

        let account_ids: Vec<i64> = roster.iter().map(|entry| entry.account_id).collect();
        let touched = tables.add_match_played(&account_ids);
        info!(match_id = match_model.id, touched, "Match stored with roster");

        let participations = tables
            .participations
            .iter()
            .filter(|p| p.match_id == match_model.id)
            .cloned()
            .collect();
        Ok((match_model, participations))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<MatchModel>, AppError> {
        Ok(self.db.read().await.matches.get(&id).cloned())
    }

    async fn participations_for(
        &self,
        match_id: i64,
    ) -> Result<Vec<ParticipationModel>, AppError> {
        let tables = self.db.read().await;
        Ok(tables
            .participations
            .iter()
            .filter(|p| p.match_id == match_id)
            .cloned()
            .collect())
    }
}

/// PostgreSQL implementation of match repository
pub struct PostgresMatchRepository {
    pool: PgPool,
}

impl PostgresMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn roster_error(e: sqlx::Error) -> AppError {
    if is_foreign_key_violation(&e) {
        return AppError::Validation("roster references an unknown account".to_string());
    }
    warn!(error = %e, "Failed to store match");
    AppError::DatabaseError(e.to_string())
}

fn rows_into_participations(
    rows: Vec<ParticipationRow>,
) -> Result<Vec<ParticipationModel>, AppError> {
    rows.into_iter().map(ParticipationModel::try_from).collect()
}

#[async_trait]
impl MatchRepository for PostgresMatchRepository {
    #[instrument(skip(self, new_match, roster), fields(roster_size = roster.len()))]
    async fn create_with_roster(
        &self,
        new_match: &NewMatch,
        roster: &[RosterEntry],
    ) -> Result<(MatchModel, Vec<ParticipationModel>), AppError> {
        let mut tx = self.pool.begin().await.map_err(roster_error)?;

        let match_model = sqlx::query_as::<_, MatchModel>(
            "INSERT INTO matches (competition, home_team, away_team) VALUES ($1, $2, $3) \
             RETURNING id, competition, home_team, away_team, created_at",
        )
        .bind(&new_match.competition)
        .bind(&new_match.home_team)
        .bind(&new_match.away_team)
        .fetch_one(&mut *tx)
        .await
        .map_err(roster_error)?;

        let account_ids: Vec<i64> = roster.iter().map(|entry| entry.account_id).collect();
        let sides: Vec<String> = roster
            .iter()
            .map(|entry| entry.side.as_str().to_string())
            .collect();

        let rows = sqlx::query_as::<_, ParticipationRow>(
            "INSERT INTO participations (match_id, account_id, side) \
             SELECT $1, account_id, side FROM UNNEST($2::bigint[], $3::varchar[]) AS r(account_id, side) \
             RETURNING id, account_id, match_id, side",
        )
        .bind(match_model.id)
        .bind(&account_ids)
        .bind(&sides)
        .fetch_all(&mut *tx)
        .await
        .map_err(roster_error)?;

        let touched = sqlx::query(ADD_MATCH_PLAYED_SQL)
            .bind(&account_ids)
            .execute(&mut *tx)
            .await
            .map_err(roster_error)?
            .rows_affected();

        tx.commit().await.map_err(roster_error)?;
        info!(match_id = match_model.id, touched, "Match stored with roster");

        Ok((match_model, rows_into_participations(rows)?))
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> Result<Option<MatchModel>, AppError> {
        sqlx::query_as::<_, MatchModel>(
            "SELECT id, competition, home_team, away_team, created_at FROM matches WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch match");
            AppError::DatabaseError(e.to_string())
        })
    }

    #[instrument(skip(self))]
    async fn participations_for(
        &self,
        match_id: i64,
    ) -> Result<Vec<ParticipationModel>, AppError> {
        let rows = sqlx::query_as::<_, ParticipationRow>(
            "SELECT id, account_id, match_id, side FROM participations \
             WHERE match_id = $1 ORDER BY id",
        )
        .bind(match_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch participations");
            AppError::DatabaseError(e.to_string())
        })?;

        rows_into_participations(rows)
    }
}
