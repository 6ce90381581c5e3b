use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::models::{NewStatEvent, StatEvent, StatEventRow};
use crate::db::{is_foreign_key_violation, is_numeric_out_of_range, InMemoryDatabase};
use crate::shared::AppError;
use crate::user::models::CounterDelta;

const STAT_COLUMNS: &str =
    "id, stat_uuid, stat_type, value, account_id, match_id, side, created_at";

/// Trait for stat event persistence
///
/// `record` inserts the event and applies the counter delta as one unit. A taken
/// `stat_uuid` yields `None` and leaves every row untouched.
#[async_trait]
pub trait StatRepository: Send + Sync {
    async fn find_by_token(&self, stat_uuid: &str) -> Result<Option<StatEvent>, AppError>;
    async fn record(
        &self,
        event: &NewStatEvent,
        delta: CounterDelta,
    ) -> Result<Option<StatEvent>, AppError>;
}

/// In-memory implementation of StatRepository for development and testing
pub struct InMemoryStatRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryStatRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StatRepository for InMemoryStatRepository {
    async fn find_by_token(&self, stat_uuid: &str) -> Result<Option<StatEvent>, AppError> {
        Ok(self.db.read().await.stat_by_token(stat_uuid).cloned())
    }

    #[instrument(skip(self, event), fields(stat_uuid = %event.stat_uuid))]
    async fn record(
        &self,
        event: &NewStatEvent,
        delta: CounterDelta,
    ) -> Result<Option<StatEvent>, AppError> {
        let mut tables = self.db.write().await;

        if tables.stat_by_token(&event.stat_uuid).is_some() {
            warn!("Stat token already taken");
            return Ok(None);
        }
        let Some(account) = tables.accounts.get(&event.account_id) else {
            return Err(AppError::Validation(format!(
                "account {} does not exist",
                event.account_id
            )));
        };
        if delta.applied_to(account).is_none() {
            return Err(AppError::Validation(
                "stat value would overflow the account's counters".to_string(),
            ));
        }
        if let Some(match_id) = event.match_id {
            if !tables.matches.contains_key(&match_id) {
                return Err(AppError::Validation(format!(
                    "match {} does not exist",
                    match_id
                )));
            }
        }

        let Some(stored) = tables.insert_stat(event.clone().into_model(0, Utc::now())) else {
            return Ok(None);
        };
        if !delta.is_zero() {
            tables.apply_counters(stored.account_id, &delta)?;
        }

        debug!(stat_id = stored.id, "Stat event stored");
        Ok(Some(stored))
    }
}

/// PostgreSQL implementation of stat repository
pub struct PostgresStatRepository {
    pool: PgPool,
}

impl PostgresStatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_error(e: sqlx::Error) -> AppError {
    if is_foreign_key_violation(&e) {
        return AppError::Validation("stat references an unknown account or match".to_string());
    }
    if is_numeric_out_of_range(&e) {
        return AppError::Validation("stat value would overflow the account's counters".to_string());
    }
    warn!(error = %e, "Failed to record stat event");
    AppError::DatabaseError(e.to_string())
}

#[async_trait]
impl StatRepository for PostgresStatRepository {
    #[instrument(skip(self))]
    async fn find_by_token(&self, stat_uuid: &str) -> Result<Option<StatEvent>, AppError> {
        let row = sqlx::query_as::<_, StatEventRow>(&format!(
            "SELECT {} FROM stat_events WHERE stat_uuid = $1",
            STAT_COLUMNS
        ))
        .bind(stat_uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch stat event");
            AppError::DatabaseError(e.to_string())
        })?;

        row.map(StatEvent::try_from).transpose()
    }

    #[instrument(skip(self, event), fields(stat_uuid = %event.stat_uuid))]
    async fn record(
        &self,
        event: &NewStatEvent,
        delta: CounterDelta,
    ) -> Result<Option<StatEvent>, AppError> {
        let mut tx = self.pool.begin().await.map_err(record_error)?;

        let inserted = sqlx::query_as::<_, StatEventRow>(&format!(
            "INSERT INTO stat_events (stat_uuid, stat_type, value, account_id, match_id, side) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (stat_uuid) DO NOTHING RETURNING {}",
            STAT_COLUMNS
        ))
        .bind(&event.stat_uuid)
        .bind(event.stat_kind.as_str())
        .bind(event.value)
        .bind(event.account_id)
        .bind(event.match_id)
        .bind(event.side.map(|side| side.as_str()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(record_error)?;

        let Some(row) = inserted else {
            warn!("Stat token already taken in database");
            return Ok(None);
        };

        if !delta.is_zero() {
            sqlx::query(
                "UPDATE accounts SET goals = goals + $2, assists = assists + $3, \
                 kcoins = kcoins + $4, updated_at = NOW() WHERE id = $1",
            )
            .bind(event.account_id)
            .bind(delta.goals)
            .bind(delta.assists)
            .bind(delta.kcoins)
            .execute(&mut *tx)
            .await
            .map_err(record_error)?;
        }

        tx.commit().await.map_err(record_error)?;
        StatEvent::try_from(row).map(Some)
    }
}
