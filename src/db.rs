use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, instrument, warn};

use crate::matches::models::{MatchModel, ParticipationModel};
use crate::shared::AppError;
use crate::stats::models::StatEvent;
use crate::user::models::{AccountModel, CounterDelta, NewAccount};

/// Tables backing the in-memory repositories.
///
/// Every repository working on the same `InMemoryDatabase` sees the same rows,
/// and a single write guard makes a multi-table change atomic.
#[derive(Debug, Default)]
pub struct MemoryTables {
    pub accounts: BTreeMap<i64, AccountModel>,
    handle_index: HashMap<String, i64>,
    pub stat_events: BTreeMap<i64, StatEvent>,
    stat_token_index: HashMap<String, i64>,
    pub matches: BTreeMap<i64, MatchModel>,
    pub participations: Vec<ParticipationModel>,
    last_id: i64,
}

impl MemoryTables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    pub fn account_by_handle(&self, handle: &str) -> Option<&AccountModel> {
        self.handle_index
            .get(handle)
            .and_then(|id| self.accounts.get(id))
    }

    /// Inserts an account unless the handle is taken (unique handle index)
    pub fn insert_account(&mut self, new_account: &NewAccount) -> Option<AccountModel> {
        if self.handle_index.contains_key(&new_account.handle) {
            return None;
        }

        let id = self.next_id();
        let account = new_account.clone().into_model(id, Utc::now());
        self.handle_index.insert(account.handle.clone(), id);
        self.accounts.insert(id, account.clone());
        Some(account)
    }

    /// Adds the delta to an account's counters.
    ///
    /// Fails without touching the row when the account is missing or a counter
    /// would overflow.
    pub fn apply_counters(
        &mut self,
        account_id: i64,
        delta: &CounterDelta,
    ) -> Result<(), AppError> {
        let account = self.accounts.get_mut(&account_id).ok_or_else(|| {
            AppError::Validation(format!("account {} does not exist", account_id))
        })?;
        let (goals, assists, kcoins) = delta.applied_to(account).ok_or_else(|| {
            AppError::Validation("stat value would overflow the account's counters".to_string())
        })?;

        account.goals = goals;
        account.assists = assists;
        account.kcoins = kcoins;
        account.updated_at = Utc::now();
        Ok(())
    }

    /// Increments `matches_played` once per distinct id, returns rows touched
    pub fn add_match_played(&mut self, account_ids: &[i64]) -> u64 {
        let distinct: HashSet<i64> = account_ids.iter().copied().collect();
        let now = Utc::now();
        let mut touched = 0;
        for id in distinct {
            if let Some(account) = self.accounts.get_mut(&id) {
                account.matches_played += 1;
                account.updated_at = now;
                touched += 1;
            }
        }
        touched
    }

    pub fn stat_by_token(&self, stat_uuid: &str) -> Option<&StatEvent> {
        self.stat_token_index
            .get(stat_uuid)
            .and_then(|id| self.stat_events.get(id))
    }

    /// Inserts a stat event unless its idempotency token is taken
    pub fn insert_stat(&mut self, mut event: StatEvent) -> Option<StatEvent> {
        if self.stat_token_index.contains_key(&event.stat_uuid) {
            return None;
        }

        event.id = self.next_id();
        self.stat_token_index.insert(event.stat_uuid.clone(), event.id);
        self.stat_events.insert(event.id, event.clone());
        Some(event)
    }

    pub fn insert_match(&mut self, mut match_model: MatchModel) -> MatchModel {
        match_model.id = self.next_id();
        self.matches.insert(match_model.id, match_model.clone());
        match_model
    }

    pub fn insert_participation(&mut self, mut participation: ParticipationModel) {
        participation.id = self.next_id();
        self.participations.push(participation);
    }
}

/// Process-local database used in development and tests
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    tables: RwLock<MemoryTables>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, MemoryTables> {
        self.tables.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, MemoryTables> {
        self.tables.write().await
    }
}

/// Opens the PostgreSQL pool and brings the schema up to date
#[instrument(skip(database_url))]
pub async fn connect_postgres(database_url: &str) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to connect to database");
            AppError::DatabaseError(e.to_string())
        })?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to run database migrations");
            AppError::DatabaseError(e.to_string())
        })?;

    info!("Database connected and migrations applied");
    Ok(pool)
}

/// True when an integer column would overflow (SQLSTATE 22003)
pub fn is_numeric_out_of_range(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("22003")
    )
}

/// True when the error is a PostgreSQL foreign key violation (SQLSTATE 23503)
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_index_rejects_duplicates() {
        let db = InMemoryDatabase::new();
        let mut tables = db.write().await;

        let first = tables.insert_account(&NewAccount::provisional("ann", "Ann"));
        let second = tables.insert_account(&NewAccount::provisional("ann", "Ann"));

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(tables.accounts.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_counters_refuses_overflow() {
        let db = InMemoryDatabase::new();
        let mut tables = db.write().await;
        let ann = tables
            .insert_account(&NewAccount::provisional("ann", "ann"))
            .unwrap();
        let delta = CounterDelta {
            goals: i64::MAX,
            ..CounterDelta::default()
        };

        assert!(tables.apply_counters(ann.id, &delta).is_ok());
        let bump = CounterDelta {
            goals: 1,
            assists: 0,
            kcoins: 5,
        };
        let second = tables.apply_counters(ann.id, &bump);

        assert!(matches!(second, Err(AppError::Validation(_))));
        assert_eq!(tables.accounts[&ann.id].goals, i64::MAX);
        assert_eq!(tables.accounts[&ann.id].kcoins, 0);
        assert!(tables.apply_counters(999, &delta).is_err());
    }

    #[tokio::test]
    async fn test_add_match_played_counts_each_account_once() {
        let db = InMemoryDatabase::new();
        let mut tables = db.write().await;
        let a = tables
            .insert_account(&NewAccount::provisional("a", "a"))
            .unwrap();
        let b = tables
            .insert_account(&NewAccount::provisional("b", "b"))
            .unwrap();

        let touched = tables.add_match_played(&[a.id, b.id, a.id, 999]);

        assert_eq!(touched, 2);
        assert_eq!(tables.accounts[&a.id].matches_played, 1);
        assert_eq!(tables.accounts[&b.id].matches_played, 1);
    }
}
