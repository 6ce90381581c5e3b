use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::models::{AccountModel, CredentialReset, NewAccount, ProfileUpdate};
use crate::db::InMemoryDatabase;
use crate::shared::AppError;

pub(crate) const ACCOUNT_COLUMNS: &str = "id, handle, display_name, email, external_uuid, \
    credential_hash, is_active, is_staff, is_test, goals, assists, kcoins, matches_played, \
    available_for_transfer, introduction, created_at, updated_at";

/// One statement for the whole roster, shared with the match transaction
pub(crate) const ADD_MATCH_PLAYED_SQL: &str =
    "UPDATE accounts SET matches_played = matches_played + 1, updated_at = NOW() WHERE id = ANY($1)";

/// Trait for account repository operations
///
/// Inserts report a taken handle as `None` (or by omitting the row) instead of
/// an error, so callers can fall back to a lookup.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<AccountModel>, AppError>;
    async fn find_by_handle(&self, handle: &str) -> Result<Option<AccountModel>, AppError>;
    async fn find_by_handles(&self, handles: &[String]) -> Result<Vec<AccountModel>, AppError>;
    async fn insert_account(&self, account: &NewAccount)
        -> Result<Option<AccountModel>, AppError>;
    async fn insert_provisional_accounts(
        &self,
        accounts: &[NewAccount],
    ) -> Result<Vec<AccountModel>, AppError>;
    async fn reset_credential(
        &self,
        id: i64,
        reset: &CredentialReset,
    ) -> Result<AccountModel, AppError>;
    async fn update_credential(&self, id: i64, credential_hash: &str) -> Result<(), AppError>;
    async fn update_profile(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> Result<AccountModel, AppError>;
    async fn add_match_played(&self, account_ids: &[i64]) -> Result<u64, AppError>;
    async fn search_by_handle(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<AccountModel>, AppError>;
    async fn list_marketplace(&self, limit: usize) -> Result<Vec<AccountModel>, AppError>;
    async fn list_test_accounts(&self, limit: usize) -> Result<Vec<AccountModel>, AppError>;
}

/// In-memory implementation of AccountRepository for development and testing
pub struct InMemoryAccountRepository {
    db: Arc<InMemoryDatabase>,
}

impl InMemoryAccountRepository {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db }
    }
}

impl Default for InMemoryAccountRepository {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryDatabase::new()))
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<AccountModel>, AppError> {
        Ok(self.db.read().await.accounts.get(&id).cloned())
    }

    #[instrument(skip(self))]
    async fn find_by_handle(&self, handle: &str) -> Result<Option<AccountModel>, AppError> {
        let tables = self.db.read().await;
        let account = tables.account_by_handle(handle).cloned();
        debug!(handle = %handle, found = account.is_some(), "Account lookup in memory");
        Ok(account)
    }

    async fn find_by_handles(&self, handles: &[String]) -> Result<Vec<AccountModel>, AppError> {
        let tables = self.db.read().await;
        Ok(handles
            .iter()
            .filter_map(|handle| tables.account_by_handle(handle).cloned())
            .collect())
    }

    #[instrument(skip(self, account), fields(handle = %account.handle))]
    async fn insert_account(
        &self,
        account: &NewAccount,
    ) -> Result<Option<AccountModel>, AppError> {
        let inserted = self.db.write().await.insert_account(account);
        if inserted.is_none() {
            warn!(handle = %account.handle, "Handle already taken in memory");
        }
        Ok(inserted)
    }

    async fn insert_provisional_accounts(
        &self,
        accounts: &[NewAccount],
    ) -> Result<Vec<AccountModel>, AppError> {
        let mut tables = self.db.write().await;
        Ok(accounts
            .iter()
            .filter_map(|account| tables.insert_account(account))
            .collect())
    }

    async fn reset_credential(
        &self,
        id: i64,
        reset: &CredentialReset,
    ) -> Result<AccountModel, AppError> {
        let mut tables = self.db.write().await;
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        if let Some(display_name) = &reset.display_name {
            account.display_name = display_name.clone();
        }
        if let Some(email) = &reset.email {
            account.email = Some(email.clone());
        }
        account.external_uuid = Some(reset.external_uuid.clone());
        account.credential_hash = Some(reset.credential_hash.clone());
        account.is_active = true;
        account.updated_at = Utc::now();

        Ok(account.clone())
    }

    async fn update_credential(&self, id: i64, credential_hash: &str) -> Result<(), AppError> {
        let mut tables = self.db.write().await;
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
        account.credential_hash = Some(credential_hash.to_string());
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn update_profile(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> Result<AccountModel, AppError> {
        let mut tables = self.db.write().await;
        let account = tables
            .accounts
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;

        if let Some(introduction) = &update.introduction {
            account.introduction = introduction.clone();
        }
        if let Some(available) = update.available_for_transfer {
            account.available_for_transfer = available;
        }
        account.updated_at = Utc::now();

        Ok(account.clone())
    }

    async fn add_match_played(&self, account_ids: &[i64]) -> Result<u64, AppError> {
        Ok(self.db.write().await.add_match_played(account_ids))
    }

    async fn search_by_handle(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<AccountModel>, AppError> {
        let needle = fragment.to_lowercase();
        let tables = self.db.read().await;
        let mut found: Vec<AccountModel> = tables
            .accounts
            .values()
            .filter(|account| account.handle.contains(&needle))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.handle.cmp(&b.handle));
        found.truncate(limit);
        Ok(found)
    }

    async fn list_marketplace(&self, limit: usize) -> Result<Vec<AccountModel>, AppError> {
        let tables = self.db.read().await;
        let mut found: Vec<AccountModel> = tables
            .accounts
            .values()
            .filter(|account| account.available_for_transfer)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.handle.cmp(&b.handle));
        found.truncate(limit);
        Ok(found)
    }

    async fn list_test_accounts(&self, limit: usize) -> Result<Vec<AccountModel>, AppError> {
        // BTreeMap iteration is already ordered by id
        let tables = self.db.read().await;
        Ok(tables
            .accounts
            .values()
            .filter(|account| account.is_test)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// PostgreSQL implementation of account repository
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        warn!(error = %e, "{}", context);
        AppError::DatabaseError(e.to_string())
    }
}

/// Escapes LIKE wildcards so the fragment matches literally
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment
        .to_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> Result<Option<AccountModel>, AppError> {
        sqlx::query_as::<_, AccountModel>(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch account by id"))
    }

    #[instrument(skip(self))]
    async fn find_by_handle(&self, handle: &str) -> Result<Option<AccountModel>, AppError> {
        debug!(handle = %handle, "Fetching account from database");

        sqlx::query_as::<_, AccountModel>(&format!(
            "SELECT {} FROM accounts WHERE handle = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch account by handle"))
    }

    #[instrument(skip(self, handles), fields(count = handles.len()))]
    async fn find_by_handles(&self, handles: &[String]) -> Result<Vec<AccountModel>, AppError> {
        sqlx::query_as::<_, AccountModel>(&format!(
            "SELECT {} FROM accounts WHERE handle = ANY($1)",
            ACCOUNT_COLUMNS
        ))
        .bind(handles)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch accounts by handle"))
    }

    #[instrument(skip(self, account), fields(handle = %account.handle))]
    async fn insert_account(
        &self,
        account: &NewAccount,
    ) -> Result<Option<AccountModel>, AppError> {
        let inserted = sqlx::query_as::<_, AccountModel>(&format!(
            "INSERT INTO accounts (handle, display_name, email, external_uuid, credential_hash, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (handle) DO NOTHING RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&account.handle)
        .bind(&account.display_name)
        .bind(&account.email)
        .bind(&account.external_uuid)
        .bind(&account.credential_hash)
        .bind(account.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to insert account"))?;

        if inserted.is_none() {
            warn!(handle = %account.handle, "Handle already taken in database");
        }
        Ok(inserted)
    }

    #[instrument(skip(self, accounts), fields(count = accounts.len()))]
    async fn insert_provisional_accounts(
        &self,
        accounts: &[NewAccount],
    ) -> Result<Vec<AccountModel>, AppError> {
        if accounts.is_empty() {
            return Ok(Vec::new());
        }

        let handles: Vec<String> = accounts.iter().map(|a| a.handle.clone()).collect();
        let display_names: Vec<String> = accounts.iter().map(|a| a.display_name.clone()).collect();

        sqlx::query_as::<_, AccountModel>(&format!(
            "INSERT INTO accounts (handle, display_name) \
             SELECT * FROM UNNEST($1::varchar[], $2::varchar[]) \
             ON CONFLICT (handle) DO NOTHING RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(&handles)
        .bind(&display_names)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to bulk insert accounts"))
    }

    #[instrument(skip(self, reset))]
    async fn reset_credential(
        &self,
        id: i64,
        reset: &CredentialReset,
    ) -> Result<AccountModel, AppError> {
        sqlx::query_as::<_, AccountModel>(&format!(
            "UPDATE accounts SET \
                display_name = COALESCE($2, display_name), \
                email = COALESCE($3, email), \
                external_uuid = $4, \
                credential_hash = $5, \
                is_active = TRUE, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(&reset.display_name)
        .bind(&reset.email)
        .bind(&reset.external_uuid)
        .bind(&reset.credential_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to reset account credential"))?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    #[instrument(skip(self, credential_hash))]
    async fn update_credential(&self, id: i64, credential_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE accounts SET credential_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(credential_hash)
        .execute(&self.pool)
        .await
        .map_err(db_error("Failed to update account credential"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Account not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, update))]
    async fn update_profile(
        &self,
        id: i64,
        update: &ProfileUpdate,
    ) -> Result<AccountModel, AppError> {
        sqlx::query_as::<_, AccountModel>(&format!(
            "UPDATE accounts SET \
                introduction = COALESCE($2, introduction), \
                available_for_transfer = COALESCE($3, available_for_transfer), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .bind(&update.introduction)
        .bind(update.available_for_transfer)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to update profile"))?
        .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    #[instrument(skip(self, account_ids), fields(count = account_ids.len()))]
    async fn add_match_played(&self, account_ids: &[i64]) -> Result<u64, AppError> {
        let result = sqlx::query(ADD_MATCH_PLAYED_SQL)
            .bind(account_ids)
            .execute(&self.pool)
            .await
            .map_err(db_error("Failed to bump matches played"))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn search_by_handle(
        &self,
        fragment: &str,
        limit: usize,
    ) -> Result<Vec<AccountModel>, AppError> {
        sqlx::query_as::<_, AccountModel>(&format!(
            "SELECT {} FROM accounts WHERE handle ILIKE $1 ORDER BY handle ASC LIMIT $2",
            ACCOUNT_COLUMNS
        ))
        .bind(like_pattern(fragment))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to search accounts"))
    }

    #[instrument(skip(self))]
    async fn list_marketplace(&self, limit: usize) -> Result<Vec<AccountModel>, AppError> {
        sqlx::query_as::<_, AccountModel>(&format!(
            "SELECT {} FROM accounts WHERE available_for_transfer ORDER BY handle ASC LIMIT $1",
            ACCOUNT_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list marketplace"))
    }

    #[instrument(skip(self))]
    async fn list_test_accounts(&self, limit: usize) -> Result<Vec<AccountModel>, AppError> {
        sqlx::query_as::<_, AccountModel>(&format!(
            "SELECT {} FROM accounts WHERE is_test ORDER BY id ASC LIMIT $1",
            ACCOUNT_COLUMNS
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to list test accounts"))
    }
}
