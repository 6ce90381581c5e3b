use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    credentials,
    models::{AccountModel, CredentialReset, NewAccount, ProfileUpdate},
    names::{
        input_to_username, is_valid_handle, normalize_display_name, to_handle, MAX_HANDLE_LEN,
    },
    repository::AccountRepository,
};
use crate::shared::AppError;

/// Result cap for search and marketplace listings
pub const SEARCH_LIMIT: usize = 100;
pub const TEST_ACCOUNTS_LIMIT: usize = 200;
pub const MAX_INTRODUCTION_LEN: usize = 255;

/// Payload of the server-driven credential reset
#[derive(Debug, Clone, Default)]
pub struct CredentialResetRequest {
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub external_uuid: Option<String>,
}

/// Display name resolved to its canonical handle
#[derive(Debug, Clone, PartialEq)]
struct ResolvedName {
    handle: String,
    display_name: String,
}

fn resolve_name(raw: Option<&str>) -> Result<ResolvedName, AppError> {
    let cleaned = normalize_display_name(raw)?
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::MissingIdentifier("Username was not provided".to_string()))?;

    let handle = to_handle(&cleaned);
    if handle.chars().count() > MAX_HANDLE_LEN || cleaned.chars().count() > MAX_HANDLE_LEN {
        return Err(AppError::InvalidNameFormat(format!(
            "names are limited to {} characters",
            MAX_HANDLE_LEN
        )));
    }

    Ok(ResolvedName {
        handle,
        display_name: cleaned,
    })
}

/// Lowercase hyphenated form only, e.g. `2e81fb58-f191-4c0e-aaa9-a41c92f689fa`
fn validate_external_uuid(raw: Option<&str>) -> Result<String, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("uuid is required".to_string()))?;

    match Uuid::parse_str(raw) {
        Ok(parsed) if parsed.hyphenated().to_string() == raw => Ok(raw.to_string()),
        _ => Err(AppError::InvalidNameFormat(format!(
            "'{}' is not a valid uuid",
            raw
        ))),
    }
}

/// Owns account identity: handle uniqueness, provisioning and credentials
pub struct AccountDirectory {
    repository: Arc<dyn AccountRepository>,
}

impl AccountDirectory {
    pub fn new(repository: Arc<dyn AccountRepository>) -> Self {
        Self { repository }
    }

    /// Returns the account for a display name, provisioning an inactive one if needed
    #[instrument(skip(self))]
    pub async fn get_or_create(&self, raw_name: Option<&str>) -> Result<AccountModel, AppError> {
        let resolved = resolve_name(raw_name)?;

        if let Some(existing) = self.repository.find_by_handle(&resolved.handle).await? {
            debug!(handle = %existing.handle, account_id = existing.id, "Resolved existing account");
            return Ok(existing);
        }

        let new_account = NewAccount::provisional(&resolved.handle, &resolved.display_name);
        if let Some(created) = self.repository.insert_account(&new_account).await? {
            info!(handle = %created.handle, account_id = created.id, "Provisioned account");
            return Ok(created);
        }

        // Lost a concurrent insert for the same handle
        warn!(handle = %resolved.handle, "Handle collision, retrying as lookup");
        self.repository
            .find_by_handle(&resolved.handle)
            .await?
            .ok_or_else(|| {
                AppError::DatabaseError(format!(
                    "account '{}' vanished after handle collision",
                    resolved.handle
                ))
            })
    }

    /// Resolves every name in one pass; output order follows input order
    #[instrument(skip(self, raw_names), fields(count = raw_names.len()))]
    pub async fn bulk_get_or_create(
        &self,
        raw_names: &[String],
    ) -> Result<Vec<AccountModel>, AppError> {
        let resolved = raw_names
            .iter()
            .map(|name| resolve_name(Some(name)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::new();
        let unique: Vec<&ResolvedName> = resolved
            .iter()
            .filter(|r| seen.insert(r.handle.clone()))
            .collect();
        let handles: Vec<String> = unique.iter().map(|r| r.handle.clone()).collect();

        let mut by_handle: HashMap<String, AccountModel> = self
            .repository
            .find_by_handles(&handles)
            .await?
            .into_iter()
            .map(|account| (account.handle.clone(), account))
            .collect();

        let missing: Vec<NewAccount> = unique
            .iter()
            .filter(|r| !by_handle.contains_key(&r.handle))
            .map(|r| NewAccount::provisional(&r.handle, &r.display_name))
            .collect();

        if !missing.is_empty() {
            let created = self.repository.insert_provisional_accounts(&missing).await?;
            info!(
                requested = missing.len(),
                created = created.len(),
                "Provisioned accounts in bulk"
            );
            by_handle.extend(created.into_iter().map(|a| (a.handle.clone(), a)));

            let collided: Vec<String> = missing
                .iter()
                .filter(|a| !by_handle.contains_key(&a.handle))
                .map(|a| a.handle.clone())
                .collect();
            if !collided.is_empty() {
                warn!(count = collided.len(), "Handle collisions in bulk insert, retrying as lookup");
                let found = self.repository.find_by_handles(&collided).await?;
                by_handle.extend(found.into_iter().map(|a| (a.handle.clone(), a)));
            }
        }

        resolved
            .iter()
            .map(|r| {
                by_handle.get(&r.handle).cloned().ok_or_else(|| {
                    AppError::DatabaseError(format!("account '{}' could not be resolved", r.handle))
                })
            })
            .collect()
    }

    /// Activates (or registers) an account with a new credential for a verified identity.
    ///
    /// Returns the account and whether this call created it.
    #[instrument(skip(self, request, new_secret), fields(handle = ?request.handle))]
    pub async fn reset_credential(
        &self,
        request: &CredentialResetRequest,
        new_secret: &str,
    ) -> Result<(AccountModel, bool), AppError> {
        let handle = request
            .handle
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| AppError::MissingIdentifier("username is required".to_string()))?;

        if new_secret.is_empty() {
            return Err(AppError::Validation("password must not be empty".to_string()));
        }
        if let Some(display_name) = &request.display_name {
            if display_name.chars().count() > MAX_HANDLE_LEN {
                return Err(AppError::Validation(format!(
                    "display_name must be at most {} characters",
                    MAX_HANDLE_LEN
                )));
            }
        }

        if let Some(existing) = self.repository.find_by_handle(handle).await? {
            let account = self.reset_existing(existing, request, new_secret).await?;
            return Ok((account, false));
        }

        if !is_valid_handle(handle) {
            return Err(AppError::InvalidNameFormat(format!(
                "'{}' is not a valid username",
                handle
            )));
        }
        let external_uuid = validate_external_uuid(request.external_uuid.as_deref())?;

        let new_account = NewAccount {
            handle: handle.to_string(),
            display_name: request
                .display_name
                .clone()
                .unwrap_or_else(|| handle.to_string()),
            email: request.email.clone(),
            external_uuid: Some(external_uuid),
            credential_hash: Some(credentials::hash_secret(new_secret)),
            is_active: true,
        };

        match self.repository.insert_account(&new_account).await? {
            Some(created) => {
                info!(handle = %created.handle, account_id = created.id, "Registered account via credential reset");
                Ok((created, true))
            }
            None => {
                let existing = self.repository.find_by_handle(handle).await?.ok_or_else(|| {
                    AppError::DatabaseError(format!(
                        "account '{}' vanished after handle collision",
                        handle
                    ))
                })?;
                let account = self.reset_existing(existing, request, new_secret).await?;
                Ok((account, false))
            }
        }
    }

    async fn reset_existing(
        &self,
        existing: AccountModel,
        request: &CredentialResetRequest,
        new_secret: &str,
    ) -> Result<AccountModel, AppError> {
        if existing.is_staff {
            warn!(handle = %existing.handle, "Refused credential reset for staff account");
            return Err(AppError::PermissionDenied(
                "staff accounts cannot be reset".to_string(),
            ));
        }

        let external_uuid = validate_external_uuid(request.external_uuid.as_deref())?;
        if let Some(recorded) = existing.external_uuid.as_deref().filter(|u| !u.is_empty()) {
            if recorded != external_uuid {
                warn!(handle = %existing.handle, "External identity mismatch on credential reset");
                return Err(AppError::Validation(
                    "uuid does not match the account's recorded identity".to_string(),
                ));
            }
        }

        let reset = CredentialReset {
            display_name: request.display_name.clone(),
            email: request.email.clone(),
            external_uuid,
            credential_hash: credentials::hash_secret(new_secret),
        };
        let account = self.repository.reset_credential(existing.id, &reset).await?;
        info!(handle = %account.handle, account_id = account.id, "Account credential reset");
        Ok(account)
    }

    /// Checks a login attempt; the input may be a display name or a handle
    #[instrument(skip(self, secret))]
    pub async fn authenticate(
        &self,
        login_input: &str,
        secret: &str,
    ) -> Result<AccountModel, AppError> {
        let denied = || AppError::Unauthorized("Invalid username or password".to_string());

        let handle = input_to_username(login_input);
        let account = self
            .repository
            .find_by_handle(&handle)
            .await?
            .ok_or_else(denied)?;

        let verified = account.is_active
            && account
                .credential_hash
                .as_deref()
                .is_some_and(|hash| credentials::verify_secret(secret, hash));
        if !verified {
            warn!(handle = %handle, "Login rejected");
            return Err(denied());
        }

        Ok(account)
    }

    #[instrument(skip(self, old_secret, new_secret))]
    pub async fn change_credential(
        &self,
        account_id: i64,
        old_secret: &str,
        new_secret: &str,
    ) -> Result<(), AppError> {
        let account = self.get_by_id(account_id).await?;

        let old_matches = account
            .credential_hash
            .as_deref()
            .is_some_and(|hash| credentials::verify_secret(old_secret, hash));
        if !old_matches {
            warn!(account_id, "Credential change with wrong current password");
            return Err(AppError::PermissionDenied(
                "current password is incorrect".to_string(),
            ));
        }
        if new_secret.is_empty() {
            return Err(AppError::Validation("password must not be empty".to_string()));
        }

        self.repository
            .update_credential(account_id, &credentials::hash_secret(new_secret))
            .await?;
        info!(account_id, "Account credential changed");
        Ok(())
    }

    #[instrument(skip(self, update))]
    pub async fn update_profile(
        &self,
        account_id: i64,
        update: &ProfileUpdate,
    ) -> Result<AccountModel, AppError> {
        if let Some(introduction) = &update.introduction {
            if introduction.chars().count() > MAX_INTRODUCTION_LEN {
                return Err(AppError::Validation(format!(
                    "introduction must be at most {} characters",
                    MAX_INTRODUCTION_LEN
                )));
            }
        }
        self.repository.update_profile(account_id, update).await
    }

    pub async fn get_by_id(&self, account_id: i64) -> Result<AccountModel, AppError> {
        self.repository
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))
    }

    pub async fn get_by_handle(&self, handle: &str) -> Result<AccountModel, AppError> {
        self.repository
            .find_by_handle(handle)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", handle)))
    }

    /// Adds one played match to each distinct account, as a single bulk write
    #[instrument(skip(self, accounts), fields(count = accounts.len()))]
    pub async fn bulk_add_match_played(&self, accounts: &[AccountModel]) -> Result<u64, AppError> {
        let ids = distinct_ids(accounts);
        if ids.is_empty() {
            return Ok(0);
        }
        self.repository.add_match_played(&ids).await
    }

    #[instrument(skip(self))]
    pub async fn search_by_name(&self, handle_fragment: &str) -> Result<Vec<AccountModel>, AppError> {
        self.repository
            .search_by_handle(handle_fragment, SEARCH_LIMIT)
            .await
    }

    #[instrument(skip(self))]
    pub async fn search_marketplace(&self) -> Result<Vec<AccountModel>, AppError> {
        self.repository.list_marketplace(SEARCH_LIMIT).await
    }

    #[instrument(skip(self))]
    pub async fn list_test_accounts(&self) -> Result<Vec<AccountModel>, AppError> {
        self.repository.list_test_accounts(TEST_ACCOUNTS_LIMIT).await
    }
}

/// Account ids in first-seen order, duplicates dropped
pub(crate) fn distinct_ids(accounts: &[AccountModel]) -> Vec<i64> {
    let mut seen = HashSet::new();
    accounts
        .iter()
        .map(|a| a.id)
        .filter(|id| seen.insert(*id))
        .collect()
}
