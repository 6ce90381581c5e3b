use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::names::{DEFAULT_SURNAME, HANDLE_DELIMITER};

/// Database model for accounts table
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct AccountModel {
    pub id: i64,
    pub handle: String, // Canonical lowercase identifier, e.g. "john.smith"
    pub display_name: String,
    pub email: Option<String>,
    pub external_uuid: Option<String>, // Virtual-world identity
    #[serde(skip_serializing)]
    pub credential_hash: Option<String>, // None means the account cannot log in
    pub is_active: bool,
    pub is_staff: bool,
    pub is_test: bool,
    pub goals: i64,
    pub assists: i64,
    pub kcoins: i64,
    pub matches_played: i64,
    pub available_for_transfer: bool,
    pub introduction: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccountModel {
    pub fn first_name(&self) -> String {
        let first = self.handle.split(HANDLE_DELIMITER).next().unwrap_or_default();
        capitalize(first)
    }

    pub fn last_name(&self) -> String {
        match self.handle.split_once(HANDLE_DELIMITER) {
            Some((_, last)) => capitalize(last),
            None => DEFAULT_SURNAME.to_string(),
        }
    }

    pub fn profile_picture_url(&self) -> String {
        format!(
            "https://my-secondlife-agni.akamaized.net/users/{}/sl_image.png",
            self.handle
        )
    }

    pub fn has_usable_credential(&self) -> bool {
        self.credential_hash.is_some()
    }
}

/// Row to insert into the accounts table
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub handle: String,
    pub display_name: String,
    pub email: Option<String>,
    pub external_uuid: Option<String>,
    pub credential_hash: Option<String>,
    pub is_active: bool,
}

impl NewAccount {
    /// Inactive account without a usable credential, created on first reference
    pub fn provisional(handle: &str, display_name: &str) -> Self {
        Self {
            handle: handle.to_string(),
            display_name: display_name.to_string(),
            email: None,
            external_uuid: None,
            credential_hash: None,
            is_active: false,
        }
    }

    pub fn into_model(self, id: i64, now: DateTime<Utc>) -> AccountModel {
        AccountModel {
            id,
            handle: self.handle,
            display_name: self.display_name,
            email: self.email,
            external_uuid: self.external_uuid,
            credential_hash: self.credential_hash,
            is_active: self.is_active,
            is_staff: false,
            is_test: false,
            goals: 0,
            assists: 0,
            kcoins: 0,
            matches_played: 0,
            available_for_transfer: false,
            introduction: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Amounts added to the cached aggregate counters of one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub goals: i64,
    pub assists: i64,
    pub kcoins: i64,
}

impl CounterDelta {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// `(goals, assists, kcoins)` after adding this delta, `None` on overflow
    pub fn applied_to(&self, account: &AccountModel) -> Option<(i64, i64, i64)> {
        Some((
            account.goals.checked_add(self.goals)?,
            account.assists.checked_add(self.assists)?,
            account.kcoins.checked_add(self.kcoins)?,
        ))
    }
}

/// Credential overwrite applied by the reset flow
#[derive(Debug, Clone)]
pub struct CredentialReset {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub external_uuid: String,
    pub credential_hash: String,
}

/// Fields a user may edit on their own profile
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProfileUpdate {
    pub introduction: Option<String>,
    pub available_for_transfer: Option<bool>,
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(handle: &str) -> AccountModel {
        NewAccount::provisional(handle, handle).into_model(1, Utc::now())
    }

    #[test]
    fn test_provisional_account_is_inactive() {
        let model = account("john.smith");
        assert!(!model.is_active);
        assert!(!model.has_usable_credential());
        assert_eq!(model.goals, 0);
        assert_eq!(model.matches_played, 0);
    }

    #[test]
    fn test_names_derived_from_handle() {
        let model = account("john.smith");
        assert_eq!(model.first_name(), "John");
        assert_eq!(model.last_name(), "Smith");

        let single = account("johnny");
        assert_eq!(single.first_name(), "Johnny");
        assert_eq!(single.last_name(), "Resident");
    }

    #[test]
    fn test_credential_hash_is_not_serialized() {
        let mut model = account("john");
        model.credential_hash = Some("sha256$salt$digest".to_string());

        let json = serde_json::to_string(&model).unwrap();
        assert!(!json.contains("credential_hash"));
        assert!(json.contains("\"handle\":\"john\""));
    }

    #[test]
    fn test_profile_picture_url_uses_handle() {
        assert!(account("john.smith")
            .profile_picture_url()
            .contains("/users/john.smith/"));
    }
}
