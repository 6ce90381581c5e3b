use serde::{Deserialize, Serialize};

use super::models::AccountModel;

/// Request payload for the server-driven password reset
#[derive(Debug, Default, Deserialize)]
pub struct ResetPasswordRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub uuid: Option<String>,
}

/// Freshly generated password, handed back to the calling server
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetPasswordResponse {
    pub pass: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
}

/// Public view of an account
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct AccountProfile {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub profile_picture_url: String,
    pub goals: i64,
    pub assists: i64,
    pub kcoins: i64,
    pub matches: i64,
    pub available_for_transfer: bool,
    pub introduction: String,
}

impl From<&AccountModel> for AccountProfile {
    fn from(account: &AccountModel) -> Self {
        Self {
            id: account.id,
            username: account.handle.clone(),
            display_name: account.display_name.clone(),
            first_name: account.first_name(),
            last_name: account.last_name(),
            profile_picture_url: account.profile_picture_url(),
            goals: account.goals,
            assists: account.assists,
            kcoins: account.kcoins,
            matches: account.matches_played,
            available_for_transfer: account.available_for_transfer,
            introduction: account.introduction.clone(),
        }
    }
}

pub fn profiles(accounts: &[AccountModel]) -> Vec<AccountProfile> {
    accounts.iter().map(AccountProfile::from).collect()
}
