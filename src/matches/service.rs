use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::{MatchModel, NewMatch, ParticipationModel, RosterEntry, Side},
    repository::MatchRepository,
};
use crate::shared::AppError;
use crate::user::{
    models::AccountModel,
    names::{normalize_display_name, to_handle},
    service::distinct_ids,
    AccountDirectory,
};

pub const MAX_TEAM_LEN: usize = 40;
pub const MAX_COMPETITION_LEN: usize = 64;

/// Raw match submission as received from a server caller
#[derive(Debug, Clone, Default)]
pub struct MatchSubmission {
    pub competition: Option<String>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub home_players: Option<Vec<String>>,
    pub away_players: Option<Vec<String>>,
}

/// Stored match with the accounts placed on each side
#[derive(Debug, Clone)]
pub struct RecordedMatch {
    pub match_model: MatchModel,
    pub home_players: Vec<AccountModel>,
    pub away_players: Vec<AccountModel>,
    pub participations: Vec<ParticipationModel>,
}

fn required_label(value: Option<&str>, field: &str) -> Result<String, AppError> {
    let label = value
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))?;
    if label.chars().count() > MAX_TEAM_LEN {
        return Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            field, MAX_TEAM_LEN
        )));
    }
    Ok(label.to_string())
}

fn required_players<'a>(
    players: Option<&'a Vec<String>>,
    field: &str,
) -> Result<&'a [String], AppError> {
    match players {
        None => Err(AppError::Validation(format!("{} is required", field))),
        Some(list) if list.is_empty() => Err(AppError::Validation(format!(
            "{} must not be empty",
            field
        ))),
        Some(list) => Ok(list.as_slice()),
    }
}

fn handle_of(raw_name: &str) -> Result<Option<String>, AppError> {
    Ok(normalize_display_name(Some(raw_name))?
        .filter(|name| !name.trim().is_empty())
        .map(|name| to_handle(&name)))
}

/// Names from `home` whose handle also appears in `away`, first spelling wins
fn players_on_both_sides(home: &[String], away: &[String]) -> Result<Vec<String>, AppError> {
    let mut away_handles = HashSet::new();
    for name in away {
        if let Some(handle) = handle_of(name)? {
            away_handles.insert(handle);
        }
    }

    let mut reported = HashSet::new();
    let mut conflicts = Vec::new();
    for name in home {
        if let Some(handle) = handle_of(name)? {
            if away_handles.contains(&handle) && reported.insert(handle) {
                conflicts.push(name.clone());
            }
        }
    }
    Ok(conflicts)
}

/// One roster entry per distinct account on a side
fn side_roster(accounts: &[AccountModel], side: Side) -> Vec<RosterEntry> {
    distinct_ids(accounts)
        .into_iter()
        .map(|account_id| RosterEntry { account_id, side })
        .collect()
}

fn dedup_accounts(accounts: Vec<AccountModel>) -> Vec<AccountModel> {
    let mut seen = HashSet::new();
    accounts
        .into_iter()
        .filter(|account| seen.insert(account.id))
        .collect()
}

/// Creates matches together with their two-sided roster
pub struct MatchRecorder {
    accounts: Arc<AccountDirectory>,
    repository: Arc<dyn MatchRepository>,
}

impl MatchRecorder {
    pub fn new(accounts: Arc<AccountDirectory>, repository: Arc<dyn MatchRepository>) -> Self {
        Self {
            accounts,
            repository,
        }
    }

    #[instrument(skip(self, submission))]
    pub async fn create_match(
        &self,
        submission: &MatchSubmission,
    ) -> Result<RecordedMatch, AppError> {
        let home_team = required_label(submission.home_team.as_deref(), "home_team")?;
        let away_team = required_label(submission.away_team.as_deref(), "away_team")?;
        let home_names = required_players(submission.home_players.as_ref(), "home_players")?;
        let away_names = required_players(submission.away_players.as_ref(), "away_players")?;

        let competition = submission
            .competition
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if competition.chars().count() > MAX_COMPETITION_LEN {
            return Err(AppError::Validation(format!(
                "competition must be at most {} characters",
                MAX_COMPETITION_LEN
            )));
        }

        let conflicts = players_on_both_sides(home_names, away_names)?;
        if !conflicts.is_empty() {
            warn!(players = ?conflicts, "Players submitted for both sides");
            return Err(AppError::Validation(format!(
                "Players cannot play for both teams: {}",
                conflicts.join(", ")
            )));
        }

        // Home and away resolve separately so duplicates collapse per side
        let home_accounts = self.accounts.bulk_get_or_create(home_names).await?;
        let away_accounts = self.accounts.bulk_get_or_create(away_names).await?;

        let mut roster = side_roster(&home_accounts, Side::Home);
        roster.extend(side_roster(&away_accounts, Side::Away));

        let new_match = NewMatch {
            competition,
            home_team,
            away_team,
        };
        let (match_model, participations) = self
            .repository
            .create_with_roster(&new_match, &roster)
            .await?;

        info!(
            event = "create_match",
            match_id = match_model.id,
            competition = %match_model.competition,
            home_team = %match_model.home_team,
            away_team = %match_model.away_team,
            participants = participations.len(),
            "Match created"
        );

        Ok(RecordedMatch {
            match_model,
            home_players: dedup_accounts(home_accounts),
            away_players: dedup_accounts(away_accounts),
            participations,
        })
    }
}
