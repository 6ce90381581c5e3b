use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{
    models::{NewStatEvent, StatEvent, StatKind},
    repository::StatRepository,
};
use crate::matches::models::Side;
use crate::shared::AppError;
use crate::user::AccountDirectory;

/// Longest accepted idempotency token (column width)
pub const MAX_STAT_UUID_LEN: usize = 36;

/// Raw stat submission as received from a server caller
#[derive(Debug, Clone, Default)]
pub struct StatSubmission {
    pub username: Option<String>,
    pub stat_type: Option<String>,
    pub value: Option<i64>,
    pub stat_uuid: Option<String>,
    pub match_id: Option<i64>,
    pub side: Option<String>,
}

/// Payload fields checked before anything is written
#[derive(Debug)]
struct ValidatedStat {
    stat_uuid: String,
    stat_kind: StatKind,
    value: i64,
    side: Option<Side>,
}

fn validate(submission: &StatSubmission) -> Result<ValidatedStat, AppError> {
    if submission
        .username
        .as_deref()
        .map_or(true, |name| name.trim().is_empty())
    {
        return Err(AppError::MissingIdentifier(
            "Username was not provided".to_string(),
        ));
    }

    let stat_uuid = submission
        .stat_uuid
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Validation("stat_uuid is required".to_string()))?;
    if stat_uuid.len() > MAX_STAT_UUID_LEN {
        return Err(AppError::Validation(format!(
            "stat_uuid must be at most {} characters",
            MAX_STAT_UUID_LEN
        )));
    }

    let stat_kind = submission
        .stat_type
        .as_deref()
        .ok_or_else(|| AppError::Validation("stat_type is required".to_string()))
        .and_then(StatKind::try_from)?;

    let value = submission
        .value
        .ok_or_else(|| AppError::Validation("value is required".to_string()))?;
    // Counters never decrease
    if value < 0 {
        return Err(AppError::Validation("value must not be negative".to_string()));
    }

    let side = submission.side.as_deref().map(Side::try_from).transpose()?;

    Ok(ValidatedStat {
        stat_uuid: stat_uuid.to_string(),
        stat_kind,
        value,
        side,
    })
}

/// Records stat events at most once per `stat_uuid`
pub struct StatLedger {
    accounts: Arc<AccountDirectory>,
    repository: Arc<dyn StatRepository>,
}

impl StatLedger {
    pub fn new(accounts: Arc<AccountDirectory>, repository: Arc<dyn StatRepository>) -> Self {
        Self {
            accounts,
            repository,
        }
    }

    /// Returns the stored event and whether this call created it
    #[instrument(skip(self, submission), fields(stat_uuid = ?submission.stat_uuid))]
    pub async fn record_stat(
        &self,
        submission: &StatSubmission,
    ) -> Result<(StatEvent, bool), AppError> {
        let validated = validate(submission)?;

        if let Some(existing) = self.repository.find_by_token(&validated.stat_uuid).await? {
            info!(event = "create_stat", created = false, stat_uuid = %existing.stat_uuid, "Stat already recorded");
            return Ok((existing, false));
        }

        let account = self
            .accounts
            .get_or_create(submission.username.as_deref())
            .await?;

        let new_event = NewStatEvent {
            stat_uuid: validated.stat_uuid,
            stat_kind: validated.stat_kind,
            value: validated.value,
            account_id: account.id,
            match_id: submission.match_id,
            side: validated.side,
        };
        let delta = new_event.stat_kind.counter_delta(new_event.value);

        if let Some(created) = self.repository.record(&new_event, delta).await? {
            info!(
                event = "create_stat",
                created = true,
                stat_uuid = %created.stat_uuid,
                stat_type = %created.stat_kind,
                value = created.value,
                handle = %account.handle,
                "Stat recorded"
            );
            return Ok((created, true));
        }

        // A concurrent submission with the same token won
        warn!(stat_uuid = %new_event.stat_uuid, "Stat token collision, returning first writer");
        let existing = self
            .repository
            .find_by_token(&new_event.stat_uuid)
            .await?
            .ok_or_else(|| {
                AppError::DatabaseError(format!(
                    "stat '{}' vanished after token collision",
                    new_event.stat_uuid
                ))
            })?;
        Ok((existing, false))
    }
}
