use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::AppError;

/// Home/away designation of a participation or stat event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Home => "home",
            Side::Away => "away",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Side {
    type Error = AppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "home" => Ok(Side::Home),
            "away" => Ok(Side::Away),
            other => Err(AppError::Validation(format!(
                "side must be 'home' or 'away', got '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchModel {
    pub id: i64,
    pub competition: String,
    pub home_team: String,
    pub away_team: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMatch {
    pub competition: String,
    pub home_team: String,
    pub away_team: String,
}

impl NewMatch {
    pub fn into_model(self, id: i64, now: DateTime<Utc>) -> MatchModel {
        MatchModel {
            id,
            competition: self.competition,
            home_team: self.home_team,
            away_team: self.away_team,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipationModel {
    pub id: i64,
    pub account_id: i64,
    pub match_id: i64,
    pub side: Side,
}

/// Participation as stored; `side` is kept as text in the database
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ParticipationRow {
    pub id: i64,
    pub account_id: i64,
    pub match_id: i64,
    pub side: String,
}

impl TryFrom<ParticipationRow> for ParticipationModel {
    type Error = AppError;

    fn try_from(row: ParticipationRow) -> Result<Self, Self::Error> {
        Ok(ParticipationModel {
            id: row.id,
            account_id: row.account_id,
            match_id: row.match_id,
            side: Side::try_from(row.side.as_str())?,
        })
    }
}

/// One resolved player placed on a side of the match being created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RosterEntry {
    pub account_id: i64,
    pub side: Side,
}
