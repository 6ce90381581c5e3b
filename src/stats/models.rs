use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::matches::models::Side;
use crate::shared::AppError;
use crate::user::models::CounterDelta;

/// Cached account counter a stat kind feeds into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Goals,
    Assists,
    Kcoins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum StatKind {
    #[serde(rename = "goal")]
    Goal,
    #[serde(rename = "assist")]
    Assist,
    #[serde(rename = "yellow")]
    YellowCard,
    #[serde(rename = "red")]
    RedCard,
    #[serde(rename = "sub off")]
    SubstitutionOff,
    #[serde(rename = "sub on")]
    SubstitutionOn,
    #[serde(rename = "kcoins")]
    CurrencyCredit,
}

impl StatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKind::Goal => "goal",
            StatKind::Assist => "assist",
            StatKind::YellowCard => "yellow",
            StatKind::RedCard => "red",
            StatKind::SubstitutionOff => "sub off",
            StatKind::SubstitutionOn => "sub on",
            StatKind::CurrencyCredit => "kcoins",
        }
    }

    /// Counter updated when an event of this kind is first recorded
    pub fn affected_counter(&self) -> Option<Counter> {
        match self {
            StatKind::Goal => Some(Counter::Goals),
            StatKind::Assist => Some(Counter::Assists),
            StatKind::CurrencyCredit => Some(Counter::Kcoins),
            StatKind::YellowCard
            | StatKind::RedCard
            | StatKind::SubstitutionOff
            | StatKind::SubstitutionOn => None,
        }
    }

    pub fn counter_delta(&self, value: i64) -> CounterDelta {
        match self.affected_counter() {
            Some(Counter::Goals) => CounterDelta {
                goals: value,
                ..CounterDelta::default()
            },
            Some(Counter::Assists) => CounterDelta {
                assists: value,
                ..CounterDelta::default()
            },
            Some(Counter::Kcoins) => CounterDelta {
                kcoins: value,
                ..CounterDelta::default()
            },
            None => CounterDelta::default(),
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for StatKind {
    type Error = AppError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        StatKind::iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| AppError::UnknownStatKind(value.to_string()))
    }
}

/// Accepted stat event, unique per `stat_uuid`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatEvent {
    pub id: i64,
    pub stat_uuid: String,
    #[serde(rename = "stat_type")]
    pub stat_kind: StatKind,
    pub value: i64,
    #[serde(rename = "user")]
    pub account_id: i64,
    #[serde(rename = "match")]
    pub match_id: Option<i64>,
    pub side: Option<Side>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStatEvent {
    pub stat_uuid: String,
    pub stat_kind: StatKind,
    pub value: i64,
    pub account_id: i64,
    pub match_id: Option<i64>,
    pub side: Option<Side>,
}

impl NewStatEvent {
    pub fn into_model(self, id: i64, now: DateTime<Utc>) -> StatEvent {
        StatEvent {
            id,
            stat_uuid: self.stat_uuid,
            stat_kind: self.stat_kind,
            value: self.value,
            account_id: self.account_id,
            match_id: self.match_id,
            side: self.side,
            created_at: now,
        }
    }
}

/// Stat event as stored; kind and side are text columns
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StatEventRow {
    pub id: i64,
    pub stat_uuid: String,
    pub stat_type: String,
    pub value: i64,
    pub account_id: i64,
    pub match_id: Option<i64>,
    pub side: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StatEventRow> for StatEvent {
    type Error = AppError;

    fn try_from(row: StatEventRow) -> Result<Self, Self::Error> {
        Ok(StatEvent {
            id: row.id,
            stat_uuid: row.stat_uuid,
            stat_kind: StatKind::try_from(row.stat_type.as_str())?,
            value: row.value,
            account_id: row.account_id,
            match_id: row.match_id,
            side: row.side.as_deref().map(Side::try_from).transpose()?,
            created_at: row.created_at,
        })
    }
}
