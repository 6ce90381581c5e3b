use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::service::{MatchSubmission, RecordedMatch};

#[derive(Debug, Deserialize)]
pub struct CreateMatchRequest {
    pub competition: Option<String>,
    pub home_team: Option<String>,
    pub away_team: Option<String>,
    pub home_players: Option<Vec<String>>,
    pub away_players: Option<Vec<String>>,
}

impl From<CreateMatchRequest> for MatchSubmission {
    fn from(request: CreateMatchRequest) -> Self {
        MatchSubmission {
            competition: request.competition,
            home_team: request.home_team,
            away_team: request.away_team,
            home_players: request.home_players,
            away_players: request.away_players,
        }
    }
}

/// Created match with each side listed by handle
#[derive(Debug, Serialize, Deserialize)]
pub struct MatchResponse {
    pub id: i64,
    pub competition: String,
    pub home_team: String,
    pub away_team: String,
    pub home_players: Vec<String>,
    pub away_players: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<RecordedMatch> for MatchResponse {
    fn from(recorded: RecordedMatch) -> Self {
        MatchResponse {
            id: recorded.match_model.id,
            competition: recorded.match_model.competition,
            home_team: recorded.match_model.home_team,
            away_team: recorded.match_model.away_team,
            home_players: recorded.home_players.into_iter().map(|a| a.handle).collect(),
            away_players: recorded.away_players.into_iter().map(|a| a.handle).collect(),
            created_at: recorded.match_model.created_at,
        }
    }
}
