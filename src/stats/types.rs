use serde::Deserialize;

use super::service::StatSubmission;

#[derive(Debug, Deserialize)]
pub struct CreateStatRequest {
    pub username: Option<String>,
    pub stat_type: Option<String>,
    pub value: Option<i64>,
    pub stat_uuid: Option<String>,
    #[serde(rename = "match")]
    pub match_id: Option<i64>,
    pub side: Option<String>,
}

impl From<CreateStatRequest> for StatSubmission {
    fn from(request: CreateStatRequest) -> Self {
        StatSubmission {
            username: request.username,
            stat_type: request.stat_type,
            value: request.value,
            stat_uuid: request.stat_uuid,
            match_id: request.match_id,
            side: request.side,
        }
    }
}
