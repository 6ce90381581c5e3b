use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use super::{service::MatchSubmission, types::{CreateMatchRequest, MatchResponse}};
use crate::session::ServerCaller;
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a match with its roster
///
/// POST /api/v1/soccer/matches
#[instrument(name = "create_match", skip(state, payload), fields(caller = %caller.username))]
pub async fn create_match(
    State(state): State<AppState>,
    Extension(caller): Extension<ServerCaller>,
    payload: Result<Json<CreateMatchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MatchResponse>), AppError> {
    let Json(request) = payload?;
    let recorded = state
        .match_recorder
        .create_match(&MatchSubmission::from(request))
        .await?;

    Ok((StatusCode::CREATED, Json(MatchResponse::from(recorded))))
}
