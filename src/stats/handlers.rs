use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::instrument;

use super::{models::StatEvent, service::StatSubmission, types::CreateStatRequest};
use crate::session::ServerCaller;
use crate::shared::{AppError, AppState};

/// HTTP handler for recording a stat event
///
/// POST /api/v1/soccer/stats
/// 201 for a new event, 200 when the `stat_uuid` was already recorded
#[instrument(name = "create_stat", skip(state, payload), fields(caller = %caller.username))]
pub async fn create_stat(
    State(state): State<AppState>,
    Extension(caller): Extension<ServerCaller>,
    payload: Result<Json<CreateStatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StatEvent>), AppError> {
    let Json(request) = payload?;
    let submission = StatSubmission::from(request);
    let (event, created) = state.stat_ledger.record_stat(&submission).await?;

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::router;
    use crate::shared::test_utils::{basic_auth_header, AppStateBuilder, TEST_BASIC_TOKEN};
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    fn stat_request(auth: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/soccer/stats")
            .header("content-type", "application/json");
        if let Some(token) = auth {
            builder = builder.header(header::AUTHORIZATION, basic_auth_header(token));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    #[tokio::test]
    async fn test_create_stat_with_invalid_token() {
        let app = router(AppStateBuilder::new().build());

        let response = app
            .oneshot(stat_request(
                Some("script1:wrong"),
                json!({"username": "user", "stat_uuid": "some-uuid", "stat_type": "goal", "value": 1}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_stat_then_resubmit() {
        let app = router(AppStateBuilder::new().build());
        let body = json!({"username": "user", "stat_uuid": "someuuid", "stat_type": "goal", "value": 1});

        let first = app
            .clone()
            .oneshot(stat_request(Some(TEST_BASIC_TOKEN), body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(stat_request(Some(TEST_BASIC_TOKEN), body))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(second.into_body(), usize::MAX)
            .await
            .unwrap();
        let event: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(event["stat_uuid"], "someuuid");
        assert_eq!(event["stat_type"], "goal");
    }

    #[tokio::test]
    async fn test_create_stat_with_unknown_kind() {
        let app = router(AppStateBuilder::new().build());

        let response = app
            .oneshot(stat_request(
                Some(TEST_BASIC_TOKEN),
                json!({"username": "user", "stat_uuid": "k1", "stat_type": "kcoints", "value": 5}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_stat_with_mistyped_body() {
        let app = router(AppStateBuilder::new().build());

        let response = app
            .clone()
            .oneshot(stat_request(
                Some(TEST_BASIC_TOKEN),
                json!({"username": "user", "stat_uuid": "v1", "stat_type": "goal", "value": "one"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["error"].is_string());

        let garbled = Request::builder()
            .method("POST")
            .uri("/api/v1/soccer/stats")
            .header("content-type", "application/json")
            .header(header::AUTHORIZATION, basic_auth_header(TEST_BASIC_TOKEN))
            .body(Body::from("{\"username\": "))
            .unwrap();
        let response = app.oneshot(garbled).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
