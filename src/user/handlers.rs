use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::net::SocketAddr;
use tracing::{info, instrument, warn};

use super::{
    credentials,
    models::ProfileUpdate,
    names::input_to_username,
    service::CredentialResetRequest,
    types::{
        profiles, AccountProfile, ChangePasswordRequest, LoginRequest, LoginResponse,
        ResetPasswordRequest, ResetPasswordResponse, SearchQuery,
    },
};
use crate::session::{ServerCaller, SessionClaims};
use crate::shared::{AppError, AppState};

/// HTTP handler for the server-driven password reset
///
/// POST /api/v1/users/reset-password
/// Returns the generated password; 201 when the account was created by this call
#[instrument(name = "reset_password", skip(state, payload), fields(caller = %caller.username))]
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(caller): Extension<ServerCaller>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ResetPasswordResponse>), AppError> {
    let Json(request) = payload?;
    let new_password = credentials::generate_password();
    let reset_request = CredentialResetRequest {
        handle: request.username,
        display_name: request.display_name,
        email: request.email,
        external_uuid: request.uuid,
    };

    let (account, created) = state
        .accounts
        .reset_credential(&reset_request, &new_password)
        .await?;

    info!(event = "reset_password", handle = %account.handle, created, "Password reset");

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(ResetPasswordResponse { pass: new_password })))
}

/// HTTP handler for end-user login
///
/// POST /api/v1/users/login
/// Returns a session token; failed attempts count against the client's rate limit
#[instrument(name = "login", skip(state, connect_info, payload))]
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) = payload?;
    let client = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if state.login_limiter.is_limited(&client).await {
        warn!(event = "ratelimit", client = %client, username = %request.username, "Login rate limited");
        return Err(AppError::TooManyRequests(
            "Too many failed login attempts. Please try again later.".to_string(),
        ));
    }

    let account = match state
        .accounts
        .authenticate(&request.username, &request.password)
        .await
    {
        Ok(account) => account,
        Err(err @ AppError::Unauthorized(_)) => {
            state.login_limiter.record_failure(&client).await;
            return Err(err);
        }
        Err(err) => return Err(err),
    };

    let token = state
        .token_config
        .create_token(account.id, account.handle.clone())?;

    info!(handle = %account.handle, "Login successful");
    Ok(Json(LoginResponse {
        token,
        username: account.handle,
    }))
}

/// GET /api/v1/users/me
#[instrument(name = "current_account", skip(state, claims), fields(account_id = claims.account_id))]
pub async fn current_account(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
) -> Result<Json<AccountProfile>, AppError> {
    let account = state.accounts.get_by_id(claims.account_id).await?;
    Ok(Json(AccountProfile::from(&account)))
}

/// PATCH /api/v1/users/me
#[instrument(name = "update_current_account", skip(state, claims, payload), fields(account_id = claims.account_id))]
pub async fn update_current_account(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<AccountProfile>, AppError> {
    let Json(update) = payload?;
    let account = state
        .accounts
        .update_profile(claims.account_id, &update)
        .await?;
    info!(handle = %account.handle, "Profile updated");
    Ok(Json(AccountProfile::from(&account)))
}

/// POST /api/v1/users/change-password
#[instrument(name = "change_password", skip(state, claims, payload), fields(account_id = claims.account_id))]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<SessionClaims>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(request) = payload?;
    state
        .accounts
        .change_credential(
            claims.account_id,
            &request.old_password,
            &request.new_password,
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/users/search?name=
#[instrument(name = "search_accounts", skip(state))]
pub async fn search_accounts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<AccountProfile>>, AppError> {
    let name = query
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::Validation("name is required".to_string()))?;

    let accounts = state
        .accounts
        .search_by_name(&input_to_username(&name))
        .await?;
    info!(result_count = accounts.len(), "Account search completed");
    Ok(Json(profiles(&accounts)))
}

/// GET /api/v1/users/marketplace
#[instrument(name = "marketplace", skip(state))]
pub async fn marketplace(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountProfile>>, AppError> {
    let accounts = state.accounts.search_marketplace().await?;
    Ok(Json(profiles(&accounts)))
}

/// GET /api/v1/users/test-accounts
#[instrument(name = "test_accounts", skip(state))]
pub async fn test_accounts(
    State(state): State<AppState>,
) -> Result<Json<Vec<AccountProfile>>, AppError> {
    let accounts = state.accounts.list_test_accounts().await?;
    Ok(Json(profiles(&accounts)))
}

/// GET /api/v1/users/:handle
#[instrument(name = "account_profile", skip(state))]
pub async fn account_profile(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<AccountProfile>, AppError> {
    let account = state.accounts.get_by_handle(&handle).await?;
    Ok(Json(AccountProfile::from(&account)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::router;
    use crate::shared::test_utils::{basic_auth_header, AppStateBuilder, TEST_BASIC_TOKEN};
    use axum::{
        body::Body,
        http::{header, Request},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt; // for `oneshot`

    const DUMMY_UUID: &str = "2e81fb58-f191-4c0e-aaa9-a41c92f689fa";

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn server_request(uri: &str, body: Value) -> Request<Body> {
        let mut request = json_request("POST", uri, body);
        request.headers_mut().insert(
            header::AUTHORIZATION,
            basic_auth_header(TEST_BASIC_TOKEN).parse().unwrap(),
        );
        request
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn register(app: &Router, handle: &str) -> String {
        let response = app
            .clone()
            .oneshot(server_request(
                "/api/v1/users/reset-password",
                json!({"username": handle, "uuid": DUMMY_UUID}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["pass"].as_str().unwrap().to_string()
    }

    async fn login_token(app: &Router, username: &str, password: &str) -> String {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/v1/users/login",
                json!({"username": username, "password": password}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_reset_password_without_auth() {
        let app = router(AppStateBuilder::new().build());

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/users/reset-password",
                json!({"username": "john.smith", "uuid": DUMMY_UUID}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"Users\""
        );
    }

    #[tokio::test]
    async fn test_reset_password_without_username() {
        let app = router(AppStateBuilder::new().build());

        let response = app
            .oneshot(server_request("/api/v1/users/reset-password", json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_password_with_invalid_username() {
        let app = router(AppStateBuilder::new().build());

        let response = app
            .oneshot(server_request(
                "/api/v1/users/reset-password",
                json!({"username": "john smith", "uuid": DUMMY_UUID}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_password_with_mistyped_field() {
        let app = router(AppStateBuilder::new().build());

        let response = app
            .oneshot(server_request(
                "/api/v1/users/reset-password",
                json!({"username": ["john.smith"], "uuid": DUMMY_UUID}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_login_with_numeric_password() {
        let app = router(AppStateBuilder::new().build());

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/users/login",
                json!({"username": "bobby.marley", "password": 12345}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reset_password_existing_user_returns_ok() {
        let app = router(AppStateBuilder::new().build());
        let first = register(&app, "john.smith").await;

        let response = app
            .clone()
            .oneshot(server_request(
                "/api/v1/users/reset-password",
                json!({"username": "john.smith", "uuid": DUMMY_UUID}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let second = body_json(response).await["pass"].as_str().unwrap().to_string();
        assert_ne!(first, second);
        login_token(&app, "john.smith", &second).await;
    }

    #[tokio::test]
    async fn test_login_and_profile_roundtrip() {
        let app = router(AppStateBuilder::new().build());
        let password = register(&app, "bobby.marley").await;
        let token = login_token(&app, "Bobby Marley", &password).await;

        let update = Request::builder()
            .method("PATCH")
            .uri("/api/v1/users/me")
            .header("content-type", "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(
                json!({"introduction": "Keeper", "available_for_transfer": true}).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(update).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let me = Request::builder()
            .uri("/api/v1/users/me")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(me).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let profile: AccountProfile =
            serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(profile.username, "bobby.marley");
        assert_eq!(profile.first_name, "Bobby");
        assert_eq!(profile.introduction, "Keeper");
        assert!(profile.available_for_transfer);

        let market = Request::builder()
            .uri("/api/v1/users/marketplace")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(market).await.unwrap();
        let listed: Vec<AccountProfile> =
            serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].username, "bobby.marley");
    }

    #[tokio::test]
    async fn test_me_requires_session() {
        let app = router(AppStateBuilder::new().build());

        let request = Request::builder()
            .uri("/api/v1/users/me")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let app = router(AppStateBuilder::new().build());
        register(&app, "bobby.marley").await;

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/users/login",
                json!({"username": "bobby.marley", "password": "The-wrong-password"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_rate_limited_after_failures() {
        let app = router(AppStateBuilder::new().with_login_limit(2).build());
        let password = register(&app, "bobby.marley").await;

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(json_request(
                    "POST",
                    "/api/v1/users/login",
                    json!({"username": "bobby.marley", "password": "nope"}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/v1/users/login",
                json!({"username": "bobby.marley", "password": password}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_change_password_with_wrong_current_password() {
        let app = router(AppStateBuilder::new().build());
        let password = register(&app, "user1").await;
        let token = login_token(&app, "user1", &password).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/users/change-password")
            .header("content-type", "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(Body::from(
                json!({"old_password": "invalid", "new_password": "new-password"}).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_search_accepts_display_name_input() {
        let state = AppStateBuilder::new().build();
        state
            .accounts
            .bulk_get_or_create(&["John Smith".to_string(), "Mary Jones".to_string()])
            .await
            .unwrap();
        let app = router(state);

        let request = Request::builder()
            .uri("/api/v1/users/search?name=John%20Sm")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let found: Vec<AccountProfile> =
            serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "john.smith");

        let missing = Request::builder()
            .uri("/api/v1/users/search")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(missing).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_profile_not_found() {
        let app = router(AppStateBuilder::new().build());

        let request = Request::builder()
            .uri("/api/v1/users/nobody")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
