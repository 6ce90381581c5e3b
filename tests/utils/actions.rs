#![allow(dead_code)] // Test utilities may not all be used in every test

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use super::setup::{TestSetup, SERVER_TOKEN};

/// Status and decoded JSON body of one request
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    pub fn field(&self, key: &str) -> Value {
        self.body[key].clone()
    }
}

// ============================================================================
// Action Helpers
// ============================================================================

impl TestSetup {
    /// Send a request through the full router and decode the reply
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }

    pub async fn server_post(&self, uri: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(
                header::AUTHORIZATION,
                format!("Basic {}", STANDARD.encode(SERVER_TOKEN)),
            )
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn public_get(&self, uri: &str) -> TestResponse {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn session_request(
        &self,
        method: &str,
        uri: &str,
        token: &str,
        body: Option<Value>,
    ) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        self.send(request).await
    }

    // ============================================================================
    // Convenience Action Methods
    // ============================================================================

    pub async fn post_stat(&self, username: &str, stat_type: &str, value: i64, token: &str) -> TestResponse {
        self.server_post(
            "/api/v1/soccer/stats",
            json!({
                "username": username,
                "stat_type": stat_type,
                "value": value,
                "stat_uuid": token,
            }),
        )
        .await
    }

    pub async fn post_match(&self, home: &[&str], away: &[&str]) -> TestResponse {
        self.server_post(
            "/api/v1/soccer/matches",
            json!({
                "competition": "league",
                "home_team": "Reds",
                "away_team": "Blues",
                "home_players": home,
                "away_players": away,
            }),
        )
        .await
    }

    /// Registers (or resets) an account and returns the generated password
    pub async fn reset_password(&self, username: &str, uuid: &str) -> TestResponse {
        self.server_post(
            "/api/v1/users/reset-password",
            json!({"username": username, "uuid": uuid}),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/users/login")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({"username": username, "password": password}).to_string(),
            ))
            .unwrap();
        self.send(request).await
    }
}
