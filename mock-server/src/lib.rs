//! In-memory stand-in for the InoCore endpoints the client talks to.
//!
//! `POST /token` issues bearer tokens for basic-auth credentials; every route
//! under `/v1` accepts either such a token or the same basic credentials.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const DEFAULT_USERNAME: &str = "daemon@localhost";
pub const DEFAULT_PASSWORD: &str = "daemon2k22";

#[derive(Debug, Clone)]
pub struct MockConfig {
    pub username: String,
    pub password: String,
    pub token_ttl: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            token_ttl: Duration::hours(1),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: MockConfig,
    tokens: RwLock<HashSet<String>>,
    token_requests: AtomicUsize,
}

impl AppState {
    pub fn new(config: MockConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                tokens: RwLock::new(HashSet::new()),
                token_requests: AtomicUsize::new(0),
            }),
        }
    }

    /// Number of `POST /token` requests seen so far.
    pub fn token_requests(&self) -> usize {
        self.inner.token_requests.load(Ordering::SeqCst)
    }

    fn basic_matches(&self, encoded: &str) -> bool {
        let expected = format!("{}:{}", self.inner.config.username, self.inner.config.password);
        STANDARD
            .decode(encoded.trim())
            .is_ok_and(|decoded| decoded == expected.as_bytes())
    }
}

pub fn app() -> Router {
    router(AppState::new(MockConfig::default()))
}

pub fn router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/ping", get(ping))
        .route("/echo", any(echo))
        .route("/status/{code}", get(simulated_status))
        .route("/plain", get(plain))
        .route("/empty", get(empty))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/token", post(issue_token))
        .nest("/v1", v1)
        .with_state(state)
}

pub async fn run_with(listener: TcpListener, state: AppState) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({"error": message, "statusCode": status.as_u16()})),
    )
        .into_response()
}

fn authorization(headers: &HeaderMap) -> Option<(&str, &str)> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .split_once(' ')
}

async fn issue_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.inner.token_requests.fetch_add(1, Ordering::SeqCst);

    match authorization(&headers) {
        Some(("Basic", encoded)) if state.basic_matches(encoded) => {}
        _ => return error_body(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    }

    let token = Uuid::new_v4().to_string();
    state.inner.tokens.write().await.insert(token.clone());
    let expires = Utc::now() + state.inner.config.token_ttl;
    tracing::debug!(%expires, "issued token");

    (
        StatusCode::CREATED,
        Json(json!({
            "token": token,
            "expires": {
                "date": expires.format("%Y-%m-%d %H:%M:%S%.6f").to_string(),
                "timezone_type": 3,
                "timezone": "UTC"
            }
        })),
    )
        .into_response()
}

async fn require_auth(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let allowed = match authorization(&headers) {
        Some(("Bearer", token)) => state.inner.tokens.read().await.contains(token),
        Some(("Basic", encoded)) => state.basic_matches(encoded),
        _ => false,
    };
    if !allowed {
        return error_body(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    next.run(request).await
}

async fn ping() -> Json<Value> {
    Json(json!({"data": {"PONG": 1}, "statusCode": 200}))
}

/// Reflect the request back so callers can inspect what was sent.
async fn echo(
    method: Method,
    headers: HeaderMap,
    Query(query): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Response {
    let body = if body.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(_) => return error_body(StatusCode::BAD_REQUEST, "Invalid JSON body"),
        }
    };
    let project_id = headers
        .get("x-project-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    Json(json!({
        "data": {
            "method": method.as_str(),
            "query": query,
            "body": body,
            "projectId": project_id,
        },
        "statusCode": 200
    }))
    .into_response()
}

async fn simulated_status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => error_body(status, "Simulated failure"),
        Err(_) => error_body(StatusCode::BAD_REQUEST, "Unknown status code"),
    }
}

async fn plain() -> &'static str {
    "pong"
}

async fn empty() -> StatusCode {
    StatusCode::NO_CONTENT
}
