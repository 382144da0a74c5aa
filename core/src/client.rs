//! Blocking client for the InoCore REST API.
//!
//! # Design
//! Every call goes through three steps: `build_request` turns the endpoint,
//! body and query parameters into a plain `HttpRequest`, the `Transport`
//! executes it, and `parse_response` classifies the `HttpResponse`. Build and
//! parse are pure, so URL composition, query encoding and error classification
//! are tested without a network.
//!
//! With `AuthScheme::Token` the credentials are exchanged for a bearer token
//! at `POST /token`. The token is cached behind a mutex and reused until its
//! expiry date or until an API call is answered with 401; it is the only
//! state that changes between calls.

use std::sync::{Mutex, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{AuthScheme, ClientConfig};
use crate::error::ApiError;
use crate::http::{ApiResult, HttpMethod, HttpRequest, HttpResponse};
use crate::query::QueryParams;
use crate::token::Token;
use crate::transport::{Transport, UreqTransport};

pub const USER_AGENT: &str = concat!("inocore-connect/", env!("CARGO_PKG_VERSION"));
pub const PROJECT_HEADER: &str = "X-Project-Id";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const TOKEN_ENDPOINT: &str = "token";

pub struct ApiClient {
    config: ClientConfig,
    transport: Box<dyn Transport>,
    token: Mutex<Option<Token>>,
}

impl ApiClient {
    /// Create a client backed by a ureq agent. No request is sent until the
    /// first call.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.verifies_peer());
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        if !config.verifies_peer() {
            warn!(
                base_url = %config.base_url(),
                "TLS peer verification is disabled; only use this on trusted networks"
            );
        }
        Self {
            config,
            transport: Box::new(transport),
            token: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn get(&self, endpoint: &str, params: Option<&QueryParams>) -> Result<ApiResult, ApiError> {
        self.call::<Value>(HttpMethod::Get, endpoint, None, params)
    }

    pub fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        data: Option<&T>,
        params: Option<&QueryParams>,
    ) -> Result<ApiResult, ApiError> {
        self.call(HttpMethod::Post, endpoint, data, params)
    }

    pub fn put<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        data: Option<&T>,
        params: Option<&QueryParams>,
    ) -> Result<ApiResult, ApiError> {
        self.call(HttpMethod::Put, endpoint, data, params)
    }

    pub fn delete<T: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        data: Option<&T>,
        params: Option<&QueryParams>,
    ) -> Result<ApiResult, ApiError> {
        self.call(HttpMethod::Delete, endpoint, data, params)
    }

    /// Send one request and classify the response.
    ///
    /// The URL is validated and the body serialized before any network
    /// activity, including the token request.
    pub fn call<T: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        data: Option<&T>,
        params: Option<&QueryParams>,
    ) -> Result<ApiResult, ApiError> {
        let mut request = self.build_request(method, endpoint, data, params)?;
        let authorization = self.authorization()?;
        request.headers.push(("Authorization".to_string(), authorization));

        debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.transport.execute(&request)?;
        debug!(status = response.status, url = %request.url, "received response");

        if response.status == 401 && self.config.scheme() == AuthScheme::Token {
            self.forget_token();
        }
        self.parse_response(response)
    }

    /// Build the request for `call` without the `Authorization` header.
    pub fn build_request<T: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        endpoint: &str,
        data: Option<&T>,
        params: Option<&QueryParams>,
    ) -> Result<HttpRequest, ApiError> {
        let mut url = self.endpoint_url(endpoint)?;
        if let Some(params) = params.filter(|p| !p.is_empty()) {
            url.query_pairs_mut().extend_pairs(params.to_pairs());
        }

        let body = data.map(serde_json::to_string).transpose()?;

        let mut headers = vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
            (PROJECT_HEADER.to_string(), self.config.project_id().to_string()),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()));
        }

        Ok(HttpRequest {
            method,
            url: url.into(),
            headers,
            body,
        })
    }

    /// Classify a response: 401/403 are authorization failures, any other
    /// non-2xx status or an undecodable JSON body is an invalid response.
    pub fn parse_response(&self, response: HttpResponse) -> Result<ApiResult, ApiError> {
        check_status(&response)?;
        if self.config.returns_object() {
            return Ok(ApiResult::Response(response));
        }
        decode_body(&response).map(ApiResult::Json)
    }

    pub fn build_token_request(&self) -> Result<HttpRequest, ApiError> {
        let url = self.endpoint_url(TOKEN_ENDPOINT)?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![
                ("Accept".to_string(), "application/json".to_string()),
                ("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string()),
                ("User-Agent".to_string(), USER_AGENT.to_string()),
                ("Authorization".to_string(), self.basic_auth()),
            ],
            body: None,
        })
    }

    pub fn parse_token_response(&self, response: HttpResponse) -> Result<Token, ApiError> {
        check_status(&response)?;
        let body = decode_body(&response)?;
        Token::from_body(&body).map_err(|message| ApiError::InvalidResponse {
            url: response.url.clone(),
            status: Some(response.status),
            reason: response.reason.clone(),
            message: Some(message),
        })
    }

    fn authorization(&self) -> Result<String, ApiError> {
        match self.config.scheme() {
            AuthScheme::Basic => Ok(self.basic_auth()),
            AuthScheme::Token => self.bearer_token().map(|token| format!("Bearer {token}")),
        }
    }

    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.config.username(), self.config.password());
        format!("Basic {}", STANDARD.encode(credentials))
    }

    /// Return the cached token, fetching a new one once it has expired.
    /// The lock is held during the fetch so concurrent callers share it.
    fn bearer_token(&self) -> Result<String, ApiError> {
        let mut cached = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired_at(Utc::now())) {
            return Ok(token.value().to_string());
        }

        let request = self.build_token_request()?;
        debug!(url = %request.url, username = self.config.username(), "requesting token");
        let token = self.parse_token_response(self.transport.execute(&request)?)?;
        debug!(expires_at = %token.expires_at(), "token acquired");

        let value = token.value().to_string();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop a token the server rejected so the next call fetches a new one.
    fn forget_token(&self) {
        let mut cached = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if cached.take().is_some() {
            debug!("cached token rejected, discarding");
        }
    }

    /// Join the base URL and `endpoint` with exactly one slash.
    fn endpoint_url(&self, endpoint: &str) -> Result<Url, ApiError> {
        let base = self.config.base_url();
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );

        if endpoint.chars().any(|c| c.is_whitespace() || c.is_control() || c == '#') {
            return Err(ApiError::invalid_url(
                joined,
                "endpoint contains whitespace, control characters or '#'",
            ));
        }

        let url = Url::parse(&joined).map_err(|e| ApiError::invalid_url(&joined, e.to_string()))?;
        if url.host_str() != base.host_str() || url.port_or_known_default() != base.port_or_known_default() {
            return Err(ApiError::invalid_url(joined, "endpoint changes the host of the base URL"));
        }
        Ok(url)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("config", &self.config).finish_non_exhaustive()
    }
}

fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let message = error_message(&response.body);
    if matches!(response.status, 401 | 403) {
        return Err(ApiError::Authorization {
            status: response.status,
            message,
        });
    }
    Err(ApiError::InvalidResponse {
        url: response.url.clone(),
        status: Some(response.status),
        reason: response.reason.clone(),
        message,
    })
}

fn decode_body(response: &HttpResponse) -> Result<Value, ApiError> {
    if response.status == 204 && response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    response.json().map_err(|e| ApiError::InvalidResponse {
        url: response.url.clone(),
        status: Some(response.status),
        reason: response.reason.clone(),
        message: Some(format!("JSON error: {e}")),
    })
}

/// Pull a server-supplied message out of an error body, if it is JSON.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let found = [value.get("error"), value.get("message"), value.pointer("/data/error")]
        .into_iter()
        .flatten()
        .find_map(|candidate| match candidate {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Object(fields) => fields.get("message").and_then(Value::as_str).map(str::to_string),
            _ => None,
        });
    found
}
