//! Executes `HttpRequest` values against the network.
//!
//! # Design
//! `Transport` is the only I/O seam of the client. `UreqTransport` is the
//! production implementation; tests substitute a stub that records requests
//! and replays canned responses. The agent is built with
//! `http_status_as_error(false)` so 4xx/5xx come back as data and status
//! interpretation stays in `ApiClient`.

use std::sync::Arc;

use ureq::tls::TlsConfig;
use ureq::{Agent, RequestBuilder};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Performs one blocking HTTP round-trip.
///
/// Implementations return `Err` only for transport failures (DNS, refused
/// connection, TLS, timeouts, unreadable bodies). Any HTTP status is `Ok`.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(request)
    }
}

#[derive(Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    /// Build an agent that verifies the server certificate unless
    /// `verify_peer` is false.
    pub fn new(verify_peer: bool) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(TlsConfig::builder().disable_verification(!verify_peer).build())
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a caller-configured agent, e.g. one with timeouts or a proxy.
    /// The agent must not treat HTTP error statuses as errors.
    pub fn from_agent(agent: Agent) -> Self {
        Self { agent }
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        let agent = &self.agent;
        let url = request.url.as_str();
        let headers = &request.headers;

        let result = match (request.method, request.body.as_deref()) {
            (HttpMethod::Get, None) => with_headers(agent.get(url), headers).call(),
            (HttpMethod::Get, Some(body)) => with_headers(agent.get(url), headers)
                .force_send_body()
                .send(body.as_bytes()),
            (HttpMethod::Delete, None) => with_headers(agent.delete(url), headers).call(),
            (HttpMethod::Delete, Some(body)) => with_headers(agent.delete(url), headers)
                .force_send_body()
                .send(body.as_bytes()),
            (HttpMethod::Post, Some(body)) => with_headers(agent.post(url), headers).send(body.as_bytes()),
            (HttpMethod::Post, None) => with_headers(agent.post(url), headers).send_empty(),
            (HttpMethod::Put, Some(body)) => with_headers(agent.put(url), headers).send(body.as_bytes()),
            (HttpMethod::Put, None) => with_headers(agent.put(url), headers).send_empty(),
        };

        let mut response = result.map_err(|e| ApiError::transport(url, e.to_string()))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::InvalidResponse {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: status.canonical_reason().map(str::to_string),
                message: Some(format!("cannot read body: {e}")),
            })?;

        Ok(HttpResponse {
            url: url.to_string(),
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            headers,
            body,
        })
    }
}
