//! HTTP request and response described as plain data.
//!
//! # Design
//! `ApiClient` builds an `HttpRequest`, hands it to a `Transport`, and parses
//! the `HttpResponse` it gets back. Keeping both sides as owned data makes the
//! build and parse steps deterministic and testable without a network.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::ApiError;

/// HTTP methods supported by the InoCore API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 4] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a method name outside GET, POST, PUT and DELETE.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("method {0:?} is not supported, must be one of GET, POST, PUT, DELETE")]
pub struct UnsupportedMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnsupportedMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnsupportedMethod(s.to_string()))
    }
}

/// An HTTP request ready to be executed by a `Transport`.
///
/// `url` is absolute and already carries the encoded query string.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First header value with the given name, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response as received from the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Decode the body as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Result of a successful call: the decoded JSON body, or the raw response
/// when the client was configured with `return_object`.
#[derive(Debug, Clone)]
pub enum ApiResult {
    Json(Value),
    Response(HttpResponse),
}

impl ApiResult {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiResult::Json(_) => None,
            ApiResult::Response(response) => Some(response.status),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ApiResult::Json(value) => Some(value),
            ApiResult::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&HttpResponse> {
        match self {
            ApiResult::Json(_) => None,
            ApiResult::Response(response) => Some(response),
        }
    }

    /// The JSON body in either shape. Raw responses are decoded on demand.
    pub fn into_json(self) -> Result<Value, ApiError> {
        match self {
            ApiResult::Json(value) => Ok(value),
            ApiResult::Response(response) => response.json().map_err(|e| ApiError::InvalidResponse {
                url: response.url.clone(),
                status: Some(response.status),
                reason: response.reason.clone(),
                message: Some(format!("JSON error: {e}")),
            }),
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
