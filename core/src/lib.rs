//! Blocking client for the InoCore REST API.
//!
//! # Overview
//! `ApiClient` composes endpoint URLs from a validated base URL, encodes
//! filter/sort/limit/offset query parameters, attaches credentials and the
//! project id, and classifies failures into three error kinds.
//!
//! ```no_run
//! use inocore_connect::{ApiClient, ClientConfig, QueryParams};
//!
//! # fn main() -> Result<(), inocore_connect::ApiError> {
//! let config = ClientConfig::new("https://core.example.com", "daemon@localhost", "secret", "my-project")?;
//! let client = ApiClient::new(config);
//!
//! let pong = client.get("v1/ping", None)?.into_json()?;
//! let params = QueryParams::new().filter("bus_type", "eq", "MODBUS").limit(10);
//! let buses = client.get("v1/bus_config", Some(&params))?;
//! # let _ = (pong, buses);
//! # Ok(())
//! # }
//! ```
//!
//! # Design
//! - Request building and response parsing are pure; only `Transport` does
//!   I/O, so both halves are tested without a server.
//! - Configuration is immutable once the client is built. The bearer token
//!   cache is the only interior state.
//! - Request-body serialization errors are surfaced as the raw
//!   `serde_json::Error` inside `ApiError::Serialization`.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod query;
pub mod token;
pub mod transport;

pub use client::ApiClient;
pub use config::{AuthScheme, ClientConfig, ConfigError};
pub use error::ApiError;
pub use http::{ApiResult, HttpMethod, HttpRequest, HttpResponse, UnsupportedMethod};
pub use query::{Filter, QueryParams, Sort, SortDirection};
pub use token::Token;
pub use transport::{Transport, UreqTransport};
