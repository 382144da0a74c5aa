//! Client configuration.
//!
//! `ClientConfig::new` validates the base URL up front so that a client can
//! never be built around an unusable address. The remaining options are set
//! with consuming setters before the config is handed to `ApiClient`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::error::ApiError;

pub const ENV_URL: &str = "INOCORE_URL";
pub const ENV_USERNAME: &str = "INOCORE_USERNAME";
pub const ENV_PASSWORD: &str = "INOCORE_PASSWORD";
pub const ENV_PROJECT_ID: &str = "INOCORE_PROJECT_ID";
pub const ENV_RETURN_OBJECT: &str = "INOCORE_RETURN_OBJECT";
pub const ENV_VERIFY_PEER: &str = "INOCORE_VERIFY_PEER";
pub const ENV_AUTH: &str = "INOCORE_AUTH";

/// How credentials are presented to the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthScheme {
    /// Exchange the credentials for a bearer token at `POST /token` and reuse
    /// it until it expires.
    #[default]
    Token,
    /// Send HTTP basic auth on every request.
    Basic,
}

impl FromStr for AuthScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "token" | "bearer" => Ok(AuthScheme::Token),
            "basic" => Ok(AuthScheme::Basic),
            other => Err(format!("unknown auth scheme {other:?}, expected \"token\" or \"basic\"")),
        }
    }
}

/// Errors from `ClientConfig::from_env`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error(transparent)]
    Url(#[from] ApiError),
}

#[derive(Clone)]
pub struct ClientConfig {
    base_url: Url,
    username: String,
    password: String,
    project_id: String,
    return_object: bool,
    verify_peer: bool,
    auth_scheme: AuthScheme,
}

impl ClientConfig {
    /// Validate `base_url` and build a config with default options.
    pub fn new(
        base_url: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let base_url = validate_base_url(base_url)?;
        Ok(Self {
            base_url,
            username: username.into(),
            password: password.into(),
            project_id: project_id.into(),
            return_object: false,
            verify_peer: true,
            auth_scheme: AuthScheme::default(),
        })
    }

    /// Read the config from `INOCORE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |var: &'static str| lookup(var).ok_or(ConfigError::Missing(var));

        let mut config = Self::new(
            &required(ENV_URL)?,
            required(ENV_USERNAME)?,
            required(ENV_PASSWORD)?,
            required(ENV_PROJECT_ID)?,
        )?;

        if let Some(value) = lookup(ENV_RETURN_OBJECT) {
            config.return_object = parse_flag(ENV_RETURN_OBJECT, value)?;
        }
        if let Some(value) = lookup(ENV_VERIFY_PEER) {
            config.verify_peer = parse_flag(ENV_VERIFY_PEER, value)?;
        }
        if let Some(value) = lookup(ENV_AUTH) {
            config.auth_scheme = value.parse().map_err(|reason| ConfigError::Invalid {
                var: ENV_AUTH,
                value,
                reason,
            })?;
        }
        Ok(config)
    }

    /// Return the raw `HttpResponse` instead of the decoded JSON body.
    pub fn return_object(mut self, return_object: bool) -> Self {
        self.return_object = return_object;
        self
    }

    /// Verify the server's TLS certificate. Only disable this for
    /// self-signed certificates on networks you trust.
    pub fn verify_peer(mut self, verify_peer: bool) -> Self {
        self.verify_peer = verify_peer;
        self
    }

    pub fn auth_scheme(mut self, auth_scheme: AuthScheme) -> Self {
        self.auth_scheme = auth_scheme;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn returns_object(&self) -> bool {
        self.return_object
    }

    pub fn verifies_peer(&self) -> bool {
        self.verify_peer
    }

    pub fn scheme(&self) -> AuthScheme {
        self.auth_scheme
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("project_id", &self.project_id)
            .field("return_object", &self.return_object)
            .field("verify_peer", &self.verify_peer)
            .field("auth_scheme", &self.auth_scheme)
            .finish()
    }
}

/// Accepts absolute http(s) URLs with a non-empty host. Trailing slashes on
/// the path are dropped so endpoints can be joined with a single `/`.
pub(crate) fn validate_base_url(raw: &str) -> Result<Url, ApiError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| ApiError::invalid_url(raw, e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ApiError::invalid_url(raw, format!("unsupported scheme {:?}", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ApiError::invalid_url(raw, "missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ApiError::invalid_url(raw, "base URL must not carry a query or fragment"));
    }

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    Ok(url)
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        (ENV_URL, "https://core.example.com/api/"),
        (ENV_USERNAME, "daemon@localhost"),
        (ENV_PASSWORD, "hunter2"),
        (ENV_PROJECT_ID, "tEsT@ino"),
    ];

    #[test]
    fn valid_urls_are_accepted() {
        for url in [
            "http://localhost",
            "http://localhost:8080/",
            "https://core.example.com/api",
            "https://10.0.0.1:8443/inocore/",
        ] {
            assert!(ClientConfig::new(url, "u", "p", "proj").is_ok(), "{url}");
        }
    }

    #[test]
    fn malformed_urls_are_rejected() {
        for url in ["", "localhost:8080", "core.example.com/api", "http://", "ftp://host", "http://host/?a=1", "not a url"] {
            let err = ClientConfig::new(url, "u", "p", "proj").unwrap_err();
            assert!(matches!(err, ApiError::InvalidUrl { .. }), "{url}");
        }
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ClientConfig::new("http://localhost:8080/api///", "u", "p", "proj").unwrap();
        assert_eq!(config.base_url().path(), "/api");
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::new("http://localhost", "u", "p", "proj").unwrap();
        assert!(!config.returns_object());
        assert!(config.verifies_peer());
        assert_eq!(config.scheme(), AuthScheme::Token);
    }

    #[test]
    fn debug_redacts_password() {
        let config = ClientConfig::new("http://localhost", "u", "hunter2", "proj").unwrap();
        let text = format!("{config:?}");
        assert!(!text.contains("hunter2"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn from_lookup_reads_required_and_optional_vars() {
        let mut vars = REQUIRED.to_vec();
        vars.extend([(ENV_VERIFY_PEER, "false"), (ENV_RETURN_OBJECT, "1"), (ENV_AUTH, "basic")]);
        let config = ClientConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.base_url().as_str(), "https://core.example.com/api");
        assert_eq!(config.project_id(), "tEsT@ino");
        assert!(!config.verifies_peer());
        assert!(config.returns_object());
        assert_eq!(config.scheme(), AuthScheme::Basic);
    }

    #[test]
    fn from_lookup_reports_missing_var() {
        let err = ClientConfig::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ENV_PASSWORD)));
    }

    #[test]
    fn from_lookup_rejects_bad_flag() {
        let mut vars = REQUIRED.to_vec();
        vars.push((ENV_VERIFY_PEER, "maybe"));
        let err = ClientConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: ENV_VERIFY_PEER, .. }));
    }

    #[test]
    fn from_lookup_wraps_invalid_url() {
        let mut vars = REQUIRED.to_vec();
        vars[0] = (ENV_URL, "nope");
        let err = ClientConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Url(ApiError::InvalidUrl { .. })));
    }
}
