//! Bearer token issued by `POST /token`.
//!
//! The server answers with a PHP `DateTime` dump:
//! `{"token": "...", "expires": {"date": "2024-05-01 13:37:00.000000",
//! "timezone_type": 3, "timezone": "Europe/Berlin"}}`.
//! The local `date` is placed in `timezone`, which is either an offset such
//! as `+02:00` or an IANA zone name. Dates without a zone are read as UTC.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::warn;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Token {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.value.is_empty() || now >= self.expires_at
    }

    /// Extract the token from a decoded `/token` response body.
    ///
    /// The error string names what was missing; the caller wraps it.
    pub fn from_body(body: &Value) -> Result<Self, String> {
        let value = body
            .get("token")
            .and_then(Value::as_str)
            .ok_or("token missing from response")?;
        let expires = body.get("expires");
        let date = expires
            .and_then(|e| e.get("date"))
            .and_then(Value::as_str)
            .ok_or("token has no expiry date")?;
        let zone = expires.and_then(|e| e.get("timezone")).and_then(Value::as_str);
        let expires_at =
            parse_expiry(date, zone).ok_or_else(|| format!("expiry date {date:?} is not a valid timestamp"))?;
        Ok(Self::new(value, expires_at))
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn parse_expiry(date: &str, zone: Option<&str>) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())?;
    match zone {
        Some(zone) => localize(naive, zone),
        None => Some(naive.and_utc()),
    }
}

/// Interpret a wall-clock time in `zone`. Zones chrono-tz does not know
/// (PHP abbreviations like `CEST`) fall back to UTC.
fn localize(naive: NaiveDateTime, zone: &str) -> Option<DateTime<Utc>> {
    if let Ok(offset) = zone.parse::<FixedOffset>() {
        return offset.from_local_datetime(&naive).single().map(|dt| dt.with_timezone(&Utc));
    }
    match zone.parse::<Tz>() {
        // `earliest` resolves the repeated hour at the end of DST; a time
        // skipped by the spring transition has no instant and is rejected.
        Ok(tz) => tz.from_local_datetime(&naive).earliest().map(|dt| dt.with_timezone(&Utc)),
        Err(_) => {
            warn!(zone, "unknown token expiry timezone, reading date as UTC");
            Some(naive.and_utc())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_php_style_expiry() {
        let body = json!({
            "token": "abc",
            "expires": {"date": "2024-05-01 13:37:00.250000", "timezone_type": 3, "timezone": "UTC"}
        });
        let token = Token::from_body(&body).unwrap();
        assert_eq!(token.value(), "abc");
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 13, 37, 0).unwrap() + Duration::milliseconds(250);
        assert_eq!(token.expires_at(), expected);
    }

    #[test]
    fn parses_rfc3339_expiry() {
        let body = json!({"token": "abc", "expires": {"date": "2024-05-01T15:37:00+02:00"}});
        let token = Token::from_body(&body).unwrap();
        assert_eq!(token.expires_at(), Utc.with_ymd_and_hms(2024, 5, 1, 13, 37, 0).unwrap());
    }

    #[test]
    fn named_zone_is_applied() {
        let body = json!({
            "token": "abc",
            "expires": {"date": "2024-05-01 15:37:00.000000", "timezone_type": 3, "timezone": "Europe/Berlin"}
        });
        let token = Token::from_body(&body).unwrap();
        assert_eq!(token.expires_at(), Utc.with_ymd_and_hms(2024, 5, 1, 13, 37, 0).unwrap());
    }

    #[test]
    fn offset_zone_is_applied() {
        let body = json!({
            "token": "abc",
            "expires": {"date": "2024-01-10 08:00:00.000000", "timezone_type": 1, "timezone": "-05:00"}
        });
        let token = Token::from_body(&body).unwrap();
        assert_eq!(token.expires_at(), Utc.with_ymd_and_hms(2024, 1, 10, 13, 0, 0).unwrap());
    }

    #[test]
    fn unknown_zone_reads_as_utc() {
        let body = json!({
            "token": "abc",
            "expires": {"date": "2024-05-01 13:37:00", "timezone_type": 2, "timezone": "CEST"}
        });
        let token = Token::from_body(&body).unwrap();
        assert_eq!(token.expires_at(), Utc.with_ymd_and_hms(2024, 5, 1, 13, 37, 0).unwrap());
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = Token::from_body(&json!({"expires": {"date": "2024-05-01 13:37:00"}})).unwrap_err();
        assert!(err.contains("token missing"));
    }

    #[test]
    fn missing_or_bad_expiry_is_an_error() {
        assert!(Token::from_body(&json!({"token": "abc"})).is_err());
        assert!(Token::from_body(&json!({"token": "abc", "expires": {"date": "tomorrow"}})).is_err());
    }

    #[test]
    fn expiry_is_inclusive() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let token = Token::new("abc", at);
        assert!(!token.is_expired_at(at - Duration::seconds(1)));
        assert!(token.is_expired_at(at));
    }

    #[test]
    fn debug_hides_token_value() {
        let token = Token::new("secret-token", Utc::now());
        assert!(!format!("{token:?}").contains("secret-token"));
    }
}
