//! Settings the surrounding application supplies to the session manager.

use crate::error::{invalid_argument, serde_error, SessionResult};
use serde::{Deserialize, Serialize};
use time::Duration;

/// Default lifetime of a non-permanent session, in minutes.
pub const DEFAULT_EXPIRATION_DELTA_MINUTES: u32 = 30;

/// Default interval between reaper sweeps, in minutes.
pub const DEFAULT_REAPER_PERIOD_MINUTES: u32 = 30;

/// Upper bound for `expiration_delta_minutes` (ten years), keeping cookie expiry inside the
/// representable date range.
pub const MAX_EXPIRATION_DELTA_MINUTES: u32 = 10 * 366 * 24 * 60;

/// Upper bound for `permanent_session_lifetime_secs` (ten years).
pub const MAX_PERMANENT_LIFETIME_SECS: u64 = 10 * 366 * 24 * 60 * 60;

/// Default session cookie name.
pub const DEFAULT_COOKIE_NAME: &str = "session";

/// Attributes copied into every cookie directive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
    pub http_only: bool,
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_string(),
            path: "/".to_string(),
            domain: None,
            http_only: true,
            secure: false,
        }
    }
}

/// Session lifetime and cookie settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of sessions that are not marked permanent.
    pub expiration_delta_minutes: u32,

    /// Lifetime of permanent sessions. When set, the reaper also uses it for every record.
    pub permanent_session_lifetime_secs: Option<u64>,

    /// Re-save untouched permanent sessions on every request so their expiry slides forward.
    pub refresh_each_request: bool,

    /// Interval between reaper sweeps.
    pub reaper_period_minutes: u32,

    pub cookie: CookieConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiration_delta_minutes: DEFAULT_EXPIRATION_DELTA_MINUTES,
            permanent_session_lifetime_secs: None,
            refresh_each_request: false,
            reaper_period_minutes: DEFAULT_REAPER_PERIOD_MINUTES,
            cookie: CookieConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON document; absent fields take their defaults.
    pub fn from_json_str(raw: &str) -> SessionResult<Self> {
        let config: Self = serde_json::from_str(raw).map_err(serde_error)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_expiration_delta_minutes(mut self, minutes: u32) -> Self {
        self.expiration_delta_minutes = minutes;
        self
    }

    pub fn with_permanent_lifetime(mut self, lifetime: std::time::Duration) -> Self {
        self.permanent_session_lifetime_secs = Some(lifetime.as_secs());
        self
    }

    pub fn without_permanent_lifetime(mut self) -> Self {
        self.permanent_session_lifetime_secs = None;
        self
    }

    pub fn with_refresh_each_request(mut self, enabled: bool) -> Self {
        self.refresh_each_request = enabled;
        self
    }

    pub fn with_reaper_period_minutes(mut self, minutes: u32) -> Self {
        self.reaper_period_minutes = minutes;
        self
    }

    pub fn with_cookie(mut self, cookie: CookieConfig) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn validate(&self) -> SessionResult<()> {
        if self.expiration_delta_minutes == 0 {
            return Err(invalid_argument("expiration_delta_minutes must be positive"));
        }
        if self.expiration_delta_minutes > MAX_EXPIRATION_DELTA_MINUTES {
            return Err(invalid_argument(format!(
                "expiration_delta_minutes must not exceed {MAX_EXPIRATION_DELTA_MINUTES}"
            )));
        }
        if self.reaper_period_minutes == 0 {
            return Err(invalid_argument("reaper_period_minutes must be positive"));
        }
        if self.permanent_session_lifetime_secs == Some(0) {
            return Err(invalid_argument(
                "permanent_session_lifetime_secs must be positive when set",
            ));
        }
        if self
            .permanent_session_lifetime_secs
            .is_some_and(|secs| secs > MAX_PERMANENT_LIFETIME_SECS)
        {
            return Err(invalid_argument(format!(
                "permanent_session_lifetime_secs must not exceed {MAX_PERMANENT_LIFETIME_SECS}"
            )));
        }
        if self.cookie.name.trim().is_empty() {
            return Err(invalid_argument("cookie name must not be empty"));
        }
        Ok(())
    }

    pub fn expiration_delta(&self) -> Duration {
        Duration::minutes(i64::from(self.expiration_delta_minutes))
    }

    pub fn permanent_lifetime(&self) -> Option<Duration> {
        self.permanent_session_lifetime_secs
            .map(|secs| Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
    }

    /// Age at which the reaper removes a record.
    pub fn effective_lifetime(&self) -> Duration {
        self.permanent_lifetime()
            .unwrap_or_else(|| self.expiration_delta())
    }

    pub fn reaper_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.reaper_period_minutes) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn defaults_match_documented_values() {
        let config = SessionConfig::default();
        assert_eq!(config.expiration_delta(), Duration::minutes(30));
        assert_eq!(config.permanent_lifetime(), None);
        assert_eq!(config.effective_lifetime(), Duration::minutes(30));
        assert_eq!(config.reaper_period(), std::time::Duration::from_secs(1800));
        assert_eq!(config.cookie.name, "session");
        assert!(config.cookie.http_only);
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = SessionConfig::from_json_str(
            r#"{"expiration_delta_minutes": 5, "cookie": {"secure": true, "domain": "example.org"}}"#,
        )
        .expect("parse");
        assert_eq!(config.expiration_delta_minutes, 5);
        assert_eq!(config.reaper_period_minutes, DEFAULT_REAPER_PERIOD_MINUTES);
        assert!(config.cookie.secure);
        assert_eq!(config.cookie.domain.as_deref(), Some("example.org"));
        assert_eq!(config.cookie.path, "/");
    }

    #[test]
    fn permanent_lifetime_wins_for_reaping() {
        let config = SessionConfig::default()
            .with_permanent_lifetime(std::time::Duration::from_secs(86_400));
        assert_eq!(config.effective_lifetime(), Duration::days(1));
    }

    #[test]
    fn zero_delta_is_rejected() {
        let err = SessionConfig::from_json_str(r#"{"expiration_delta_minutes": 0}"#)
            .expect_err("zero delta");
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.message.contains("expiration_delta_minutes"));
    }

    #[test]
    fn oversized_expiration_delta_is_rejected() {
        let err = SessionConfig::default()
            .with_expiration_delta_minutes(u32::MAX)
            .validate()
            .expect_err("delta too large");
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.message.contains("expiration_delta_minutes"));

        SessionConfig::default()
            .with_expiration_delta_minutes(MAX_EXPIRATION_DELTA_MINUTES)
            .validate()
            .expect("largest delta is valid");
    }

    #[test]
    fn oversized_permanent_lifetime_is_rejected() {
        let err = SessionConfig::from_json_str(
            r#"{"permanent_session_lifetime_secs": 1000000000000}"#,
        )
        .expect_err("lifetime too large");
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert!(err.message.contains("permanent_session_lifetime_secs"));

        SessionConfig::default()
            .with_permanent_lifetime(std::time::Duration::from_secs(MAX_PERMANENT_LIFETIME_SECS))
            .validate()
            .expect("largest lifetime is valid");
    }

    #[test]
    fn malformed_json_is_internal() {
        let err = SessionConfig::from_json_str("{not json").expect_err("malformed");
        assert_eq!(err.code, ErrorCode::Internal);
    }
}
