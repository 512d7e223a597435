use crate::config::CookieConfig;
use crate::id::SessionId;
use time::OffsetDateTime;

/// What the HTTP layer should do with the session cookie after a save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CookieDirective {
    Set(SetCookie),
    Clear(ClearCookie),
}

impl CookieDirective {
    pub(crate) fn set(config: &CookieConfig, id: &SessionId, expires: OffsetDateTime) -> Self {
        Self::Set(SetCookie {
            name: config.name.clone(),
            value: id.as_str().to_owned(),
            expires,
            path: config.path.clone(),
            domain: config.domain.clone(),
            http_only: config.http_only,
            secure: config.secure,
        })
    }

    pub(crate) fn clear(config: &CookieConfig) -> Self {
        Self::Clear(ClearCookie {
            name: config.name.clone(),
            path: config.path.clone(),
            domain: config.domain.clone(),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Set(cookie) => &cookie.name,
            Self::Clear(cookie) => &cookie.name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetCookie {
    pub name: String,
    /// The session id.
    pub value: String,
    pub expires: OffsetDateTime,
    pub path: String,
    pub domain: Option<String>,
    pub http_only: bool,
    pub secure: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClearCookie {
    pub name: String,
    pub path: String,
    pub domain: Option<String>,
}
