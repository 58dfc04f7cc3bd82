use std::time::Duration;

use chrono::{DateTime, Utc};
use secrecy::SecretString;

/// Username/password pair for the switch's web management interface.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }
}

/// Token issued by `/data/login.json`.
///
/// The switch identifies a session by the `_tid_` value plus the user level
/// it granted. Both are echoed back on every data request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub tid: String,
    pub user_level: u8,
    pub issued_at: DateTime<Utc>,
    /// Locally computed expiry (`issued_at + ttl`). `None` means the
    /// session is only invalidated by the device itself.
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionToken {
    pub fn new(tid: String, user_level: u8, ttl: Option<Duration>) -> Self {
        let issued_at = Utc::now();
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| issued_at + ttl);
        Self {
            tid,
            user_level,
            issued_at,
            expires_at,
        }
    }

    /// Whether the token has passed its local expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

/// Where the session token travels on a data request.
///
/// Most endpoints read `_tid_`/`usrLvl` from the query string; the log
/// table reads them from request headers instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPlacement {
    Query,
    Header,
}

/// Observable phase of a [`DeviceSession`](crate::DeviceSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionPhase {
    Unauthenticated,
    Authenticating,
    Authenticated,
}
