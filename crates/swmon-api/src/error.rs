use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `swmon-api` crate.
///
/// Covers every failure mode across both API surfaces: the switch's web
/// management interface and the InfluxDB write endpoint.
/// `swmon-core` maps these into the pipeline's error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login rejected (wrong credentials, account locked, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The device reported that the session token is no longer valid.
    #[error("Session expired -- re-authentication required")]
    SessionExpired,

    /// The session expired again right after a fresh login.
    #[error("Session invalid after re-authentication: {message}")]
    Session { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request exceeded the client's configured timeout.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The device answered with a 5xx status (busy or rebooting).
    #[error("Device unavailable (HTTP {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Device API ──────────────────────────────────────────────────
    /// The device answered `{"success": false, "errorcode": N}`.
    #[error("Device API error (code {code}): {message}")]
    DeviceApi { code: i64, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Time-series backend ─────────────────────────────────────────
    /// The InfluxDB write endpoint rejected the request.
    #[error("InfluxDB write failed (HTTP {status}): {message}")]
    Influx { status: u16, message: String },
}

impl Error {
    /// Wrap a `send()` failure, naming the configured timeout when that is
    /// what fired.
    pub(crate) fn from_send(err: reqwest::Error, timeout: Option<Duration>) -> Self {
        match timeout {
            Some(t) if err.is_timeout() => Self::Timeout {
                timeout_ms: u64::try_from(t.as_millis()).unwrap_or(u64::MAX),
            },
            _ => Self::Transport(err),
        }
    }

    /// Returns `true` if this error indicates the session has expired
    /// and re-authentication might resolve it.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::Unavailable { .. } => true,
            Self::Influx { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the device (or backend) could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_decode() && e.status().is_none(),
            Self::Timeout { .. } | Self::Unavailable { .. } | Self::Tls(_) => true,
            _ => false,
        }
    }
}
