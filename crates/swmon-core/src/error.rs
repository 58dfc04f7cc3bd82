// ── Core error types ──
//
// Pipeline-facing errors. Collectors and processors report failures as an
// `ErrorKind` plus a message; the `From<swmon_api::Error>` impl sorts
// transport-layer failures into that taxonomy.

use serde::Serialize;
use thiserror::Error;

/// Failure classification shared by collectors, processors, and the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Connection refused, timed out, DNS or TLS failure.
    Unreachable,
    /// Credentials rejected.
    Auth,
    /// The session could not be kept alive across a re-login.
    Session,
    /// The device answered with something we could not interpret.
    Parse,
    /// The time-series backend rejected or never received a write.
    Write,
    /// Invalid configuration. Only raised at startup.
    Config,
}

impl ErrorKind {
    /// Kinds that count toward marking a device unhealthy.
    pub fn affects_device_health(self) -> bool {
        matches!(self, Self::Unreachable | Self::Auth | Self::Session)
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Cannot reach {target}: {reason}")]
    Unreachable { target: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Malformed device data: {message}")]
    Parse { message: String },

    // ── Backend errors ───────────────────────────────────────────────
    #[error("Time-series write failed: {message}")]
    Write { message: String, transient: bool },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("No devices configured")]
    NoDevices,

    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unreachable { .. } => ErrorKind::Unreachable,
            Self::AuthenticationFailed { .. } => ErrorKind::Auth,
            Self::Session { .. } => ErrorKind::Session,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Write { .. } => ErrorKind::Write,
            Self::NoDevices | Self::Config { .. } => ErrorKind::Config,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether retrying the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Write { transient, .. } => *transient,
            Self::Unreachable { .. } => true,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<swmon_api::Error> for CoreError {
    fn from(err: swmon_api::Error) -> Self {
        use swmon_api::Error as Api;

        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::SessionExpired => CoreError::Session {
                message: "session expired".into(),
            },
            Api::Session { message } => CoreError::Session { message },
            Api::Transport(ref e) if e.is_decode() => CoreError::Parse {
                message: e.to_string(),
            },
            Api::Transport(e) => CoreError::Unreachable {
                target: e
                    .url()
                    .map_or_else(|| "<unknown>".into(), |u| u.host_str().unwrap_or("").to_owned()),
                reason: e.to_string(),
            },
            Api::Timeout { timeout_ms } => CoreError::Unreachable {
                target: String::new(),
                reason: format!("timed out after {timeout_ms}ms"),
            },
            Api::Unavailable { status, message } => CoreError::Unreachable {
                target: String::new(),
                reason: format!("HTTP {status}: {message}"),
            },
            Api::Tls(msg) => CoreError::Unreachable {
                target: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::DeviceApi { code, message } => CoreError::Parse {
                message: format!("device error {code}: {message}"),
            },
            Api::Deserialization { message, body: _ } => CoreError::Parse { message },
            ref influx @ Api::Influx { .. } => CoreError::Write {
                transient: influx.is_transient(),
                message: influx.to_string(),
            },
        }
    }
}
