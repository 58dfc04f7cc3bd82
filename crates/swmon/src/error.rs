//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use swmon_config::ConfigError;
use swmon_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid configuration")]
    #[diagnostic(
        code(swmon::config),
        help("Config file: {path}\nNested keys can be overridden with SWMON_<SECTION>__<KEY>.")
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    #[error("No password for device '{device}'")]
    #[diagnostic(
        code(swmon::no_credentials),
        help(
            "Set `password_env` for the device, store it in the keyring under\n\
             service 'swmon', account '{device}/password', or set `password`."
        )
    )]
    NoCredentials { device: String },

    #[error("Device '{name}' is not configured")]
    #[diagnostic(code(swmon::unknown_device), help("Configured devices: {available}"))]
    UnknownDevice { name: String, available: String },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("Authentication failed")]
    #[diagnostic(code(swmon::auth_failed), help("Verify the switch username and password."))]
    AuthFailed {
        #[source]
        source: CoreError,
    },

    #[error("Could not reach a switch or the time-series store")]
    #[diagnostic(
        code(swmon::connection_failed),
        help("Check the host, port, and that the web UI is enabled on the switch.")
    )]
    Unreachable {
        #[source]
        source: CoreError,
    },

    #[error(transparent)]
    #[diagnostic(code(swmon::core))]
    Core(CoreError),

    #[error("{failed} of {total} checks failed")]
    #[diagnostic(code(swmon::check_failed))]
    CheckFailed { failed: usize, total: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config(path: impl Into<String>, source: ConfigError) -> Self {
        match source {
            ConfigError::NoCredentials { device } => Self::NoCredentials { device },
            source => Self::Config {
                path: path.into(),
                source,
            },
        }
    }

    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } | Self::UnknownDevice { .. } => exit_code::USAGE,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Unreachable { .. } => exit_code::CONNECTION,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            err @ CoreError::AuthenticationFailed { .. } => Self::AuthFailed { source: err },
            err @ (CoreError::Unreachable { .. } | CoreError::Write { transient: true, .. }) => {
                Self::Unreachable { source: err }
            }
            other => Self::Core(other),
        }
    }
}

impl From<swmon_api::Error> for CliError {
    fn from(err: swmon_api::Error) -> Self {
        CoreError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let auth: CliError = CoreError::AuthenticationFailed {
            message: "bad password".into(),
        }
        .into();
        assert_eq!(auth.exit_code(), exit_code::AUTH);

        let unreachable: CliError = swmon_api::Error::Timeout { timeout_ms: 5_000 }.into();
        assert_eq!(unreachable.exit_code(), exit_code::CONNECTION);

        let config = CliError::config("swmon.toml", ConfigError::NoInflux);
        assert_eq!(config.exit_code(), exit_code::USAGE);

        let creds = CliError::config(
            "swmon.toml",
            ConfigError::NoCredentials {
                device: "core".into(),
            },
        );
        assert!(matches!(creds, CliError::NoCredentials { .. }));
    }
}
