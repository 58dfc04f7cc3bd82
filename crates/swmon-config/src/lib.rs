//! Configuration for swmon.
//!
//! TOML file plus `SWMON_` environment overrides, credential resolution
//! (env var, then system keyring, then plaintext), and translation to
//! `swmon_core::PipelineConfig` and `swmon_api::InfluxConfig`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use swmon_api::{InfluxConfig, TlsMode};
use swmon_core::{CoreError, DeviceConfig, PipelineConfig, PollIntervals, Thresholds, WriterConfig};

/// Keyring service name for stored secrets.
pub const KEYRING_SERVICE: &str = "swmon";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for device '{device}'")]
    NoCredentials { device: String },

    #[error("no InfluxDB token configured")]
    NoInfluxToken,

    #[error("no [influx] section configured")]
    NoInflux,

    #[error(transparent)]
    Pipeline(#[from] CoreError),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Settings inherited by every device unless overridden.
    #[serde(default)]
    pub defaults: Defaults,

    /// Switches to poll, keyed by name.
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceProfile>,

    #[serde(default)]
    pub pipeline: PipelineSection,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influx: Option<InfluxSection>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_username")]
    pub username: String,

    /// Accept self-signed certificates.
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_request_spacing_ms")]
    pub request_spacing_ms: u64,

    /// Local session lifetime; unset relies on the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_ttl_secs: Option<u64>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            username: default_username(),
            insecure: default_insecure(),
            timeout: default_timeout(),
            request_spacing_ms: default_request_spacing_ms(),
            session_ttl_secs: None,
        }
    }
}

fn default_username() -> String {
    "admin".into()
}
fn default_insecure() -> bool {
    true
}
fn default_timeout() -> u64 {
    10
}
fn default_request_spacing_ms() -> u64 {
    500
}

/// One switch.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DeviceProfile {
    /// Hostname or IP, optionally with a scheme (`https://10.0.0.2`).
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Plaintext password (prefer `password_env` or the keyring).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_spacing_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_ttl_secs: Option<u64>,
}

/// Poll periods (seconds), thresholds, and writer tuning.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSection {
    pub poll_interval_cpu: u64,
    pub poll_interval_ports: u64,
    pub poll_interval_mac: u64,
    pub poll_interval_system: u64,
    pub poll_interval_logs: u64,

    pub cpu_warning_pct: f64,
    pub cpu_critical_pct: f64,
    pub port_warning_pct: f64,
    pub port_critical_pct: f64,
    pub temp_warning: f64,
    pub temp_critical: f64,

    pub write_batch_size: usize,
    /// Seconds.
    pub write_batch_interval: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub channel_capacity: usize,

    pub unhealthy_threshold: u32,
    pub max_backoff_ticks: u32,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let intervals = PollIntervals::default();
        let writer = WriterConfig::default();
        Self {
            poll_interval_cpu: intervals.cpu.as_secs(),
            poll_interval_ports: intervals.ports.as_secs(),
            poll_interval_mac: intervals.mac.as_secs(),
            poll_interval_system: intervals.system.as_secs(),
            poll_interval_logs: intervals.logs.as_secs(),
            cpu_warning_pct: 70.0,
            cpu_critical_pct: 90.0,
            port_warning_pct: 70.0,
            port_critical_pct: 90.0,
            temp_warning: 80.0,
            temp_critical: 90.0,
            write_batch_size: writer.batch_size,
            write_batch_interval: writer.batch_interval.as_secs(),
            max_retries: writer.max_retries,
            retry_base_delay_ms: u64::try_from(writer.retry_base_delay.as_millis()).unwrap_or(1_000),
            channel_capacity: writer.channel_capacity,
            unhealthy_threshold: 5,
            max_backoff_ticks: 8,
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct InfluxSection {
    /// e.g. `http://localhost:8086`
    pub url: String,
    pub org: String,
    pub bucket: String,

    /// Plaintext token (prefer `token_env` or the keyring).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "swmon", "swmon").map_or_else(
        || PathBuf::from("swmon.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

fn base_figment() -> Figment {
    Figment::new().merge(Serialized::defaults(Config::default()))
}

/// Load defaults, then the TOML file, then `SWMON_` environment variables.
///
/// Nested keys use a double underscore:
/// `SWMON_PIPELINE__POLL_INTERVAL_CPU=30`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config = base_figment()
        .merge(Toml::file(&path))
        .merge(Env::prefixed("SWMON_").split("__"))
        .extract()?;
    Ok(config)
}

impl Config {
    /// Parse a TOML document over the defaults, without environment input.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Ok(base_figment().merge(Toml::string(toml)).extract()?)
    }

    /// Serialize to TOML and write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Resolve every device's credentials and build a validated
    /// [`PipelineConfig`].
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        let devices = self
            .devices
            .iter()
            .map(|(name, profile)| self.device_config(name, profile))
            .collect::<Result<Vec<_>, _>>()?;

        let p = &self.pipeline;
        let mut config = PipelineConfig::new(devices);
        config.intervals = PollIntervals {
            cpu: Duration::from_secs(p.poll_interval_cpu),
            ports: Duration::from_secs(p.poll_interval_ports),
            mac: Duration::from_secs(p.poll_interval_mac),
            system: Duration::from_secs(p.poll_interval_system),
            logs: Duration::from_secs(p.poll_interval_logs),
        };
        config.thresholds = Thresholds::from_limits(
            (p.cpu_warning_pct, p.cpu_critical_pct),
            (p.port_warning_pct, p.port_critical_pct),
            (p.temp_warning, p.temp_critical),
        )?;
        config.writer = WriterConfig {
            batch_size: p.write_batch_size,
            batch_interval: Duration::from_secs(p.write_batch_interval),
            max_retries: p.max_retries,
            retry_base_delay: Duration::from_millis(p.retry_base_delay_ms),
            channel_capacity: p.channel_capacity,
        };
        config.unhealthy_threshold = p.unhealthy_threshold;
        config.max_backoff_ticks = p.max_backoff_ticks;

        config.validate()?;
        Ok(config)
    }

    fn device_config(&self, name: &str, profile: &DeviceProfile) -> Result<DeviceConfig, ConfigError> {
        let url = device_url(profile)?;
        let username = profile
            .username
            .clone()
            .unwrap_or_else(|| self.defaults.username.clone());
        let password = resolve_device_password(profile, name)?;

        let mut device = DeviceConfig::new(name, url, username, password);
        device.tls = if profile.insecure.unwrap_or(self.defaults.insecure) {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::System
        };
        device.timeout = Duration::from_secs(profile.timeout.unwrap_or(self.defaults.timeout));
        device.request_spacing = Duration::from_millis(
            profile
                .request_spacing_ms
                .unwrap_or(self.defaults.request_spacing_ms),
        );
        device.session_ttl = profile
            .session_ttl_secs
            .or(self.defaults.session_ttl_secs)
            .map(Duration::from_secs);
        Ok(device)
    }

    /// Build the InfluxDB connection settings, resolving the token.
    pub fn influx_config(&self) -> Result<InfluxConfig, ConfigError> {
        let section = self.influx.as_ref().ok_or(ConfigError::NoInflux)?;
        let url = Url::parse(&section.url).map_err(|e| ConfigError::Validation {
            field: "influx.url".into(),
            reason: format!("{e}: {}", section.url),
        })?;
        if section.org.is_empty() || section.bucket.is_empty() {
            return Err(ConfigError::Validation {
                field: "influx".into(),
                reason: "org and bucket must be set".into(),
            });
        }
        Ok(InfluxConfig {
            url,
            org: section.org.clone(),
            bucket: section.bucket.clone(),
            token: resolve_influx_token(section)?,
        })
    }

    /// Timeout for InfluxDB requests.
    pub fn influx_timeout(&self) -> Duration {
        Duration::from_secs(
            self.influx
                .as_ref()
                .and_then(|s| s.timeout)
                .unwrap_or(self.defaults.timeout),
        )
    }
}

/// `host` may carry a scheme; plain hosts default to `http`.
pub fn device_url(profile: &DeviceProfile) -> Result<Url, ConfigError> {
    let host = profile.host.trim();
    let raw = if host.contains("://") {
        host.to_owned()
    } else {
        format!("http://{host}")
    };
    let mut url = Url::parse(&raw).map_err(|e| ConfigError::Validation {
        field: "host".into(),
        reason: format!("{e}: {host}"),
    })?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: format!("no host in '{host}'"),
        });
    }
    if let Some(port) = profile.port {
        url.set_port(Some(port)).map_err(|()| ConfigError::Validation {
            field: "port".into(),
            reason: format!("cannot set port on {url}"),
        })?;
    }
    Ok(url)
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_secret(account: &str) -> Option<SecretString> {
    keyring::Entry::new(KEYRING_SERVICE, account)
        .ok()?
        .get_password()
        .ok()
        .map(SecretString::from)
}

/// Device password: `password_env`, then keyring `<device>/password`,
/// then plaintext.
pub fn resolve_device_password(profile: &DeviceProfile, device: &str) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(secret) = keyring_secret(&format!("{device}/password")) {
        return Ok(secret);
    }

    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        device: device.into(),
    })
}

/// InfluxDB token: `token_env`, then keyring `influx/token`, then plaintext.
pub fn resolve_influx_token(section: &InfluxSection) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = section.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(secret) = keyring_secret("influx/token") {
        return Ok(secret);
    }

    if let Some(ref token) = section.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoInfluxToken)
}
