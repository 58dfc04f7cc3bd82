// ── Runtime pipeline configuration ──
//
// These types describe which switches to poll and how often. They carry
// credential data and tuning, but never touch disk or the environment.
// `swmon-config` builds a `PipelineConfig` and hands it in.

use std::collections::HashSet;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use swmon_api::{Credentials, DeviceSession, SwitchClient, TlsMode, TransportConfig};

use crate::error::CoreError;
use crate::thresholds::Thresholds;

/// Connection settings for a single switch.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Label used in logs, metric tags, and events. Unique per pipeline.
    pub name: String,
    /// Management root, e.g. `http://192.168.0.1`.
    pub url: Url,
    pub username: String,
    pub password: SecretString,
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Local session lifetime; `None` relies on the device to expire it.
    pub session_ttl: Option<Duration>,
    /// Minimum gap between two requests to this device.
    pub request_spacing: Duration,
}

impl DeviceConfig {
    pub fn new(name: impl Into<String>, url: Url, username: impl Into<String>, password: SecretString) -> Self {
        Self {
            name: name.into(),
            url,
            username: username.into(),
            password,
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(10),
            session_ttl: None,
            request_spacing: swmon_api::session::DEFAULT_REQUEST_SPACING,
        }
    }

    /// Build the authenticated session for this device.
    pub fn build_session(&self) -> Result<DeviceSession, CoreError> {
        let transport = TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
            cookie_jar: None,
        };
        let client = SwitchClient::new(self.url.clone(), &transport)?;
        let credentials = Credentials::new(self.username.clone(), self.password.clone());
        Ok(DeviceSession::new(self.name.clone(), client, credentials)
            .with_ttl(self.session_ttl)
            .with_request_spacing(self.request_spacing))
    }
}

/// Per-collector poll periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub cpu: Duration,
    /// Shared by the port statistics and port status collectors.
    pub ports: Duration,
    pub mac: Duration,
    pub system: Duration,
    pub logs: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            cpu: Duration::from_secs(60),
            ports: Duration::from_secs(60),
            mac: Duration::from_secs(300),
            system: Duration::from_secs(300),
            logs: Duration::from_secs(120),
        }
    }
}

impl PollIntervals {
    fn all(&self) -> [(&'static str, Duration); 5] {
        [
            ("cpu", self.cpu),
            ("ports", self.ports),
            ("mac", self.mac),
            ("system", self.system),
            ("logs", self.logs),
        ]
    }
}

/// Batching and retry policy for the time-series writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterConfig {
    /// Flush once the buffer holds this many metrics.
    pub batch_size: usize,
    /// Flush at least this often while metrics are buffered.
    pub batch_interval: Duration,
    /// Retries after the first failed attempt before a batch is dropped.
    pub max_retries: u32,
    /// First retry delay; doubles per attempt.
    pub retry_base_delay: Duration,
    /// Capacity of the collector-to-writer hand-off channel.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            batch_interval: Duration::from_secs(10),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
            channel_capacity: 1024,
        }
    }
}

/// Everything the pipeline needs to run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub devices: Vec<DeviceConfig>,
    pub intervals: PollIntervals,
    pub thresholds: Thresholds,
    pub writer: WriterConfig,
    /// Consecutive reachability/auth/session failures before a device is
    /// marked unhealthy.
    pub unhealthy_threshold: u32,
    /// Upper bound on ticks skipped after repeated collector failures.
    pub max_backoff_ticks: u32,
}

impl PipelineConfig {
    pub fn new(devices: Vec<DeviceConfig>) -> Self {
        Self {
            devices,
            intervals: PollIntervals::default(),
            thresholds: Thresholds::default(),
            writer: WriterConfig::default(),
            unhealthy_threshold: 5,
            max_backoff_ticks: 8,
        }
    }

    /// Startup checks. Every failure here is fatal.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.devices.is_empty() {
            return Err(CoreError::NoDevices);
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(CoreError::config("device name must not be empty"));
            }
            if !seen.insert(device.name.as_str()) {
                return Err(CoreError::config(format!(
                    "device name '{}' is used more than once",
                    device.name
                )));
            }
            if device.username.is_empty() {
                return Err(CoreError::config(format!(
                    "device '{}' has no username",
                    device.name
                )));
            }
            if device.url.host_str().is_none() {
                return Err(CoreError::config(format!(
                    "device '{}' URL has no host: {}",
                    device.name, device.url
                )));
            }
        }

        self.validate_tuning()
    }

    /// Interval, writer, and health settings only; the device list is not
    /// consulted.
    pub fn validate_tuning(&self) -> Result<(), CoreError> {
        for (name, period) in self.intervals.all() {
            if period.is_zero() {
                return Err(CoreError::config(format!(
                    "poll interval '{name}' must be greater than zero"
                )));
            }
        }

        if self.writer.batch_size == 0 {
            return Err(CoreError::config("write batch size must be at least 1"));
        }
        if self.writer.batch_interval.is_zero() {
            return Err(CoreError::config("write batch interval must be greater than zero"));
        }
        if self.writer.channel_capacity == 0 {
            return Err(CoreError::config("writer channel capacity must be at least 1"));
        }
        if self.unhealthy_threshold == 0 {
            return Err(CoreError::config("unhealthy threshold must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn device(name: &str) -> DeviceConfig {
        DeviceConfig::new(
            name,
            Url::parse("http://192.168.0.1").unwrap(),
            "admin",
            SecretString::from("pw"),
        )
    }

    #[test]
    fn no_devices_is_fatal() {
        let err = PipelineConfig::new(vec![]).validate().unwrap_err();
        assert!(matches!(err, CoreError::NoDevices));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = PipelineConfig::new(vec![device("a"), device("a")])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = PipelineConfig::new(vec![device("a")]);
        config.intervals.logs = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults_validate() {
        PipelineConfig::new(vec![device("a"), device("b")])
            .validate()
            .unwrap();
    }

    #[test]
    fn session_is_built_unauthenticated() {
        let session = device("a").build_session().unwrap();
        assert_eq!(session.name(), "a");
        assert_eq!(session.phase(), swmon_api::SessionPhase::Unauthenticated);
    }
}
