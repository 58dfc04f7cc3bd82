//! `swmon check`: validate config, then one authenticated request per
//! device and an optional InfluxDB health probe.

use std::path::Path;
use std::time::{Duration, Instant};

use owo_colors::OwoColorize;

use swmon_api::{Endpoint, InfluxClient, TlsMode, TransportConfig};
use swmon_config::Config;
use swmon_core::{CoreError, DeviceConfig};

use crate::cli::{CheckArgs, GlobalOpts};
use crate::commands::should_color;
use crate::error::CliError;

/// Outcome of probing one target.
struct Probe {
    target: String,
    detail: String,
    elapsed: Duration,
    error: Option<CoreError>,
}

impl Probe {
    fn render(&self, color: bool) -> String {
        let elapsed = humantime::format_duration(round_ms(self.elapsed)).to_string();
        match (&self.error, color) {
            (None, true) => format!(
                "{} {:<16} {} {}",
                "ok".green().bold(),
                self.target,
                self.detail,
                elapsed.dimmed()
            ),
            (None, false) => format!("ok   {:<16} {} {elapsed}", self.target, self.detail),
            (Some(e), true) => format!("{} {:<16} {e}", "FAIL".red().bold(), self.target),
            (Some(e), false) => format!("FAIL {:<16} {e}", self.target),
        }
    }
}

fn round_ms(d: Duration) -> Duration {
    Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

pub async fn handle(
    config: &Config,
    path: &Path,
    args: &CheckArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let pipeline_config = config
        .to_pipeline_config()
        .map_err(|e| CliError::config(path.display().to_string(), e))?;

    let devices: Vec<&DeviceConfig> = match args.device.as_deref() {
        Some(name) => {
            let device = pipeline_config
                .devices
                .iter()
                .find(|d| d.name == name)
                .ok_or_else(|| CliError::UnknownDevice {
                    name: name.to_owned(),
                    available: pipeline_config
                        .devices
                        .iter()
                        .map(|d| d.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                })?;
            vec![device]
        }
        None => pipeline_config.devices.iter().collect(),
    };

    let mut probes = Vec::with_capacity(devices.len() + 1);
    for device in devices {
        probes.push(probe_device(device).await);
    }
    if !args.skip_influx && config.influx.is_some() {
        probes.push(probe_influx(config).await);
    }

    let color = should_color(global.color);
    for probe in &probes {
        println!("{}", probe.render(color));
    }

    let failed = probes.iter().filter(|p| p.error.is_some()).count();
    if failed > 0 {
        return Err(CliError::CheckFailed {
            failed,
            total: probes.len(),
        });
    }
    Ok(())
}

async fn probe_device(device: &DeviceConfig) -> Probe {
    let started = Instant::now();
    let result = async {
        let session = device.build_session()?;
        let info = session.fetch(Endpoint::SystemInfo).await?;
        if let Err(e) = session.logout().await {
            tracing::debug!(device = %device.name, error = %e, "logout failed");
        }
        Ok::<_, CoreError>(info)
    }
    .await;

    let (detail, error) = match result {
        Ok(info) => {
            let model = info
                .get("hw_version")
                .or_else(|| info.get("dev_name"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("-");
            (format!("{} {model}", device.url), None)
        }
        Err(e) => (String::new(), Some(e)),
    };
    Probe {
        target: device.name.clone(),
        detail,
        elapsed: started.elapsed(),
        error,
    }
}

async fn probe_influx(config: &Config) -> Probe {
    let started = Instant::now();
    let result = async {
        let influx = config
            .influx_config()
            .map_err(|e| CoreError::config(e.to_string()))?;
        let transport = TransportConfig {
            tls: TlsMode::System,
            timeout: config.influx_timeout(),
            cookie_jar: None,
        };
        let client = InfluxClient::new(&influx, &transport)?;
        client.health().await?;
        Ok::<_, CoreError>(influx.url.to_string())
    }
    .await;

    let (detail, error) = match result {
        Ok(url) => (url, None),
        Err(e) => (String::new(), Some(e)),
    };
    Probe {
        target: "influxdb".into(),
        detail,
        elapsed: started.elapsed(),
        error,
    }
}
