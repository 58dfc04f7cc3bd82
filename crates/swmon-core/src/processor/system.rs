use swmon_api::switch::models::SystemInfoRaw;
use tracing::warn;

use super::{ProcessContext, Processor};
use crate::error::CoreError;
use crate::model::system::parse_uptime;
use crate::model::{FanStatus, MacAddress, ProcessedMetric, Status, SystemHealth, measurement};
use crate::thresholds::ThresholdTable;

/// Temperature classification plus identity and uptime. Feeds uptime to
/// the device epoch tracker so counter rates reset across reboots.
#[derive(Debug, Clone)]
pub struct SystemProcessor {
    table: ThresholdTable,
}

impl SystemProcessor {
    pub fn new(table: ThresholdTable) -> Self {
        Self { table }
    }
}

impl Default for SystemProcessor {
    fn default() -> Self {
        Self::new(ThresholdTable::default_temperature())
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn to_health(raw: SystemInfoRaw) -> SystemHealth {
    SystemHealth {
        cpu_percent: None,
        temperature_c: raw.temperature,
        fan: raw.fan_sta.map(|s| if s == 1 { FanStatus::Ok } else { FanStatus::Fail }),
        uptime_secs: raw.run_time.as_deref().and_then(parse_uptime),
        hostname: non_empty(raw.dev_name),
        location: non_empty(raw.dev_loc),
        mac: non_empty(raw.mac_address).map(|m| MacAddress::new(m).to_string()),
        firmware: non_empty(raw.fw_version),
        hardware: non_empty(raw.hw_version),
        serial: non_empty(raw.se_number),
    }
}

impl Processor for SystemProcessor {
    type Raw = SystemInfoRaw;
    type State = ();

    fn process(
        &self,
        raw: SystemInfoRaw,
        _state: &mut (),
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<ProcessedMetric>, CoreError> {
        let health = to_health(raw);

        if let Some(uptime) = health.uptime_secs {
            ctx.epoch.observe_uptime(uptime);
        }

        // Models without a sensor report no temperature; nothing to classify.
        let status = health
            .temperature_c
            .map_or(Status::Normal, |t| self.table.classify(t));
        if matches!(status, Status::Warning | Status::Critical) {
            warn!(device = ctx.device, temperature = ?health.temperature_c, %status, "high temperature");
        }
        let fan_status = if health.fan == Some(FanStatus::Fail) {
            warn!(device = ctx.device, "fan reports failure");
            Status::Critical
        } else {
            Status::Normal
        };

        #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
        let uptime_days = health
            .uptime_secs
            .map(|s| (s as f64 / 86_400.0 * 100.0).round() / 100.0);

        Ok(vec![
            ProcessedMetric::new(measurement::SYSTEM_INFO, ctx.device, ctx.at)
                .field_opt("temperature_c", health.temperature_c)
                .field_opt("fan_ok", health.fan.map(|f| f == FanStatus::Ok))
                .field_opt("uptime_secs", health.uptime_secs)
                .field_opt("uptime_days", uptime_days)
                .field("epoch", ctx.epoch.current())
                .field_opt("hostname", health.hostname)
                .field_opt("location", health.location)
                .field_opt("mac_address", health.mac)
                .field_opt("firmware", health.firmware)
                .field_opt("hardware", health.hardware)
                .field_opt("serial", health.serial)
                .with_status(status.worst(fan_status)),
        ])
    }
}
