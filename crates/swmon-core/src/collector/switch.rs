// TP-Link switch collectors, one per data endpoint.

use serde_json::Value;
use swmon_api::Endpoint;
use swmon_api::switch::models::{
    CpuInfo, LogRow, MacTableRow, PortStatisticsRow, PortStatusRow, SystemInfoRaw,
};

use super::Collector;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuCollector;

impl Collector for CpuCollector {
    type Raw = CpuInfo;
    const ENDPOINT: Endpoint = Endpoint::CpuInfo;

    fn name(&self) -> &'static str {
        "cpu"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PortStatisticsCollector;

impl Collector for PortStatisticsCollector {
    type Raw = Vec<PortStatisticsRow>;
    const ENDPOINT: Endpoint = Endpoint::PortStatistics;

    fn name(&self) -> &'static str {
        "port_statistics"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PortStatusCollector;

impl Collector for PortStatusCollector {
    type Raw = Vec<PortStatusRow>;
    const ENDPOINT: Endpoint = Endpoint::PortStatus;

    fn name(&self) -> &'static str {
        "port_status"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MacTableCollector;

impl Collector for MacTableCollector {
    type Raw = Vec<MacTableRow>;
    const ENDPOINT: Endpoint = Endpoint::MacTable;

    fn name(&self) -> &'static str {
        "mac_table"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemInfoCollector;

impl Collector for SystemInfoCollector {
    type Raw = SystemInfoRaw;
    const ENDPOINT: Endpoint = Endpoint::SystemInfo;

    fn name(&self) -> &'static str {
        "system"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogCollector;

impl Collector for LogCollector {
    type Raw = Vec<LogRow>;
    const ENDPOINT: Endpoint = Endpoint::LogTable;

    fn name(&self) -> &'static str {
        "logs"
    }

    /// An empty log buffer comes back without a `data` array.
    fn decode(&self, data: Value) -> Result<Self::Raw, CoreError> {
        match data {
            Value::Null => Ok(Vec::new()),
            Value::Array(_) => serde_json::from_value(data)
                .map_err(|e| CoreError::parse(format!("{}: {e}", Self::ENDPOINT))),
            other => Err(CoreError::parse(format!(
                "{}: expected an array, got {}",
                Self::ENDPOINT,
                json_type(&other)
            ))),
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
