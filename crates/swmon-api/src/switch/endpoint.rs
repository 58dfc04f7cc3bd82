// Switch data endpoints
//
// Every telemetry domain is a `POST /data/<name>.json` with a small JSON
// payload. The path, default payload, and token placement are the only
// per-endpoint differences.

use serde_json::{Value, json};

use crate::auth::TokenPlacement;

/// One of the switch's JSON data endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Endpoint {
    CpuInfo,
    PortStatistics,
    PortStatus,
    MacTable,
    SystemInfo,
    LogTable,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::CpuInfo => "/data/cpuInfo.json",
            Self::PortStatistics => "/data/portStatistics.json",
            Self::PortStatus => "/data/portStatusCfg.json",
            Self::MacTable => "/data/swtMacTableCfg.json",
            Self::SystemInfo => "/data/systemInfo.json",
            Self::LogTable => "/data/logtable.json",
        }
    }

    /// The request body the web UI sends for a plain read.
    pub fn default_payload(self) -> Value {
        match self {
            Self::CpuInfo => json!({ "unit": "unit1" }),
            Self::PortStatistics | Self::MacTable => json!({
                "operation": "load",
                "tab": "unit1",
            }),
            Self::PortStatus => json!({
                "operation": "load",
                "special": "display",
                "tab": "unit1",
            }),
            Self::SystemInfo | Self::LogTable => json!({ "operation": "load" }),
        }
    }

    pub fn token_placement(self) -> TokenPlacement {
        match self {
            Self::LogTable => TokenPlacement::Header,
            _ => TokenPlacement::Query,
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn every_endpoint_is_a_json_data_path() {
        for endpoint in Endpoint::iter() {
            assert!(endpoint.path().starts_with("/data/"), "{endpoint}");
            assert!(endpoint.path().ends_with(".json"), "{endpoint}");
        }
    }

    #[test]
    fn only_log_table_uses_header_tokens() {
        let header: Vec<_> = Endpoint::iter()
            .filter(|e| e.token_placement() == TokenPlacement::Header)
            .collect();
        assert_eq!(header, vec![Endpoint::LogTable]);
    }
}
