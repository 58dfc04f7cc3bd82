// ── System health ──

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FanStatus {
    Ok,
    Fail,
}

/// Health and identity reported by the system-info endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SystemHealth {
    /// Filled from the most recent CPU sample when one is available.
    pub cpu_percent: Option<f64>,
    pub temperature_c: Option<f64>,
    pub fan: Option<FanStatus>,
    pub uptime_secs: Option<u64>,
    pub hostname: Option<String>,
    pub location: Option<String>,
    pub mac: Option<String>,
    pub firmware: Option<String>,
    pub hardware: Option<String>,
    pub serial: Option<String>,
}

/// Parse device uptime text such as `"7 day - 12 hour - 17 min - 49 sec"`.
///
/// Units may be singular or plural and appear in any subset. Returns
/// `None` when no unit could be read.
pub fn parse_uptime(text: &str) -> Option<u64> {
    let mut total: u64 = 0;
    let mut matched = false;
    let tokens: Vec<&str> = text
        .split(|c: char| c.is_whitespace() || c == '-' || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    for pair in tokens.windows(2) {
        let [value, unit] = pair else { continue };
        let Ok(n) = value.parse::<u64>() else {
            continue;
        };
        let unit = unit.to_ascii_lowercase();
        let scale = if unit.starts_with("day") {
            86_400
        } else if unit.starts_with("hour") || unit == "h" {
            3_600
        } else if unit.starts_with("min") {
            60
        } else if unit.starts_with("sec") || unit == "s" {
            1
        } else {
            continue;
        };
        total = total.saturating_add(n.saturating_mul(scale));
        matched = true;
    }

    matched.then_some(total)
}
