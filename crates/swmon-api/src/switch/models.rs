// Raw switch payloads
//
// Row types exactly as the web UI's JSON endpoints return them. Firmware
// builds disagree on whether numbers arrive as JSON numbers or strings
// (sometimes with thousands separators), so numeric fields go through the
// lenient helpers below. Interpretation of these rows belongs to the
// processors in `swmon-core`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ── CPU ─────────────────────────────────────────────────────────────

/// `/data/cpuInfo.json`: one utilization sample per CPU unit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CpuInfo {
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    pub cpu: Vec<f64>,
}

// ── Ports ───────────────────────────────────────────────────────────

/// One row of `/data/portStatistics.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortStatisticsRow {
    #[serde(deserialize_with = "lenient_text")]
    pub port: String,
    /// Administrative state; `1` (or "enable") means enabled.
    #[serde(default)]
    pub state: Option<Value>,
    /// Link text such as "1000M Full" or "Link Down".
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub octets_rx: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub packet_rx: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub octets_tx: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub packet_tx: u64,
}

/// One row of `/data/portStatusCfg.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortStatusRow {
    #[serde(deserialize_with = "lenient_text")]
    pub port: String,
    #[serde(default)]
    pub state: Option<Value>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub link: Option<String>,
    /// Negotiated speed text, e.g. "1000M" or "100Mbps".
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub speed: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_text")]
    pub duplex: Option<String>,
}

// ── MAC table ───────────────────────────────────────────────────────

/// One row of `/data/swtMacTableCfg.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MacTableRow {
    pub mac: String,
    #[serde(rename = "vlanId", default = "default_vlan", deserialize_with = "lenient_u16")]
    pub vlan_id: u16,
    #[serde(deserialize_with = "lenient_text")]
    pub port: String,
    /// `2` is a static entry; anything else is learned.
    #[serde(rename = "type", default, deserialize_with = "lenient_u8")]
    pub entry_type: u8,
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub aging: Option<u64>,
}

fn default_vlan() -> u16 {
    1
}

// ── System ──────────────────────────────────────────────────────────

/// `/data/systemInfo.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SystemInfoRaw {
    #[serde(default)]
    pub dev_name: Option<String>,
    #[serde(default)]
    pub dev_loc: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub fw_version: Option<String>,
    #[serde(default)]
    pub hw_version: Option<String>,
    #[serde(default)]
    pub se_number: Option<String>,
    /// Uptime text, e.g. "7 day - 12 hour - 17 min - 49 sec".
    #[serde(default)]
    pub run_time: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub temperature: Option<f64>,
    /// `1` means the fan reports healthy.
    #[serde(default, deserialize_with = "lenient_opt_u64")]
    pub fan_sta: Option<u64>,
}

// ── Logs ────────────────────────────────────────────────────────────

/// One row of `/data/logtable.json`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LogRow {
    #[serde(default)]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_u16")]
    pub module: u16,
    /// Syslog level 0..=7.
    #[serde(default = "default_severity", deserialize_with = "lenient_u8")]
    pub severity: u8,
    #[serde(default)]
    pub content: String,
}

fn default_severity() -> u8 {
    6
}

// ── Lenient number helpers ──────────────────────────────────────────

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrText {
    Int(u64),
    Float(f64),
    Text(String),
}

impl NumOrText {
    fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => strip_separators(s).parse().ok(),
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Self::Float(f) if *f >= 0.0 && f.is_finite() => Some(*f as u64),
            Self::Float(_) => None,
            Self::Text(s) => parse_counter(s),
        }
    }
}

/// Parse a counter that may carry thousands separators ("1,234,567").
pub fn parse_counter(text: &str) -> Option<u64> {
    strip_separators(text).parse().ok()
}

fn strip_separators(text: &str) -> String {
    text.trim().chars().filter(|c| *c != ',').collect()
}

fn invalid<E: serde::de::Error>(what: &str) -> E {
    E::custom(format!("expected {what}"))
}

pub(crate) fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    NumOrText::deserialize(d)?
        .as_u64()
        .ok_or_else(|| invalid("an unsigned counter"))
}

pub(crate) fn lenient_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(Option::<NumOrText>::deserialize(d)?.and_then(|v| v.as_u64()))
}

pub(crate) fn lenient_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    Ok(Option::<NumOrText>::deserialize(d)?.and_then(|v| v.as_f64()))
}

pub(crate) fn lenient_u16<'de, D: Deserializer<'de>>(d: D) -> Result<u16, D::Error> {
    let n = lenient_u64(d)?;
    u16::try_from(n).map_err(|_| invalid("a 16-bit integer"))
}

pub(crate) fn lenient_u8<'de, D: Deserializer<'de>>(d: D) -> Result<u8, D::Error> {
    let n = lenient_u64(d)?;
    u8::try_from(n).map_err(|_| invalid("an 8-bit integer"))
}

impl From<NumOrText> for String {
    fn from(v: NumOrText) -> Self {
        match v {
            NumOrText::Int(n) => n.to_string(),
            NumOrText::Float(f) => f.to_string(),
            NumOrText::Text(s) => s,
        }
    }
}

/// Text fields that some firmware sends as bare numbers (`"port": 3`).
pub(crate) fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    NumOrText::deserialize(d).map(String::from)
}

pub(crate) fn lenient_opt_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<NumOrText>::deserialize(d)?.map(String::from))
}

fn lenient_f64_vec<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
    Vec::<NumOrText>::deserialize(d)?
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| invalid("a numeric CPU sample")))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn counters_tolerate_thousands_separators() {
        let row: PortStatisticsRow = serde_json::from_value(json!({
            "port": "1/0/1",
            "octetsRx": "1,234,567",
            "packetRx": 42,
            "octetsTx": "0",
            "packetTx": "9,001",
        }))
        .unwrap();
        assert_eq!(row.octets_rx, 1_234_567);
        assert_eq!(row.packet_rx, 42);
        assert_eq!(row.packet_tx, 9_001);
    }

    #[test]
    fn garbage_counter_is_rejected() {
        let res: Result<PortStatisticsRow, _> = serde_json::from_value(json!({
            "port": "1/0/1",
            "octetsRx": "lots",
        }));
        assert!(res.is_err());
    }

    #[test]
    fn mac_row_defaults_vlan_and_reads_type() {
        let row: MacTableRow = serde_json::from_value(json!({
            "mac": "00-1A-3F-87-0F-7A",
            "port": "1/0/13",
            "type": "2",
        }))
        .unwrap();
        assert_eq!(row.vlan_id, 1);
        assert_eq!(row.entry_type, 2);
        assert_eq!(row.aging, None);
    }

    #[test]
    fn cpu_samples_accept_mixed_encodings() {
        let info: CpuInfo = serde_json::from_value(json!({ "cpu": [12, "7.5"] })).unwrap();
        assert_eq!(info.cpu, vec![12.0, 7.5]);
    }

    #[test]
    fn numeric_link_becomes_text() {
        let row: PortStatusRow =
            serde_json::from_value(json!({ "port": "1/0/2", "link": 1, "speed": "1000M" })).unwrap();
        assert_eq!(row.link.as_deref(), Some("1"));
        assert_eq!(row.speed.as_deref(), Some("1000M"));
    }

    #[test]
    fn parse_counter_handles_spaces() {
        assert_eq!(parse_counter(" 12,000 "), Some(12_000));
        assert_eq!(parse_counter("n/a"), None);
    }
}
