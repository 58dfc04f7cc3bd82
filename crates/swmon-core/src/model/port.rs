// ── Port domain types ──

use serde::{Deserialize, Serialize};

/// Administrative state configured on the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdminState {
    Enabled,
    Disabled,
}

/// Operational link state. `Unknown` when the endpoint did not report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LinkState {
    Up,
    Down,
    Unknown,
}

/// Normalized view of one switch port at one instant.
///
/// Counters are monotonic within a device epoch; a reboot resets them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortState {
    /// Port label as the switch reports it, e.g. `1/0/13`.
    pub index: String,
    pub admin: AdminState,
    pub link: LinkState,
    /// Negotiated speed; `None` when down or not reported.
    pub speed_mbps: Option<u32>,
    pub duplex: Option<String>,
    pub rx_bytes: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub tx_packets: u64,
}

impl PortState {
    pub fn is_up(&self) -> bool {
        self.link == LinkState::Up
    }

    pub fn is_enabled(&self) -> bool {
        self.admin == AdminState::Enabled
    }
}

/// Interpret the switch's admin-state value: `1`, `"1"`, `"enable"`,
/// `"enabled"`, or `"on"` mean enabled. Missing means enabled.
pub fn parse_admin_state(raw: Option<&serde_json::Value>) -> AdminState {
    use serde_json::Value;
    let enabled = match raw {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "enable" | "enabled" | "on"
        ),
        Some(_) => false,
    };
    if enabled {
        AdminState::Enabled
    } else {
        AdminState::Disabled
    }
}

/// Interpret link text. Speed text such as "1000M Full" implies the link is
/// up; "Link Down" or "down" mean down.
pub fn parse_link_state(raw: Option<&str>) -> LinkState {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return LinkState::Unknown;
    };
    let lower = text.to_ascii_lowercase();
    if lower.contains("down") || lower == "0" {
        LinkState::Down
    } else {
        LinkState::Up
    }
}

/// Parse the leading speed token: "1000M", "100Mbps", "10G", "1000M Full".
pub fn parse_speed_mbps(raw: Option<&str>) -> Option<u32> {
    let token = raw?.split_whitespace().next()?.to_ascii_lowercase();
    let digits: String = token.chars().take_while(char::is_ascii_digit).collect();
    let value: u32 = digits.parse().ok()?;
    let unit = &token[digits.len()..];
    match unit {
        "" | "m" | "mbps" | "mb" => Some(value),
        "g" | "gbps" | "gb" => value.checked_mul(1000),
        _ => None,
    }
}

/// Duplex word from link text ("1000M Full" -> "full").
pub fn parse_duplex(raw: Option<&str>) -> Option<String> {
    raw?.split_whitespace()
        .map(str::to_ascii_lowercase)
        .find(|w| w == "full" || w == "half")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn admin_state_variants() {
        assert_eq!(parse_admin_state(Some(&json!(1))), AdminState::Enabled);
        assert_eq!(parse_admin_state(Some(&json!("Enable"))), AdminState::Enabled);
        assert_eq!(parse_admin_state(Some(&json!(0))), AdminState::Disabled);
        assert_eq!(parse_admin_state(Some(&json!("disable"))), AdminState::Disabled);
        assert_eq!(parse_admin_state(None), AdminState::Enabled);
    }

    #[test]
    fn link_state_from_speed_text() {
        assert_eq!(parse_link_state(Some("1000M Full")), LinkState::Up);
        assert_eq!(parse_link_state(Some("Link Down")), LinkState::Down);
        assert_eq!(parse_link_state(Some("Up")), LinkState::Up);
        assert_eq!(parse_link_state(None), LinkState::Unknown);
    }

    #[test]
    fn speed_tokens() {
        assert_eq!(parse_speed_mbps(Some("1000M Full")), Some(1000));
        assert_eq!(parse_speed_mbps(Some("100Mbps")), Some(100));
        assert_eq!(parse_speed_mbps(Some("10G")), Some(10_000));
        assert_eq!(parse_speed_mbps(Some("Link Down")), None);
        assert_eq!(parse_speed_mbps(None), None);
    }

    #[test]
    fn duplex_word() {
        assert_eq!(parse_duplex(Some("100M Half")), Some("half".into()));
        assert_eq!(parse_duplex(Some("1000M")), None);
    }
}
