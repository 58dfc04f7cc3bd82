// ── Device log domain types ──

use serde::{Deserialize, Serialize};

use super::metric::Status;

/// Collapsed severity for device log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Map a syslog level: 0-2 critical, 3 error, 4 warning, 5-7 info.
    /// Out-of-range levels are treated as informational.
    pub fn from_syslog(level: u8) -> Self {
        match level {
            0..=2 => Self::Critical,
            3 => Self::Error,
            4 => Self::Warning,
            _ => Self::Info,
        }
    }

    pub fn status(self) -> Status {
        match self {
            Self::Info => Status::Normal,
            Self::Warning => Status::Warning,
            Self::Error | Self::Critical => Status::Critical,
        }
    }
}

/// One device log line after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Device-local timestamp text, kept verbatim.
    pub timestamp: String,
    pub severity: Severity,
    pub syslog_level: u8,
    pub message: String,
    pub module_id: u16,
    pub module_name: String,
    pub source_ip: Option<String>,
}

impl LogEntry {
    /// Stable identity used for de-duplication across polls.
    pub fn dedup_key(&self) -> String {
        format!("{}\u{1f}{}", self.timestamp, self.message)
    }
}

/// Human name of a firmware module id.
pub fn module_name(id: u16) -> String {
    let name = match id {
        160 => "VLAN",
        166 => "CONFIG",
        169 => "AUTHENTICATION",
        170 => "SYSTEM",
        174 => "PORT",
        182 => "SNMP",
        196 => "WEB",
        198 => "CLI",
        214 => "MAC",
        215 => "LOG",
        225 => "STP",
        other => return format!("MODULE_{other}"),
    };
    name.to_owned()
}

/// Pull the first parenthesised IPv4 address out of a log message, as in
/// `"Login by admin (192.168.0.20)"`.
pub fn extract_source_ip(message: &str) -> Option<String> {
    let mut rest = message;
    while let Some(open) = rest.find('(') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(')') else {
            break;
        };
        let candidate = &after[..close];
        if candidate.parse::<std::net::Ipv4Addr>().is_ok() {
            return Some(candidate.to_owned());
        }
        rest = &after[close + 1..];
    }
    None
}
