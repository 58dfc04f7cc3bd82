// ── MAC table domain types ──

use serde::{Deserialize, Serialize};

use super::identity::MacAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MacEntryType {
    Static,
    Dynamic,
}

/// One forwarding-table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacEntry {
    pub mac: MacAddress,
    pub vlan: u16,
    pub port: String,
    pub entry_type: MacEntryType,
    pub age_secs: Option<u64>,
}

/// Identity of an entry for arrival/departure diffing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacKey {
    pub mac: MacAddress,
    pub vlan: u16,
    pub port: String,
}

impl MacEntry {
    pub fn key(&self) -> MacKey {
        MacKey {
            mac: self.mac.clone(),
            vlan: self.vlan,
            port: self.port.clone(),
        }
    }
}

/// Whether an entry appeared or disappeared between two polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MacChange {
    Arrived,
    Departed,
}
