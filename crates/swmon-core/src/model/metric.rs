// ── Processed metrics ──
//
// The normalized unit every processor emits and the writer persists.
// Immutable once built; the builder methods consume `self`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swmon_api::{LineValue, Point};

/// Measurement names as they appear in the time-series store.
pub mod measurement {
    pub const CPU: &str = "cpu_usage";
    pub const PORT_TRAFFIC: &str = "port_traffic";
    pub const PORT_STATUS: &str = "port_status";
    pub const MAC_ADDRESSES: &str = "mac_addresses";
    pub const MAC_EVENTS: &str = "mac_events";
    pub const SWITCH_LOGS: &str = "switch_logs";
    pub const SYSTEM_INFO: &str = "system_info";
    pub const DEVICE_HEALTH: &str = "device_health";
}

// ── Status ──────────────────────────────────────────────────────────

/// Classification attached to every metric.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    Normal,
    Warning,
    Critical,
    Unknown,
}

impl Status {
    /// Severity rank, `Normal` lowest. `Unknown` ranks between normal and
    /// warning: it is worth a look but not an alert.
    pub fn rank(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Unknown => 1,
            Self::Warning => 2,
            Self::Critical => 3,
        }
    }

    /// The more severe of two statuses.
    #[must_use]
    pub fn worst(self, other: Self) -> Self {
        if other.rank() > self.rank() { other } else { self }
    }
}

// ── FieldValue ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for FieldValue {
    fn from(v: usize) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<&FieldValue> for LineValue {
    fn from(v: &FieldValue) -> Self {
        match v {
            FieldValue::Float(f) => Self::Float(*f),
            FieldValue::Int(i) => Self::Integer(*i),
            FieldValue::Bool(b) => Self::Boolean(*b),
            FieldValue::Text(s) => Self::Text(s.clone()),
        }
    }
}

// ── ProcessedMetric ─────────────────────────────────────────────────

/// One classified observation, ready for the time-series store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedMetric {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub status: Status,
    pub timestamp: DateTime<Utc>,
}

impl ProcessedMetric {
    /// Start a metric for `device`. The device name is always tagged.
    pub fn new(measurement: &str, device: &str, timestamp: DateTime<Utc>) -> Self {
        let mut tags = BTreeMap::new();
        tags.insert("device".to_owned(), device.to_owned());
        Self {
            measurement: measurement.to_owned(),
            tags,
            fields: BTreeMap::new(),
            status: Status::Normal,
            timestamp,
        }
    }

    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.insert(key.to_owned(), value.into());
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.to_owned(), value.into());
        self
    }

    /// Set `key` only when `value` is present.
    pub fn field_opt<V: Into<FieldValue>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn device(&self) -> &str {
        self.tags.get("device").map_or("", String::as_str)
    }

    /// Identity of the series this metric belongs to: measurement plus
    /// tags. Used to detect status transitions between polls.
    pub fn series_key(&self) -> String {
        let mut key = self.measurement.clone();
        for (k, v) in &self.tags {
            key.push(',');
            key.push_str(k);
            key.push('=');
            key.push_str(v);
        }
        key
    }

    /// Line-protocol point with the status carried as a tag.
    pub fn to_point(&self) -> Point {
        let mut point = Point::new(self.measurement.clone(), self.timestamp)
            .tag("status", self.status.to_string());
        for (k, v) in &self.tags {
            point = point.tag(k.clone(), v.clone());
        }
        for (k, v) in &self.fields {
            point = point.field(k.clone(), LineValue::from(v));
        }
        point
    }
}
