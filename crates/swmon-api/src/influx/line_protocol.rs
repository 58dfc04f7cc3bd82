// InfluxDB line protocol
//
// `measurement,tag=v field=1i,other="text" 1700000000000000000`

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};

/// A single field value in line protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum LineValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
}

/// One line-protocol point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, LineValue>,
    pub timestamp: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: LineValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Render as a single line, or `None` when no field survives encoding
    /// (InfluxDB rejects field-less points; NaN and infinities are dropped).
    pub fn to_line(&self) -> Option<String> {
        let mut fields = String::new();
        for (key, value) in &self.fields {
            let encoded = match value {
                LineValue::Float(f) if !f.is_finite() => continue,
                LineValue::Float(f) => format!("{f}"),
                LineValue::Integer(i) => format!("{i}i"),
                LineValue::Boolean(b) => b.to_string(),
                LineValue::Text(s) => format!("\"{}\"", escape_string_field(s)),
            };
            if !fields.is_empty() {
                fields.push(',');
            }
            let _ = write!(fields, "{}={encoded}", escape_key(key));
        }
        if fields.is_empty() {
            return None;
        }

        let mut line = escape_measurement(&self.measurement);
        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            let _ = write!(line, ",{}={}", escape_key(key), escape_key(value));
        }
        line.push(' ');
        line.push_str(&fields);
        if let Some(ns) = self.timestamp.timestamp_nanos_opt() {
            let _ = write!(line, " {ns}");
        }
        Some(line)
    }
}

/// Render a batch, one point per line. Points without fields are skipped.
pub fn encode_batch(points: &[Point]) -> String {
    points
        .iter()
        .filter_map(Point::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape_measurement(s: &str) -> String {
    escape(s, &[',', ' '])
}

/// Tag keys, tag values, and field keys.
fn escape_key(s: &str) -> String {
    escape(s, &[',', '=', ' '])
}

fn escape_string_field(s: &str) -> String {
    escape(s, &['"', '\\'])
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        // Newlines terminate a point; fold them into spaces.
        if c == '\n' {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}
