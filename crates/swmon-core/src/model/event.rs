// ── Pipeline events ──
//
// Broadcast to subscribers (alerting, the CLI). Nothing in the pipeline
// waits on a receiver; lagging subscribers miss events.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::metric::Status;
use crate::error::ErrorKind;

/// Per-device reachability as seen by the health tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeviceHealth {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A series moved from one status to another.
    StatusChanged {
        device: String,
        series: String,
        from: Status,
        to: Status,
        at: DateTime<Utc>,
    },
    DeviceHealthChanged {
        device: String,
        health: DeviceHealth,
        consecutive_failures: u32,
        at: DateTime<Utc>,
    },
    CollectorFailed {
        device: String,
        collector: String,
        kind: ErrorKind,
        message: String,
        consecutive_failures: u32,
        at: DateTime<Utc>,
    },
    /// The writer gave up on a batch after exhausting its retries.
    BatchDropped {
        metrics: usize,
        attempts: u32,
        error: String,
        at: DateTime<Utc>,
    },
}
