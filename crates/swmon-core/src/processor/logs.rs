// Device log processor.
//
// The log table returns the whole ring buffer on every poll, so most rows
// are repeats. A bounded memory of dedup keys makes each line come out
// exactly once while it stays in that memory.

use std::collections::{HashSet, VecDeque};

use chrono::Duration;
use swmon_api::switch::models::LogRow;

use super::{ProcessContext, Processor};
use crate::error::CoreError;
use crate::model::log::{extract_source_ip, module_name};
use crate::model::{LogEntry, ProcessedMetric, Severity, measurement};

/// Default number of dedup keys remembered per device.
pub const DEFAULT_LOG_MEMORY: usize = 4096;

/// FIFO-bounded set of seen keys.
#[derive(Debug)]
pub struct LogDedup {
    capacity: usize,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl Default for LogDedup {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_MEMORY)
    }
}

impl LogDedup {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    /// Record `key`; returns `true` if it had not been seen.
    pub fn insert(&mut self, key: String) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn to_entry(row: LogRow) -> LogEntry {
    let message = row.content.trim().to_owned();
    LogEntry {
        timestamp: row.time.trim().to_owned(),
        severity: Severity::from_syslog(row.severity),
        syslog_level: row.severity,
        module_id: row.module,
        module_name: module_name(row.module),
        source_ip: extract_source_ip(&message),
        message,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogProcessor;

impl Processor for LogProcessor {
    type Raw = Vec<LogRow>;
    type State = LogDedup;

    fn process(
        &self,
        raw: Vec<LogRow>,
        state: &mut LogDedup,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<ProcessedMetric>, CoreError> {
        let mut metrics = Vec::new();
        for row in raw {
            let entry = to_entry(row);
            if !state.insert(entry.dedup_key()) {
                continue;
            }
            // Lines from one poll share a collection time; offset each by a
            // nanosecond so the store keeps them as distinct points.
            let offset = Duration::nanoseconds(i64::try_from(metrics.len()).unwrap_or(i64::MAX));
            metrics.push(
                ProcessedMetric::new(measurement::SWITCH_LOGS, ctx.device, ctx.at + offset)
                    .tag("severity", entry.severity.to_string())
                    .tag("module", entry.module_name.as_str())
                    .field("message", entry.message.as_str())
                    .field("device_time", entry.timestamp.as_str())
                    .field("syslog_level", i64::from(entry.syslog_level))
                    .field("module_id", i64::from(entry.module_id))
                    .field_opt("source_ip", entry.source_ip)
                    .with_status(entry.severity.status()),
            );
        }
        Ok(metrics)
    }
}
