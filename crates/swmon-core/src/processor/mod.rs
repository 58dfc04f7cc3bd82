// ── Processors ──
//
// Pure transforms from raw collector rows to classified metrics. Each
// processor is paired with one collector and owns a small piece of state
// (previous counters, the previous MAC set, seen log lines) that lives in
// the polling task, never shared.

mod cpu;
mod logs;
mod mac;
mod ports;
mod system;

use chrono::{DateTime, Utc};

use crate::epoch::DeviceEpoch;
use crate::error::CoreError;
use crate::model::ProcessedMetric;

pub use cpu::CpuProcessor;
pub use logs::{LogDedup, LogProcessor};
pub use mac::{MacDiff, MacProcessor, MacState, diff_mac_tables};
pub use ports::{
    PortSample, PortStatisticsProcessor, PortStatusProcessor, counter_rate,
};
pub use system::SystemProcessor;

/// Per-call inputs that are not part of the raw payload.
#[derive(Debug, Clone, Copy)]
pub struct ProcessContext<'a> {
    pub device: &'a str,
    /// When the raw payload was collected.
    pub at: DateTime<Utc>,
    pub epoch: &'a DeviceEpoch,
}

pub trait Processor: Send + Sync + 'static {
    type Raw;
    type State: Default + Send;

    fn process(
        &self,
        raw: Self::Raw,
        state: &mut Self::State,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<ProcessedMetric>, CoreError>;
}
