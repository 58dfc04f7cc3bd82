//! Telemetry pipeline between `swmon-api` and the time-series store.
//!
//! - **[`Pipeline`]** owns one [`DeviceSession`](swmon_api::DeviceSession)
//!   per switch and spawns a polling task per collector per device.
//!   [`start()`](Pipeline::start) wires the tasks to a [`BatchWriter`];
//!   [`shutdown()`](Pipeline::shutdown) cancels, drains, and logs out.
//!
//! - **Collectors** ([`collector`]) fetch one endpoint and decode raw rows.
//!   Failures come back as data, never as panics or early returns.
//!
//! - **Processors** ([`processor`]) turn raw rows into classified
//!   [`ProcessedMetric`]s using data-driven [`ThresholdTable`]s, keeping
//!   per-task state such as previous counters and seen log lines.
//!
//! - **Writer** ([`writer`]) batches metrics by size and age and retries
//!   transient sink failures before dropping a batch.
//!
//! Alerting hooks are exposed as a broadcast of [`PipelineEvent`]s and a
//! per-device `watch` of [`DeviceHealth`].

pub mod collector;
pub mod config;
pub mod epoch;
pub mod error;
pub mod health;
pub mod model;
pub mod pipeline;
pub mod processor;
pub mod thresholds;
pub mod writer;

// ── Primary re-exports ──────────────────────────────────────────────
pub use collector::{Collector, CollectorResult, DeviceApi, Outcome};
pub use config::{DeviceConfig, PipelineConfig, PollIntervals, WriterConfig};
pub use epoch::DeviceEpoch;
pub use error::{CoreError, ErrorKind};
pub use health::{HealthTracker, HealthTransition};
pub use pipeline::Pipeline;
pub use processor::{ProcessContext, Processor};
pub use thresholds::{Band, ThresholdTable, Thresholds};
pub use writer::{
    BatchWriter, InfluxSink, MemorySink, TimeSeriesSink, WriterStats, WriterStatsSnapshot,
};

pub use model::{
    DeviceHealth, FieldValue, MacAddress, PipelineEvent, ProcessedMetric, Status, measurement,
};
