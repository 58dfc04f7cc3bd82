// ── Domain model ──

pub mod event;
pub mod identity;
pub mod log;
pub mod mac;
pub mod metric;
pub mod port;
pub mod system;

pub use event::{DeviceHealth, PipelineEvent};
pub use identity::MacAddress;
pub use log::{LogEntry, Severity};
pub use mac::{MacChange, MacEntry, MacEntryType, MacKey};
pub use metric::{FieldValue, ProcessedMetric, Status, measurement};
pub use port::{AdminState, LinkState, PortState};
pub use system::{FanStatus, SystemHealth};
