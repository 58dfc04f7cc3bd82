use swmon_api::switch::models::CpuInfo;
use tracing::warn;

use super::{ProcessContext, Processor};
use crate::error::CoreError;
use crate::model::{ProcessedMetric, Status, measurement};
use crate::thresholds::ThresholdTable;

/// Classifies the first CPU unit's utilization.
#[derive(Debug, Clone)]
pub struct CpuProcessor {
    table: ThresholdTable,
}

impl CpuProcessor {
    pub fn new(table: ThresholdTable) -> Self {
        Self { table }
    }
}

impl Default for CpuProcessor {
    fn default() -> Self {
        Self::new(ThresholdTable::default_cpu())
    }
}

impl Processor for CpuProcessor {
    type Raw = CpuInfo;
    type State = ();

    fn process(
        &self,
        raw: CpuInfo,
        _state: &mut (),
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<ProcessedMetric>, CoreError> {
        let Some(&percent) = raw.cpu.first() else {
            return Err(CoreError::parse("cpuInfo carried no samples"));
        };

        let status = self.table.classify(percent);
        if matches!(status, Status::Warning | Status::Critical) {
            warn!(device = ctx.device, cpu_percent = percent, %status, "high CPU usage");
        }

        Ok(vec![
            ProcessedMetric::new(measurement::CPU, ctx.device, ctx.at)
                .field("cpu_percent", percent)
                .with_status(status),
        ])
    }
}
