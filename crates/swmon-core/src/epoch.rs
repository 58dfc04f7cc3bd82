// ── Device epoch tracking ──
//
// An epoch is a span of monotonic counters. A decrease in reported uptime
// means the device rebooted, so every counter-derived rate computed across
// the boundary is meaningless. Processors stamp their samples with the
// epoch and refuse to diff across a change.

use std::sync::{Mutex, PoisonError};

use tracing::info;

#[derive(Debug, Default)]
struct EpochState {
    epoch: u64,
    last_uptime: Option<u64>,
}

/// Epoch counter for one device, shared by that device's tasks.
#[derive(Debug, Default)]
pub struct DeviceEpoch {
    device: String,
    state: Mutex<EpochState>,
}

impl DeviceEpoch {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            state: Mutex::new(EpochState::default()),
        }
    }

    pub fn current(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).epoch
    }

    /// Record a fresh uptime reading. Returns `true` when it starts a new
    /// epoch.
    pub fn observe_uptime(&self, uptime_secs: u64) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let rebooted = state.last_uptime.is_some_and(|prev| uptime_secs < prev);
        if rebooted {
            state.epoch += 1;
            info!(
                device = %self.device,
                epoch = state.epoch,
                uptime_secs,
                "uptime went backwards, starting new counter epoch"
            );
        }
        state.last_uptime = Some(uptime_secs);
        rebooted
    }
}
