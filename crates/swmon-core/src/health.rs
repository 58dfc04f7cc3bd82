// ── Device health tracking ──
//
// Counts consecutive reachability/auth/session failures across all of a
// device's collectors. Parse failures prove the device answered, so they
// neither count nor reset the streak.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::model::{DeviceHealth, PipelineEvent, ProcessedMetric, Status, measurement};

/// A health change produced by a success or failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub health: DeviceHealth,
    pub consecutive_failures: u32,
}

impl HealthTransition {
    pub fn to_event(self, device: &str, at: DateTime<Utc>) -> PipelineEvent {
        PipelineEvent::DeviceHealthChanged {
            device: device.to_owned(),
            health: self.health,
            consecutive_failures: self.consecutive_failures,
            at,
        }
    }

    pub fn to_metric(self, device: &str, at: DateTime<Utc>) -> ProcessedMetric {
        let status = match self.health {
            DeviceHealth::Healthy => Status::Normal,
            DeviceHealth::Unhealthy => Status::Critical,
        };
        ProcessedMetric::new(measurement::DEVICE_HEALTH, device, at)
            .field("healthy", self.health == DeviceHealth::Healthy)
            .field("consecutive_failures", i64::from(self.consecutive_failures))
            .with_status(status)
    }
}

#[derive(Debug)]
pub struct HealthTracker {
    device: String,
    threshold: u32,
    failures: Mutex<u32>,
    health: watch::Sender<DeviceHealth>,
}

impl HealthTracker {
    pub fn new(device: impl Into<String>, threshold: u32) -> Self {
        let (health, _) = watch::channel(DeviceHealth::Healthy);
        Self {
            device: device.into(),
            threshold: threshold.max(1),
            failures: Mutex::new(0),
            health,
        }
    }

    pub fn current(&self) -> DeviceHealth {
        *self.health.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeviceHealth> {
        self.health.subscribe()
    }

    pub fn consecutive_failures(&self) -> u32 {
        *self.failures.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    pub fn record_success(&self) -> Option<HealthTransition> {
        *self.failures.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = 0;
        self.set(DeviceHealth::Healthy, 0)
    }

    pub fn record_failure(&self, kind: ErrorKind) -> Option<HealthTransition> {
        if !kind.affects_device_health() {
            return None;
        }
        let count = {
            let mut failures = self
                .failures
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *failures = failures.saturating_add(1);
            *failures
        };
        if count >= self.threshold {
            self.set(DeviceHealth::Unhealthy, count)
        } else {
            None
        }
    }

    fn set(&self, next: DeviceHealth, consecutive_failures: u32) -> Option<HealthTransition> {
        let changed = self.health.send_if_modified(|h| {
            if *h == next {
                false
            } else {
                *h = next;
                true
            }
        });
        if !changed {
            return None;
        }
        match next {
            DeviceHealth::Unhealthy => {
                warn!(device = %self.device, consecutive_failures, "device marked unhealthy");
            }
            DeviceHealth::Healthy => info!(device = %self.device, "device recovered"),
        }
        Some(HealthTransition {
            health: next,
            consecutive_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escalates_at_threshold_and_recovers_on_success() {
        let tracker = HealthTracker::new("sw1", 3);
        assert_eq!(tracker.record_failure(ErrorKind::Unreachable), None);
        assert_eq!(tracker.record_failure(ErrorKind::Auth), None);
        let t = tracker.record_failure(ErrorKind::Session);
        assert_eq!(
            t,
            Some(HealthTransition {
                health: DeviceHealth::Unhealthy,
                consecutive_failures: 3,
            })
        );
        assert_eq!(tracker.current(), DeviceHealth::Unhealthy);

        // Already unhealthy: no repeated transition.
        assert_eq!(tracker.record_failure(ErrorKind::Unreachable), None);

        let t = tracker.record_success();
        assert_eq!(t.map(|t| t.health), Some(DeviceHealth::Healthy));
        assert_eq!(tracker.consecutive_failures(), 0);
        assert_eq!(tracker.record_success(), None);
    }

    #[test]
    fn parse_failures_are_neutral() {
        let tracker = HealthTracker::new("sw1", 2);
        tracker.record_failure(ErrorKind::Unreachable);
        assert_eq!(tracker.record_failure(ErrorKind::Parse), None);
        assert_eq!(tracker.consecutive_failures(), 1);
        assert!(tracker.record_failure(ErrorKind::Unreachable).is_some());
    }

    #[test]
    fn watchers_see_transitions() {
        let tracker = HealthTracker::new("sw1", 1);
        let rx = tracker.subscribe();
        tracker.record_failure(ErrorKind::Unreachable);
        assert_eq!(*rx.borrow(), DeviceHealth::Unhealthy);
    }

    #[test]
    fn transition_metric_is_critical_when_unhealthy() {
        let m = HealthTransition {
            health: DeviceHealth::Unhealthy,
            consecutive_failures: 5,
        }
        .to_metric("sw1", Utc::now());
        assert_eq!(m.measurement, measurement::DEVICE_HEALTH);
        assert_eq!(m.status, Status::Critical);
        assert_eq!(m.fields["consecutive_failures"].as_i64(), Some(5));
    }
}
