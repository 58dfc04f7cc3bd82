// ── Collectors ──
//
// A collector fetches one telemetry domain from one device and decodes it
// into raw rows. Nothing more: no retries, no interpretation. Failures are
// returned as data so the scheduler can keep polling.

mod switch;

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use swmon_api::{DeviceSession, Endpoint};
use tracing::{debug, warn};

use crate::error::{CoreError, ErrorKind};

pub use switch::{
    CpuCollector, LogCollector, MacTableCollector, PortStatisticsCollector, PortStatusCollector,
    SystemInfoCollector,
};

// ── DeviceApi ───────────────────────────────────────────────────────

/// The seam between collectors and a device. Implemented by
/// [`DeviceSession`]; tests substitute scripted fakes.
pub trait DeviceApi: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Fetch one endpoint with its default payload.
    fn fetch(&self, endpoint: Endpoint) -> impl Future<Output = Result<Value, swmon_api::Error>> + Send;

    /// Release any device-side session. Best-effort.
    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl DeviceApi for DeviceSession {
    fn name(&self) -> &str {
        DeviceSession::name(self)
    }

    fn fetch(&self, endpoint: Endpoint) -> impl Future<Output = Result<Value, swmon_api::Error>> + Send {
        DeviceSession::fetch(self, endpoint)
    }

    async fn close(&self) {
        if let Err(e) = self.logout().await {
            warn!(device = %DeviceSession::name(self), error = %e, "logout failed (non-fatal)");
        }
    }
}

// ── CollectorResult ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ok(T),
    Failed { kind: ErrorKind, message: String },
}

/// One collection attempt. Transient: consumed by the processor.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorResult<T> {
    pub attempted_at: DateTime<Utc>,
    pub outcome: Outcome<T>,
}

impl<T> CollectorResult<T> {
    pub fn ok(attempted_at: DateTime<Utc>, raw: T) -> Self {
        Self {
            attempted_at,
            outcome: Outcome::Ok(raw),
        }
    }

    pub fn failed(attempted_at: DateTime<Utc>, err: &CoreError) -> Self {
        Self {
            attempted_at,
            outcome: Outcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok(_))
    }
}

// ── Collector ───────────────────────────────────────────────────────

pub trait Collector: Send + Sync + 'static {
    type Raw: DeserializeOwned + Send + 'static;

    const ENDPOINT: Endpoint;

    /// Short name used in logs, events, and task labels.
    fn name(&self) -> &'static str;

    /// Turn the endpoint's `data` payload into raw rows.
    fn decode(&self, data: Value) -> Result<Self::Raw, CoreError> {
        serde_json::from_value(data)
            .map_err(|e| CoreError::parse(format!("{}: {e}", Self::ENDPOINT)))
    }

    fn collect<D: DeviceApi>(&self, device: &D) -> impl Future<Output = CollectorResult<Self::Raw>> + Send {
        async move {
            let attempted_at = Utc::now();
            let result = device
                .fetch(Self::ENDPOINT)
                .await
                .map_err(CoreError::from)
                .and_then(|data| self.decode(data));
            match result {
                Ok(raw) => {
                    debug!(device = %device.name(), collector = self.name(), "collected");
                    CollectorResult::ok(attempted_at, raw)
                }
                Err(e) => CollectorResult::failed(attempted_at, &e),
            }
        }
    }
}
