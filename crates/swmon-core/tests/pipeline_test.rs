#![allow(clippy::unwrap_used)]
// End-to-end pipeline behaviour against scripted devices, on paused time.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::broadcast;

use swmon_api::Endpoint;
use swmon_core::{
    DeviceApi, DeviceHealth, ErrorKind, MemorySink, Pipeline, PipelineConfig, PipelineEvent,
    Status, measurement,
};

// ── Helpers ─────────────────────────────────────────────────────────

/// Answers the CPU endpoint with a fixed reading and times out on every
/// endpoint not listed in `working`.
struct ScriptedSwitch {
    name: &'static str,
    cpu_percent: f64,
    working: Vec<Endpoint>,
    closed: AtomicBool,
}

impl ScriptedSwitch {
    fn new(name: &'static str, cpu_percent: f64, working: &[Endpoint]) -> Self {
        Self {
            name,
            cpu_percent,
            working: working.to_vec(),
            closed: AtomicBool::new(false),
        }
    }
}

impl DeviceApi for ScriptedSwitch {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, endpoint: Endpoint) -> Result<Value, swmon_api::Error> {
        if !self.working.contains(&endpoint) {
            return Err(swmon_api::Error::Timeout { timeout_ms: 10_000 });
        }
        Ok(match endpoint {
            Endpoint::CpuInfo => json!({ "cpu": [self.cpu_percent] }),
            Endpoint::SystemInfo => json!({
                "dev_name": self.name,
                "run_time": "1 day - 0 hour - 0 min - 0 sec",
                "temperature": 40,
            }),
            _ => json!([]),
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Each poll of the CPU and log endpoints returns data numbered by call,
/// so output order can be checked against poll order.
#[derive(Default)]
struct SequencedSwitch {
    cpu_polls: AtomicU32,
    log_polls: AtomicU32,
}

impl DeviceApi for SequencedSwitch {
    fn name(&self) -> &str {
        "seq"
    }

    async fn fetch(&self, endpoint: Endpoint) -> Result<Value, swmon_api::Error> {
        match endpoint {
            Endpoint::CpuInfo => {
                let n = self.cpu_polls.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "cpu": [f64::from(n % 100)] }))
            }
            Endpoint::LogTable => {
                let n = self.log_polls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Array(
                    (0..3)
                        .map(|i| {
                            json!({
                                "time": format!("2024-01-01 00:{:02}:{i:02}", n % 60),
                                "module": 196,
                                "severity": 6,
                                "content": format!("poll {n} line {i}"),
                            })
                        })
                        .collect(),
                ))
            }
            _ => Err(swmon_api::Error::Timeout { timeout_ms: 10_000 }),
        }
    }

    async fn close(&self) {}
}

fn config() -> PipelineConfig {
    let mut config = PipelineConfig::new(Vec::new());
    config.intervals.cpu = Duration::from_secs(1);
    config
}

fn drain(rx: &mut broadcast::Receiver<Arc<PipelineEvent>>) -> Vec<Arc<PipelineEvent>> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Failure isolation ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failing_collectors_do_not_starve_cpu() {
    let device = Arc::new(ScriptedSwitch::new("sw1", 12.0, &[Endpoint::CpuInfo]));
    let pipeline = Pipeline::with_devices(config(), vec![Arc::clone(&device)]).unwrap();
    let mut events = pipeline.events();
    let sink = MemorySink::new();

    pipeline.start(sink.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(100)).await;
    pipeline.shutdown().await;

    let cpu = sink
        .metrics()
        .into_iter()
        .filter(|m| m.measurement == measurement::CPU)
        .count();
    assert!(cpu >= 100, "expected at least 100 CPU metrics, got {cpu}");

    let failed: Vec<String> = drain(&mut events)
        .iter()
        .filter_map(|e| match e.as_ref() {
            PipelineEvent::CollectorFailed {
                collector, kind, ..
            } => {
                assert_eq!(*kind, ErrorKind::Unreachable);
                Some(collector.clone())
            }
            _ => None,
        })
        .collect();
    assert!(failed.iter().any(|c| c == "port_statistics"));
    assert!(failed.iter().any(|c| c == "logs"));
    assert!(!failed.iter().any(|c| c == "cpu"));

    assert!(device.closed.load(Ordering::SeqCst), "shutdown closes devices");
    assert_eq!(
        pipeline.writer_stats().metrics_written,
        u64::try_from(sink.metrics().len()).unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn one_device_failing_does_not_affect_another() {
    let good = Arc::new(ScriptedSwitch::new("good", 10.0, &[Endpoint::CpuInfo]));
    let bad = Arc::new(ScriptedSwitch::new("bad", 10.0, &[]));
    let pipeline = Pipeline::with_devices(config(), vec![good, bad]).unwrap();
    let sink = MemorySink::new();

    pipeline.start(sink.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(20)).await;
    pipeline.shutdown().await;

    let good_cpu = sink
        .metrics()
        .iter()
        .filter(|m| m.measurement == measurement::CPU && m.device() == "good")
        .count();
    assert!(good_cpu >= 20);
    assert!(
        !sink
            .metrics()
            .iter()
            .any(|m| m.measurement == measurement::CPU && m.device() == "bad")
    );
}

// ── Device health ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unreachable_device_is_marked_unhealthy_and_keeps_polling() {
    let device = Arc::new(ScriptedSwitch::new("sw1", 10.0, &[]));
    let mut config = config();
    config.unhealthy_threshold = 3;
    let pipeline = Pipeline::with_devices(config, vec![device]).unwrap();
    let mut events = pipeline.events();
    let health = pipeline.device_health("sw1").unwrap();
    let sink = MemorySink::new();

    pipeline.start(sink.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(*health.borrow(), DeviceHealth::Unhealthy);
    pipeline.shutdown().await;

    let events = drain(&mut events);
    let transitions = events
        .iter()
        .filter(|e| {
            matches!(
                e.as_ref(),
                PipelineEvent::DeviceHealthChanged {
                    health: DeviceHealth::Unhealthy,
                    ..
                }
            )
        })
        .count();
    assert_eq!(transitions, 1);

    // Still polling after escalation: CPU failed on every one-second tick
    // the backoff allowed, not just the first few.
    let cpu_failures = events
        .iter()
        .filter(|e| {
            matches!(
                e.as_ref(),
                PipelineEvent::CollectorFailed { collector, .. } if collector == "cpu"
            )
        })
        .count();
    assert!(cpu_failures >= 3);

    let health_metric = sink
        .metrics()
        .into_iter()
        .find(|m| m.measurement == measurement::DEVICE_HEALTH)
        .unwrap();
    assert_eq!(health_metric.status, Status::Critical);
    assert!(pipeline.device_health("missing").is_none());
}

// ── Status transitions ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn critical_cpu_publishes_a_status_change_once() {
    let device = Arc::new(ScriptedSwitch::new("sw1", 95.0, &[Endpoint::CpuInfo]));
    let pipeline = Pipeline::with_devices(config(), vec![device]).unwrap();
    let mut events = pipeline.events();

    pipeline.start(MemorySink::new()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    pipeline.shutdown().await;

    let changes: Vec<(Status, Status)> = drain(&mut events)
        .iter()
        .filter_map(|e| match e.as_ref() {
            PipelineEvent::StatusChanged { series, from, to, .. }
                if series.starts_with(measurement::CPU) =>
            {
                Some((*from, *to))
            }
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![(Status::Unknown, Status::Critical)]);
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn start_twice_is_rejected() {
    let device = Arc::new(ScriptedSwitch::new("sw1", 10.0, &[Endpoint::CpuInfo]));
    let pipeline = Pipeline::with_devices(config(), vec![device]).unwrap();
    pipeline.start(MemorySink::new()).await.unwrap();
    assert!(pipeline.start(MemorySink::new()).await.is_err());
    pipeline.shutdown().await;
}

#[test]
fn empty_device_list_is_rejected() {
    let result = Pipeline::<ScriptedSwitch>::with_devices(config(), Vec::new());
    assert!(matches!(result, Err(swmon_core::CoreError::NoDevices)));
}

// ── Ordering ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn each_collector_delivers_in_poll_order() {
    let device = Arc::new(SequencedSwitch::default());
    let mut config = config();
    config.intervals.logs = Duration::from_secs(1);
    let pipeline = Pipeline::with_devices(config, vec![Arc::clone(&device)]).unwrap();
    let sink = MemorySink::new();

    pipeline.start(sink.clone()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    pipeline.shutdown().await;

    let metrics = sink.metrics();

    let cpu: Vec<f64> = metrics
        .iter()
        .filter(|m| m.measurement == measurement::CPU)
        .map(|m| m.fields["cpu_percent"].as_f64().unwrap())
        .collect();
    assert!(cpu.len() >= 30);
    let expected: Vec<f64> = (0..cpu.len())
        .map(|n| f64::from(u32::try_from(n).unwrap()))
        .collect();
    assert_eq!(cpu, expected);

    let logs: Vec<String> = metrics
        .iter()
        .filter(|m| m.measurement == measurement::SWITCH_LOGS)
        .map(|m| m.fields["message"].as_str().unwrap().to_owned())
        .collect();
    assert!(logs.len() >= 90);
    assert_eq!(logs.len() % 3, 0);
    let expected: Vec<String> = (0..logs.len() / 3)
        .flat_map(|n| (0..3).map(move |i| format!("poll {n} line {i}")))
        .collect();
    assert_eq!(logs, expected);
}
