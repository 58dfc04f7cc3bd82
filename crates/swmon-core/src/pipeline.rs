// ── Pipeline orchestrator ──
//
// Owns every device session and spawns one polling task per collector per
// device. Tasks share a single hand-off channel into the batch writer and
// never touch each other's state; a failing collector only slows itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use swmon_api::DeviceSession;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collector::{
    Collector, CpuCollector, DeviceApi, LogCollector, MacTableCollector, Outcome,
    PortStatisticsCollector, PortStatusCollector, SystemInfoCollector,
};
use crate::config::PipelineConfig;
use crate::epoch::DeviceEpoch;
use crate::error::{CoreError, ErrorKind};
use crate::health::{HealthTracker, HealthTransition};
use crate::model::{DeviceHealth, PipelineEvent, ProcessedMetric, Status, measurement};
use crate::processor::{
    CpuProcessor, LogProcessor, MacProcessor, PortStatisticsProcessor, PortStatusProcessor,
    ProcessContext, Processor, SystemProcessor,
};
use crate::writer::{BatchWriter, TimeSeriesSink, WriterStats, WriterStatsSnapshot};

const EVENT_CHANNEL_SIZE: usize = 256;

// ── Per-device runtime ──────────────────────────────────────────────

struct DeviceRuntime<D> {
    api: Arc<D>,
    epoch: Arc<DeviceEpoch>,
    health: Arc<HealthTracker>,
}

impl<D> Clone for DeviceRuntime<D> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            epoch: Arc::clone(&self.epoch),
            health: Arc::clone(&self.health),
        }
    }
}

// ── Pipeline ────────────────────────────────────────────────────────

/// Cheaply cloneable handle to a running (or not yet started) pipeline.
pub struct Pipeline<D: DeviceApi = DeviceSession> {
    inner: Arc<PipelineInner<D>>,
}

impl<D: DeviceApi> Clone for Pipeline<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PipelineInner<D> {
    config: PipelineConfig,
    devices: Vec<DeviceRuntime<D>>,
    event_tx: broadcast::Sender<Arc<PipelineEvent>>,
    stats: Arc<WriterStats>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    writer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline<DeviceSession> {
    /// Validate `config` and build an unauthenticated session per device.
    /// Nothing touches the network until [`start`](Self::start).
    pub fn new(config: PipelineConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let sessions = config
            .devices
            .iter()
            .map(|d| d.build_session().map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_devices(config, sessions)
    }
}

impl<D: DeviceApi> Pipeline<D> {
    /// Build a pipeline over already-constructed devices. `config.devices`
    /// is ignored; tuning is still validated.
    pub fn with_devices(config: PipelineConfig, devices: Vec<Arc<D>>) -> Result<Self, CoreError> {
        if devices.is_empty() {
            return Err(CoreError::NoDevices);
        }
        config.validate_tuning()?;

        let devices = devices
            .into_iter()
            .map(|api| DeviceRuntime {
                epoch: Arc::new(DeviceEpoch::new(api.name())),
                health: Arc::new(HealthTracker::new(api.name(), config.unhealthy_threshold)),
                api,
            })
            .collect();
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);

        Ok(Self {
            inner: Arc::new(PipelineInner {
                config,
                devices,
                event_tx,
                stats: Arc::new(WriterStats::default()),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
                writer_handle: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    pub fn device_names(&self) -> Vec<String> {
        self.inner
            .devices
            .iter()
            .map(|d| d.api.name().to_owned())
            .collect()
    }

    /// Spawn the writer and every polling task.
    pub async fn start<S: TimeSeriesSink>(&self, sink: S) -> Result<(), CoreError> {
        let mut handles = self.inner.task_handles.lock().await;
        let mut writer_slot = self.inner.writer_handle.lock().await;
        if writer_slot.is_some() || self.inner.cancel.is_cancelled() {
            return Err(CoreError::config("pipeline can only be started once"));
        }

        let config = &self.inner.config;
        let (tx, rx) = mpsc::channel(config.writer.channel_capacity);

        let writer = BatchWriter::new(
            sink,
            config.writer,
            Arc::clone(&self.inner.stats),
            self.inner.event_tx.clone(),
        );
        *writer_slot = Some(tokio::spawn(writer.run(rx, self.inner.cancel.clone())));

        let intervals = config.intervals;
        let thresholds = &config.thresholds;
        for device in &self.inner.devices {
            let spawner = TaskSpawner {
                device,
                tx: &tx,
                events: &self.inner.event_tx,
                cancel: &self.inner.cancel,
                max_backoff_ticks: config.max_backoff_ticks,
            };
            handles.push(spawner.spawn(
                CpuCollector,
                CpuProcessor::new(thresholds.cpu.clone()),
                intervals.cpu,
            ));
            handles.push(spawner.spawn(
                PortStatisticsCollector,
                PortStatisticsProcessor::new(thresholds.port_utilization.clone()),
                intervals.ports,
            ));
            handles.push(spawner.spawn(PortStatusCollector, PortStatusProcessor, intervals.ports));
            handles.push(spawner.spawn(MacTableCollector, MacProcessor, intervals.mac));
            handles.push(spawner.spawn(
                SystemInfoCollector,
                SystemProcessor::new(thresholds.temperature.clone()),
                intervals.system,
            ));
            handles.push(spawner.spawn(LogCollector, LogProcessor, intervals.logs));
        }

        info!(
            devices = self.inner.devices.len(),
            tasks = handles.len(),
            "pipeline started"
        );
        Ok(())
    }

    /// Stop polling, drain the writer, and log out of every device.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "polling task ended abnormally");
            }
        }

        // Every sender lived in a polling task, so the writer sees the
        // channel close once they are joined.
        if let Some(writer) = self.inner.writer_handle.lock().await.take() {
            if let Err(e) = writer.await {
                warn!(error = %e, "writer task ended abnormally");
            }
        }

        futures_util::future::join_all(self.inner.devices.iter().map(|d| d.api.close())).await;
        info!("pipeline stopped");
    }

    /// Subscribe to pipeline events. Slow receivers miss events.
    pub fn events(&self) -> broadcast::Receiver<Arc<PipelineEvent>> {
        self.inner.event_tx.subscribe()
    }

    pub fn device_health(&self, device: &str) -> Option<watch::Receiver<DeviceHealth>> {
        self.inner
            .devices
            .iter()
            .find(|d| d.api.name() == device)
            .map(|d| d.health.subscribe())
    }

    pub fn writer_stats(&self) -> WriterStatsSnapshot {
        self.inner.stats.snapshot()
    }
}

// ── Polling tasks ───────────────────────────────────────────────────

struct TaskSpawner<'a, D> {
    device: &'a DeviceRuntime<D>,
    tx: &'a mpsc::Sender<ProcessedMetric>,
    events: &'a broadcast::Sender<Arc<PipelineEvent>>,
    cancel: &'a CancellationToken,
    max_backoff_ticks: u32,
}

impl<D: DeviceApi> TaskSpawner<'_, D> {
    fn spawn<C, P>(&self, collector: C, processor: P, period: Duration) -> JoinHandle<()>
    where
        C: Collector,
        P: Processor<Raw = C::Raw>,
    {
        let task = PollTask {
            device: self.device.clone(),
            collector,
            processor,
            period,
            tx: self.tx.clone(),
            events: self.events.clone(),
            max_backoff_ticks: self.max_backoff_ticks,
        };
        tokio::spawn(task.run(self.cancel.clone()))
    }
}

/// Ticks skipped after `failures` consecutive failures: 0, 1, 3, 7, ...
/// capped at `max`.
pub fn backoff_ticks(failures: u32, max: u32) -> u32 {
    if failures == 0 {
        return 0;
    }
    1u32.checked_shl(failures - 1)
        .unwrap_or(u32::MAX)
        .saturating_sub(1)
        .min(max)
}

/// Last status per series, for transition detection.
#[derive(Debug, Default)]
struct StatusMemory {
    last: HashMap<String, Status>,
}

impl StatusMemory {
    /// Returns `(from, to)` when `metric` changes its series' status. A
    /// series seen for the first time only reports when it is not normal.
    fn observe(&mut self, metric: &ProcessedMetric) -> Option<(String, Status, Status)> {
        if matches!(
            metric.measurement.as_str(),
            measurement::SWITCH_LOGS | measurement::MAC_EVENTS
        ) {
            return None;
        }
        let key = metric.series_key();
        let previous = self.last.insert(key.clone(), metric.status);
        match previous {
            None if matches!(metric.status, Status::Normal | Status::Unknown) => None,
            None => Some((key, Status::Unknown, metric.status)),
            Some(prev) if prev != metric.status => Some((key, prev, metric.status)),
            Some(_) => None,
        }
    }
}

struct PollTask<D, C, P> {
    device: DeviceRuntime<D>,
    collector: C,
    processor: P,
    period: Duration,
    tx: mpsc::Sender<ProcessedMetric>,
    events: broadcast::Sender<Arc<PipelineEvent>>,
    max_backoff_ticks: u32,
}

impl<D, C, P> PollTask<D, C, P>
where
    D: DeviceApi,
    C: Collector,
    P: Processor<Raw = C::Raw>,
{
    async fn run(self, cancel: CancellationToken) {
        let device = self.device.api.name().to_owned();
        let collector = self.collector.name();
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut state = P::State::default();
        let mut statuses = StatusMemory::default();
        let mut failures: u32 = 0;
        let mut skip: u32 = 0;

        debug!(device = %device, collector, period = ?self.period, "polling task started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            if skip > 0 {
                skip -= 1;
                continue;
            }

            let result = self.collector.collect(self.device.api.as_ref()).await;
            let at = result.attempted_at;
            let processed = match result.outcome {
                Outcome::Ok(raw) => {
                    if let Some(t) = self.device.health.record_success() {
                        if !self.publish_health(&device, t, at).await {
                            break;
                        }
                    }
                    let ctx = ProcessContext {
                        device: &device,
                        at,
                        epoch: &self.device.epoch,
                    };
                    self.processor
                        .process(raw, &mut state, &ctx)
                        .map_err(|e| (e.kind(), e.to_string()))
                }
                Outcome::Failed { kind, message } => {
                    if let Some(t) = self.device.health.record_failure(kind) {
                        if !self.publish_health(&device, t, at).await {
                            break;
                        }
                    }
                    Err((kind, message))
                }
            };

            match processed {
                Ok(metrics) => {
                    failures = 0;
                    if !self.forward(&device, metrics, &mut statuses).await {
                        break;
                    }
                }
                Err((kind, message)) => {
                    failures = failures.saturating_add(1);
                    skip = backoff_ticks(failures, self.max_backoff_ticks);
                    self.report_failure(&device, collector, kind, message, failures, skip, at);
                }
            }
        }
        debug!(device = %device, collector, "polling task stopped");
    }

    /// Send metrics in order, publishing status transitions. Returns
    /// `false` once the writer is gone.
    async fn forward(
        &self,
        device: &str,
        metrics: Vec<ProcessedMetric>,
        statuses: &mut StatusMemory,
    ) -> bool {
        for metric in metrics {
            if let Some((series, from, to)) = statuses.observe(&metric) {
                debug!(device, series = %series, %from, %to, "status changed");
                self.emit(PipelineEvent::StatusChanged {
                    device: device.to_owned(),
                    series,
                    from,
                    to,
                    at: metric.timestamp,
                });
            }
            if self.tx.send(metric).await.is_err() {
                return false;
            }
        }
        true
    }

    async fn publish_health(&self, device: &str, t: HealthTransition, at: DateTime<Utc>) -> bool {
        self.emit(t.to_event(device, at));
        self.tx.send(t.to_metric(device, at)).await.is_ok()
    }

    #[allow(clippy::too_many_arguments)]
    fn report_failure(
        &self,
        device: &str,
        collector: &str,
        kind: ErrorKind,
        message: String,
        consecutive_failures: u32,
        skip: u32,
        at: DateTime<Utc>,
    ) {
        warn!(
            device,
            collector,
            %kind,
            error = %message,
            consecutive_failures,
            skip_ticks = skip,
            "collection failed"
        );
        self.emit(PipelineEvent::CollectorFailed {
            device: device.to_owned(),
            collector: collector.to_owned(),
            kind,
            message,
            consecutive_failures,
            at,
        });
    }

    fn emit(&self, event: PipelineEvent) {
        let _ = self.events.send(Arc::new(event));
    }
}
