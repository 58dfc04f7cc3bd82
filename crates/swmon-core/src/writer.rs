// ── Time-series writer ──
//
// Single consumer of the collector hand-off channel. Buffers metrics and
// flushes on size or age, retrying transient sink failures with
// exponential backoff. Batches that cannot be written are dropped with an
// error log and a `BatchDropped` event so collection never stalls behind
// a dead backend.

use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use swmon_api::{InfluxClient, Point};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WriterConfig;
use crate::error::CoreError;
use crate::model::{PipelineEvent, ProcessedMetric};

// ── Sink seam ───────────────────────────────────────────────────────

/// Destination for processed metrics.
pub trait TimeSeriesSink: Send + Sync + 'static {
    fn write_batch(&self, batch: &[ProcessedMetric]) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn write(&self, metric: &ProcessedMetric) -> impl Future<Output = Result<(), CoreError>> + Send {
        self.write_batch(std::slice::from_ref(metric))
    }
}

/// InfluxDB v2 sink.
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: InfluxClient,
}

impl InfluxSink {
    pub fn new(client: InfluxClient) -> Self {
        Self { client }
    }
}

impl TimeSeriesSink for InfluxSink {
    async fn write_batch(&self, batch: &[ProcessedMetric]) -> Result<(), CoreError> {
        let points: Vec<Point> = batch.iter().map(ProcessedMetric::to_point).collect();
        let written = self.client.write(&points).await?;
        debug!(lines = written, "batch written to InfluxDB");
        Ok(())
    }
}

/// In-process sink that keeps every batch. Used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    batches: Arc<Mutex<Vec<Vec<ProcessedMetric>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch received, in write order.
    pub fn batches(&self) -> Vec<Vec<ProcessedMetric>> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// All metrics received, flattened.
    pub fn metrics(&self) -> Vec<ProcessedMetric> {
        self.batches().into_iter().flatten().collect()
    }
}

impl TimeSeriesSink for MemorySink {
    async fn write_batch(&self, batch: &[ProcessedMetric]) -> Result<(), CoreError> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.to_vec());
        Ok(())
    }
}

// ── Buffer ──────────────────────────────────────────────────────────

/// Accumulates metrics until `limit` is reached.
#[derive(Debug)]
pub struct BatchBuffer {
    limit: usize,
    items: Vec<ProcessedMetric>,
}

impl BatchBuffer {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            items: Vec::with_capacity(limit),
        }
    }

    /// Add a metric; returns the full batch when this push reaches the limit.
    pub fn push(&mut self, metric: ProcessedMetric) -> Option<Vec<ProcessedMetric>> {
        self.items.push(metric);
        (self.items.len() >= self.limit).then(|| self.take())
    }

    pub fn take(&mut self) -> Vec<ProcessedMetric> {
        mem::replace(&mut self.items, Vec::with_capacity(self.limit))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ── Stats ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct WriterStats {
    metrics_written: AtomicU64,
    metrics_dropped: AtomicU64,
    batches_written: AtomicU64,
    batches_dropped: AtomicU64,
    retries: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WriterStatsSnapshot {
    pub metrics_written: u64,
    pub metrics_dropped: u64,
    pub batches_written: u64,
    pub batches_dropped: u64,
    pub retries: u64,
}

impl WriterStats {
    pub fn snapshot(&self) -> WriterStatsSnapshot {
        WriterStatsSnapshot {
            metrics_written: self.metrics_written.load(Ordering::Relaxed),
            metrics_dropped: self.metrics_dropped.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }

    fn record_written(&self, metrics: usize) {
        self.metrics_written.fetch_add(as_u64(metrics), Ordering::Relaxed);
        self.batches_written.fetch_add(1, Ordering::Relaxed);
    }

    fn record_dropped(&self, metrics: usize) {
        self.metrics_dropped.fetch_add(as_u64(metrics), Ordering::Relaxed);
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

fn as_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

// ── BatchWriter ─────────────────────────────────────────────────────

pub struct BatchWriter<S> {
    sink: S,
    config: WriterConfig,
    stats: Arc<WriterStats>,
    events: broadcast::Sender<Arc<PipelineEvent>>,
}

impl<S: TimeSeriesSink> BatchWriter<S> {
    pub fn new(
        sink: S,
        config: WriterConfig,
        stats: Arc<WriterStats>,
        events: broadcast::Sender<Arc<PipelineEvent>>,
    ) -> Self {
        Self {
            sink,
            config,
            stats,
            events,
        }
    }

    /// Consume `rx` until every sender is dropped, then flush what is left.
    ///
    /// `cancel` only cuts retry backoff short; the channel is always
    /// drained.
    pub async fn run(self, mut rx: mpsc::Receiver<ProcessedMetric>, cancel: CancellationToken) {
        let period = self.config.batch_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut buffer = BatchBuffer::new(self.config.batch_size);

        loop {
            tokio::select! {
                received = rx.recv() => {
                    let Some(metric) = received else { break };
                    if let Some(batch) = buffer.push(metric) {
                        self.flush(batch, &cancel).await;
                    }
                }
                _ = ticker.tick() => {
                    if !buffer.is_empty() {
                        self.flush(buffer.take(), &cancel).await;
                    }
                }
            }
        }

        if !buffer.is_empty() {
            self.flush(buffer.take(), &cancel).await;
        }
        let stats = self.stats.snapshot();
        info!(
            written = stats.metrics_written,
            dropped = stats.metrics_dropped,
            "writer stopped"
        );
    }

    async fn flush(&self, batch: Vec<ProcessedMetric>, cancel: &CancellationToken) {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match self.sink.write_batch(&batch).await {
                Ok(()) => {
                    debug!(metrics = batch.len(), attempt, "batch flushed");
                    self.stats.record_written(batch.len());
                    return;
                }
                Err(e) => e,
            };

            if !err.is_transient() || attempt > self.config.max_retries {
                self.drop_batch(&batch, attempt, &err);
                return;
            }

            let delay = backoff_delay(self.config.retry_base_delay, attempt - 1);
            self.stats.retries.fetch_add(1, Ordering::Relaxed);
            warn!(
                metrics = batch.len(),
                attempt,
                retry_in = ?delay,
                error = %err,
                "write failed, retrying"
            );
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.drop_batch(&batch, attempt, &err);
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn drop_batch(&self, batch: &[ProcessedMetric], attempts: u32, err: &CoreError) {
        error!(metrics = batch.len(), attempts, error = %err, "dropping batch");
        self.stats.record_dropped(batch.len());
        let _ = self.events.send(Arc::new(PipelineEvent::BatchDropped {
            metrics: batch.len(),
            attempts,
            error: err.to_string(),
            at: Utc::now(),
        }));
    }
}

/// `base * 2^retry`, saturating.
pub fn backoff_delay(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry))
}
