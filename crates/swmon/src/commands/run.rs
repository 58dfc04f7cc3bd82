//! `swmon run`: poll until ctrl-c, then drain and log out.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use swmon_api::{InfluxClient, TlsMode, TransportConfig};
use swmon_config::Config;
use swmon_core::{CoreError, InfluxSink, Pipeline, PipelineEvent, ProcessedMetric, TimeSeriesSink};

use crate::cli::RunArgs;
use crate::error::CliError;

/// Writes each metric to stdout as one JSON object per line.
struct StdoutSink;

impl TimeSeriesSink for StdoutSink {
    async fn write_batch(&self, batch: &[ProcessedMetric]) -> Result<(), CoreError> {
        let mut out = std::io::stdout().lock();
        for metric in batch {
            let line = serde_json::to_string(metric).map_err(|e| CoreError::Write {
                message: e.to_string(),
                transient: false,
            })?;
            writeln!(out, "{line}").map_err(|e| CoreError::Write {
                message: e.to_string(),
                transient: false,
            })?;
        }
        Ok(())
    }
}

pub async fn handle(config: &Config, path: &Path, args: &RunArgs) -> Result<(), CliError> {
    let pipeline_config = config
        .to_pipeline_config()
        .map_err(|e| CliError::config(path.display().to_string(), e))?;
    let pipeline = Pipeline::new(pipeline_config)?;

    if args.dry_run {
        info!("dry run: metrics go to stdout");
        pipeline.start(StdoutSink).await?;
    } else {
        let influx = config
            .influx_config()
            .map_err(|e| CliError::config(path.display().to_string(), e))?;
        let transport = TransportConfig {
            tls: TlsMode::System,
            timeout: config.influx_timeout(),
            cookie_jar: None,
        };
        let client = InfluxClient::new(&influx, &transport)?;
        if let Err(e) = client.health().await {
            // Writes retry on their own; a backend that is down at startup
            // is not fatal.
            warn!(error = %e, url = %influx.url, "InfluxDB health check failed");
        }
        pipeline.start(InfluxSink::new(client)).await?;
    }

    let logger = tokio::spawn(log_events(pipeline.events()));

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    pipeline.shutdown().await;
    logger.abort();

    let stats = pipeline.writer_stats();
    info!(
        written = stats.metrics_written,
        dropped = stats.metrics_dropped,
        batches = stats.batches_written,
        retries = stats.retries,
        "done"
    );
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<Arc<PipelineEvent>>) {
    loop {
        match events.recv().await {
            Ok(event) => log_event(&event),
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "event log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::StatusChanged {
            device,
            series,
            from,
            to,
            ..
        } => info!(device = %device, series = %series, %from, %to, "status changed"),
        PipelineEvent::DeviceHealthChanged {
            device,
            health,
            consecutive_failures,
            ..
        } => info!(device = %device, %health, consecutive_failures, "device health changed"),
        // Already logged where they happen.
        PipelineEvent::CollectorFailed { .. } | PipelineEvent::BatchDropped { .. } => {}
    }
}
