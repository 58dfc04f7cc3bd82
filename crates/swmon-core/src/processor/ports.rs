// Port statistics and port status processors.
//
// Rates are derived from consecutive counter samples of the same port in
// the same device epoch. Anything that makes the difference meaningless
// (no prior sample, counter went backwards, no elapsed time, reboot in
// between) yields an unknown rate rather than a guess.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use swmon_api::switch::models::{PortStatisticsRow, PortStatusRow};

use super::{ProcessContext, Processor};
use crate::error::CoreError;
use crate::model::port::{parse_admin_state, parse_duplex, parse_link_state, parse_speed_mbps};
use crate::model::{AdminState, LinkState, PortState, ProcessedMetric, Status, measurement};
use crate::thresholds::ThresholdTable;

/// Counter snapshot kept between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSample {
    pub at: DateTime<Utc>,
    pub epoch: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

/// `(c2 - c1) / (t2 - t1)` per second, or `None` when the counters or the
/// clock did not move forward.
pub fn counter_rate(c1: u64, t1: DateTime<Utc>, c2: u64, t2: DateTime<Utc>) -> Option<f64> {
    if c2 < c1 {
        return None;
    }
    let elapsed_ms = (t2 - t1).num_milliseconds();
    if elapsed_ms <= 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    let rate = (c2 - c1) as f64 * 1000.0 / elapsed_ms as f64;
    Some(rate)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rates {
    rx_bytes: f64,
    tx_bytes: f64,
    rx_packets: f64,
    tx_packets: f64,
}

fn rates_between(prev: &PortSample, cur: &PortSample) -> Option<Rates> {
    if prev.epoch != cur.epoch {
        return None;
    }
    Some(Rates {
        rx_bytes: counter_rate(prev.rx_bytes, prev.at, cur.rx_bytes, cur.at)?,
        tx_bytes: counter_rate(prev.tx_bytes, prev.at, cur.tx_bytes, cur.at)?,
        rx_packets: counter_rate(prev.rx_packets, prev.at, cur.rx_packets, cur.at)?,
        tx_packets: counter_rate(prev.tx_packets, prev.at, cur.tx_packets, cur.at)?,
    })
}

// ── Port statistics ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PortStatisticsProcessor {
    table: ThresholdTable,
}

impl PortStatisticsProcessor {
    pub fn new(table: ThresholdTable) -> Self {
        Self { table }
    }

    fn classify(&self, port: &PortState, rates: Option<&Rates>) -> (Status, Option<f64>) {
        if port.admin == AdminState::Disabled {
            return (Status::Normal, None);
        }
        if port.link == LinkState::Down {
            return (Status::Warning, None);
        }
        let Some(rates) = rates else {
            return (Status::Unknown, None);
        };
        let Some(speed) = port.speed_mbps.filter(|s| *s > 0) else {
            return (Status::Normal, None);
        };
        let peak_bps = rates.rx_bytes.max(rates.tx_bytes) * 8.0;
        let utilization = peak_bps / (f64::from(speed) * 1_000_000.0) * 100.0;
        (self.table.classify(utilization), Some(utilization))
    }
}

impl Default for PortStatisticsProcessor {
    fn default() -> Self {
        Self::new(ThresholdTable::default_port_utilization())
    }
}

impl Processor for PortStatisticsProcessor {
    type Raw = Vec<PortStatisticsRow>;
    /// Last sample per port label.
    type State = HashMap<String, PortSample>;

    fn process(
        &self,
        raw: Vec<PortStatisticsRow>,
        state: &mut HashMap<String, PortSample>,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<ProcessedMetric>, CoreError> {
        let epoch = ctx.epoch.current();
        let mut metrics = Vec::with_capacity(raw.len());

        for row in raw {
            let port = PortState {
                admin: parse_admin_state(row.state.as_ref()),
                link: parse_link_state(row.link.as_deref()),
                speed_mbps: parse_speed_mbps(row.link.as_deref()),
                duplex: parse_duplex(row.link.as_deref()),
                rx_bytes: row.octets_rx,
                rx_packets: row.packet_rx,
                tx_bytes: row.octets_tx,
                tx_packets: row.packet_tx,
                index: row.port,
            };
            let sample = PortSample {
                at: ctx.at,
                epoch,
                rx_bytes: port.rx_bytes,
                tx_bytes: port.tx_bytes,
                rx_packets: port.rx_packets,
                tx_packets: port.tx_packets,
            };

            let rates = state
                .insert(port.index.clone(), sample)
                .and_then(|prev| rates_between(&prev, &sample));
            let (status, utilization) = self.classify(&port, rates.as_ref());

            let mut metric = ProcessedMetric::new(measurement::PORT_TRAFFIC, ctx.device, ctx.at)
                .tag("port", port.index.as_str())
                .field("rx_bytes", port.rx_bytes)
                .field("tx_bytes", port.tx_bytes)
                .field("rx_packets", port.rx_packets)
                .field("tx_packets", port.tx_packets)
                .field("link", port.link.to_string())
                .field("enabled", port.is_enabled())
                .field_opt("speed_mbps", port.speed_mbps.map(i64::from))
                .field_opt("utilization_pct", utilization)
                .with_status(status);
            if let Some(r) = rates {
                metric = metric
                    .field("rx_bytes_per_sec", r.rx_bytes)
                    .field("tx_bytes_per_sec", r.tx_bytes)
                    .field("rx_packets_per_sec", r.rx_packets)
                    .field("tx_packets_per_sec", r.tx_packets);
            }
            metrics.push(metric);
        }

        Ok(metrics)
    }
}

// ── Port status ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct PortStatusProcessor;

impl Processor for PortStatusProcessor {
    type Raw = Vec<PortStatusRow>;
    type State = ();

    fn process(
        &self,
        raw: Vec<PortStatusRow>,
        _state: &mut (),
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<ProcessedMetric>, CoreError> {
        Ok(raw
            .into_iter()
            .map(|row| {
                let admin = parse_admin_state(row.state.as_ref());
                let link = parse_link_state(row.link.as_deref());
                let speed = parse_speed_mbps(row.speed.as_deref());
                let duplex = row
                    .duplex
                    .map(|d| d.trim().to_ascii_lowercase())
                    .or_else(|| parse_duplex(row.speed.as_deref()));
                let status = if admin == AdminState::Enabled && link == LinkState::Down {
                    Status::Warning
                } else {
                    Status::Normal
                };
                ProcessedMetric::new(measurement::PORT_STATUS, ctx.device, ctx.at)
                    .tag("port", row.port)
                    .field("link", link.to_string())
                    .field("is_connected", link == LinkState::Up)
                    .field("enabled", admin == AdminState::Enabled)
                    .field_opt("speed_mbps", speed.map(i64::from))
                    .field_opt("duplex", duplex)
                    .with_status(status)
            })
            .collect())
    }
}
