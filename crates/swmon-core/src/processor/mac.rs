// MAC table processor: occupancy counts plus arrival/departure diffing.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use swmon_api::switch::models::MacTableRow;
use tracing::debug;

use super::{ProcessContext, Processor};
use crate::error::CoreError;
use crate::model::{MacAddress, MacChange, MacEntry, MacEntryType, MacKey, ProcessedMetric, measurement};

/// Previous poll's key set. `None` until the first successful poll.
#[derive(Debug, Default)]
pub struct MacState {
    previous: Option<BTreeSet<MacKey>>,
}

/// Keys present now but not before, and before but not now. Both sorted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MacDiff {
    pub arrived: Vec<MacKey>,
    pub departed: Vec<MacKey>,
}

pub fn diff_mac_tables(previous: &BTreeSet<MacKey>, current: &BTreeSet<MacKey>) -> MacDiff {
    MacDiff {
        arrived: current.difference(previous).cloned().collect(),
        departed: previous.difference(current).cloned().collect(),
    }
}

fn to_entry(row: MacTableRow) -> MacEntry {
    MacEntry {
        mac: MacAddress::new(&row.mac),
        vlan: row.vlan_id,
        port: row.port,
        entry_type: if row.entry_type == 2 {
            MacEntryType::Static
        } else {
            MacEntryType::Dynamic
        },
        age_secs: row.aging,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MacProcessor;

impl Processor for MacProcessor {
    type Raw = Vec<MacTableRow>;
    type State = MacState;

    fn process(
        &self,
        raw: Vec<MacTableRow>,
        state: &mut MacState,
        ctx: &ProcessContext<'_>,
    ) -> Result<Vec<ProcessedMetric>, CoreError> {
        let entries: Vec<MacEntry> = raw.into_iter().map(to_entry).collect();
        let current: BTreeSet<MacKey> = entries.iter().map(MacEntry::key).collect();

        let mut per_port: BTreeMap<&str, i64> = BTreeMap::new();
        let mut static_count = 0usize;
        for entry in &entries {
            *per_port.entry(entry.port.as_str()).or_default() += 1;
            if entry.entry_type == MacEntryType::Static {
                static_count += 1;
            }
        }

        let mut metrics = Vec::with_capacity(per_port.len() + 1);
        metrics.push(
            ProcessedMetric::new(measurement::MAC_ADDRESSES, ctx.device, ctx.at)
                .field("total", current.len())
                .field("static", static_count)
                .field("dynamic", entries.len().saturating_sub(static_count)),
        );
        // Ports that emptied since the last poll report zero.
        if let Some(previous) = &state.previous {
            for key in previous {
                per_port.entry(key.port.as_str()).or_default();
            }
        }
        for (port, count) in &per_port {
            metrics.push(
                ProcessedMetric::new(measurement::MAC_ADDRESSES, ctx.device, ctx.at)
                    .tag("port", *port)
                    .field("count", *count),
            );
        }

        if let Some(previous) = &state.previous {
            let diff = diff_mac_tables(previous, &current);
            debug!(
                device = ctx.device,
                arrived = diff.arrived.len(),
                departed = diff.departed.len(),
                "MAC table diff"
            );
            let changes = diff
                .arrived
                .iter()
                .map(|k| (MacChange::Arrived, k))
                .chain(diff.departed.iter().map(|k| (MacChange::Departed, k)));
            // The MAC is a field, not a tag: events on one port and VLAN only
            // stay distinct points through their timestamps.
            for (i, (change, key)) in changes.enumerate() {
                let offset = Duration::nanoseconds(i64::try_from(i).unwrap_or(i64::MAX));
                metrics.push(
                    ProcessedMetric::new(measurement::MAC_EVENTS, ctx.device, ctx.at + offset)
                        .tag("change", change.to_string())
                        .tag("port", key.port.as_str())
                        .tag("vlan", key.vlan.to_string())
                        .field("mac", key.mac.as_str()),
                );
            }
        }

        state.previous = Some(current);
        Ok(metrics)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::epoch::DeviceEpoch;
    use crate::model::FieldValue;

    fn key(mac: &str, vlan: u16, port: &str) -> MacKey {
        MacKey {
            mac: MacAddress::new(mac),
            vlan,
            port: port.into(),
        }
    }

    fn rows(v: serde_json::Value) -> Vec<MacTableRow> {
        serde_json::from_value(v).unwrap()
    }

    fn events(metrics: &[ProcessedMetric]) -> Vec<(String, String)> {
        metrics
            .iter()
            .filter(|m| m.measurement == measurement::MAC_EVENTS)
            .map(|m| {
                (
                    m.tags["change"].clone(),
                    m.fields["mac"].as_str().unwrap().to_owned(),
                )
            })
            .collect()
    }

    #[test]
    fn diff_example() {
        let a = key("aa:aa:aa:aa:aa:01", 1, "1/0/1");
        let b = key("aa:aa:aa:aa:aa:02", 1, "1/0/2");
        let c = key("aa:aa:aa:aa:aa:03", 1, "1/0/3");
        let previous = BTreeSet::from([a.clone(), b.clone()]);
        let current = BTreeSet::from([b, c.clone()]);

        let diff = diff_mac_tables(&previous, &current);
        assert_eq!(diff.arrived, vec![c]);
        assert_eq!(diff.departed, vec![a]);
    }

    #[test]
    fn moving_ports_is_a_departure_and_an_arrival() {
        let previous = BTreeSet::from([key("aa:aa:aa:aa:aa:01", 1, "1/0/1")]);
        let current = BTreeSet::from([key("aa:aa:aa:aa:aa:01", 1, "1/0/7")]);
        let diff = diff_mac_tables(&previous, &current);
        assert_eq!(diff.arrived.len(), 1);
        assert_eq!(diff.departed.len(), 1);
    }

    #[test]
    fn first_poll_counts_but_emits_no_events() {
        let epoch = DeviceEpoch::new("sw1");
        let ctx = ProcessContext {
            device: "sw1",
            at: Utc::now(),
            epoch: &epoch,
        };
        let mut state = MacState::default();

        let first = MacProcessor
            .process(
                rows(json!([
                    { "mac": "00-1A-3F-87-0F-7A", "vlanId": 1, "port": "1/0/13", "type": 1 },
                    { "mac": "00-1A-3F-87-0F-7B", "vlanId": 1, "port": "1/0/13", "type": 2 },
                    { "mac": "00-1A-3F-87-0F-7C", "vlanId": 10, "port": "1/0/5", "type": 1 },
                ])),
                &mut state,
                &ctx,
            )
            .unwrap();
        assert!(events(&first).is_empty());

        let summary = &first[0];
        assert_eq!(summary.fields["total"].as_i64(), Some(3));
        assert_eq!(summary.fields["static"].as_i64(), Some(1));
        let port13 = first
            .iter()
            .find(|m| m.tags.get("port").map(String::as_str) == Some("1/0/13"))
            .unwrap();
        assert_eq!(port13.fields["count"].as_i64(), Some(2));

        let second = MacProcessor
            .process(
                rows(json!([
                    { "mac": "00-1A-3F-87-0F-7A", "vlanId": 1, "port": "1/0/13", "type": 1 },
                    { "mac": "00-1A-3F-87-0F-7D", "vlanId": 1, "port": "1/0/2", "type": 1 },
                ])),
                &mut state,
                &ctx,
            )
            .unwrap();
        assert_eq!(
            events(&second),
            vec![
                ("arrived".to_owned(), "00:1a:3f:87:0f:7d".to_owned()),
                ("departed".to_owned(), "00:1a:3f:87:0f:7b".to_owned()),
                ("departed".to_owned(), "00:1a:3f:87:0f:7c".to_owned()),
            ]
        );
    }

    #[test]
    fn simultaneous_arrivals_on_one_port_are_distinct_points() {
        let epoch = DeviceEpoch::new("sw1");
        let ctx = ProcessContext {
            device: "sw1",
            at: Utc::now(),
            epoch: &epoch,
        };
        let mut state = MacState::default();
        MacProcessor.process(Vec::new(), &mut state, &ctx).unwrap();

        let metrics = MacProcessor
            .process(
                rows(json!([
                    { "mac": "00:00:00:00:00:01", "vlanId": 1, "port": "1/0/3", "type": 1 },
                    { "mac": "00:00:00:00:00:02", "vlanId": 1, "port": "1/0/3", "type": 1 },
                ])),
                &mut state,
                &ctx,
            )
            .unwrap();

        let arrivals: Vec<_> = metrics
            .iter()
            .filter(|m| m.measurement == measurement::MAC_EVENTS)
            .collect();
        assert_eq!(arrivals.len(), 2);
        assert_eq!(arrivals[0].tags, arrivals[1].tags);
        let identities: BTreeSet<_> = arrivals
            .iter()
            .map(|m| (m.series_key(), m.timestamp))
            .collect();
        assert_eq!(identities.len(), 2);
    }

    #[test]
    fn emptied_port_reports_zero() {
        let epoch = DeviceEpoch::new("sw1");
        let ctx = ProcessContext {
            device: "sw1",
            at: Utc::now(),
            epoch: &epoch,
        };
        let mut state = MacState::default();
        MacProcessor
            .process(
                rows(json!([
                    { "mac": "00:00:00:00:00:05", "vlanId": 1, "port": "1/0/5", "type": 1 },
                ])),
                &mut state,
                &ctx,
            )
            .unwrap();

        let second = MacProcessor.process(Vec::new(), &mut state, &ctx).unwrap();
        let counts: Vec<_> = second
            .iter()
            .filter(|m| m.tags.get("port").map(String::as_str) == Some("1/0/5"))
            .filter_map(|m| m.fields.get("count").and_then(FieldValue::as_i64))
            .collect();
        assert_eq!(counts, vec![0]);
        assert_eq!(second[0].fields["total"].as_i64(), Some(0));

        // Reported once; the port is forgotten after that.
        let third = MacProcessor.process(Vec::new(), &mut state, &ctx).unwrap();
        assert_eq!(third.len(), 1);
    }
}
