// ── Threshold tables ──
//
// Classification is data: an ordered list of contiguous half-open bands
// `[lower, upper)`, the last one closed at its top. Values outside every
// band (or NaN) classify as `Unknown`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::Status;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub lower: f64,
    pub upper: f64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdTable {
    bands: Vec<Band>,
}

impl ThresholdTable {
    /// Build a table from explicit bands. Bands must be non-empty,
    /// ascending, and contiguous (`bands[i].upper == bands[i + 1].lower`).
    pub fn new(bands: Vec<Band>) -> Result<Self, CoreError> {
        if bands.is_empty() {
            return Err(CoreError::config("threshold table has no bands"));
        }
        for band in &bands {
            if band.lower.is_nan() || band.upper.is_nan() || band.lower >= band.upper {
                return Err(CoreError::config(format!(
                    "threshold band [{}, {}) is empty or inverted",
                    band.lower, band.upper
                )));
            }
        }
        for pair in bands.windows(2) {
            if let [a, b] = pair {
                if a.upper.total_cmp(&b.lower).is_ne() {
                    return Err(CoreError::config(format!(
                        "threshold bands [{}, {}) and [{}, {}) are not contiguous",
                        a.lower, a.upper, b.lower, b.upper
                    )));
                }
            }
        }
        Ok(Self { bands })
    }

    /// `[min, warning)` normal, `[warning, critical)` warning,
    /// `[critical, max]` critical.
    pub fn ascending(min: f64, warning: f64, critical: f64, max: f64) -> Result<Self, CoreError> {
        Self::new(vec![
            Band {
                lower: min,
                upper: warning,
                status: Status::Normal,
            },
            Band {
                lower: warning,
                upper: critical,
                status: Status::Warning,
            },
            Band {
                lower: critical,
                upper: max,
                status: Status::Critical,
            },
        ])
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn classify(&self, value: f64) -> Status {
        let last = self.bands.len().saturating_sub(1);
        for (i, band) in self.bands.iter().enumerate() {
            let below_top = value < band.upper || (i == last && value <= band.upper);
            if value >= band.lower && below_top {
                return band.status;
            }
        }
        Status::Unknown
    }

    /// CPU utilization percent: `[0,70)` normal, `[70,90)` warning, `[90,100]` critical.
    pub fn default_cpu() -> Self {
        Self::percent(70.0, 90.0)
    }

    /// Port utilization percent. The top is open: short-interval samples
    /// can read slightly above line rate.
    pub fn default_port_utilization() -> Self {
        Self::open_top(0.0, 70.0, 90.0)
    }

    /// Temperature in °C: `<80` normal, `[80,90)` warning, `>=90` critical.
    pub fn default_temperature() -> Self {
        Self::open_top(f64::NEG_INFINITY, 80.0, 90.0)
    }

    fn percent(warning: f64, critical: f64) -> Self {
        Self::from_known_good(vec![(0.0, warning), (warning, critical), (critical, 100.0)])
    }

    fn open_top(min: f64, warning: f64, critical: f64) -> Self {
        Self::from_known_good(vec![(min, warning), (warning, critical), (critical, f64::INFINITY)])
    }

    fn from_known_good(bounds: Vec<(f64, f64)>) -> Self {
        let statuses = [Status::Normal, Status::Warning, Status::Critical];
        Self {
            bands: bounds
                .into_iter()
                .zip(statuses)
                .map(|((lower, upper), status)| Band {
                    lower,
                    upper,
                    status,
                })
                .collect(),
        }
    }
}

/// The three tables the processors classify against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub cpu: ThresholdTable,
    pub port_utilization: ThresholdTable,
    pub temperature: ThresholdTable,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu: ThresholdTable::default_cpu(),
            port_utilization: ThresholdTable::default_port_utilization(),
            temperature: ThresholdTable::default_temperature(),
        }
    }
}

impl Thresholds {
    /// Build all three tables from warning/critical limits, validating each.
    pub fn from_limits(
        cpu: (f64, f64),
        port: (f64, f64),
        temperature: (f64, f64),
    ) -> Result<Self, CoreError> {
        Ok(Self {
            cpu: ThresholdTable::ascending(0.0, cpu.0, cpu.1, 100.0)?,
            port_utilization: ThresholdTable::ascending(0.0, port.0, port.1, f64::INFINITY)?,
            temperature: ThresholdTable::ascending(
                f64::NEG_INFINITY,
                temperature.0,
                temperature.1,
                f64::INFINITY,
            )?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cpu_boundaries() {
        let table = ThresholdTable::default_cpu();
        assert_eq!(table.classify(0.0), Status::Normal);
        assert_eq!(table.classify(69.99), Status::Normal);
        assert_eq!(table.classify(70.0), Status::Warning);
        assert_eq!(table.classify(89.99), Status::Warning);
        assert_eq!(table.classify(90.0), Status::Critical);
        assert_eq!(table.classify(100.0), Status::Critical);
    }

    #[test]
    fn cpu_out_of_range_is_unknown() {
        let table = ThresholdTable::default_cpu();
        assert_eq!(table.classify(-0.1), Status::Unknown);
        assert_eq!(table.classify(100.1), Status::Unknown);
        assert_eq!(table.classify(f64::NAN), Status::Unknown);
    }

    #[test]
    fn cpu_classification_is_monotonic_and_total() {
        let table = ThresholdTable::default_cpu();
        let mut previous = 0u8;
        let mut value = 0.0_f64;
        while value <= 100.0 {
            let status = table.classify(value);
            assert_ne!(status, Status::Unknown, "gap at {value}");
            assert!(status.rank() >= previous, "non-monotonic at {value}");
            previous = status.rank();
            value += 0.05;
        }
    }

    #[test]
    fn temperature_boundaries() {
        let table = ThresholdTable::default_temperature();
        assert_eq!(table.classify(-10.0), Status::Normal);
        assert_eq!(table.classify(79.9), Status::Normal);
        assert_eq!(table.classify(80.0), Status::Warning);
        assert_eq!(table.classify(90.0), Status::Critical);
        assert_eq!(table.classify(150.0), Status::Critical);
    }

    #[test]
    fn inverted_limits_are_rejected() {
        assert!(ThresholdTable::ascending(0.0, 90.0, 70.0, 100.0).is_err());
        assert!(Thresholds::from_limits((70.0, 90.0), (70.0, 90.0), (95.0, 90.0)).is_err());
    }

    #[test]
    fn gapped_bands_are_rejected() {
        let err = ThresholdTable::new(vec![
            Band {
                lower: 0.0,
                upper: 50.0,
                status: Status::Normal,
            },
            Band {
                lower: 60.0,
                upper: 100.0,
                status: Status::Critical,
            },
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn from_limits_matches_defaults() {
        let built = Thresholds::from_limits((70.0, 90.0), (70.0, 90.0), (80.0, 90.0)).unwrap();
        assert_eq!(built, Thresholds::default());
    }
}
