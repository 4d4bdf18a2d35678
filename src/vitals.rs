//! Per-slot vitals summaries
//!
//! Standard aggregate/default functions for the slot aggregator:
//! - heart rate and SpO2: min, max and mean per slot
//! - steps: total per slot
//! - distance: straight-line walking distance (km) between time-ordered fixes
//! - falls: number of detected falls per slot

use crate::aggregator::SlotAggregator;
use crate::distance::great_circle_distance_km;
use crate::error::EngineError;
use crate::schema::{Reading, RecordAdapter, TelemetryRecord};
use crate::types::{Coordinate, Metric, SlotSummary};
use chrono::{DateTime, Utc};

/// Summarizer for one metric of one device
pub struct VitalsSummarizer;

impl VitalsSummarizer {
    /// Build the dense per-slot series of `metric` for `device_address`
    pub fn summarize(
        aggregator: &SlotAggregator<'_>,
        records: &[TelemetryRecord],
        device_address: &str,
        metric: Metric,
    ) -> Result<Vec<SlotSummary>, EngineError> {
        let selected = RecordAdapter::select(records, device_address, metric);

        aggregator.aggregate(
            &selected,
            |record| record.timestamp,
            |group, slot_start| summarize_group(metric, group, slot_start),
            SlotSummary::empty,
        )
    }
}

/// Summarize the records that fell into one slot
fn summarize_group(
    metric: Metric,
    group: &[&&TelemetryRecord],
    slot_start: DateTime<Utc>,
) -> SlotSummary {
    let mut summary = SlotSummary::empty(slot_start);
    summary.count = group.len();

    match metric {
        Metric::HeartRate | Metric::Spo2 => {
            let values: Vec<f64> = group.iter().filter_map(|r| measurement(&r.reading)).collect();
            if !values.is_empty() {
                summary.min = values.iter().copied().reduce(f64::min);
                summary.max = values.iter().copied().reduce(f64::max);
                summary.average = Some(values.iter().sum::<f64>() / values.len() as f64);
            }
        }
        Metric::Steps => {
            let steps: u64 = group
                .iter()
                .map(|r| match r.reading {
                    Reading::Steps { count } => u64::from(count),
                    _ => 0,
                })
                .sum();
            summary.total = Some(steps as f64);
        }
        Metric::Distance => {
            let mut fixes: Vec<(DateTime<Utc>, Coordinate)> = group
                .iter()
                .filter_map(|r| r.coordinate().map(|c| (r.timestamp, c)))
                .collect();
            fixes.sort_by_key(|(timestamp, _)| *timestamp);
            let path: Vec<Coordinate> = fixes.into_iter().map(|(_, c)| c).collect();
            summary.total = Some(walking_distance_km(&path));
        }
        Metric::Falls => {
            summary.total = Some(group.len() as f64);
        }
    }

    summary
}

fn measurement(reading: &Reading) -> Option<f64> {
    match reading {
        Reading::HeartRate { bpm } => Some(*bpm),
        Reading::Spo2 { percentage } => Some(*percentage),
        _ => None,
    }
}

/// Straight-line walking distance along a path of fixes, in kilometers
pub fn walking_distance_km(path: &[Coordinate]) -> f64 {
    path.windows(2)
        .map(|hop| great_circle_distance_km(&hop[0], &hop[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::period::Period;
    use crate::timezone::FixedOffsetZones;
    use chrono::{NaiveDate, NaiveDateTime, TimeZone};

    const DEVICE: &str = "AA:BB:CC:00:11:22";

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 17, hour, minute, 0).unwrap()
    }

    fn reference() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 17)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_heart_rate_summary() {
        let zones = FixedOffsetZones::new();
        let aggregator = SlotAggregator::new(&zones, Period::Hour, reference(), "UTC");
        let records = vec![
            TelemetryRecord::heart_rate(DEVICE, at(10, 1), 60.0),
            TelemetryRecord::heart_rate(DEVICE, at(10, 3), 80.0),
            TelemetryRecord::heart_rate(DEVICE, at(10, 4), 70.0),
            TelemetryRecord::heart_rate("other", at(10, 2), 150.0),
            TelemetryRecord::spo2(DEVICE, at(10, 2), 95.0),
        ];

        let series =
            VitalsSummarizer::summarize(&aggregator, &records, DEVICE, Metric::HeartRate).unwrap();

        assert_eq!(series.len(), 12);
        assert_eq!(series[0].count, 3);
        assert_eq!(series[0].min, Some(60.0));
        assert_eq!(series[0].max, Some(80.0));
        assert_eq!(series[0].average, Some(70.0));
        assert_eq!(series[0].total, None);
        assert_eq!(series[1], SlotSummary::empty(at(10, 5)));
    }

    #[test]
    fn test_steps_and_falls_totals() {
        let zones = FixedOffsetZones::new();
        let aggregator = SlotAggregator::new(&zones, Period::Day, reference(), "UTC");
        let records = vec![
            TelemetryRecord::steps(DEVICE, at(9, 10), 120),
            TelemetryRecord::steps(DEVICE, at(9, 50), 30),
            TelemetryRecord::fall(DEVICE, at(9, 20)),
            TelemetryRecord::fall(DEVICE, at(15, 0)),
        ];

        let steps = VitalsSummarizer::summarize(&aggregator, &records, DEVICE, Metric::Steps).unwrap();
        assert_eq!(steps.len(), 24);
        assert_eq!(steps[9].total, Some(150.0));
        assert_eq!(steps[9].count, 2);
        assert_eq!(steps[10].total, None);

        let falls = VitalsSummarizer::summarize(&aggregator, &records, DEVICE, Metric::Falls).unwrap();
        assert_eq!(falls[9].total, Some(1.0));
        assert_eq!(falls[15].total, Some(1.0));
        assert_eq!(falls.iter().filter(|s| s.count > 0).count(), 2);
    }

    #[test]
    fn test_distance_orders_fixes_by_time() {
        let zones = FixedOffsetZones::new();
        let aggregator = SlotAggregator::new(&zones, Period::Hour, reference(), "UTC");
        // Out of order on input; in time order the walk is 0 -> 1 -> 2 degrees
        let records = vec![
            TelemetryRecord::location(DEVICE, at(10, 4), coord(0.0, 2.0)),
            TelemetryRecord::location(DEVICE, at(10, 0), coord(0.0, 0.0)),
            TelemetryRecord::location(DEVICE, at(10, 2), coord(0.0, 1.0)),
        ];

        let series =
            VitalsSummarizer::summarize(&aggregator, &records, DEVICE, Metric::Distance).unwrap();
        let km = series[0].total.unwrap();
        assert!((km - 2.0 * 111.195).abs() < 0.05, "{}", km);
    }

    #[test]
    fn test_walking_distance_edge_cases() {
        assert_eq!(walking_distance_km(&[]), 0.0);
        assert_eq!(walking_distance_km(&[coord(1.0, 1.0)]), 0.0);
        assert_eq!(walking_distance_km(&[coord(1.0, 1.0), coord(1.0, 1.0)]), 0.0);
    }
}
