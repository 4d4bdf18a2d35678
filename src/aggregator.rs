//! Slot aggregation
//!
//! Buckets irregular, timestamped records into the fixed slots of a window
//! and produces exactly one result per slot, in ascending slot order. Slots
//! that received no records are filled by a caller-supplied default.
//!
//! The expected-slot list is the output domain: records outside the window
//! are ignored, and no slot is ever added for them. On a spring-forward day
//! the last Day slot starts after the window closes and always holds the
//! default.

use crate::error::EngineError;
use crate::period::Period;
use crate::timezone::TimeZoneConverter;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Aggregator bound to one window: a period, a local reference and a zone
pub struct SlotAggregator<'a> {
    converter: &'a dyn TimeZoneConverter,
    period: Period,
    reference: NaiveDateTime,
    timezone: &'a str,
}

impl<'a> SlotAggregator<'a> {
    pub fn new(
        converter: &'a dyn TimeZoneConverter,
        period: Period,
        reference: NaiveDateTime,
        timezone: &'a str,
    ) -> Self {
        Self {
            converter,
            period,
            reference,
            timezone,
        }
    }

    /// UTC starts of the slots this aggregator produces results for
    pub fn expected_slots(&self) -> Result<Vec<DateTime<Utc>>, EngineError> {
        self.period
            .expected_slots(self.reference, self.timezone, self.converter)
    }

    /// Aggregate `records` into one result per expected slot.
    ///
    /// `aggregate` receives the records of a non-empty slot in input order
    /// together with the slot start; `default` receives only the slot start.
    pub fn aggregate<S, R, K, A, D>(
        &self,
        records: &[S],
        timestamp: K,
        aggregate: A,
        default: D,
    ) -> Result<Vec<R>, EngineError>
    where
        K: Fn(&S) -> DateTime<Utc>,
        A: Fn(&[&S], DateTime<Utc>) -> R,
        D: Fn(DateTime<Utc>) -> R,
    {
        let expected = self.expected_slots()?;
        let window_start = self
            .period
            .window_start(self.reference, self.timezone, self.converter)?;
        let window_end = self
            .period
            .end_of_window(self.reference, self.timezone, self.converter)?;

        let mut groups: HashMap<DateTime<Utc>, Vec<&S>> = HashMap::new();
        for record in records {
            let instant = timestamp(record);
            if instant < window_start || instant > window_end {
                continue;
            }
            let key = self
                .period
                .slot_start(instant, self.timezone, self.converter)?;
            groups.entry(key).or_default().push(record);
        }

        let mut matched = 0;
        let results: Vec<R> = expected
            .iter()
            .map(|slot| match groups.get(slot) {
                Some(group) => {
                    matched += group.len();
                    aggregate(group.as_slice(), *slot)
                }
                None => default(*slot),
            })
            .collect();

        debug!(
            period = %self.period,
            timezone = self.timezone,
            records = records.len(),
            in_window = matched,
            outside_window = records.len() - matched,
            "slots_aggregated"
        );

        Ok(results)
    }
}

/// Aggregate `records` over the window of `period` containing `reference`.
///
/// Convenience wrapper around [`SlotAggregator`]. The result always holds
/// exactly `period.slot_count()` entries.
pub fn aggregate_by_period<S, R, K, A, D>(
    records: &[S],
    period: Period,
    reference: NaiveDateTime,
    timezone: &str,
    converter: &dyn TimeZoneConverter,
    timestamp: K,
    aggregate: A,
    default: D,
) -> Result<Vec<R>, EngineError>
where
    K: Fn(&S) -> DateTime<Utc>,
    A: Fn(&[&S], DateTime<Utc>) -> R,
    D: Fn(DateTime<Utc>) -> R,
{
    SlotAggregator::new(converter, period, reference, timezone).aggregate(
        records, timestamp, aggregate, default,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timezone::{FixedOffsetZones, SystemTimeZones};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Reading {
        at: DateTime<Utc>,
        value: u32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Bucket {
        start: DateTime<Utc>,
        count: usize,
        values: Vec<u32>,
        filled: bool,
    }

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").unwrap()
    }

    fn utc(s: &str) -> DateTime<Utc> {
        Utc.from_utc_datetime(&naive(s))
    }

    fn reading(s: &str, value: u32) -> Reading {
        Reading { at: utc(s), value }
    }

    fn run(
        records: &[Reading],
        period: Period,
        reference: &str,
        timezone: &str,
        converter: &dyn TimeZoneConverter,
    ) -> Vec<Bucket> {
        aggregate_by_period(
            records,
            period,
            naive(reference),
            timezone,
            converter,
            |r| r.at,
            |group, start| Bucket {
                start,
                count: group.len(),
                values: group.iter().map(|r| r.value).collect(),
                filled: false,
            },
            |start| Bucket {
                start,
                count: 0,
                values: Vec::new(),
                filled: true,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_cardinality_for_every_period() {
        let zones = FixedOffsetZones::new();
        let many: Vec<Reading> = (0..500)
            .map(|i| Reading {
                at: utc("2024-01-15 00:00:00") + chrono::Duration::minutes(i * 37),
                value: i as u32,
            })
            .collect();

        for period in Period::ALL {
            for records in [&[][..], &many[..]] {
                let out = run(records, period, "2024-01-17 10:00:00", "UTC", &zones);
                assert_eq!(out.len(), period.slot_count());
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let zones = FixedOffsetZones::new();
        let records = vec![
            reading("2024-01-17 10:07:00", 1),
            reading("2024-01-17 10:02:00", 2),
            reading("2024-01-17 10:41:00", 3),
        ];
        let first = run(&records, Period::Hour, "2024-01-17 10:00:00", "UTC", &zones);
        let second = run(&records, Period::Hour, "2024-01-17 10:00:00", "UTC", &zones);
        assert_eq!(first, second);
    }

    #[test]
    fn test_boundary_belongs_to_starting_slot() {
        let zones = FixedOffsetZones::new();
        let records = vec![
            reading("2024-01-17 10:55:00.000", 1),
            reading("2024-01-17 10:54:59.999", 2),
        ];
        let out = run(&records, Period::Hour, "2024-01-17 10:00:00", "UTC", &zones);

        assert_eq!(out[10].start, utc("2024-01-17 10:50:00"));
        assert_eq!(out[10].values, vec![2]);
        assert_eq!(out[11].start, utc("2024-01-17 10:55:00"));
        assert_eq!(out[11].values, vec![1]);
    }

    #[test]
    fn test_empty_week_is_all_defaults() {
        let zones = FixedOffsetZones::new();
        let out = run(&[], Period::Week, "2024-01-15 00:00:00", "UTC", &zones);

        assert_eq!(out.len(), 7);
        assert!(out.iter().all(|b| b.filled && b.count == 0));
        assert_eq!(out[0].start, utc("2024-01-15 00:00:00"));
        assert_eq!(out[6].start, utc("2024-01-21 00:00:00"));
    }

    #[test]
    fn test_three_readings_in_hour() {
        let zones = FixedOffsetZones::new();
        let records = vec![
            reading("2024-01-17 10:00:00", 1),
            reading("2024-01-17 10:05:00", 2),
            reading("2024-01-17 10:10:00", 3),
        ];
        let out = run(&records, Period::Hour, "2024-01-17 10:00:00", "UTC", &zones);

        assert_eq!(out.len(), 12);
        let counts: Vec<usize> = out.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(out[3..].iter().all(|b| b.filled));
    }

    #[test]
    fn test_record_past_window_is_excluded() {
        let zones = FixedOffsetZones::new();
        let records = vec![
            reading("2024-01-17 10:59:59", 1),
            reading("2024-01-17 11:00:00", 2),
        ];
        let out = run(&records, Period::Hour, "2024-01-17 10:00:00", "UTC", &zones);

        assert_eq!(out.len(), 12);
        assert_eq!(out[11].start, utc("2024-01-17 10:55:00"));
        assert_eq!(out[11].values, vec![1]);
        let total: usize = out.iter().map(|b| b.count).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_group_keeps_input_order_for_unordered_records() {
        let zones = FixedOffsetZones::new();
        let records = vec![
            reading("2024-01-17 10:33:00", 3),
            reading("2024-01-17 10:04:00", 9),
            reading("2024-01-17 10:31:00", 1),
            reading("2024-01-17 10:34:59", 2),
        ];
        let out = run(&records, Period::Hour, "2024-01-17 10:00:00", "UTC", &zones);
        assert_eq!(out[6].values, vec![3, 1, 2]);
        assert_eq!(out[0].values, vec![9]);
    }

    #[test]
    fn test_day_in_offset_zone() {
        let zones = FixedOffsetZones::new().with_zone("EST", -5 * 3600).unwrap();
        let records = vec![
            // 23:30 local on the 16th: previous day, excluded
            reading("2024-01-17 04:30:00", 1),
            // 00:15 local on the 17th
            reading("2024-01-17 05:15:00", 2),
            // 23:59 local on the 17th
            reading("2024-01-18 04:59:00", 3),
        ];
        let out = run(&records, Period::Day, "2024-01-17 12:00:00", "EST", &zones);

        assert_eq!(out[0].start, utc("2024-01-17 05:00:00"));
        assert_eq!(out[0].values, vec![2]);
        assert_eq!(out[23].values, vec![3]);
        assert_eq!(out.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn test_week_in_real_zone() {
        let zones = SystemTimeZones;
        let records = vec![
            // Sunday evening local, Monday UTC
            reading("2024-01-22 02:00:00", 1),
            // Monday morning local
            reading("2024-01-15 14:00:00", 2),
        ];
        let out = run(
            &records,
            Period::Week,
            "2024-01-18 09:00:00",
            "America/New_York",
            &zones,
        );

        assert_eq!(out[0].start, utc("2024-01-15 05:00:00"));
        assert_eq!(out[0].values, vec![2]);
        assert_eq!(out[6].values, vec![1]);
    }

    #[test]
    fn test_invalid_zone_propagates() {
        let zones = FixedOffsetZones::new();
        let records = vec![reading("2024-01-17 10:00:00", 1)];
        let result = aggregate_by_period(
            &records,
            Period::Day,
            naive("2024-01-17 10:00:00"),
            "Nowhere/Special",
            &zones,
            |r| r.at,
            |group, _| group.len(),
            |_| 0,
        );
        assert!(matches!(result, Err(EngineError::InvalidTimezone(_))));
    }

    #[test]
    fn test_spring_forward_day_ignores_next_local_day() {
        let zones = SystemTimeZones;
        let records = vec![
            // 23:30 EDT on the 10th
            reading("2024-03-11 03:30:00", 1),
            // 00:30 EDT on the 11th
            reading("2024-03-11 04:30:00", 2),
        ];
        let out = run(
            &records,
            Period::Day,
            "2024-03-10 12:00:00",
            "America/New_York",
            &zones,
        );

        assert_eq!(out.len(), 24);
        assert_eq!(out[22].start, utc("2024-03-11 03:00:00"));
        assert_eq!(out[22].values, vec![1]);
        assert_eq!(out[23].start, utc("2024-03-11 04:00:00"));
        assert!(out[23].filled);
        assert_eq!(out.iter().map(|b| b.count).sum::<usize>(), 1);
    }
}
