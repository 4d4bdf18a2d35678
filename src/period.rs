//! Aggregation periods and slot-boundary arithmetic
//!
//! A [`Period`] selects the window being aggregated (this hour, this day,
//! this week) and the width of the slots inside it.
//!
//! Boundary policy: the reference passed to window operations is a local
//! wall-clock value in the subject's time zone. Boundaries are built as local
//! wall-clock values and converted to UTC exactly once through the
//! [`TimeZoneConverter`]. Record timestamps are UTC instants; their Day and
//! Week slot keys are found by viewing them in local time and flooring there.

use crate::error::EngineError;
use crate::timezone::TimeZoneConverter;
use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggregation window size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Twelve 5-minute slots
    Hour,
    /// Twenty-four 1-hour slots
    Day,
    /// Seven 1-day slots, Monday first
    Week,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::Hour, Period::Day, Period::Week];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Hour => "hour",
            Period::Day => "day",
            Period::Week => "week",
        }
    }

    /// Width of a single slot
    pub fn slot_width(&self) -> Duration {
        match self {
            Period::Hour => Duration::minutes(5),
            Period::Day => Duration::hours(1),
            Period::Week => Duration::days(1),
        }
    }

    /// Number of slots in one window
    pub fn slot_count(&self) -> usize {
        match self {
            Period::Hour => 12,
            Period::Day => 24,
            Period::Week => 7,
        }
    }

    /// Last representable instant (millisecond precision) of the window
    /// containing `reference`.
    pub fn end_of_window(
        &self,
        reference: NaiveDateTime,
        timezone: &str,
        converter: &dyn TimeZoneConverter,
    ) -> Result<DateTime<Utc>, EngineError> {
        let local_end = match self {
            Period::Hour => at(reference.date(), reference.hour(), 59, 59, 999)?,
            Period::Day => at(reference.date(), 23, 59, 59, 999)?,
            Period::Week => at(add_days(week_start(reference.date())?, 6)?, 23, 59, 59, 999)?,
        };
        converter.local_to_utc(timezone, local_end)
    }

    /// UTC start of the window containing `reference` (the first expected slot)
    pub fn window_start(
        &self,
        reference: NaiveDateTime,
        timezone: &str,
        converter: &dyn TimeZoneConverter,
    ) -> Result<DateTime<Utc>, EngineError> {
        let local_start = match self {
            Period::Hour => at(reference.date(), reference.hour(), 0, 0, 0)?,
            Period::Day => at(reference.date(), 0, 0, 0, 0)?,
            Period::Week => at(week_start(reference.date())?, 0, 0, 0, 0)?,
        };
        converter.local_to_utc(timezone, local_start)
    }

    /// Start of the slot a UTC instant belongs to.
    ///
    /// Slots are half-open, so an instant exactly on a boundary starts a new
    /// slot.
    pub fn slot_start(
        &self,
        instant: DateTime<Utc>,
        timezone: &str,
        converter: &dyn TimeZoneConverter,
    ) -> Result<DateTime<Utc>, EngineError> {
        match self {
            Period::Hour => {
                let minute = instant.minute() - instant.minute() % 5;
                let floored = at(instant.date_naive(), instant.hour(), minute, 0, 0)?;
                Ok(Utc.from_utc_datetime(&floored))
            }
            Period::Day => {
                // Floor under the instant's own offset so the repeated hour of
                // a DST fall-back keeps two distinct slots
                let local = converter.utc_to_local(timezone, instant)?;
                let floored = at(local.date_naive(), local.hour(), 0, 0, 0)?;
                let offset = Duration::seconds(i64::from(local.offset().local_minus_utc()));
                let utc = floored
                    .checked_sub_signed(offset)
                    .ok_or_else(|| out_of_range(floored))?;
                Ok(Utc.from_utc_datetime(&utc))
            }
            Period::Week => {
                let local = converter.utc_to_local(timezone, instant)?;
                converter.local_to_utc(timezone, at(local.date_naive(), 0, 0, 0, 0)?)
            }
        }
    }

    /// Ordered UTC starts of every slot in the window containing `reference`.
    ///
    /// Always returns exactly [`Period::slot_count`] instants in ascending
    /// order.
    pub fn expected_slots(
        &self,
        reference: NaiveDateTime,
        timezone: &str,
        converter: &dyn TimeZoneConverter,
    ) -> Result<Vec<DateTime<Utc>>, EngineError> {
        let count = self.slot_count();

        match self {
            Period::Hour | Period::Day => {
                let first = self.window_start(reference, timezone, converter)?;
                let width = self.slot_width();
                (0..count as i32)
                    .map(|i| {
                        first
                            .checked_add_signed(width * i)
                            .ok_or_else(|| out_of_range(first))
                    })
                    .collect()
            }
            Period::Week => {
                // Each local midnight is converted on its own; a DST change
                // inside the week moves the UTC instants, not the days
                let monday = week_start(reference.date())?;
                (0..count as i64)
                    .map(|i| {
                        let midnight = at(add_days(monday, i)?, 0, 0, 0, 0)?;
                        converter.local_to_utc(timezone, midnight)
                    })
                    .collect()
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Period::Hour),
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            _ => Err(EngineError::InvalidPeriod(s.to_string())),
        }
    }
}

impl TryFrom<i32> for Period {
    type Error = EngineError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Period::Hour),
            1 => Ok(Period::Day),
            2 => Ok(Period::Week),
            other => Err(EngineError::InvalidPeriod(other.to_string())),
        }
    }
}

/// Monday of the week containing `date`
fn week_start(date: NaiveDate) -> Result<NaiveDate, EngineError> {
    add_days(date, -i64::from(date.weekday().num_days_from_monday()))
}

fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate, EngineError> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| out_of_range(date))
}

/// Window arithmetic ran past the representable calendar
fn out_of_range(near: impl fmt::Display) -> EngineError {
    EngineError::ParseError(format!("date out of supported range near {}", near))
}

fn at(date: NaiveDate, hour: u32, minute: u32, second: u32, milli: u32) -> Result<NaiveDateTime, EngineError> {
    date.and_hms_milli_opt(hour, minute, second, milli).ok_or_else(|| {
        EngineError::ParseError(format!(
            "invalid wall-clock time {} {:02}:{:02}:{:02}.{:03}",
            date, hour, minute, second, milli
        ))
    })
}
