//! Time-zone conversion
//!
//! Every wall-clock boundary the engine builds goes through a
//! [`TimeZoneConverter`]. Production code uses [`SystemTimeZones`] (the IANA
//! database compiled in through `chrono-tz`); tests and embedders without a
//! tz database can use [`FixedOffsetZones`].

use crate::error::EngineError;
use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, Offset, TimeZone, Utc,
};
use chrono_tz::Tz;
use std::collections::HashMap;

/// Converts between local wall-clock values and UTC instants.
pub trait TimeZoneConverter: Send + Sync {
    /// Resolve a local wall-clock value (no offset attached) to UTC.
    fn local_to_utc(
        &self,
        timezone: &str,
        local: NaiveDateTime,
    ) -> Result<DateTime<Utc>, EngineError>;

    /// Convert a UTC instant to the local wall clock of `timezone`.
    fn utc_to_local(
        &self,
        timezone: &str,
        utc: DateTime<Utc>,
    ) -> Result<DateTime<FixedOffset>, EngineError>;

    /// Check that `timezone` can be resolved by this converter.
    fn validate(&self, timezone: &str) -> Result<(), EngineError> {
        self.utc_to_local(timezone, DateTime::<Utc>::default())
            .map(|_| ())
    }
}

/// Common Windows time-zone ids mapped to their IANA equivalents
const WINDOWS_ZONES: &[(&str, &str)] = &[
    ("UTC", "UTC"),
    ("Coordinated Universal Time", "UTC"),
    ("Eastern Standard Time", "America/New_York"),
    ("Central Standard Time", "America/Chicago"),
    ("Mountain Standard Time", "America/Denver"),
    ("US Mountain Standard Time", "America/Phoenix"),
    ("Pacific Standard Time", "America/Los_Angeles"),
    ("Alaskan Standard Time", "America/Anchorage"),
    ("Hawaiian Standard Time", "Pacific/Honolulu"),
    ("GMT Standard Time", "Europe/London"),
    ("W. Europe Standard Time", "Europe/Berlin"),
    ("Romance Standard Time", "Europe/Paris"),
    ("Central European Standard Time", "Europe/Warsaw"),
    ("GTB Standard Time", "Europe/Bucharest"),
    ("FLE Standard Time", "Europe/Kiev"),
    ("Russian Standard Time", "Europe/Moscow"),
    ("Egypt Standard Time", "Africa/Cairo"),
    ("South Africa Standard Time", "Africa/Johannesburg"),
    ("Arabian Standard Time", "Asia/Dubai"),
    ("India Standard Time", "Asia/Kolkata"),
    ("Nepal Standard Time", "Asia/Kathmandu"),
    ("China Standard Time", "Asia/Shanghai"),
    ("Tokyo Standard Time", "Asia/Tokyo"),
    ("AUS Eastern Standard Time", "Australia/Sydney"),
    ("New Zealand Standard Time", "Pacific/Auckland"),
    ("E. South America Standard Time", "America/Sao_Paulo"),
];

/// Map a Windows time-zone id to its IANA equivalent, if known
pub fn windows_to_iana(id: &str) -> Option<&'static str> {
    WINDOWS_ZONES
        .iter()
        .find(|(windows, _)| windows.eq_ignore_ascii_case(id))
        .map(|(_, iana)| *iana)
}

/// Converter backed by the compiled-in IANA database.
///
/// Ambiguous local times (clocks falling back) resolve to the earlier
/// occurrence. Local times inside a spring-forward gap are shifted forward by
/// applying the offset that was in force before the gap.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeZones;

impl SystemTimeZones {
    /// Resolve an IANA or Windows time-zone id
    pub fn resolve(timezone: &str) -> Result<Tz, EngineError> {
        let trimmed = timezone.trim();
        let id = windows_to_iana(trimmed).unwrap_or(trimmed);
        id.parse::<Tz>()
            .map_err(|_| EngineError::InvalidTimezone(timezone.to_string()))
    }
}

impl TimeZoneConverter for SystemTimeZones {
    fn local_to_utc(
        &self,
        timezone: &str,
        local: NaiveDateTime,
    ) -> Result<DateTime<Utc>, EngineError> {
        let tz = Self::resolve(timezone)?;

        match tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => {
                // A day earlier is always before the gap opened
                let day_before = local
                    .checked_sub_signed(Duration::days(1))
                    .ok_or_else(|| out_of_range(local))?;
                let before = tz.offset_from_utc_datetime(&day_before).fix();
                shift_to_utc(local, before)
            }
        }
    }

    fn utc_to_local(
        &self,
        timezone: &str,
        utc: DateTime<Utc>,
    ) -> Result<DateTime<FixedOffset>, EngineError> {
        let tz = Self::resolve(timezone)?;
        Ok(utc.with_timezone(&tz).fixed_offset())
    }
}

/// Apply `offset` to a local wall-clock value, failing at the calendar edges
fn shift_to_utc(local: NaiveDateTime, offset: FixedOffset) -> Result<DateTime<Utc>, EngineError> {
    local
        .checked_sub_signed(Duration::seconds(i64::from(offset.local_minus_utc())))
        .map(|utc| Utc.from_utc_datetime(&utc))
        .ok_or_else(|| out_of_range(local))
}

fn out_of_range(local: NaiveDateTime) -> EngineError {
    EngineError::ParseError(format!("local time {} is outside the supported range", local))
}

/// Deterministic converter with one fixed UTC offset per zone id.
#[derive(Debug, Clone)]
pub struct FixedOffsetZones {
    offsets: HashMap<String, FixedOffset>,
}

impl Default for FixedOffsetZones {
    fn default() -> Self {
        Self::new()
    }
}

impl FixedOffsetZones {
    /// Create a converter that only knows `UTC`
    pub fn new() -> Self {
        let mut offsets = HashMap::new();
        offsets.insert("UTC".to_string(), Utc.fix());
        Self { offsets }
    }

    /// Register a zone with an offset east of UTC, in seconds
    pub fn with_zone(mut self, id: &str, offset_seconds: i32) -> Result<Self, EngineError> {
        let offset = FixedOffset::east_opt(offset_seconds).ok_or_else(|| {
            EngineError::InvalidTimezone(format!("{}: offset {}s out of range", id, offset_seconds))
        })?;
        self.offsets.insert(id.to_string(), offset);
        Ok(self)
    }

    fn offset(&self, timezone: &str) -> Result<FixedOffset, EngineError> {
        self.offsets
            .get(timezone.trim())
            .copied()
            .ok_or_else(|| EngineError::InvalidTimezone(timezone.to_string()))
    }
}

impl TimeZoneConverter for FixedOffsetZones {
    fn local_to_utc(
        &self,
        timezone: &str,
        local: NaiveDateTime,
    ) -> Result<DateTime<Utc>, EngineError> {
        let offset = self.offset(timezone)?;
        shift_to_utc(local, offset)
    }

    fn utc_to_local(
        &self,
        timezone: &str,
        utc: DateTime<Utc>,
    ) -> Result<DateTime<FixedOffset>, EngineError> {
        let offset = self.offset(timezone)?;
        Ok(utc.with_timezone(&offset))
    }
}
