//! Core types shared by the aggregation and geofence stages
//!
//! This module defines the data that crosses the engine's boundary: coordinates
//! and perimeters going in, per-slot summaries, series payloads and perimeter
//! alerts coming out.

use crate::error::EngineError;
use crate::period::Period;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(EngineError::InvalidCoordinate(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(EngineError::InvalidCoordinate(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }
}

/// Circular geofence around a tracked subject.
///
/// `radius` is compared directly against the planar distance between raw
/// degree values, so it is expressed in the same degree-like units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Perimeter {
    pub center: Coordinate,
    pub radius: f64,
}

impl Perimeter {
    pub fn validate(&self) -> Result<(), EngineError> {
        self.center.validate()?;
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(EngineError::InvalidCoordinate(format!(
                "perimeter radius {} must be a non-negative number",
                self.radius
            )));
        }
        Ok(())
    }
}

/// Whether a subject is currently outside its perimeter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerimeterState {
    pub out_of_perimeter: bool,
}

impl PerimeterState {
    pub const INSIDE: PerimeterState = PerimeterState {
        out_of_perimeter: false,
    };
    pub const OUTSIDE: PerimeterState = PerimeterState {
        out_of_perimeter: true,
    };
}

/// Sensor reading family a series is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    HeartRate,
    Spo2,
    Steps,
    Distance,
    Falls,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::HeartRate => "heart_rate",
            Metric::Spo2 => "spo2",
            Metric::Steps => "steps",
            Metric::Distance => "distance",
            Metric::Falls => "falls",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "heart_rate" | "hr" => Ok(Metric::HeartRate),
            "spo2" => Ok(Metric::Spo2),
            "steps" => Ok(Metric::Steps),
            "distance" => Ok(Metric::Distance),
            "falls" | "fall" => Ok(Metric::Falls),
            _ => Err(EngineError::ParseError(format!("unknown metric: {}", s))),
        }
    }
}

/// Aggregated values for one slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotSummary {
    /// UTC start of the slot
    pub slot_start: DateTime<Utc>,
    /// Number of readings that fell into the slot
    pub count: usize,
    /// Smallest reading (heart rate, SpO2)
    pub min: Option<f64>,
    /// Largest reading (heart rate, SpO2)
    pub max: Option<f64>,
    /// Mean reading (heart rate, SpO2)
    pub average: Option<f64>,
    /// Summed quantity (steps, walking distance in km, falls)
    pub total: Option<f64>,
}

impl SlotSummary {
    /// Summary for a slot that received no readings
    pub fn empty(slot_start: DateTime<Utc>) -> Self {
        Self {
            slot_start,
            count: 0,
            min: None,
            max: None,
            average: None,
            total: None,
        }
    }
}

/// What series to build: one device, one metric, one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRequest {
    pub device_address: String,
    pub metric: Metric,
    pub period: Period,
    /// Local wall-clock instant anchoring the window, in `timezone`
    pub reference: NaiveDateTime,
    /// IANA or Windows time-zone id
    pub timezone: String,
}

/// Producer metadata embedded in every series payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Dense, gap-filled series for one device, metric and window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesPayload {
    pub producer: SeriesProducer,
    pub device_address: String,
    pub metric: Metric,
    pub period: Period,
    pub timezone: String,
    pub window_start_utc: String,
    pub window_end_utc: String,
    pub computed_at_utc: String,
    pub slots: Vec<SlotSummary>,
}

/// Emitted when a subject crosses its perimeter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerimeterAlert {
    pub address: String,
    pub out_of_perimeter: bool,
    /// Planar distance from the perimeter center, in degree units
    pub distance: f64,
    pub location: Coordinate,
    pub evaluated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(latitude: f64, longitude: f64) -> Coordinate {
        Coordinate {
            latitude,
            longitude,
        }
    }

    #[test]
    fn test_coordinate_ranges() {
        assert!(coord(45.0, -122.0).validate().is_ok());
        assert!(coord(90.0, 180.0).validate().is_ok());
        assert!(matches!(
            coord(91.0, 0.0).validate(),
            Err(EngineError::InvalidCoordinate(_))
        ));
        assert!(coord(0.0, -180.5).validate().is_err());
        assert!(coord(f64::NAN, 0.0).validate().is_err());
    }

    #[test]
    fn test_perimeter_validation() {
        let center = coord(10.0, 10.0);
        assert!(Perimeter { center, radius: 0.5 }.validate().is_ok());
        assert!(Perimeter { center, radius: 0.0 }.validate().is_ok());
        assert!(Perimeter { center, radius: -1.0 }.validate().is_err());
        assert!(Perimeter { center, radius: f64::INFINITY }.validate().is_err());
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("heart-rate".parse::<Metric>().unwrap(), Metric::HeartRate);
        assert_eq!("SpO2".parse::<Metric>().unwrap(), Metric::Spo2);
        assert_eq!("falls".parse::<Metric>().unwrap(), Metric::Falls);
        assert!("temperature".parse::<Metric>().is_err());
        assert_eq!(serde_json::to_string(&Metric::HeartRate).unwrap(), "\"heart_rate\"");
    }

    #[test]
    fn test_perimeter_state_default_is_inside() {
        assert_eq!(PerimeterState::default(), PerimeterState::INSIDE);
        let json = serde_json::to_string(&PerimeterState::OUTSIDE).unwrap();
        assert_eq!(json, r#"{"out_of_perimeter":true}"#);
    }
}
