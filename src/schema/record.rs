//! carewatch.telemetry.v1 record definition
//!
//! One record is one timestamped reading from a wearable, keyed by the
//! device address it came from:
//! - heart rate and SpO2 samples
//! - step counts
//! - GPS location fixes
//! - detected falls

use crate::types::{Coordinate, Metric};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current schema version
pub const SCHEMA_VERSION: &str = "carewatch.telemetry.v1";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// Sensor reading carried by a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reading {
    /// Heart rate in beats per minute
    HeartRate { bpm: f64 },
    /// Blood oxygen saturation (percentage, 0-100)
    Spo2 { percentage: f64 },
    /// Steps counted since the previous step record
    Steps { count: u32 },
    /// GPS fix in decimal degrees
    Location { latitude: f64, longitude: f64 },
    /// Fall detected by the device
    Fall {
        /// Detector confidence (0-1), when the device reports one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },
}

impl Reading {
    /// Metric family this reading contributes to
    pub fn metric(&self) -> Metric {
        match self {
            Reading::HeartRate { .. } => Metric::HeartRate,
            Reading::Spo2 { .. } => Metric::Spo2,
            Reading::Steps { .. } => Metric::Steps,
            Reading::Location { .. } => Metric::Distance,
            Reading::Fall { .. } => Metric::Falls,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Reading::HeartRate { .. } => "heart_rate",
            Reading::Spo2 { .. } => "spo2",
            Reading::Steps { .. } => "steps",
            Reading::Location { .. } => "location",
            Reading::Fall { .. } => "fall",
        }
    }
}

/// Timestamped telemetry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Schema version
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Optional unique record identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Address of the wearable that produced the reading
    pub device_address: String,
    /// When the reading was taken (UTC)
    pub timestamp: DateTime<Utc>,
    /// The reading itself
    pub reading: Reading,
}

impl TelemetryRecord {
    /// Create a new record with a generated id
    pub fn new(device_address: impl Into<String>, timestamp: DateTime<Utc>, reading: Reading) -> Self {
        TelemetryRecord {
            schema_version: SCHEMA_VERSION.to_string(),
            record_id: Some(uuid::Uuid::new_v4().to_string()),
            device_address: device_address.into(),
            timestamp,
            reading,
        }
    }

    pub fn heart_rate(device_address: impl Into<String>, timestamp: DateTime<Utc>, bpm: f64) -> Self {
        Self::new(device_address, timestamp, Reading::HeartRate { bpm })
    }

    pub fn spo2(device_address: impl Into<String>, timestamp: DateTime<Utc>, percentage: f64) -> Self {
        Self::new(device_address, timestamp, Reading::Spo2 { percentage })
    }

    pub fn steps(device_address: impl Into<String>, timestamp: DateTime<Utc>, count: u32) -> Self {
        Self::new(device_address, timestamp, Reading::Steps { count })
    }

    pub fn location(
        device_address: impl Into<String>,
        timestamp: DateTime<Utc>,
        coordinate: Coordinate,
    ) -> Self {
        Self::new(
            device_address,
            timestamp,
            Reading::Location {
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
            },
        )
    }

    pub fn fall(device_address: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(device_address, timestamp, Reading::Fall { confidence: None })
    }

    /// Location carried by this record, if it is a GPS fix
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self.reading {
            Reading::Location {
                latitude,
                longitude,
            } => Some(Coordinate {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// Validate the record schema and value ranges
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        if self.device_address.trim().is_empty() {
            return Err(ValidationError::MissingDeviceAddress);
        }

        let reading = self.reading.type_name();
        match &self.reading {
            Reading::HeartRate { bpm } => check_range(reading, "bpm", *bpm, 0.0, 300.0),
            Reading::Spo2 { percentage } => {
                check_range(reading, "percentage", *percentage, 0.0, 100.0)
            }
            Reading::Steps { .. } => Ok(()),
            Reading::Location {
                latitude,
                longitude,
            } => {
                check_range(reading, "latitude", *latitude, -90.0, 90.0)?;
                check_range(reading, "longitude", *longitude, -180.0, 180.0)
            }
            Reading::Fall {
                confidence: Some(confidence),
            } => check_range(reading, "confidence", *confidence, 0.0, 1.0),
            Reading::Fall { confidence: None } => Ok(()),
        }
    }
}

fn check_range(
    reading: &str,
    field: &str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            reading: reading.to_string(),
            field: field.to_string(),
            value,
            min,
            max,
        })
    }
}

/// Validation errors for telemetry records
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Record has no device address")]
    MissingDeviceAddress,

    #[error("{reading} {field} {value} outside [{min}, {max}]")]
    OutOfRange {
        reading: String,
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_deserialize_heart_rate_record() {
        let json = r#"{
            "device_address": "AA:BB:CC:DD:EE:01",
            "timestamp": "2024-01-15T08:30:00Z",
            "reading": { "type": "heart_rate", "bpm": 72.0 }
        }"#;

        let record: TelemetryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert_eq!(record.timestamp, ts());
        assert_eq!(record.reading, Reading::HeartRate { bpm: 72.0 });
        assert_eq!(record.reading.metric(), Metric::HeartRate);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_deserialize_location_and_fall() {
        let location: TelemetryRecord = serde_json::from_str(
            r#"{"device_address":"dev","timestamp":"2024-01-15T08:30:00Z",
                "reading":{"type":"location","latitude":45.5,"longitude":-122.6}}"#,
        )
        .unwrap();
        assert_eq!(
            location.coordinate(),
            Some(Coordinate {
                latitude: 45.5,
                longitude: -122.6
            })
        );

        let fall: TelemetryRecord = serde_json::from_str(
            r#"{"device_address":"dev","timestamp":"2024-01-15T08:30:00Z","reading":{"type":"fall"}}"#,
        )
        .unwrap();
        assert_eq!(fall.reading, Reading::Fall { confidence: None });
        assert_eq!(fall.coordinate(), None);
    }

    #[test]
    fn test_serialize_record() {
        let record = TelemetryRecord::spo2("dev-1", ts(), 97.0);
        let json = serde_json::to_string(&record).unwrap();

        assert!(json.contains(r#""type":"spo2""#));
        assert!(json.contains(SCHEMA_VERSION));
        assert!(record.record_id.is_some());
    }

    #[test]
    fn test_validation_ranges() {
        assert!(TelemetryRecord::heart_rate("dev", ts(), 72.0).validate().is_ok());

        let err = TelemetryRecord::heart_rate("dev", ts(), 420.0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref reading, .. } if reading == "heart_rate"));

        assert!(TelemetryRecord::spo2("dev", ts(), 101.0).validate().is_err());
        assert!(TelemetryRecord::heart_rate("dev", ts(), f64::NAN).validate().is_err());

        let bad_fix = TelemetryRecord::new(
            "dev",
            ts(),
            Reading::Location {
                latitude: 95.0,
                longitude: 0.0,
            },
        );
        assert!(bad_fix.validate().is_err());
    }

    #[test]
    fn test_validation_schema_and_address() {
        let mut record = TelemetryRecord::fall("dev", ts());
        record.schema_version = "carewatch.telemetry.v0".to_string();
        assert!(matches!(
            record.validate(),
            Err(ValidationError::InvalidSchemaVersion { .. })
        ));

        let anonymous = TelemetryRecord::steps("  ", ts(), 10);
        assert_eq!(anonymous.validate(), Err(ValidationError::MissingDeviceAddress));
    }
}
