//! Parsing and selection of telemetry records
//!
//! Turns NDJSON or JSON-array input into [`TelemetryRecord`]s and picks out
//! the records a series or a perimeter check needs.

use crate::error::EngineError;
use crate::schema::record::*;
use crate::types::{Coordinate, Metric};
use tracing::debug;

/// Adapter for reading and filtering telemetry records
pub struct RecordAdapter;

impl RecordAdapter {
    /// Parse a JSON string containing an array of records
    pub fn parse_array(json: &str) -> Result<Vec<TelemetryRecord>, EngineError> {
        let records: Vec<TelemetryRecord> = serde_json::from_str(json)?;
        Ok(records)
    }

    /// Parse NDJSON (newline-delimited JSON) containing records
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<TelemetryRecord>, EngineError> {
        let mut records = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<TelemetryRecord>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => {
                    return Err(EngineError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(records)
    }

    /// Validate a batch of records, returning only the failures
    pub fn validate_records(records: &[TelemetryRecord]) -> Vec<ValidationResult> {
        records
            .iter()
            .enumerate()
            .filter_map(|(idx, record)| {
                record.validate().err().map(|error| ValidationResult {
                    index: idx,
                    record_id: record.record_id.clone(),
                    error,
                })
            })
            .collect()
    }

    /// Valid records of one device contributing to `metric`, in input order
    pub fn select<'r>(
        records: &'r [TelemetryRecord],
        device_address: &str,
        metric: Metric,
    ) -> Vec<&'r TelemetryRecord> {
        records
            .iter()
            .filter(|r| r.device_address == device_address && r.reading.metric() == metric)
            .filter(|r| is_usable(r))
            .collect()
    }

    /// Most recent valid location fix of a device.
    ///
    /// Ties on timestamp go to the record that appears last in the input.
    pub fn last_known_location(
        records: &[TelemetryRecord],
        device_address: &str,
    ) -> Option<Coordinate> {
        records
            .iter()
            .filter(|r| r.device_address == device_address)
            .filter(|r| r.coordinate().is_some() && is_usable(r))
            .filter_map(|r| r.coordinate().map(|c| (r.timestamp, c)))
            .max_by_key(|(timestamp, _)| *timestamp)
            .map(|(_, coordinate)| coordinate)
    }
}

/// Out-of-range readings are skipped rather than aggregated
fn is_usable(record: &TelemetryRecord) -> bool {
    match record.validate() {
        Ok(()) => true,
        Err(error) => {
            debug!(
                device_address = %record.device_address,
                timestamp = %record.timestamp,
                error = %error,
                "record_skipped"
            );
            false
        }
    }
}

/// A record that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub record_id: Option<String>,
    pub error: ValidationError,
}
