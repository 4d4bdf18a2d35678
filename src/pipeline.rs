//! Pipeline orchestration
//!
//! This module provides the public entry points of Carewatch: building a
//! dense vitals series for a query, checking a single perimeter, and the
//! stateful monitor a periodic job drives once per tick.

use crate::aggregator::SlotAggregator;
use crate::config::MonitorConfig;
use crate::encoder::SeriesEncoder;
use crate::error::EngineError;
use crate::geofence::{GeofenceEvaluator, PerimeterEvaluation};
use crate::period::Period;
use crate::schema::{RecordAdapter, TelemetryRecord};
use crate::state::PerimeterStateStore;
use crate::timezone::{SystemTimeZones, TimeZoneConverter};
use crate::types::{
    Coordinate, Metric, Perimeter, PerimeterAlert, PerimeterState, SeriesPayload, SeriesRequest,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Build the dense series described by `request_json` from raw records.
///
/// # Arguments
/// * `records` - Telemetry records as a JSON array or NDJSON
/// * `request_json` - A [`SeriesRequest`] as JSON
///
/// # Returns
/// The series payload as JSON, always holding `slot_count(period)` slots
///
/// # Example
/// ```ignore
/// let payload = vitals_series(
///     records,
///     r#"{"device_address":"dev-1","metric":"heart_rate","period":"hour",
///         "reference":"2024-01-17T10:00:00","timezone":"Europe/London"}"#,
/// )?;
/// ```
pub fn vitals_series(records: &str, request_json: &str) -> Result<String, EngineError> {
    let request: SeriesRequest = serde_json::from_str(request_json)?;
    let records = parse_records(records)?;
    let payload = compute_series(&records, &request, &SystemTimeZones, &SeriesEncoder::new())?;
    serde_json::to_string_pretty(&payload).map_err(EngineError::JsonError)
}

/// Parse records given either as a JSON array or as NDJSON
pub fn parse_records(input: &str) -> Result<Vec<TelemetryRecord>, EngineError> {
    if input.trim_start().starts_with('[') {
        RecordAdapter::parse_array(input)
    } else {
        RecordAdapter::parse_ndjson(input)
    }
}

/// Aggregate `records` into the series described by `request`.
///
/// Stages:
/// 1. Resolve the time zone (misconfiguration is surfaced, never defaulted)
/// 2. Select the device's readings for the requested metric
/// 3. Bucket them into the window's slots, filling gaps with empty summaries
/// 4. Encode with window boundaries and producer metadata
pub fn compute_series(
    records: &[TelemetryRecord],
    request: &SeriesRequest,
    converter: &dyn TimeZoneConverter,
    encoder: &SeriesEncoder,
) -> Result<SeriesPayload, EngineError> {
    converter.validate(&request.timezone).map_err(|e| {
        warn!(timezone = %request.timezone, error = %e, "timezone_unresolvable");
        e
    })?;

    let aggregator = SlotAggregator::new(
        converter,
        request.period,
        request.reference,
        &request.timezone,
    );
    let slots = crate::vitals::VitalsSummarizer::summarize(
        &aggregator,
        records,
        &request.device_address,
        request.metric,
    )?;

    let window_start = request
        .period
        .window_start(request.reference, &request.timezone, converter)?;
    let window_end = request
        .period
        .end_of_window(request.reference, &request.timezone, converter)?;

    encoder.encode(request, window_start, window_end, slots)
}

/// Input for a one-off perimeter check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerimeterCheck {
    #[serde(default)]
    pub perimeter: Option<Perimeter>,
    #[serde(default)]
    pub location: Option<Coordinate>,
    #[serde(default)]
    pub state: PerimeterState,
}

/// Evaluate a [`PerimeterCheck`] given as JSON and return the
/// [`PerimeterEvaluation`] as JSON
pub fn evaluate_perimeter(check_json: &str) -> Result<String, EngineError> {
    let check: PerimeterCheck = serde_json::from_str(check_json)?;
    if let Some(perimeter) = &check.perimeter {
        perimeter.validate()?;
    }
    if let Some(location) = &check.location {
        location.validate()?;
    }

    let evaluation = GeofenceEvaluator::evaluate(
        check.perimeter.as_ref(),
        check.location.as_ref(),
        check.state,
    );
    Ok(serde_json::to_string(&evaluation)?)
}

/// Stateful monitor for periodic ticks with persistent perimeter states.
///
/// The caller owns the schedule; each [`MonitorProcessor::tick`] evaluates
/// every configured subject once. Ticks for the same processor must not run
/// concurrently, which keeps writes to a subject's state serialized.
pub struct MonitorProcessor<Z: TimeZoneConverter = SystemTimeZones> {
    converter: Z,
    config: MonitorConfig,
    states: PerimeterStateStore,
    encoder: SeriesEncoder,
}

impl MonitorProcessor<SystemTimeZones> {
    /// Create a monitor backed by the system time-zone database
    pub fn new(config: MonitorConfig) -> Result<Self, EngineError> {
        Self::with_converter(config, SystemTimeZones)
    }
}

impl<Z: TimeZoneConverter> MonitorProcessor<Z> {
    /// Create a monitor with a specific converter; the configuration is
    /// validated against it
    pub fn with_converter(config: MonitorConfig, converter: Z) -> Result<Self, EngineError> {
        config.validate(&converter).map_err(|e| {
            warn!(error = %e, "monitor_config_rejected");
            e
        })?;

        Ok(Self {
            converter,
            config,
            states: PerimeterStateStore::new(),
            encoder: SeriesEncoder::new(),
        })
    }

    pub fn states(&self) -> &PerimeterStateStore {
        &self.states
    }

    /// Load perimeter states from JSON
    pub fn load_states(&mut self, json: &str) -> Result<(), EngineError> {
        self.states = PerimeterStateStore::from_json(json)
            .map_err(|e| EngineError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Save perimeter states to JSON
    pub fn save_states(&self) -> Result<String, EngineError> {
        self.states
            .to_json()
            .map_err(|e| EngineError::EncodingError(e.to_string()))
    }

    /// Evaluate every configured subject against its last known location.
    ///
    /// Returns one alert per subject whose state changed; repeated ticks for
    /// a subject that stays outside return nothing.
    pub fn tick(&mut self, records: &[TelemetryRecord], now: DateTime<Utc>) -> Vec<PerimeterAlert> {
        let mut alerts = Vec::new();

        for subject in &self.config.subjects {
            let location = RecordAdapter::last_known_location(records, &subject.address);
            let current = self.states.get(&subject.address);
            let evaluation = GeofenceEvaluator::evaluate(
                subject.perimeter.as_ref(),
                location.as_ref(),
                current,
            );

            if !evaluation.transitioned {
                continue;
            }

            // transitioned implies both inputs were present
            let (Some(location), Some(distance)) = (location, evaluation.distance) else {
                continue;
            };

            self.states.set(&subject.address, evaluation.state);
            info!(
                address = %subject.address,
                out_of_perimeter = evaluation.state.out_of_perimeter,
                distance,
                "perimeter_transition"
            );

            alerts.push(PerimeterAlert {
                address: subject.address.clone(),
                out_of_perimeter: evaluation.state.out_of_perimeter,
                distance,
                location,
                evaluated_at: now,
            });
        }

        debug!(
            subjects = self.config.subjects.len(),
            alerts = alerts.len(),
            "monitor_tick"
        );

        alerts
    }

    /// Build a series for a configured subject in its own time zone
    pub fn series(
        &self,
        records: &[TelemetryRecord],
        address: &str,
        metric: Metric,
        period: Period,
        reference: NaiveDateTime,
    ) -> Result<SeriesPayload, EngineError> {
        let subject = self
            .config
            .subject(address)
            .ok_or_else(|| EngineError::MissingField(format!("subject {}", address)))?;

        let request = SeriesRequest {
            device_address: subject.address.clone(),
            metric,
            period,
            reference,
            timezone: subject.timezone.clone(),
        };
        compute_series(records, &request, &self.converter, &self.encoder)
    }
}
