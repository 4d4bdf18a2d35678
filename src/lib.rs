//! Carewatch - Time-windowed vitals aggregation and geofencing for elder-care wearables
//!
//! Carewatch turns raw wearable telemetry into dense, gap-filled series over a
//! local-time window (hour, day or week) and tracks whether each subject is
//! inside its configured perimeter:
//! record parsing → device/metric selection → slot bucketing → series encoding,
//! and last known location → perimeter evaluation → transition alerts.
//!
//! Window boundaries are computed in the subject's own time zone and
//! converted to UTC once, so the same query gives the same slots on any host.

pub mod aggregator;
pub mod config;
pub mod distance;
pub mod encoder;
pub mod error;
pub mod geofence;
pub mod period;
pub mod pipeline;
pub mod schema;
pub mod state;
pub mod timezone;
pub mod types;
pub mod vitals;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use aggregator::{aggregate_by_period, SlotAggregator};
pub use config::{MonitorConfig, SubjectConfig};
pub use error::EngineError;
pub use geofence::{GeofenceEvaluator, PerimeterEvaluation};
pub use period::Period;
pub use pipeline::{compute_series, evaluate_perimeter, vitals_series, MonitorProcessor};
pub use state::PerimeterStateStore;
pub use timezone::{FixedOffsetZones, SystemTimeZones, TimeZoneConverter};
pub use types::{Coordinate, Metric, Perimeter, PerimeterAlert, PerimeterState, SlotSummary};

// Schema exports
pub use schema::{RecordAdapter, TelemetryRecord, SCHEMA_VERSION};

/// Carewatch version embedded in all series payloads
pub const CAREWATCH_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for series payloads
pub const PRODUCER_NAME: &str = "carewatch";
