//! carewatch.telemetry.v1 input schema
//!
//! This module defines the timestamped sensor records the engine consumes
//! and the adapter that parses, validates and selects them.

mod adapter;
mod record;

pub use adapter::*;
pub use record::*;
