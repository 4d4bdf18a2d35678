//! Monitor configuration
//!
//! Subjects, their time zones and their perimeters are configured out of band
//! and handed to the engine as a JSON document:
//!
//! ```json
//! {
//!   "subjects": [
//!     {
//!       "address": "AA:BB:CC:00:11:22",
//!       "timezone": "Europe/London",
//!       "perimeter": { "center": { "latitude": 51.5, "longitude": -0.12 }, "radius": 0.01 }
//!     }
//!   ]
//! }
//! ```

use crate::error::EngineError;
use crate::timezone::TimeZoneConverter;
use crate::types::Perimeter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn default_timezone() -> String {
    "UTC".to_string()
}

/// One tracked subject, identified by its device address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectConfig {
    pub address: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// No perimeter means geofencing stays inert for this subject
    #[serde(default)]
    pub perimeter: Option<Perimeter>,
}

/// Configuration for the periodic monitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub subjects: Vec<SubjectConfig>,
}

impl MonitorConfig {
    /// Parse configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let json = fs::read_to_string(path).map_err(|e| {
            EngineError::ParseError(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Check addresses, perimeters and time zones
    pub fn validate(&self, converter: &dyn TimeZoneConverter) -> Result<(), EngineError> {
        let mut seen = HashSet::new();

        for subject in &self.subjects {
            if subject.address.trim().is_empty() {
                return Err(EngineError::MissingField("subjects[].address".to_string()));
            }
            if !seen.insert(subject.address.as_str()) {
                return Err(EngineError::ParseError(format!(
                    "Duplicate subject address: {}",
                    subject.address
                )));
            }
            if let Some(perimeter) = &subject.perimeter {
                perimeter.validate()?;
            }
            converter.validate(&subject.timezone)?;
        }

        Ok(())
    }

    pub fn subject(&self, address: &str) -> Option<&SubjectConfig> {
        self.subjects.iter().find(|s| s.address == address)
    }
}
