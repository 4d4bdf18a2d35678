//! Perimeter state persistence
//!
//! Keeps the last known in/out-of-perimeter state per subject so a periodic
//! caller can load it before a tick and save it afterwards.

use crate::types::PerimeterState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Perimeter state of every subject seen so far, keyed by address
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerimeterStateStore {
    states: BTreeMap<String, PerimeterState>,
}

impl PerimeterStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a subject; subjects never evaluated are inside
    pub fn get(&self, address: &str) -> PerimeterState {
        self.states.get(address).copied().unwrap_or_default()
    }

    /// Record a subject's new state
    pub fn set(&mut self, address: &str, state: PerimeterState) {
        self.states.insert(address.to_string(), state);
    }

    /// Number of subjects with a stored state
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Addresses currently outside their perimeter
    pub fn outside(&self) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(|(_, state)| state.out_of_perimeter)
            .map(|(address, _)| address.as_str())
    }

    /// Load state store from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize state store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
