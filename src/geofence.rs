//! Perimeter (geofence) evaluation
//!
//! Decides whether a subject is outside its configured circle and reports a
//! transition only when that answer changes. Callers persist the new state
//! and notify only when `transitioned` is set, which gives at most one
//! notification per crossing.

use crate::distance::planar_distance;
use crate::types::{Coordinate, Perimeter, PerimeterState};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Outcome of one perimeter evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerimeterEvaluation {
    /// State after this evaluation
    pub state: PerimeterState,
    /// True only when `state` differs from the state passed in
    pub transitioned: bool,
    /// Distance from the perimeter center, when both inputs were present
    pub distance: Option<f64>,
}

impl PerimeterEvaluation {
    fn unchanged(state: PerimeterState) -> Self {
        Self {
            state,
            transitioned: false,
            distance: None,
        }
    }
}

/// Stateless geofence evaluator
pub struct GeofenceEvaluator;

impl GeofenceEvaluator {
    /// Evaluate a subject's last known location against its perimeter.
    ///
    /// A missing perimeter or location leaves the state untouched.
    pub fn evaluate(
        perimeter: Option<&Perimeter>,
        location: Option<&Coordinate>,
        current: PerimeterState,
    ) -> PerimeterEvaluation {
        let (perimeter, location) = match (perimeter, location) {
            (Some(p), Some(l)) => (p, l),
            _ => return PerimeterEvaluation::unchanged(current),
        };

        let distance = planar_distance(location, &perimeter.center);
        let state = PerimeterState {
            out_of_perimeter: distance > perimeter.radius,
        };
        let transitioned = state != current;

        debug!(
            distance,
            radius = perimeter.radius,
            out_of_perimeter = state.out_of_perimeter,
            transitioned,
            "perimeter_evaluated"
        );

        PerimeterEvaluation {
            state,
            transitioned,
            distance: Some(distance),
        }
    }
}
