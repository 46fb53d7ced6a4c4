//! Vessel telemetry consumed by criterion evaluators.

use serde::{Deserialize, Serialize};

/// Read-only snapshot of the tracked vessel for one tick.
///
/// Apsides are raw distances from the body centre, in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VesselTelemetry {
    pub vessel_id: String,

    /// Body the vessel is currently orbiting.
    pub body_id: String,

    pub apoapsis: f64,

    pub periapsis: f64,

    /// Mean radius of the orbited body.
    pub body_radius: f64,
}

impl VesselTelemetry {
    /// Apoapsis above the body's mean surface.
    pub fn apoapsis_altitude(&self) -> f64 {
        self.apoapsis - self.body_radius
    }

    /// Periapsis above the body's mean surface.
    pub fn periapsis_altitude(&self) -> f64 {
        self.periapsis - self.body_radius
    }
}
