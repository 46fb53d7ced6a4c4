//! Criterion evaluators.
//!
//! Each leaf kind implements [`Criterion`]: it ingests the tick's telemetry
//! into its live fields and tests those fields against its bounds. The
//! free functions at the bottom dispatch over [`CriterionSpec`].

use covenant_core::{CriterionSpec, LiveState, OrbitBounds, OrbitLive, VesselTelemetry};

/// Capability interface of a criterion leaf kind.
pub trait Criterion {
    /// Live fields refreshed from telemetry.
    type Live;

    /// Copy the relevant parts of `telemetry` into `live`.
    fn refresh_live_state(&self, live: &mut Self::Live, telemetry: &VesselTelemetry);

    /// Pure achievement test over the live fields.
    fn is_satisfied(&self, live: &Self::Live) -> bool;
}

/// A bound that is unset or NaN does not constrain.
fn bound(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}

/// `min <= value <= max` over the defined bounds only.
fn within(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    let (min, max) = (bound(min), bound(max));
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.map_or(true, |min| value >= min) && max.map_or(true, |max| value <= max)
}

impl Criterion for OrbitBounds {
    type Live = OrbitLive;

    fn refresh_live_state(&self, live: &mut OrbitLive, telemetry: &VesselTelemetry) {
        live.apoapsis = Some(telemetry.apoapsis_altitude());
        live.periapsis = Some(telemetry.periapsis_altitude());
        live.body_id = Some(telemetry.body_id.clone());
    }

    fn is_satisfied(&self, live: &OrbitLive) -> bool {
        let body_matches = match self.target_body.as_deref().filter(|b| !b.is_empty()) {
            Some(target) => live.body_id.as_deref() == Some(target),
            None => true,
        };

        body_matches
            && within(live.apoapsis, self.min_apoapsis, self.max_apoapsis)
            && within(live.periapsis, self.min_periapsis, self.max_periapsis)
    }
}

/// Fresh live fields for a leaf of kind `spec`.
pub fn initial_live_state(spec: &CriterionSpec) -> LiveState {
    match spec {
        CriterionSpec::Orbit(_) => LiveState::Orbit(OrbitLive::default()),
    }
}

/// Refresh `live` from `telemetry` according to `spec`.
pub fn refresh_live_state(spec: &CriterionSpec, live: &mut LiveState, telemetry: &VesselTelemetry) {
    match (spec, live) {
        (CriterionSpec::Orbit(bounds), LiveState::Orbit(orbit)) => {
            bounds.refresh_live_state(orbit, telemetry)
        }
    }
}

/// Achievement test for `live` against `spec`.
pub fn is_satisfied(spec: &CriterionSpec, live: &LiveState) -> bool {
    match (spec, live) {
        (CriterionSpec::Orbit(bounds), LiveState::Orbit(orbit)) => bounds.is_satisfied(orbit),
    }
}
