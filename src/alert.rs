//! Alert rule: a flame is burning and the user is farther from home than
//! the configured limit.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::{GeoCoordinate, distance};
use crate::state::FlameCell;

/// Default distance limit in meters.
pub const DEFAULT_DISTANCE_LIMIT_M: f64 = 5.0;

/// A coordinate report as received from a client. Either field may be missing.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LocationReport {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl LocationReport {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat: Some(lat),
            lon: Some(lon),
        }
    }

    /// The reported coordinate, if both fields are present.
    pub fn coordinate(&self) -> Option<GeoCoordinate> {
        Some(GeoCoordinate::new(self.lat?, self.lon?))
    }
}

/// The report was missing its latitude or longitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("location report is missing latitude or longitude")]
pub struct InvalidReport;

/// Combined flame/distance assessment for one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertResult {
    pub alert: bool,
    pub flame: bool,

    /// Distance from home in whole meters, truncated.
    pub distance: i64,

    pub message: String,
}

/// Evaluates reports against a fixed home location.
#[derive(Debug, Clone, Copy)]
pub struct AlertEvaluator {
    home: GeoCoordinate,
    distance_limit_m: f64,
}

impl AlertEvaluator {
    pub fn new(home: GeoCoordinate, distance_limit_m: f64) -> Self {
        Self {
            home,
            distance_limit_m,
        }
    }

    pub fn home(&self) -> GeoCoordinate {
        self.home
    }

    pub fn distance_limit_m(&self) -> f64 {
        self.distance_limit_m
    }

    /// Whether a flame at `distance_m` from home should raise an alert.
    ///
    /// Being exactly at the limit does not alert.
    pub fn should_alert(&self, flame: bool, distance_m: f64) -> bool {
        flame && distance_m > self.distance_limit_m
    }

    /// Assess a flame verdict against a reported position.
    pub fn evaluate(&self, flame: bool, reported: GeoCoordinate) -> AlertResult {
        let distance_m = distance(self.home, reported);
        self.assess(flame, distance_m)
    }

    /// Validate `report`, then assess it against the current verdict in `cell`.
    pub fn evaluate_report(
        &self,
        cell: &FlameCell,
        report: &LocationReport,
    ) -> Result<AlertResult, InvalidReport> {
        let reported = report.coordinate().ok_or(InvalidReport)?;
        let flame = cell.flame_detected();
        Ok(self.evaluate(flame, reported))
    }

    fn assess(&self, flame: bool, distance_m: f64) -> AlertResult {
        let alert = self.should_alert(flame, distance_m);
        let meters = distance_m as i64;

        AlertResult {
            alert,
            flame,
            distance: meters,
            message: alert_message(alert, flame, meters),
        }
    }
}

fn alert_message(alert: bool, flame: bool, meters: i64) -> String {
    if alert {
        format!("Flame detected! You are {}m away!", meters)
    } else {
        format!(
            "Safe. Flame: {} | Distance: {}m",
            if flame { "YES" } else { "NO" },
            meters
        )
    }
}
