//! Process-wide configuration, read from the environment once at startup.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `STOVE_PORT` | `5050` |
//! | `STOVE_HOME_LAT` | `11.6854` |
//! | `STOVE_HOME_LON` | `76.1320` |
//! | `STOVE_DISTANCE_LIMIT_M` | `5` |
//! | `STOVE_VIDEO_PATH` | `frames` |
//! | `STOVE_PIXEL_THRESHOLD` | `500` |
//! | `STOVE_CYCLE_INTERVAL_MS` | `30` |
//!
//! Unset variables fall back to the default. A variable that is set but
//! cannot be parsed is an error rather than a silent fallback.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::alert::{AlertEvaluator, DEFAULT_DISTANCE_LIMIT_M};
use crate::geo::GeoCoordinate;
use crate::monitor::{DEFAULT_CYCLE_INTERVAL, MonitorConfig};
use crate::vision::{ColorBand, DEFAULT_PIXEL_THRESHOLD, FlameClassifier};

/// Default port if not specified via environment variable.
pub const DEFAULT_PORT: u16 = 5050;

/// Default home location.
pub const DEFAULT_HOME: GeoCoordinate = GeoCoordinate::new(11.6854, 76.1320);

/// Default frame source: a directory of still frames, decodable without OpenCV.
/// Point `STOVE_VIDEO_PATH` at a video file when built with the `opencv` feature.
pub const DEFAULT_VIDEO_PATH: &str = "frames";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{var} must be a finite, non-negative number, got {value:?}")]
    OutOfRange { var: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub home: GeoCoordinate,
    pub distance_limit_m: f64,
    pub video_path: PathBuf,
    pub pixel_threshold: u64,
    pub cycle_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            home: DEFAULT_HOME,
            distance_limit_m: DEFAULT_DISTANCE_LIMIT_M,
            video_path: PathBuf::from(DEFAULT_VIDEO_PATH),
            pixel_threshold: DEFAULT_PIXEL_THRESHOLD,
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
        }
    }
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let home_lat = parse_var(&lookup, "STOVE_HOME_LAT")?.unwrap_or(defaults.home.latitude);
        let home_lon = parse_var(&lookup, "STOVE_HOME_LON")?.unwrap_or(defaults.home.longitude);

        let distance_limit_m = match parse_var::<f64, _>(&lookup, "STOVE_DISTANCE_LIMIT_M")? {
            Some(limit) if !limit.is_finite() || limit < 0.0 => {
                return Err(ConfigError::OutOfRange {
                    var: "STOVE_DISTANCE_LIMIT_M",
                    value: limit.to_string(),
                });
            }
            Some(limit) => limit,
            None => defaults.distance_limit_m,
        };

        Ok(Self {
            port: parse_var(&lookup, "STOVE_PORT")?.unwrap_or(defaults.port),
            home: GeoCoordinate::new(home_lat, home_lon),
            distance_limit_m,
            video_path: lookup("STOVE_VIDEO_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.video_path),
            pixel_threshold: parse_var(&lookup, "STOVE_PIXEL_THRESHOLD")?
                .unwrap_or(defaults.pixel_threshold),
            cycle_interval: parse_var(&lookup, "STOVE_CYCLE_INTERVAL_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.cycle_interval),
        })
    }

    pub fn evaluator(&self) -> AlertEvaluator {
        AlertEvaluator::new(self.home, self.distance_limit_m)
    }

    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            source_path: self.video_path.clone(),
            classifier: FlameClassifier::new(ColorBand::FLAME, self.pixel_threshold),
            cycle_interval: self.cycle_interval,
        }
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
