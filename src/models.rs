use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TEMPERATURE_C: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub temperature: f64,
    pub density: f64,
    pub surge: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Planar distance over raw degrees.
    pub fn distance_to(&self, other: &Location) -> f64 {
        ((self.lat - other.lat).powi(2) + (self.lng - other.lng).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HazardZone {
    pub active: bool,
    #[serde(default)]
    pub lat_min: Option<f64>,
    #[serde(default)]
    pub lat_max: Option<f64>,
    #[serde(default)]
    pub lng_min: Option<f64>,
    #[serde(default)]
    pub lng_max: Option<f64>,
}

impl HazardZone {
    /// Inclusive on every edge; a missing bound never rejects.
    pub fn contains(&self, point: &Location) -> bool {
        self.lat_min.map_or(true, |min| point.lat >= min)
            && self.lat_max.map_or(true, |max| point.lat <= max)
            && self.lng_min.map_or(true, |min| point.lng >= min)
            && self.lng_max.map_or(true, |max| point.lng <= max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub waypoints: Vec<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub area_id: String,
    pub time_window: DateTime<Utc>,
    pub risk_level: RiskLevel,
    pub hazard_type: String,
    pub hospital_target: String,
    pub surge: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HospitalAlert {
    pub hospital_id: String,
    pub surge: u32,
    pub time_window: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reroute(String),
    ImmediateStop,
    OptimalPath,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Reroute(route) => write!(f, "REROUTE:{route}"),
            Command::ImmediateStop => f.write_str("IMMEDIATE_STOP"),
            Command::OptimalPath => f.write_str("OPTIMAL_PATH"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized command {0:?}")]
pub struct CommandParseError(pub String);

impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "IMMEDIATE_STOP" => Ok(Command::ImmediateStop),
            "OPTIMAL_PATH" => Ok(Command::OptimalPath),
            other => match other.strip_prefix("REROUTE:") {
                Some(route) if !route.is_empty() => Ok(Command::Reroute(route.to_string())),
                _ => Err(CommandParseError(other.to_string())),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionRequest {
    pub area_id: String,
    pub current: Location,
    pub destination: Location,
    pub hazard_zone: HazardZone,
    pub density: f64,
    pub temperature: Option<f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("{field} must be a finite number")]
    NonFinite { field: &'static str },
    #[error("density must be non-negative, got {0}")]
    NegativeDensity(f64),
}

impl DecisionRequest {
    pub fn temperature_or_default(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE_C)
    }

    /// Rejects NaN and infinite inputs, which would otherwise poison route
    /// costs and the forecast.
    pub fn validate(&self) -> Result<(), RequestError> {
        let zone = &self.hazard_zone;
        let fields = [
            ("lat", Some(self.current.lat)),
            ("lng", Some(self.current.lng)),
            ("dest_lat", Some(self.destination.lat)),
            ("dest_lng", Some(self.destination.lng)),
            ("density", Some(self.density)),
            ("temperature", self.temperature),
            ("lat_min", zone.lat_min),
            ("lat_max", zone.lat_max),
            ("lng_min", zone.lng_min),
            ("lng_max", zone.lng_max),
        ];
        for (field, value) in fields {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(RequestError::NonFinite { field });
            }
        }
        if self.density < 0.0 {
            return Err(RequestError::NegativeDensity(self.density));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteAssessment {
    pub name: String,
    pub hazardous: bool,
    /// Only scored when the route is clear.
    pub cost: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub command: Command,
    pub prediction: PredictionResult,
    pub route_assessments: Vec<RouteAssessment>,
}
