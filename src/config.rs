use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::forecast::FitOptions;
use crate::models::{Location, Route};
use crate::risk::{Hospital, RiskThresholds};

pub const MAX_HORIZON_HOURS: i64 = 24 * 365;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("at least one hospital must be registered")]
    NoHospitals,
    #[error("route catalog is empty")]
    NoRoutes,
    #[error("route {0} has no waypoints")]
    EmptyRoute(String),
    #[error("route {0} is listed more than once")]
    DuplicateRoute(String),
    #[error("penalty configured for unknown route {0}")]
    UnknownPenaltyRoute(String),
    #[error("moderate threshold {moderate} must be below high threshold {high}")]
    ThresholdOrder { moderate: u32, high: u32 },
    #[error("test fraction {0} must be within [0, 1)")]
    TestFraction(f64),
    #[error("forecast horizon must be between 1 and 8760 hours, got {0}")]
    Horizon(i64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastSettings {
    pub fit: FitOptions,
    pub horizon_hours: i64,
    pub hazard_type: String,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            fit: FitOptions::default(),
            horizon_hours: 4,
            hazard_type: "Heat Exhaustion/Crowd Overload".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub routes: Vec<Route>,
    /// Fixed extra cost per route name, e.g. tolls or known congestion.
    pub penalties: BTreeMap<String, f64>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let route = |name: &str, points: [(f64, f64); 3]| Route {
            name: name.to_string(),
            waypoints: points
                .iter()
                .map(|&(lat, lng)| Location::new(lat, lng))
                .collect(),
        };

        Self {
            routes: vec![
                route("path_A", [(24.71, 46.67), (24.71, 46.68), (24.70, 46.69)]),
                route("path_B", [(24.72, 46.66), (24.70, 46.67), (24.69, 46.68)]),
                route("path_C", [(24.73, 46.69), (24.71, 46.69), (24.70, 46.70)]),
            ],
            penalties: BTreeMap::from([("path_C".to_string(), 3.0)]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub forecast: ForecastSettings,
    pub risk: RiskThresholds,
    pub hospitals: Vec<Hospital>,
    pub routing: RoutingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            forecast: ForecastSettings::default(),
            risk: RiskThresholds::default(),
            hospitals: vec![
                Hospital {
                    id: "Riyadh Central".to_string(),
                    location: Location::new(24.7000, 46.6800),
                },
                Hospital {
                    id: "East Health Center".to_string(),
                    location: Location::new(24.7500, 46.7200),
                },
            ],
            routing: RoutingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Built-in defaults when no path is given, otherwise a JSON file whose
    /// missing sections fall back to those defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("invalid config {}", path.display()))?
            }
            None => AppConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hospitals.is_empty() {
            return Err(ConfigError::NoHospitals);
        }
        if self.routing.routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }

        let mut seen = HashSet::new();
        for route in &self.routing.routes {
            if route.waypoints.is_empty() {
                return Err(ConfigError::EmptyRoute(route.name.clone()));
            }
            if !seen.insert(route.name.as_str()) {
                return Err(ConfigError::DuplicateRoute(route.name.clone()));
            }
        }
        if let Some(name) = self
            .routing
            .penalties
            .keys()
            .find(|name| !seen.contains(name.as_str()))
        {
            return Err(ConfigError::UnknownPenaltyRoute(name.clone()));
        }

        if self.risk.moderate >= self.risk.high {
            return Err(ConfigError::ThresholdOrder {
                moderate: self.risk.moderate,
                high: self.risk.high,
            });
        }

        let fraction = self.forecast.fit.test_fraction;
        if !(0.0..1.0).contains(&fraction) {
            return Err(ConfigError::TestFraction(fraction));
        }
        if !(1..=MAX_HORIZON_HOURS).contains(&self.forecast.horizon_hours) {
            return Err(ConfigError::Horizon(self.forecast.horizon_hours));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.routing.routes.len(), 3);
        assert_eq!(config.forecast.horizon_hours, 4);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "risk": { "high": 20 }, "forecast": { "horizon_hours": 6 } }"#)
                .unwrap();
        assert_eq!(config.risk, RiskThresholds { high: 20, moderate: 5 });
        assert_eq!(config.forecast.horizon_hours, 6);
        assert_eq!(config.forecast.fit.seed, 42);
        assert_eq!(config.hospitals.len(), 2);
    }

    #[test]
    fn rejects_empty_registries() {
        let mut config = AppConfig::default();
        config.hospitals.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoHospitals));

        let mut config = AppConfig::default();
        config.routing.routes.clear();
        assert_eq!(config.validate(), Err(ConfigError::NoRoutes));
    }

    #[test]
    fn rejects_bad_routes() {
        let mut config = AppConfig::default();
        config.routing.routes[1].waypoints.clear();
        assert_eq!(
            config.validate(),
            Err(ConfigError::EmptyRoute("path_B".to_string()))
        );

        let mut config = AppConfig::default();
        config.routing.routes[2].name = "path_A".to_string();
        config.routing.penalties.clear();
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateRoute("path_A".to_string()))
        );

        let mut config = AppConfig::default();
        config.routing.penalties.insert("path_Z".to_string(), 1.0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownPenaltyRoute("path_Z".to_string()))
        );
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let mut config = AppConfig::default();
        config.risk = RiskThresholds { high: 5, moderate: 5 };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ThresholdOrder { moderate: 5, high: 5 })
        );
    }

    #[test]
    fn rejects_bad_forecast_settings() {
        let mut config = AppConfig::default();
        config.forecast.fit.test_fraction = 1.0;
        assert_eq!(config.validate(), Err(ConfigError::TestFraction(1.0)));

        let mut config = AppConfig::default();
        config.forecast.horizon_hours = 0;
        assert_eq!(config.validate(), Err(ConfigError::Horizon(0)));

        let mut config = AppConfig::default();
        config.forecast.horizon_hours = 10_000_000_000;
        assert_eq!(config.validate(), Err(ConfigError::Horizon(10_000_000_000)));

        config.forecast.horizon_hours = MAX_HORIZON_HOURS;
        assert_eq!(config.validate(), Ok(()));
    }
}
