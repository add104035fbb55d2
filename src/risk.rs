use serde::{Deserialize, Serialize};

use crate::models::{Location, RiskLevel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Surges at or above this are HIGH.
    pub high: u32,
    /// Surges strictly above this (and below `high`) are MODERATE.
    pub moderate: u32,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high: 15,
            moderate: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: String,
    pub location: Location,
}

#[derive(Debug, Clone)]
pub struct RiskClassifier {
    thresholds: RiskThresholds,
    hospitals: Vec<Hospital>,
}

impl RiskClassifier {
    /// `hospitals` must be non-empty; `AppConfig::validate` enforces this.
    pub fn new(thresholds: RiskThresholds, hospitals: Vec<Hospital>) -> Self {
        Self {
            thresholds,
            hospitals,
        }
    }

    pub fn classify(&self, surge: u32, location: &Location) -> (RiskLevel, String) {
        let level = self.classify_level(surge);
        let target = self
            .nearest_hospital(location)
            .map(|hospital| hospital.id.clone())
            .unwrap_or_default();
        (level, target)
    }

    pub fn classify_level(&self, surge: u32) -> RiskLevel {
        if surge >= self.thresholds.high {
            RiskLevel::High
        } else if surge > self.thresholds.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    /// Closest registered hospital; ties go to the earlier registry entry.
    pub fn nearest_hospital(&self, location: &Location) -> Option<&Hospital> {
        let mut best: Option<(&Hospital, f64)> = None;
        for hospital in &self.hospitals {
            let distance = location.distance_to(&hospital.location);
            match best {
                Some((_, closest)) if distance >= closest => {}
                _ => best = Some((hospital, distance)),
            }
        }
        best.map(|(hospital, _)| hospital)
    }
}

pub fn should_notify(level: RiskLevel) -> bool {
    matches!(level, RiskLevel::Moderate | RiskLevel::High)
}
