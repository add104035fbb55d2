use chrono::{DateTime, Duration, Utc};

use crate::config::{AppConfig, ForecastSettings};
use crate::forecast::{self, TrainedModel};
use crate::models::{Command, Decision, DecisionRequest, HospitalAlert, PredictionResult};
use crate::notify::NotificationSink;
use crate::risk::{self, RiskClassifier};
use crate::routing::{self, RouteEvaluator};

pub struct Orchestrator {
    model: TrainedModel,
    classifier: RiskClassifier,
    router: RouteEvaluator,
    sink: Box<dyn NotificationSink>,
    settings: ForecastSettings,
}

impl Orchestrator {
    pub fn new(
        model: TrainedModel,
        classifier: RiskClassifier,
        router: RouteEvaluator,
        sink: Box<dyn NotificationSink>,
        settings: ForecastSettings,
    ) -> Self {
        Self {
            model,
            classifier,
            router,
            sink,
            settings,
        }
    }

    pub fn from_config(model: TrainedModel, config: &AppConfig, sink: Box<dyn NotificationSink>) -> Self {
        Self::new(
            model,
            RiskClassifier::new(config.risk, config.hospitals.clone()),
            RouteEvaluator::new(config.routing.routes.clone(), config.routing.penalties.clone()),
            sink,
            config.forecast.clone(),
        )
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Runs one decision. The prediction is always produced; routing only
    /// happens for an active hazard zone.
    pub fn decide(&self, request: &DecisionRequest, now: DateTime<Utc>) -> Decision {
        let prediction = self.predict(request, now);

        if risk::should_notify(prediction.risk_level) {
            tracing::warn!(
                area = %prediction.area_id,
                level = %prediction.risk_level,
                surge = prediction.surge,
                hospital = %prediction.hospital_target,
                "risk alert"
            );
            let alert = HospitalAlert {
                hospital_id: prediction.hospital_target.clone(),
                surge: prediction.surge,
                time_window: prediction.time_window,
            };
            if let Err(err) = self.sink.send(&alert) {
                tracing::warn!(hospital = %alert.hospital_id, error = %err, "hospital notification failed");
            }
        }

        if !request.hazard_zone.active {
            tracing::info!("no active hazard, proceeding on optimal path");
            return Decision {
                command: Command::OptimalPath,
                prediction,
                route_assessments: Vec::new(),
            };
        }

        let route_assessments =
            self.router
                .evaluate(&request.current, &request.destination, &request.hazard_zone);
        let command = match routing::select_safest(&route_assessments) {
            Some(route) => Command::Reroute(route.name.clone()),
            None => Command::ImmediateStop,
        };
        tracing::info!(command = %command, "active hazard handled");

        Decision {
            command,
            prediction,
            route_assessments,
        }
    }

    fn predict(&self, request: &DecisionRequest, now: DateTime<Utc>) -> PredictionResult {
        let surge = forecast::predict(&self.model, request.temperature_or_default(), request.density);
        let (risk_level, hospital_target) = self.classifier.classify(surge, &request.current);

        PredictionResult {
            area_id: request.area_id.clone(),
            time_window: forecast_window(now, self.settings.horizon_hours),
            risk_level,
            hazard_type: self.settings.hazard_type.clone(),
            hospital_target,
            surge,
        }
    }
}

/// `now + hours`, saturating at the latest representable instant.
fn forecast_window(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    Duration::try_hours(hours)
        .and_then(|horizon| now.checked_add_signed(horizon))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::TimeZone;

    use super::*;
    use crate::models::{HazardZone, Location, RiskLevel};

    /// Shares captured alerts with the test after the sink is boxed.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingSink {
        pub(crate) alerts: Arc<Mutex<Vec<HospitalAlert>>>,
    }

    impl NotificationSink for RecordingSink {
        fn send(&self, alert: &HospitalAlert) -> anyhow::Result<()> {
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn send(&self, _alert: &HospitalAlert) -> anyhow::Result<()> {
            anyhow::bail!("hospital gateway unreachable")
        }
    }

    /// The generating equation of the training data, without noise.
    pub(crate) fn reference_model() -> TrainedModel {
        TrainedModel {
            intercept: 0.0,
            temperature_coef: 0.8,
            density_coef: 1.5,
            train_size: 160,
            holdout_size: 40,
            holdout_rmse: Some(5.0),
        }
    }

    pub(crate) fn request(temperature: Option<f64>, density: f64, hazard_zone: HazardZone) -> DecisionRequest {
        DecisionRequest {
            area_id: "Current User Area".to_string(),
            current: Location::new(24.7150, 46.6750),
            destination: Location::new(24.7300, 46.7000),
            hazard_zone,
            density,
            temperature,
        }
    }

    fn decision_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 1, 12, 0, 0).unwrap()
    }

    fn orchestrator_with(model: TrainedModel, sink: Box<dyn NotificationSink>) -> Orchestrator {
        Orchestrator::from_config(model, &AppConfig::default(), sink)
    }

    fn scenario_zone() -> HazardZone {
        HazardZone {
            active: true,
            lat_min: Some(24.70),
            lat_max: Some(24.72),
            lng_min: Some(46.68),
            lng_max: Some(46.70),
        }
    }

    #[test]
    fn high_risk_active_hazard_reroutes_and_notifies() {
        let sink = RecordingSink::default();
        let orchestrator = orchestrator_with(reference_model(), Box::new(sink.clone()));

        let decision = orchestrator.decide(&request(Some(45.5), 8.5, scenario_zone()), decision_time());

        assert_eq!(decision.command, Command::Reroute("path_B".to_string()));
        assert_eq!(decision.prediction.surge, 49);
        assert_eq!(decision.prediction.risk_level, RiskLevel::High);
        assert_eq!(decision.prediction.hospital_target, "Riyadh Central");
        assert_eq!(
            decision.prediction.time_window,
            Utc.with_ymd_and_hms(2026, 7, 1, 16, 0, 0).unwrap()
        );
        assert_eq!(decision.route_assessments.len(), 3);

        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].surge, 49);
        assert_eq!(alerts[0].time_window, decision.prediction.time_window);
    }

    #[test]
    fn inactive_hazard_always_takes_optimal_path() {
        let sink = RecordingSink::default();
        let orchestrator = orchestrator_with(reference_model(), Box::new(sink.clone()));

        for (temperature, density) in [(36.0, 2.0), (45.5, 8.5), (0.0, 0.0)] {
            let decision = orchestrator.decide(
                &request(Some(temperature), density, HazardZone::default()),
                decision_time(),
            );
            assert_eq!(decision.command, Command::OptimalPath);
            assert!(decision.route_assessments.is_empty());
        }
    }

    #[test]
    fn low_risk_skips_the_hospital() {
        let model = TrainedModel {
            intercept: -30.0,
            ..reference_model()
        };
        let sink = RecordingSink::default();
        let orchestrator = orchestrator_with(model, Box::new(sink.clone()));

        let decision = orchestrator.decide(&request(Some(36.0), 2.0, HazardZone::default()), decision_time());

        assert_eq!(decision.command.to_string(), "OPTIMAL_PATH");
        assert_eq!(decision.prediction.surge, 2);
        assert_eq!(decision.prediction.risk_level, RiskLevel::Low);
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[test]
    fn fully_blocked_catalog_stops_movement() {
        let orchestrator = orchestrator_with(reference_model(), Box::new(RecordingSink::default()));
        let zone = HazardZone {
            active: true,
            lat_min: Some(24.60),
            lat_max: Some(24.80),
            lng_min: Some(46.60),
            lng_max: Some(46.80),
        };

        let decision = orchestrator.decide(&request(Some(40.0), 5.0, zone), decision_time());

        assert_eq!(decision.command, Command::ImmediateStop);
        assert!(decision.route_assessments.iter().all(|a| a.hazardous));
    }

    #[test]
    fn notification_failure_does_not_block_the_command() {
        let orchestrator = orchestrator_with(reference_model(), Box::new(FailingSink));

        let decision = orchestrator.decide(&request(Some(45.5), 8.5, scenario_zone()), decision_time());

        assert_eq!(decision.command.to_string(), "REROUTE:path_B");
        assert_eq!(decision.prediction.risk_level, RiskLevel::High);
    }

    #[test]
    fn missing_temperature_uses_default() {
        let orchestrator = orchestrator_with(reference_model(), Box::new(RecordingSink::default()));

        let decision = orchestrator.decide(&request(None, 2.0, HazardZone::default()), decision_time());

        // 0.8 * 30 + 1.5 * 2
        assert_eq!(decision.prediction.surge, 27);
        assert_eq!(decision.prediction.hazard_type, "Heat Exhaustion/Crowd Overload");
    }

    #[test]
    fn oversized_horizon_saturates_instead_of_panicking() {
        let config = AppConfig::default();
        let settings = ForecastSettings {
            horizon_hours: 10_000_000_000,
            ..config.forecast.clone()
        };
        let orchestrator = Orchestrator::new(
            reference_model(),
            RiskClassifier::new(config.risk, config.hospitals.clone()),
            RouteEvaluator::new(config.routing.routes.clone(), config.routing.penalties.clone()),
            Box::new(RecordingSink::default()),
            settings,
        );

        let decision = orchestrator.decide(&request(Some(36.0), 2.0, HazardZone::default()), decision_time());

        assert_eq!(decision.command, Command::OptimalPath);
        assert_eq!(decision.prediction.time_window, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn command_follows_the_cheapest_clear_assessment() {
        let orchestrator = orchestrator_with(reference_model(), Box::new(RecordingSink::default()));
        let zone = HazardZone {
            active: true,
            lat_min: Some(24.725),
            ..HazardZone::default()
        };

        let decision = orchestrator.decide(&request(Some(36.0), 2.0, zone), decision_time());

        let cheapest = routing::select_safest(&decision.route_assessments).map(|a| a.name.clone());
        assert_eq!(cheapest.as_deref(), Some("path_A"));
        assert_eq!(decision.command, Command::Reroute("path_A".to_string()));
    }
}
