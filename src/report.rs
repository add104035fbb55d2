use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::forecast::TrainedModel;
use crate::models::{Command, Decision, DecisionRequest};
use crate::risk;

pub fn build_report(
    request: &DecisionRequest,
    decision: &Decision,
    model: &TrainedModel,
    generated_at: DateTime<Utc>,
) -> String {
    let prediction = &decision.prediction;
    let mut output = String::new();

    let _ = writeln!(output, "# Surge Dispatch Report");
    let _ = writeln!(
        output,
        "Generated for {} at {}",
        prediction.area_id,
        generated_at.to_rfc3339()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Conditions");
    let _ = writeln!(
        output,
        "- Temperature: {:.1} C{}",
        request.temperature_or_default(),
        if request.temperature.is_none() {
            " (default, feed omitted it)"
        } else {
            ""
        }
    );
    let _ = writeln!(output, "- Crowd density: {:.2} per m2", request.density);
    let _ = writeln!(
        output,
        "- Position ({:.4}, {:.4}) heading to ({:.4}, {:.4})",
        request.current.lat, request.current.lng, request.destination.lat, request.destination.lng
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Forecast");
    let _ = writeln!(
        output,
        "- Expected surge: ~{} cases by {}",
        prediction.surge,
        prediction.time_window.to_rfc3339()
    );
    let _ = writeln!(output, "- Risk level: {}", prediction.risk_level);
    let _ = writeln!(output, "- Hazard type: {}", prediction.hazard_type);
    if risk::should_notify(prediction.risk_level) {
        let _ = writeln!(output, "- Hospital alerted: {}", prediction.hospital_target);
    } else {
        let _ = writeln!(output, "- No hospital alert ({} nearest)", prediction.hospital_target);
    }
    let _ = writeln!(
        output,
        "- Model: surge = {:.3} + {:.3} * temp + {:.3} * density (holdout RMSE {})",
        model.intercept,
        model.temperature_coef,
        model.density_coef,
        model
            .holdout_rmse
            .map(|rmse| format!("{rmse:.2}"))
            .unwrap_or_else(|| "n/a".to_string())
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Routing");

    if decision.route_assessments.is_empty() {
        let _ = writeln!(output, "No active hazard zone reported.");
    } else {
        for assessment in decision.route_assessments.iter() {
            match assessment.cost {
                Some(cost) => {
                    let _ = writeln!(output, "- {}: clear, cost {:.4}", assessment.name, cost);
                }
                None => {
                    let _ = writeln!(output, "- {}: crosses hazard zone", assessment.name);
                }
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Command");
    let _ = writeln!(output, "`{}`", decision.command);
    if decision.command == Command::ImmediateStop {
        let _ = writeln!(output, "No safe route found. Stop movement.");
    }

    output
}
