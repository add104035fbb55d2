use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;
mod forecast;
mod models;
mod notify;
mod orchestrator;
mod report;
mod risk;
mod routing;
mod samples;

use crate::config::AppConfig;
use crate::models::{Decision, DecisionRequest, HazardZone, Location};
use crate::notify::{JsonLinesSink, NotificationSink, TracingSink};
use crate::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(name = "surge-route-dispatch")]
#[command(about = "Case surge forecasting and hazard-aware rerouting", long_about = None)]
struct Cli {
    /// JSON configuration overriding the built-in defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write synthetic training samples to CSV
    Generate {
        #[arg(long)]
        out: PathBuf,
        #[arg(long = "samples", default_value_t = 200)]
        count: usize,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Fit the surge model and print its coefficients
    Train {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Produce a dispatch command for the current conditions
    Decide(DecisionArgs),
    /// Generate a markdown decision report
    Report {
        #[command(flatten)]
        decision: DecisionArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Args)]
struct DecisionArgs {
    /// Training samples used to fit the model
    #[arg(long)]
    csv: PathBuf,
    #[arg(long, default_value = "Current User Area")]
    area_id: String,
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    lng: f64,
    #[arg(long, allow_hyphen_values = true)]
    dest_lat: f64,
    #[arg(long, allow_hyphen_values = true)]
    dest_lng: f64,
    #[arg(long)]
    density: f64,
    /// Defaults to 30 C when the weather feed has no reading
    #[arg(long, allow_hyphen_values = true)]
    temperature: Option<f64>,
    #[arg(long)]
    hazard_active: bool,
    #[arg(long, allow_hyphen_values = true)]
    lat_min: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    lat_max: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    lng_min: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    lng_max: Option<f64>,
    /// Append hospital notifications to this JSON-lines file
    #[arg(long)]
    alerts: Option<PathBuf>,
}

impl DecisionArgs {
    fn request(&self) -> anyhow::Result<DecisionRequest> {
        let request = DecisionRequest {
            area_id: self.area_id.clone(),
            current: Location::new(self.lat, self.lng),
            destination: Location::new(self.dest_lat, self.dest_lng),
            hazard_zone: HazardZone {
                active: self.hazard_active,
                lat_min: self.lat_min,
                lat_max: self.lat_max,
                lng_min: self.lng_min,
                lng_max: self.lng_max,
            },
            density: self.density,
            temperature: self.temperature,
        };
        request.validate().context("invalid decision input")?;
        Ok(request)
    }

    fn sink(&self) -> anyhow::Result<Box<dyn NotificationSink>> {
        match &self.alerts {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("failed to open alert log {}", path.display()))?;
                Ok(Box::new(JsonLinesSink::new(file)))
            }
            None => Ok(Box::new(TracingSink)),
        }
    }
}

fn build_orchestrator(config: &AppConfig, args: &DecisionArgs) -> anyhow::Result<Orchestrator> {
    let data = samples::load_csv(&args.csv)?;
    let model = forecast::fit(&data, &config.forecast.fit)
        .with_context(|| format!("cannot fit surge model from {}", args.csv.display()))?;
    Ok(Orchestrator::from_config(model, config, args.sink()?))
}

/// The only thing `decide` writes to stdout; everything else goes to the log.
fn dispatch_line(decision: &Decision) -> String {
    decision.command.to_string()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate { out, count, seed } => {
            let data = samples::generate(count, seed)?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            samples::write_samples(file, &data)?;
            println!("Wrote {} samples to {}.", data.len(), out.display());
        }
        Commands::Train { csv } => {
            let data = samples::load_csv(&csv)?;
            let model = forecast::fit(&data, &config.forecast.fit)
                .with_context(|| format!("cannot fit surge model from {}", csv.display()))?;
            println!(
                "surge = {:.4} + {:.4} * temperature + {:.4} * density",
                model.intercept, model.temperature_coef, model.density_coef
            );
            match model.holdout_rmse {
                Some(rmse) => println!(
                    "Trained on {} samples; holdout RMSE {:.2} over {} samples.",
                    model.train_size, rmse, model.holdout_size
                ),
                None => println!("Trained on {} samples; no holdout.", model.train_size),
            }
        }
        Commands::Decide(args) => {
            let request = args.request()?;
            let orchestrator = build_orchestrator(&config, &args)?;
            let decision = orchestrator.decide(&request, Utc::now());
            tracing::info!(
                prediction = %serde_json::to_string(&decision.prediction)?,
                "decision prediction"
            );
            println!("{}", dispatch_line(&decision));
        }
        Commands::Report { decision: args, out } => {
            let request = args.request()?;
            let orchestrator = build_orchestrator(&config, &args)?;
            let now = Utc::now();
            let decision = orchestrator.decide(&request, now);
            let report = report::build_report(&request, &decision, orchestrator.model(), now);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Command, PredictionResult, RiskLevel};

    fn decision(command: Command) -> Decision {
        Decision {
            command,
            prediction: PredictionResult {
                area_id: "Current User Area".to_string(),
                time_window: Utc::now(),
                risk_level: RiskLevel::High,
                hazard_type: "Heat Exhaustion/Crowd Overload".to_string(),
                hospital_target: "Riyadh Central".to_string(),
                surge: 49,
            },
            route_assessments: Vec::new(),
        }
    }

    #[test]
    fn dispatch_line_is_only_the_command_literal() {
        for command in [
            Command::Reroute("path_B".to_string()),
            Command::ImmediateStop,
            Command::OptimalPath,
        ] {
            let line = dispatch_line(&decision(command.clone()));
            assert_eq!(line.lines().count(), 1);
            assert_eq!(line.parse::<Command>(), Ok(command));
        }
    }

    #[test]
    fn nan_coordinates_are_rejected_before_fitting() {
        let args = Cli::try_parse_from([
            "surge-route-dispatch",
            "decide",
            "--csv",
            "missing.csv",
            "--lat",
            "NaN",
            "--lng",
            "46.675",
            "--dest-lat",
            "24.73",
            "--dest-lng",
            "46.70",
            "--density",
            "2",
        ])
        .unwrap();
        let Commands::Decide(args) = args.command else {
            panic!("expected decide");
        };
        let err = args.request().unwrap_err();
        assert!(format!("{err:#}").contains("lat must be a finite number"));
    }
}
