use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TrainingSample;

/// Intercept plus two slopes needs at least this many points to be determined.
pub const MIN_TRAINING_SAMPLES: usize = 3;

#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("need at least {required} training samples, found {found}")]
    TooFewSamples { found: usize, required: usize },
    #[error("sample {index} has a non-finite feature")]
    NonFiniteSample { index: usize },
    #[error("{0} has zero variance across the training samples")]
    ZeroVariance(&'static str),
    #[error("temperature and density are collinear across the training samples")]
    CollinearFeatures,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub intercept: f64,
    pub temperature_coef: f64,
    pub density_coef: f64,
    pub train_size: usize,
    pub holdout_size: usize,
    pub holdout_rmse: Option<f64>,
}

impl TrainedModel {
    fn raw(&self, temperature: f64, density: f64) -> f64 {
        self.intercept + self.temperature_coef * temperature + self.density_coef * density
    }
}

/// Least-squares fit of surge on temperature and density.
///
/// The same samples and seed always yield the same model. The held-out error
/// is diagnostic only and never feeds back into the coefficients.
pub fn fit(samples: &[TrainingSample], options: &FitOptions) -> Result<TrainedModel, ForecastError> {
    if samples.len() < MIN_TRAINING_SAMPLES {
        return Err(ForecastError::TooFewSamples {
            found: samples.len(),
            required: MIN_TRAINING_SAMPLES,
        });
    }

    if let Some(index) = samples
        .iter()
        .position(|s| !s.temperature.is_finite() || !s.density.is_finite())
    {
        return Err(ForecastError::NonFiniteSample { index });
    }

    let (train, holdout) = split(samples, options);
    let (intercept, temperature_coef, density_coef) = least_squares(&train)?;

    let mut model = TrainedModel {
        intercept,
        temperature_coef,
        density_coef,
        train_size: train.len(),
        holdout_size: holdout.len(),
        holdout_rmse: None,
    };

    if !holdout.is_empty() {
        let sum_sq: f64 = holdout
            .iter()
            .map(|s| (s.surge as f64 - model.raw(s.temperature, s.density)).powi(2))
            .sum();
        model.holdout_rmse = Some((sum_sq / holdout.len() as f64).sqrt());
    }

    tracing::info!(
        train = model.train_size,
        holdout = model.holdout_size,
        rmse = ?model.holdout_rmse,
        "surge model fitted"
    );

    Ok(model)
}

/// Expected surge for the given conditions, clamped at zero and rounded.
pub fn predict(model: &TrainedModel, temperature: f64, density: f64) -> u32 {
    let value = model.raw(temperature, density);
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let rounded = value.round();
    if rounded >= u32::MAX as f64 {
        u32::MAX
    } else {
        rounded as u32
    }
}

fn split(samples: &[TrainingSample], options: &FitOptions) -> (Vec<TrainingSample>, Vec<TrainingSample>) {
    let n = samples.len();
    let mut holdout_len = (n as f64 * options.test_fraction.clamp(0.0, 1.0)).ceil() as usize;
    if n.saturating_sub(holdout_len) < MIN_TRAINING_SAMPLES {
        holdout_len = 0;
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(options.seed);
    indices.shuffle(&mut rng);

    let holdout = indices[..holdout_len].iter().map(|&i| samples[i]).collect();
    let train = indices[holdout_len..].iter().map(|&i| samples[i]).collect();
    (train, holdout)
}

fn least_squares(samples: &[TrainingSample]) -> Result<(f64, f64, f64), ForecastError> {
    let n = samples.len() as f64;
    let mean_t = samples.iter().map(|s| s.temperature).sum::<f64>() / n;
    let mean_d = samples.iter().map(|s| s.density).sum::<f64>() / n;
    let mean_y = samples.iter().map(|s| s.surge as f64).sum::<f64>() / n;

    let (mut s_tt, mut s_dd, mut s_td, mut s_ty, mut s_dy) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for sample in samples {
        let t = sample.temperature - mean_t;
        let d = sample.density - mean_d;
        let y = sample.surge as f64 - mean_y;
        s_tt += t * t;
        s_dd += d * d;
        s_td += t * d;
        s_ty += t * y;
        s_dy += d * y;
    }

    if s_tt <= f64::EPSILON {
        return Err(ForecastError::ZeroVariance("temperature"));
    }
    if s_dd <= f64::EPSILON {
        return Err(ForecastError::ZeroVariance("density"));
    }

    let det = s_tt * s_dd - s_td * s_td;
    if det <= 1e-10 * s_tt * s_dd {
        return Err(ForecastError::CollinearFeatures);
    }

    let temperature_coef = (s_ty * s_dd - s_dy * s_td) / det;
    let density_coef = (s_dy * s_tt - s_ty * s_td) / det;
    let intercept = mean_y - temperature_coef * mean_t - density_coef * mean_d;
    Ok((intercept, temperature_coef, density_coef))
}
