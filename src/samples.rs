use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::models::TrainingSample;

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Temperature_C")]
    temperature: f64,
    #[serde(rename = "Crowd_Density", alias = "Crowd_Density_P_sqm")]
    density: f64,
    #[serde(rename = "Predicted_Case_Surge")]
    surge: u32,
}

pub fn load_csv(csv_path: &Path) -> anyhow::Result<Vec<TrainingSample>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    read_samples(file).with_context(|| format!("failed to parse {}", csv_path.display()))
}

pub fn read_samples<R: Read>(input: R) -> anyhow::Result<Vec<TrainingSample>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut samples = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("bad sample row {}", line + 1))?;
        samples.push(TrainingSample {
            temperature: row.temperature,
            density: row.density,
            surge: row.surge,
        });
    }

    Ok(samples)
}

pub fn write_samples<W: Write>(output: W, samples: &[TrainingSample]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(output);
    for sample in samples {
        writer.serialize(CsvRow {
            temperature: sample.temperature,
            density: sample.density,
            surge: sample.surge,
        })?;
    }
    writer.flush()?;
    Ok(())
}

const NOISE_STD_DEV: f64 = 5.0;

/// Synthetic field data: `0.8 * T + 1.5 * D` plus Gaussian noise (sigma 5),
/// with `T` in [35, 50) and `D` in [1, 10).
pub fn generate(count: usize, seed: u64) -> anyhow::Result<Vec<TrainingSample>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, NOISE_STD_DEV).context("invalid noise distribution")?;

    let samples = (0..count)
        .map(|_| {
            let temperature = rng.random_range(35.0..50.0);
            let density = rng.random_range(1.0..10.0);
            let surge = 0.8 * temperature + 1.5 * density + noise.sample(&mut rng);
            TrainingSample {
                temperature,
                density,
                surge: surge.round().max(0.0) as u32,
            }
        })
        .collect();

    Ok(samples)
}
