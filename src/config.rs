use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Playback amplitude of the probe chirp, 0.0 - 1.0.
    pub amplitude: f32,
    /// Number of chirp cycles per probe run.
    pub num_cycles: usize,
    /// Preferred input device, matched by case-insensitive name prefix.
    /// Falls back to the system default input device when unset.
    pub input_device: Option<String>,
    /// Preferred output device, matched by case-insensitive name prefix.
    pub output_device: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            amplitude: std::env::var("SONAR_AMPLITUDE")
                .unwrap_or_else(|_| "1.0".into())
                .parse()
                .context("SONAR_AMPLITUDE must be a number between 0.0 and 1.0")?,
            num_cycles: std::env::var("SONAR_CYCLES")
                .unwrap_or_else(|_| "200".into())
                .parse()
                .context("SONAR_CYCLES must be a positive integer")?,
            input_device: std::env::var("SONAR_INPUT_DEVICE").ok(),
            output_device: std::env::var("SONAR_OUTPUT_DEVICE").ok(),
        })
    }
}
