/// Experiment 1 - alias detection.
///
/// Compares alias-band (8-16 kHz) power while the chirp is sounding against
/// the same band during the guard silence of the same cycle. Energy that is
/// present only while the transmitter is active is time-locked to the
/// transmission and cannot be ambient noise.

use serde::Serialize;

use crate::dsp::spectrum::{band_power, power_spectrum, POWER_FLOOR};
use crate::pipeline::ProbeParams;

#[derive(Debug, Clone, Serialize)]
pub struct AliasDetection {
    pub fundamental_db: f64,
    pub alias_db: f64,
    pub noise_db: f64,
    pub snr_db: f64,
    pub alias_below_fundamental_db: f64,
    pub passed: bool,
}

impl AliasDetection {
    fn failed() -> Self {
        Self {
            fundamental_db: 0.0,
            alias_db: 0.0,
            noise_db: 0.0,
            snr_db: 0.0,
            alias_below_fundamental_db: 0.0,
            passed: false,
        }
    }
}

fn to_db(power: f64) -> f64 {
    10.0 * power.max(POWER_FLOOR).log10()
}

pub fn run(
    recording: &[f32],
    onsets: &[usize],
    sample_rate: f32,
    params: &ProbeParams,
) -> AliasDetection {
    let cycle_len = params.cycle_len();
    let mut alias_on = 0.0f64;
    let mut alias_off = 0.0f64;
    let mut fundamental = 0.0f64;
    let mut cycles = 0usize;

    for &onset in onsets {
        if onset + cycle_len > recording.len() {
            continue;
        }
        let chirp_window = &recording[onset..onset + params.chirp_len];
        let guard_window = &recording[onset + params.chirp_len..onset + cycle_len];
        let on_spectrum = power_spectrum(chirp_window, params.fft_size);
        let off_spectrum = power_spectrum(guard_window, params.fft_size);

        alias_on += band_power(&on_spectrum, params.alias_band, sample_rate);
        alias_off += band_power(&off_spectrum, params.alias_band, sample_rate);
        fundamental += band_power(&on_spectrum, params.fundamental_band, sample_rate);
        cycles += 1;
    }

    if cycles == 0 {
        return AliasDetection::failed();
    }

    let fundamental_db = to_db(fundamental / cycles as f64);
    let alias_db = to_db(alias_on / cycles as f64);
    let noise_db = to_db(alias_off / cycles as f64);
    let snr_db = alias_db - noise_db;
    tracing::debug!(fundamental_db, alias_db, noise_db, snr_db, cycles, "alias detection");

    AliasDetection {
        fundamental_db,
        alias_db,
        noise_db,
        snr_db,
        alias_below_fundamental_db: fundamental_db - alias_db,
        passed: snr_db > params.snr_threshold_db,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_onsets_fails_cleanly() {
        let params = ProbeParams::default();
        let recording = vec![0.0f32; 10_000];
        let result = run(&recording, &[], 48000.0, &params);
        assert!(!result.passed);
        assert_eq!(result.snr_db, 0.0);
    }

    #[test]
    fn test_all_onsets_out_of_bounds_fails_cleanly() {
        let params = ProbeParams::default();
        let recording = vec![0.0f32; 100];
        let result = run(&recording, &[0, 50], 48000.0, &params);
        assert!(!result.passed);
        assert_eq!(result.fundamental_db, 0.0);
    }

    #[test]
    fn test_silence_has_no_alias_snr() {
        let params = ProbeParams::default();
        let recording = vec![0.0f32; 2 * params.cycle_len()];
        let result = run(&recording, &[0], 48000.0, &params);
        assert!(!result.passed);
        // Both windows bottom out at the power floor
        assert!(result.snr_db.abs() < 1e-9);
    }
}
