/// Experiment 2 - range coherence.
///
/// The decisive test that the 8-16 kHz energy really is the folded second
/// harmonic. Frequency doubling turns the 16->20 kHz transmission into
/// 32->40 kHz, and folding through Nyquist reverses the sweep: a genuine
/// alias must present as a 16->8 kHz *downchirp*. Random in-band noise
/// correlates equally with either sweep direction; the alias correlates
/// preferentially with the matching one, and its peak lag is the round-trip
/// delay of the reflection.

use serde::Serialize;

use crate::audio::chirp::{alias_reference, wrong_direction_reference};
use crate::dsp::correlate::{cross_correlate, median_abs, peak_abs_from};
use crate::dsp::spectrum::POWER_FLOOR;
use crate::pipeline::{band_isolate, CalibrationTemplate, ProbeParams, SPEED_OF_SOUND};

#[derive(Debug, Clone, Serialize)]
pub struct RangeCoherence {
    pub peak_sample: usize,
    pub distance_mm: f64,
    pub alias_peak_strength: f64,
    pub direction_ratio: f64,
    pub passed: bool,
}

impl RangeCoherence {
    fn failed() -> Self {
        Self {
            peak_sample: 0,
            distance_mm: 0.0,
            alias_peak_strength: 0.0,
            direction_ratio: 0.0,
            passed: false,
        }
    }
}

pub fn run(
    averaged: &[f32],
    valid_cycles: usize,
    calibration: Option<&CalibrationTemplate>,
    sample_rate: f32,
    params: &ProbeParams,
) -> RangeCoherence {
    if valid_cycles == 0 || averaged.len() < params.chirp_len {
        return RangeCoherence::failed();
    }

    let alias_signal = band_isolate(averaged, params.alias_band, calibration, sample_rate, params);

    // Matched-filter references: the predicted fold direction and its mirror.
    let alias_ref = alias_reference(params.alias_band, params.chirp_len, sample_rate);
    let wrong_ref = wrong_direction_reference(params.alias_band, params.chirp_len, sample_rate);

    let corr_alias = cross_correlate(&alias_signal, &alias_ref);
    let corr_wrong = cross_correlate(&alias_signal, &wrong_ref);

    let (peak_sample, correct_mag) = peak_abs_from(&corr_alias, params.skip_lags);
    let (_, wrong_mag) = peak_abs_from(&corr_wrong, params.skip_lags);
    let noise_floor = median_abs(&corr_alias);

    let alias_peak_strength = correct_mag as f64 / (noise_floor as f64).max(POWER_FLOOR);
    let direction_ratio = correct_mag as f64 / (wrong_mag as f64).max(POWER_FLOOR);
    let distance_mm =
        peak_sample as f64 / sample_rate as f64 * SPEED_OF_SOUND / 2.0 * 1000.0;
    tracing::debug!(
        peak_sample,
        alias_peak_strength,
        direction_ratio,
        distance_mm,
        "range coherence"
    );

    RangeCoherence {
        peak_sample,
        distance_mm,
        alias_peak_strength,
        direction_ratio,
        passed: alias_peak_strength > params.peak_median_threshold
            && direction_ratio > params.direction_threshold,
    }
}
