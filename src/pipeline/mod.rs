/// Batch analysis pipeline: coherent cycle averaging, band isolation,
/// calibration subtraction, and the three probe experiments.
///
/// The public surface is two pure functions, `calibrate` and `analyze`.
/// Both take a complete recording and share no state; the calibration
/// template is an explicit argument, never a singleton. Callers should keep
/// these off any latency-sensitive thread: a full analysis runs ~200
/// refinement correlations plus several full-segment transforms.

pub mod alias;
pub mod average;
pub mod coherence;
pub mod onsets;
pub mod resolution;

use serde::Serialize;

use crate::audio::chirp;
use crate::dsp::calibration::subtract_template;
use crate::dsp::spectrum::{bandpass, DEFAULT_FFT_SIZE};

pub use alias::AliasDetection;
pub use coherence::RangeCoherence;
pub use resolution::Resolution;

/// Speed of sound used to convert peak lags to one-way distance (m/s).
pub const SPEED_OF_SOUND: f64 = 343.0;

/// Correlation margin appended to the chirp when averaging: the longest
/// round-trip delay the probe can resolve (12.5 ms, about 2.1 m one-way).
pub const CORRELATION_MARGIN: usize = 600;
/// Half-width of the per-cycle onset refinement search.
pub const REFINE_WINDOW: usize = 50;
/// Correlation lags ignored at the start of each matched-filter output,
/// where residual onset artifacts live.
pub const SKIP_LAGS: usize = 20;
/// Largest timing misalignment the calibration subtraction will absorb.
pub const MAX_CAL_SHIFT: usize = 10;
/// Alias band: where the folded second harmonic lands.
pub const ALIAS_BAND: (f32, f32) = (8000.0, 16000.0);
/// Fundamental band: the transmitted sweep.
pub const FUNDAMENTAL_BAND: (f32, f32) = (16000.0, 20000.0);
/// Chirp-on vs chirp-off alias power margin required by experiment 1 (dB).
pub const SNR_THRESHOLD_DB: f64 = 3.0;
/// Alias peak over correlation median required by experiment 2.
pub const PEAK_MEDIAN_THRESHOLD: f64 = 2.0;
/// Correct-direction over wrong-direction peak ratio required by experiment 2.
pub const DIRECTION_THRESHOLD: f64 = 1.5;

/// Every operational parameter of the probe. Defaults match the deployed
/// geometry; the thresholds are empirical for the target hardware and may
/// need retuning elsewhere, which is why they live here and not in the
/// experiment code.
#[derive(Debug, Clone)]
pub struct ProbeParams {
    pub chirp_start_freq: f32,
    pub chirp_end_freq: f32,
    pub chirp_len: usize,
    pub guard_len: usize,
    pub num_cycles: usize,
    pub lead_len: usize,
    pub margin: usize,
    pub fft_size: usize,
    pub refine_window: usize,
    pub skip_lags: usize,
    pub max_cal_shift: usize,
    pub alias_band: (f32, f32),
    pub fundamental_band: (f32, f32),
    pub snr_threshold_db: f64,
    pub peak_median_threshold: f64,
    pub direction_threshold: f64,
}

impl Default for ProbeParams {
    fn default() -> Self {
        Self {
            chirp_start_freq: chirp::PROBE_START_FREQ,
            chirp_end_freq: chirp::PROBE_END_FREQ,
            chirp_len: chirp::CHIRP_SAMPLES,
            guard_len: chirp::GUARD_SAMPLES,
            num_cycles: chirp::NUM_CYCLES,
            lead_len: chirp::LEAD_SAMPLES,
            margin: CORRELATION_MARGIN,
            fft_size: DEFAULT_FFT_SIZE,
            refine_window: REFINE_WINDOW,
            skip_lags: SKIP_LAGS,
            max_cal_shift: MAX_CAL_SHIFT,
            alias_band: ALIAS_BAND,
            fundamental_band: FUNDAMENTAL_BAND,
            snr_threshold_db: SNR_THRESHOLD_DB,
            peak_median_threshold: PEAK_MEDIAN_THRESHOLD,
            direction_threshold: DIRECTION_THRESHOLD,
        }
    }
}

impl ProbeParams {
    /// One transmission cycle: chirp plus guard.
    pub fn cycle_len(&self) -> usize {
        self.chirp_len + self.guard_len
    }

    /// Averaged-segment length: chirp plus correlation margin.
    pub fn segment_len(&self) -> usize {
        self.chirp_len + self.margin
    }
}

/// Direct-path response captured from a no-reflector run.
#[derive(Debug, Clone)]
pub struct CalibrationTemplate {
    pub segment: Vec<f32>,
    pub cycles: usize,
}

/// Verdicts of the three experiments plus supporting numbers.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub alias_detection: AliasDetection,
    pub range_coherence: RangeCoherence,
    pub resolution: Resolution,
    /// Cycles that survived onset detection and bounds checks.
    pub cycles: usize,
    pub all_confirmed: bool,
}

/// Build the direct-path calibration template from a no-reflector recording.
pub fn calibrate(recording: &[f32], chirp_template: &[f32], params: &ProbeParams) -> CalibrationTemplate {
    let onsets = onsets::detect_onsets(recording, chirp_template, params);
    let (segment, cycles) = average::coherent_average(recording, &onsets, params.segment_len());
    tracing::info!(cycles, "calibration template built");
    CalibrationTemplate { segment, cycles }
}

/// Run all three experiments over a probe recording. Never fails: degenerate
/// inputs produce result records with `passed = false` and zeroed fields.
pub fn analyze(
    recording: &[f32],
    chirp_template: &[f32],
    sample_rate: f32,
    calibration: Option<&CalibrationTemplate>,
    params: &ProbeParams,
) -> ProbeResult {
    let onsets = onsets::detect_onsets(recording, chirp_template, params);
    let (averaged, cycles) = average::coherent_average(recording, &onsets, params.segment_len());
    tracing::info!(
        onsets = onsets.len(),
        cycles,
        calibrated = calibration.is_some(),
        "analyzing probe recording"
    );

    let alias_detection = alias::run(recording, &onsets, sample_rate, params);
    let range_coherence = coherence::run(&averaged, cycles, calibration, sample_rate, params);
    let resolution = resolution::run(&averaged, cycles, calibration, sample_rate, params);

    let all_confirmed = alias_detection.passed && range_coherence.passed && resolution.passed;
    ProbeResult {
        alias_detection,
        range_coherence,
        resolution,
        cycles,
        all_confirmed,
    }
}

/// Isolate one band of the averaged segment and, when a calibration template
/// is present, subtract the identically-filtered direct path. Subtraction is
/// per band because low-frequency drift between recordings would otherwise
/// leak into the broadband inner products.
pub(crate) fn band_isolate(
    averaged: &[f32],
    band: (f32, f32),
    calibration: Option<&CalibrationTemplate>,
    sample_rate: f32,
    params: &ProbeParams,
) -> Vec<f32> {
    let filtered = bandpass(averaged, band, sample_rate, params.fft_size);
    match calibration {
        Some(template) if template.cycles > 0 => {
            let template_band = bandpass(&template.segment, band, sample_rate, params.fft_size);
            subtract_template(&filtered, &template_band, params.max_cal_shift)
        }
        _ => filtered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_derived_lengths() {
        let params = ProbeParams::default();
        assert_eq!(params.cycle_len(), 3600);
        assert_eq!(params.segment_len(), 3000);
    }

    #[test]
    fn test_analyze_empty_recording_is_harmless() {
        let params = ProbeParams::default();
        let chirp_template = chirp::probe_chirp(48000.0, 1.0);
        let result = analyze(&[], &chirp_template, 48000.0, None, &params);
        assert_eq!(result.cycles, 0);
        assert!(!result.all_confirmed);
        assert!(!result.alias_detection.passed);
        assert!(!result.range_coherence.passed);
        assert!(!result.resolution.passed);
    }

    #[test]
    fn test_calibrate_empty_recording_yields_empty_template() {
        let params = ProbeParams::default();
        let chirp_template = chirp::probe_chirp(48000.0, 1.0);
        let template = calibrate(&[], &chirp_template, &params);
        assert_eq!(template.cycles, 0);
        assert_eq!(template.segment.len(), params.segment_len());
    }
}
