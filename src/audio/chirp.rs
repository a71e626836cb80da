/// Linear FM chirp synthesis and playback-buffer construction.
///
/// The probe transmits a phase-continuous linear sweep near the top of the
/// audible band. The same generator, run with the sweep reversed, produces
/// the matched-filter references used to hunt for the folded second
/// harmonic: a 16-20 kHz transmission radiates harmonic energy at 32-40 kHz,
/// which the anti-alias filter fails to fully reject and which folds through
/// the 24 kHz Nyquist point into a 16->8 kHz downchirp.

use std::f64::consts::TAU;

/// Nominal session sample rate.
pub const SAMPLE_RATE: u32 = 48000;

/// Probe chirp sweep (fundamental band).
pub const PROBE_START_FREQ: f32 = 16000.0;
pub const PROBE_END_FREQ: f32 = 20000.0;
pub const PROBE_AMPLITUDE: f32 = 1.0;

/// Chirp duration in samples (50 ms at 48 kHz).
pub const CHIRP_SAMPLES: usize = 2400;
/// Silent guard between chirps. Must exceed the longest expected round-trip
/// delay so one cycle's reflections do not bleed into the next.
pub const GUARD_SAMPLES: usize = 1200;
/// One transmission cycle: chirp plus guard.
pub const CYCLE_SAMPLES: usize = CHIRP_SAMPLES + GUARD_SAMPLES;
/// Chirp repetitions per probe run.
pub const NUM_CYCLES: usize = 200;
/// Leading silence (0.5 s) that absorbs audio-path startup latency.
pub const LEAD_SAMPLES: usize = 24000;

/// Generate a linear chirp (frequency sweep) signal.
///
/// Instantaneous phase is 2*pi * (f0*t + k*t^2/2) with sweep rate
/// k = (f1 - f0) / T. Passing `start_freq > end_freq` yields a downchirp,
/// which is how the alias and wrong-direction references are built.
pub fn generate_chirp(
    start_freq: f32,
    end_freq: f32,
    num_samples: usize,
    sample_rate: f32,
    amplitude: f32,
) -> Vec<f32> {
    let fs = sample_rate as f64;
    let duration = num_samples as f64 / fs;
    let rate = (end_freq as f64 - start_freq as f64) / duration;

    (0..num_samples)
        .map(|i| {
            let t = i as f64 / fs;
            let phase = TAU * (start_freq as f64 * t + 0.5 * rate * t * t);
            (phase.sin() * amplitude as f64) as f32
        })
        .collect()
}

/// Generate the probe chirp (16->20 kHz, 2400 samples) at a given amplitude.
pub fn probe_chirp(sample_rate: f32, amplitude: f32) -> Vec<f32> {
    generate_chirp(
        PROBE_START_FREQ,
        PROBE_END_FREQ,
        CHIRP_SAMPLES,
        sample_rate,
        amplitude,
    )
}

/// Matched-filter replica of the transmitted sweep, at unit amplitude.
pub fn fundamental_reference(
    start_freq: f32,
    end_freq: f32,
    chirp_len: usize,
    sample_rate: f32,
) -> Vec<f32> {
    generate_chirp(start_freq, end_freq, chirp_len, sample_rate, 1.0)
}

/// Matched-filter replica of the predicted fold: doubling the transmitted
/// sweep and folding it through Nyquist reverses the direction, so a genuine
/// second-harmonic alias descends across `band`.
pub fn alias_reference(band: (f32, f32), chirp_len: usize, sample_rate: f32) -> Vec<f32> {
    generate_chirp(band.1, band.0, chirp_len, sample_rate, 1.0)
}

/// The nonsense hypothesis: the same band swept upward. In-band noise
/// correlates with this as readily as with the true fold direction; a real
/// alias does not.
pub fn wrong_direction_reference(band: (f32, f32), chirp_len: usize, sample_rate: f32) -> Vec<f32> {
    generate_chirp(band.0, band.1, chirp_len, sample_rate, 1.0)
}

/// Build the full playback waveform: `lead_len` samples of silence, then
/// `num_cycles` repetitions of chirp + `guard_len` samples of silence.
pub fn playback_waveform(
    chirp: &[f32],
    num_cycles: usize,
    guard_len: usize,
    lead_len: usize,
) -> Vec<f32> {
    let cycle_len = chirp.len() + guard_len;
    let mut samples = Vec::with_capacity(lead_len + num_cycles * cycle_len);
    samples.resize(lead_len, 0.0);
    for _ in 0..num_cycles {
        samples.extend_from_slice(chirp);
        samples.resize(samples.len() + guard_len, 0.0);
    }
    samples
}
