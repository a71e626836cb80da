/// Shared synthesis helpers for the scenario tests: deterministic noise and
/// recordings with per-cycle echoes injected at exact (possibly fractional)
/// sample delays.

use alias_sonar::audio::chirp::{generate_chirp, CHIRP_SAMPLES, CYCLE_SAMPLES};

pub const SAMPLE_RATE: f32 = 48000.0;

/// An echo injected into every cycle of a synthetic recording. Fractional
/// delays are honored by evaluating the sweep's phase at the shifted time,
/// the way a physical reflection actually lands between samples.
pub struct Echo {
    pub start_freq: f32,
    pub end_freq: f32,
    pub amplitude: f32,
    pub delay: f32,
}

pub struct Scene {
    pub cycles: usize,
    /// Extra capture samples before the playback starts.
    pub pad: usize,
    /// Leading silence in the playback itself.
    pub lead: usize,
    pub noise_amplitude: f32,
    pub noise_seed: u64,
    pub echoes: Vec<Echo>,
}

/// Deterministic uniform noise in [-amplitude, amplitude].
pub fn white_noise(len: usize, amplitude: f32, seed: u64) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    (0..len)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let unit = (state >> 11) as f32 / (1u64 << 53) as f32;
            (unit * 2.0 - 1.0) * amplitude
        })
        .collect()
}

/// A linear sweep starting `delay` samples (fractional allowed) into a
/// buffer of `out_len` samples.
pub fn delayed_chirp(
    start_freq: f32,
    end_freq: f32,
    amplitude: f32,
    delay: f32,
    out_len: usize,
) -> Vec<f32> {
    let fs = SAMPLE_RATE as f64;
    let duration = CHIRP_SAMPLES as f64 / fs;
    let rate = (end_freq as f64 - start_freq as f64) / duration;
    (0..out_len)
        .map(|i| {
            let t = (i as f64 - delay as f64) / fs;
            if t >= 0.0 && t < duration {
                let phase = std::f64::consts::TAU * (start_freq as f64 * t + 0.5 * rate * t * t);
                (phase.sin() * amplitude as f64) as f32
            } else {
                0.0
            }
        })
        .collect()
}

/// Build a synthetic capture: pad + playback (lead, cycles of chirp+guard),
/// with each scene echo added into every cycle, under uniform noise.
pub fn synth_recording(scene: &Scene) -> Vec<f32> {
    let chirp = generate_chirp(16000.0, 20000.0, CHIRP_SAMPLES, SAMPLE_RATE, 1.0);
    let total = scene.pad + scene.lead + scene.cycles * CYCLE_SAMPLES;
    let mut recording = white_noise(total, scene.noise_amplitude, scene.noise_seed);

    for j in 0..scene.cycles {
        let onset = scene.pad + scene.lead + j * CYCLE_SAMPLES;
        for (r, &s) in recording[onset..onset + CHIRP_SAMPLES].iter_mut().zip(&chirp) {
            *r += s;
        }
        for echo in &scene.echoes {
            let wave = delayed_chirp(
                echo.start_freq,
                echo.end_freq,
                echo.amplitude,
                echo.delay,
                CYCLE_SAMPLES,
            );
            for (r, &s) in recording[onset..onset + CYCLE_SAMPLES].iter_mut().zip(&wave) {
                *r += s;
            }
        }
    }

    recording
}
