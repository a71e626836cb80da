//! Spectral primitives: real-input power spectrum, band power, and a
//! brick-wall FFT bandpass.
//!
//! The bandpass zeroes whole bins rather than shaping a response curve
//! because the experiments need phase preserved exactly: a matched filter
//! downstream compares sweep *direction*, and any phase warp in the band
//! isolation step would smear the correlation peaks it is trying to sharpen.

use rustfft::{num_complex::Complex32, FftPlanner};

/// Default transform size for power estimation and band isolation.
pub const DEFAULT_FFT_SIZE: usize = 4096;

/// Floor used wherever a power or inner product could reach zero.
pub const POWER_FLOOR: f64 = 1e-20;

/// Transform size for a given input: the configured size, grown to the next
/// power of two when the input is longer.
fn fft_len(input_len: usize, fft_size: usize) -> usize {
    fft_size.max(input_len.next_power_of_two())
}

/// Magnitude-squared spectrum of a real input, zero-padded to `fft_size`
/// (or the next power of two above the input length, whichever is larger).
/// Returns N/2 bins of |X[k]|^2 / N^2.
pub fn power_spectrum(samples: &[f32], fft_size: usize) -> Vec<f64> {
    let n = fft_len(samples.len(), fft_size);
    let mut buffer: Vec<Complex32> = samples
        .iter()
        .map(|&s| Complex32::new(s, 0.0))
        .collect();
    buffer.resize(n, Complex32::new(0.0, 0.0));

    let mut planner = FftPlanner::<f32>::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let scale = (n as f64) * (n as f64);
    buffer[..n / 2]
        .iter()
        .map(|c| (c.re as f64 * c.re as f64 + c.im as f64 * c.im as f64) / scale)
        .collect()
}

/// Mean bin value of `spectrum` over the inclusive range
/// ceil(f_lo*N/f_s) ..= floor(f_hi*N/f_s). Returns `POWER_FLOOR` when the
/// band maps to no bins.
pub fn band_power(spectrum: &[f64], band: (f32, f32), sample_rate: f32) -> f64 {
    let n = spectrum.len() * 2;
    let lo = (band.0 as f64 * n as f64 / sample_rate as f64).ceil() as usize;
    let hi = (band.1 as f64 * n as f64 / sample_rate as f64).floor() as usize;
    let hi = hi.min(spectrum.len().saturating_sub(1));
    if lo > hi || spectrum.is_empty() {
        return POWER_FLOOR;
    }
    let slice = &spectrum[lo..=hi];
    slice.iter().sum::<f64>() / slice.len() as f64
}

/// Brick-wall bandpass: forward FFT, zero every bin outside
/// floor(f_lo*N/f_s) ..= ceil(f_hi*N/f_s) plus the DC and Nyquist bins,
/// inverse FFT, truncate to the input length. No magnitude weighting, so
/// phase inside the band is untouched.
pub fn bandpass(samples: &[f32], band: (f32, f32), sample_rate: f32, fft_size: usize) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let n = fft_len(samples.len(), fft_size);
    let half = n / 2;
    let keep_lo = (band.0 as f64 * n as f64 / sample_rate as f64).floor() as usize;
    let keep_hi = (band.1 as f64 * n as f64 / sample_rate as f64).ceil() as usize;

    let mut buffer: Vec<Complex32> = samples
        .iter()
        .map(|&s| Complex32::new(s, 0.0))
        .collect();
    buffer.resize(n, Complex32::new(0.0, 0.0));

    let mut planner = FftPlanner::<f32>::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    for k in 0..=half {
        let keep = k >= keep_lo && k <= keep_hi && k != 0 && k != half;
        if !keep {
            buffer[k] = Complex32::new(0.0, 0.0);
            if k != 0 && k != half {
                buffer[n - k] = Complex32::new(0.0, 0.0);
            }
        }
    }

    planner.plan_fft_inverse(n).process(&mut buffer);

    // rustfft leaves the inverse unscaled
    let scale = 1.0 / n as f32;
    buffer[..samples.len()].iter().map(|c| c.re * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    const SAMPLE_RATE: f32 = 48000.0;

    /// A sine centered exactly on FFT bin `bin` for a 4096-point transform.
    fn bin_tone(bin: usize, len: usize) -> Vec<f32> {
        let freq = bin as f32 * SAMPLE_RATE / DEFAULT_FFT_SIZE as f32;
        (0..len)
            .map(|i| (TAU * freq * i as f32 / SAMPLE_RATE).sin())
            .collect()
    }

    #[test]
    fn test_power_spectrum_concentrates_at_tone_bin() {
        let tone = bin_tone(512, DEFAULT_FFT_SIZE);
        let spectrum = power_spectrum(&tone, DEFAULT_FFT_SIZE);
        assert_eq!(spectrum.len(), DEFAULT_FFT_SIZE / 2);
        // A unit sine filling the transform puts (N/2)^2 / N^2 = 0.25 there
        assert!(
            (spectrum[512] - 0.25).abs() < 1e-3,
            "Expected ~0.25 at the tone bin, got {}",
            spectrum[512]
        );
        assert!(spectrum[100] < 1e-9, "Off-tone bin should be empty, got {}", spectrum[100]);
    }

    #[test]
    fn test_band_power_empty_band_returns_floor() {
        let spectrum = vec![1.0f64; 2048];
        // Inverted band maps to no bins
        assert_eq!(band_power(&spectrum, (16000.0, 8000.0), SAMPLE_RATE), POWER_FLOOR);
        // A band entirely above Nyquist maps to no bins either
        assert_eq!(band_power(&spectrum, (30000.0, 40000.0), SAMPLE_RATE), POWER_FLOOR);
    }

    #[test]
    fn test_band_power_mean_of_flat_spectrum() {
        let spectrum = vec![2.0f64; 2048];
        let p = band_power(&spectrum, (8000.0, 16000.0), SAMPLE_RATE);
        assert!((p - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_bandpass_preserves_length() {
        let signal = vec![0.25f32; 3000];
        let filtered = bandpass(&signal, (8000.0, 16000.0), SAMPLE_RATE, DEFAULT_FFT_SIZE);
        assert_eq!(filtered.len(), signal.len());
    }

    #[test]
    fn test_bandpass_rejects_out_of_band_tone() {
        // In-band and out-of-band tones on exact bins, full transform length
        // so the stopband zeroing is not blurred by truncation.
        let in_band = bin_tone(1024, DEFAULT_FFT_SIZE); // 12 kHz
        let out_band = bin_tone(341, DEFAULT_FFT_SIZE); // ~4 kHz
        let mixed: Vec<f32> = in_band.iter().zip(&out_band).map(|(a, b)| a + b).collect();

        let filtered = bandpass(&mixed, (8000.0, 16000.0), SAMPLE_RATE, DEFAULT_FFT_SIZE);
        let spectrum = power_spectrum(&filtered, DEFAULT_FFT_SIZE);
        assert!(
            spectrum[341] < spectrum[1024] * 1e-9,
            "Stopband tone survived: {} vs passband {}",
            spectrum[341],
            spectrum[1024]
        );
        assert!((spectrum[1024] - 0.25).abs() < 1e-3, "Passband tone should be untouched");
    }

    #[test]
    fn test_bandpass_removes_dc() {
        let signal = vec![1.0f32; DEFAULT_FFT_SIZE];
        let filtered = bandpass(&signal, (0.0, 24000.0), SAMPLE_RATE, DEFAULT_FFT_SIZE);
        let peak = filtered.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        assert!(peak < 1e-3, "DC should be zeroed, residual {}", peak);
    }

    #[test]
    fn test_bandpass_idempotent() {
        // At the full transform length the brick wall is exact, so applying
        // it twice changes nothing.
        let signal: Vec<f32> = (0..DEFAULT_FFT_SIZE)
            .map(|i| ((i as f32 * 0.37).sin() + (i as f32 * 1.93).cos()) * 0.5)
            .collect();
        let once = bandpass(&signal, (8000.0, 16000.0), SAMPLE_RATE, DEFAULT_FFT_SIZE);
        let twice = bandpass(&once, (8000.0, 16000.0), SAMPLE_RATE, DEFAULT_FFT_SIZE);
        for (i, (a, b)) in once.iter().zip(&twice).enumerate() {
            assert!((a - b).abs() < 1e-4, "Mismatch at {}: {} vs {}", i, a, b);
        }
    }
}
