/// Direct-path removal: timing-aligned least-squares template subtraction.
///
/// The speaker-to-mic direct path is stable between recordings, so the
/// averaged no-reflector segment captured during calibration can be scaled
/// and subtracted from a probe segment. Clock skew between the two runs is
/// at most a few samples, hence the small integer lag search; the amplitude
/// match is the usual projection alpha = <x, c> / <c, c>.

use crate::dsp::spectrum::POWER_FLOOR;

/// Subtract an aligned, amplitude-matched copy of `template` from `signal`.
///
/// Searches lags in [-max_shift, +max_shift] for the one maximizing the
/// inner product over the overlap; only a positive maximum counts as an
/// alignment. Samples beyond the common length are passed through.
pub fn subtract_template(signal: &[f32], template: &[f32], max_shift: usize) -> Vec<f32> {
    let n = signal.len().min(template.len());
    if n == 0 {
        return signal.to_vec();
    }

    let shift_range = max_shift as isize;
    let mut best_shift: Option<isize> = None;
    let mut best_score = 0.0f64;
    for shift in -shift_range..=shift_range {
        let mut acc = 0.0f64;
        for (i, &c) in template[..n].iter().enumerate() {
            let j = i as isize + shift;
            if j >= 0 && (j as usize) < n {
                acc += signal[j as usize] as f64 * c as f64;
            }
        }
        if acc > best_score {
            best_score = acc;
            best_shift = Some(shift);
        }
    }
    // No positive alignment anywhere in the search range: nothing to remove.
    let shift = match best_shift {
        Some(s) => s,
        None => return signal.to_vec(),
    };

    // Shift the template into a zero-padded buffer so the subtraction below
    // is a plain sample-wise loop.
    let mut shifted = vec![0.0f32; n];
    for (i, &c) in template[..n].iter().enumerate() {
        let j = i as isize + shift;
        if j >= 0 && (j as usize) < n {
            shifted[j as usize] = c;
        }
    }

    let mut cross = 0.0f64;
    let mut energy = 0.0f64;
    for (&x, &c) in signal[..n].iter().zip(shifted.iter()) {
        cross += x as f64 * c as f64;
        energy += c as f64 * c as f64;
    }
    if energy < POWER_FLOOR {
        return signal.to_vec();
    }
    let alpha = cross / energy;

    let mut out = signal.to_vec();
    for (o, &c) in out[..n].iter_mut().zip(shifted.iter()) {
        *o = (*o as f64 - alpha * c as f64) as f32;
    }
    out
}
