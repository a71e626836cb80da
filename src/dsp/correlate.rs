/// Time-domain matched-filter primitives: sliding-dot-product
/// cross-correlation and the scalar probes taken from its output.
///
/// The correlation here is deliberately *unnormalized* and the reference is
/// *not* time-reversed: peak positions are read as reflection delays, and a
/// reversed reference would turn the operation into convolution and shift
/// every peak.

/// Cross-correlate `signal` with `reference`:
/// out[n] = sum_k signal[n + k] * reference[k], length |s| - |r| + 1.
/// Returns an empty vector when the signal is shorter than the reference.
pub fn cross_correlate(signal: &[f32], reference: &[f32]) -> Vec<f32> {
    if reference.is_empty() || signal.len() < reference.len() {
        return Vec::new();
    }
    let out_len = signal.len() - reference.len() + 1;
    let mut out = Vec::with_capacity(out_len);
    for n in 0..out_len {
        let window = &signal[n..n + reference.len()];
        let acc: f64 = window
            .iter()
            .zip(reference.iter())
            .map(|(&s, &r)| s as f64 * r as f64)
            .sum();
        out.push(acc as f32);
    }
    out
}

/// Index and magnitude of the absolute maximum at or after `start`.
/// Ties resolve to the earliest index; an out-of-range start yields (0, 0).
pub fn peak_abs_from(values: &[f32], start: usize) -> (usize, f32) {
    if start >= values.len() {
        return (0, 0.0);
    }
    let mut best_idx = start;
    let mut best_mag = values[start].abs();
    for (i, &v) in values.iter().enumerate().skip(start + 1) {
        if v.abs() > best_mag {
            best_mag = v.abs();
            best_idx = i;
        }
    }
    (best_idx, best_mag)
}

/// -3 dB main-lobe width around `peak`, in samples: walk outward from the
/// peak while |values[i]| stays at or above peak/sqrt(2), and report the
/// distance between the first failing index on each side.
pub fn width_3db(values: &[f32], peak: usize) -> usize {
    if peak >= values.len() {
        return 0;
    }
    let threshold = values[peak].abs() / std::f32::consts::SQRT_2;

    let mut left = peak as isize;
    while left >= 0 && values[left as usize].abs() >= threshold {
        left -= 1;
    }
    let mut right = peak;
    while right < values.len() && values[right].abs() >= threshold {
        right += 1;
    }
    (right as isize - left) as usize
}

/// Median of absolute values; the robust noise-floor estimate for a
/// correlation output. Returns 0 for an empty input.
pub fn median_abs(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut mags: Vec<f32> = values.iter().map(|v| v.abs()).collect();
    mags.sort_by(|a, b| a.total_cmp(b));
    let mid = mags.len() / 2;
    if mags.len() % 2 == 1 {
        mags[mid]
    } else {
        (mags[mid - 1] + mags[mid]) / 2.0
    }
}
