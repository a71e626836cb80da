/// Per-cycle chirp onset detection: one coarse pass to find the first
/// transmission, then a narrow tracking pass for every cycle after it.
///
/// Exact alignment is what makes the rest of the pipeline work: the folded
/// harmonic sits roughly 40 dB below the fundamental, and a single sample of
/// drift across 200 cycles is enough to wash it out of the coherent sum.

use crate::dsp::correlate::{cross_correlate, peak_abs_from};
use crate::pipeline::ProbeParams;

/// Locate every chirp onset in `recording`.
///
/// The coarse pass correlates the opening stretch of the recording (long
/// enough to cover the leading silence plus a few cycles of audio-path
/// latency) against the template and takes the strongest lag as the first
/// onset. Each subsequent cycle is searched only within +/- `refine_window`
/// samples of the previous onset plus one cycle length, so the tracker
/// follows slow sample-rate drift instead of assuming a rigid grid.
pub fn detect_onsets(recording: &[f32], chirp: &[f32], params: &ProbeParams) -> Vec<usize> {
    if chirp.is_empty() || recording.len() < chirp.len() {
        return Vec::new();
    }
    let cycle_len = params.cycle_len();
    let start_cap = recording.len() - chirp.len();

    let coarse_span = recording
        .len()
        .min(params.lead_len + 4 * cycle_len)
        .max(chirp.len());
    let coarse = cross_correlate(&recording[..coarse_span], chirp);
    let (first_onset, first_mag) = peak_abs_from(&coarse, 0);
    tracing::debug!(first_onset, first_mag, "coarse onset search complete");

    let window = params.refine_window;
    let mut onsets = Vec::with_capacity(params.num_cycles);
    for cycle in 0..params.num_cycles {
        let expected = match onsets.last() {
            None => first_onset,
            Some(&prev) => prev + cycle_len,
        };
        let lo = expected.saturating_sub(window);
        if lo > start_cap {
            tracing::debug!(cycle, "refinement window past end of recording");
            break;
        }
        let hi = (expected + window).min(start_cap);
        let segment = &recording[lo..hi + chirp.len()];
        let corr = cross_correlate(segment, chirp);
        let (local_peak, _) = peak_abs_from(&corr, 0);
        onsets.push(lo + local_peak);
    }

    tracing::debug!(found = onsets.len(), expected = params.num_cycles, "onset tracking done");
    onsets
}
