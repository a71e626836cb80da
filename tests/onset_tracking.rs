/// Onset detection against the full-size probe geometry: exact recovery on
/// a clean capture and lock retention under sample-clock drift.

use alias_sonar::audio::chirp::{playback_waveform, probe_chirp, CHIRP_SAMPLES, CYCLE_SAMPLES, GUARD_SAMPLES, LEAD_SAMPLES, NUM_CYCLES, SAMPLE_RATE};
use alias_sonar::pipeline::average::coherent_average;
use alias_sonar::pipeline::onsets::detect_onsets;
use alias_sonar::pipeline::ProbeParams;

fn rms(samples: &[f32]) -> f64 {
    (samples.iter().map(|&s| s as f64 * s as f64).sum::<f64>() / samples.len() as f64).sqrt()
}

#[test]
fn test_clean_playback_recovers_all_onsets_exactly() {
    let params = ProbeParams::default();
    let chirp = probe_chirp(SAMPLE_RATE as f32, 1.0);
    let recording = playback_waveform(&chirp, NUM_CYCLES, GUARD_SAMPLES, LEAD_SAMPLES);

    let onsets = detect_onsets(&recording, &chirp, &params);
    assert_eq!(onsets.len(), NUM_CYCLES);
    for (j, &onset) in onsets.iter().enumerate() {
        assert_eq!(
            onset,
            LEAD_SAMPLES + j * CYCLE_SAMPLES,
            "Cycle {} landed at the wrong sample",
            j
        );
    }
}

#[test]
fn test_drifting_clock_stays_locked_and_coherent() {
    // +0.5 sample per cycle of clock drift, quantized onto the sample grid.
    let params = ProbeParams::default();
    let chirp = probe_chirp(SAMPLE_RATE as f32, 1.0);
    let mut recording = vec![0.0f32; LEAD_SAMPLES + NUM_CYCLES * CYCLE_SAMPLES + 200];
    let mut truth = Vec::with_capacity(NUM_CYCLES);
    for j in 0..NUM_CYCLES {
        let onset = LEAD_SAMPLES + j * CYCLE_SAMPLES + j / 2;
        recording[onset..onset + CHIRP_SAMPLES].copy_from_slice(&chirp);
        truth.push(onset);
    }

    let onsets = detect_onsets(&recording, &chirp, &params);
    assert_eq!(onsets.len(), NUM_CYCLES, "Drift within the window must not drop cycles");
    assert_eq!(onsets, truth, "Tracker should follow the drifted grid exactly");

    // With exact onsets the coherent sum is as clean as the no-drift case.
    let (avg_drift, n_drift) = coherent_average(&recording, &onsets, params.segment_len());
    let clean = playback_waveform(&chirp, NUM_CYCLES, GUARD_SAMPLES, LEAD_SAMPLES);
    let clean_onsets = detect_onsets(&clean, &chirp, &params);
    let (avg_clean, n_clean) = coherent_average(&clean, &clean_onsets, params.segment_len());
    assert_eq!(n_drift, NUM_CYCLES);
    assert_eq!(n_clean, NUM_CYCLES);

    let drift_rms = rms(&avg_drift[..CHIRP_SAMPLES]);
    let clean_rms = rms(&avg_clean[..CHIRP_SAMPLES]);
    let ratio_db = 20.0 * (drift_rms / clean_rms).log10();
    assert!(
        ratio_db.abs() < 1.0,
        "Drifted coherent sum lost {} dB against the clean one",
        ratio_db
    );
}
