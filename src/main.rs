use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use alias_sonar::audio::{chirp, device};
use alias_sonar::config::Config;
use alias_sonar::pipeline::{self, ProbeParams, ProbeResult};

#[derive(Parser)]
#[command(name = "alias-sonar", about = "Acoustic ranging probe that recovers aliased second-harmonic chirps")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a probe: calibrate against an empty scene, then measure
    Run {
        /// Skip the calibration pass (experiments use raw band signals)
        #[arg(long)]
        skip_calibration: bool,
        /// Print the raw result record as JSON instead of result cards
        #[arg(long)]
        json: bool,
    },
    /// List available audio devices
    ListDevices,
    /// Play a short burst of probe chirps (checks the speaker path)
    TestChirp,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("alias_sonar=info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting alias-sonar");

    match cli.command {
        Commands::Run { skip_calibration, json } => run_probe(&config, skip_calibration, json),
        Commands::ListDevices => device::list_devices(),
        Commands::TestChirp => test_chirp(&config),
    }
}

fn run_probe(config: &Config, skip_calibration: bool, json: bool) -> Result<()> {
    let params = ProbeParams {
        num_cycles: config.num_cycles,
        ..ProbeParams::default()
    };
    let sample_rate = chirp::SAMPLE_RATE;
    // The matched-filter template stays at unit amplitude; only the
    // transmitted copy is scaled.
    let template = chirp::generate_chirp(
        params.chirp_start_freq,
        params.chirp_end_freq,
        params.chirp_len,
        sample_rate as f32,
        chirp::PROBE_AMPLITUDE,
    );
    let tx_chirp = chirp::generate_chirp(
        params.chirp_start_freq,
        params.chirp_end_freq,
        params.chirp_len,
        sample_rate as f32,
        config.amplitude,
    );
    let waveform =
        chirp::playback_waveform(&tx_chirp, params.num_cycles, params.guard_len, params.lead_len);

    let calibration = if skip_calibration {
        None
    } else {
        prompt("Clear the measurement path (no reflector), then press Enter to calibrate")?;
        let capture = device::play_and_record(&waveform, sample_rate, config)?;
        let cal = pipeline::calibrate(&capture.samples, &template, &params);
        anyhow::ensure!(
            cal.cycles > 0,
            "Calibration found no chirp cycles; check speaker volume and microphone"
        );
        println!("Calibrated against {} cycles.", cal.cycles);
        Some(cal)
    };

    prompt("Place the reflector, then press Enter to run the probe")?;
    let capture = device::play_and_record(&waveform, sample_rate, config)?;
    let result = pipeline::analyze(
        &capture.samples,
        &template,
        capture.sample_rate,
        calibration.as_ref(),
        &params,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_cards(&result);
    }
    Ok(())
}

fn test_chirp(config: &Config) -> Result<()> {
    let tx_chirp = chirp::probe_chirp(chirp::SAMPLE_RATE as f32, config.amplitude);
    let waveform = chirp::playback_waveform(&tx_chirp, 10, chirp::GUARD_SAMPLES, chirp::LEAD_SAMPLES);
    println!("Playing 10 probe cycles (the sweep sits at the top of the audible band)...");
    let capture = device::play_and_record(&waveform, chirp::SAMPLE_RATE, config)?;
    let peak = capture.samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
    println!(
        "Captured {} samples at {} Hz, peak level {:.3}",
        capture.samples.len(),
        capture.sample_rate,
        peak
    );
    Ok(())
}

fn prompt(message: &str) -> Result<()> {
    println!("{}...", message);
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(())
}

fn glyph(passed: bool) -> &'static str {
    if passed {
        "\u{2713}"
    } else {
        "\u{2717}"
    }
}

fn print_cards(result: &ProbeResult) {
    let alias = &result.alias_detection;
    println!("\n--- Alias Detection [{}] ---", glyph(alias.passed));
    println!("  fundamental power:   {:>8.1} dB", alias.fundamental_db);
    println!("  alias band (chirp):  {:>8.1} dB", alias.alias_db);
    println!("  alias band (guard):  {:>8.1} dB", alias.noise_db);
    println!("  alias SNR:           {:>8.1} dB", alias.snr_db);
    println!("  below fundamental:   {:>8.1} dB", alias.alias_below_fundamental_db);

    let coherence = &result.range_coherence;
    println!("\n--- Range Coherence [{}] ---", glyph(coherence.passed));
    println!("  peak sample:         {:>8}", coherence.peak_sample);
    println!("  distance:            {:>8.1} mm", coherence.distance_mm);
    println!("  peak / noise floor:  {:>8.2}", coherence.alias_peak_strength);
    println!("  direction ratio:     {:>8.2}", coherence.direction_ratio);

    let resolution = &result.resolution;
    println!("\n--- Resolution [{}] ---", glyph(resolution.passed));
    println!("  fundamental width:   {:>8} samples", resolution.fundamental_width);
    println!("  stitched width:      {:>8} samples", resolution.stitched_width);
    println!("  improvement:         {:>8.2}x", resolution.ratio);

    println!(
        "\n{} cycles analyzed; super-resolution {}",
        result.cycles,
        if result.all_confirmed { "CONFIRMED" } else { "not confirmed" }
    );
}
