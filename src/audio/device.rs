/// Audio session: synchronized play-and-record through cpal.
///
/// The probe needs one thing from the platform: play a waveform through the
/// loudspeaker while recording the microphone, time-synchronously, and hand
/// the whole capture back as mono f32. Capture starts before playback and
/// keeps running after it so the pipeline's leading-silence search always
/// has the first chirp inside the buffer.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::Config;

/// Capture lead time before playback starts.
pub const CAPTURE_PREROLL: Duration = Duration::from_millis(200);
/// Capture tail after playback ends.
pub const CAPTURE_TAIL: Duration = Duration::from_millis(500);
/// Preferred I/O buffer: 5 ms of frames at 48 kHz.
pub const PREFERRED_BUFFER_FRAMES: u32 = 240;

/// A completed capture: mono samples at the input device's native rate.
pub struct Capture {
    pub samples: Vec<f32>,
    pub sample_rate: f32,
}

/// List all available audio input and output devices.
pub fn list_devices() -> Result<()> {
    let host = cpal::default_host();

    println!("Audio host: {:?}", host.id());

    println!("\n--- Output Devices ---");
    if let Ok(devices) = host.output_devices() {
        for (i, device) in devices.enumerate() {
            println!("  [{}] {}", i, device.name().unwrap_or_else(|_| "Unknown".into()));
            if let Ok(config) = device.default_output_config() {
                println!("      Default config: {:?}", config);
            }
        }
    }

    println!("\n--- Input Devices ---");
    if let Ok(devices) = host.input_devices() {
        for (i, device) in devices.enumerate() {
            println!("  [{}] {}", i, device.name().unwrap_or_else(|_| "Unknown".into()));
            if let Ok(config) = device.default_input_config() {
                println!("      Default config: {:?}", config);
            }
        }
    }

    Ok(())
}

fn matches_prefix(device: &cpal::Device, prefix: &str) -> bool {
    device
        .name()
        .map(|n| n.to_lowercase().starts_with(&prefix.to_lowercase()))
        .unwrap_or(false)
}

fn find_output_device(host: &cpal::Host, prefix: Option<&str>) -> Result<cpal::Device> {
    match prefix {
        Some(p) => host
            .output_devices()?
            .find(|d| matches_prefix(d, p))
            .ok_or_else(|| anyhow!("No output device matching {:?}", p)),
        None => host
            .default_output_device()
            .context("No output audio device available"),
    }
}

fn find_input_device(host: &cpal::Host, prefix: Option<&str>) -> Result<cpal::Device> {
    match prefix {
        Some(p) => host
            .input_devices()?
            .find(|d| matches_prefix(d, p))
            .ok_or_else(|| anyhow!("No input device matching {:?}", p)),
        None => host
            .default_input_device()
            .context("No input audio device available"),
    }
}

fn build_output_stream(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    waveform: Arc<Vec<f32>>,
    cursor: Arc<AtomicUsize>,
    done: Arc<AtomicBool>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let channels = stream_config.channels as usize;
    device.build_output_stream(
        stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let idx = cursor.fetch_add(1, Ordering::Relaxed);
                let sample = if idx < waveform.len() {
                    waveform[idx]
                } else {
                    done.store(true, Ordering::Relaxed);
                    0.0
                };
                for out in frame.iter_mut() {
                    *out = sample;
                }
            }
        },
        |err| tracing::error!("Audio output error: {}", err),
        None,
    )
}

fn build_input_stream(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    sender: Sender<Vec<f32>>,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let channels = stream_config.channels as usize;
    device.build_input_stream(
        stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // Mix whatever the hardware delivers down to mono
            let mono: Vec<f32> = data
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect();
            let _ = sender.try_send(mono);
        },
        |err| tracing::error!("Audio input error: {}", err),
        None,
    )
}

/// Build a stream with the preferred 5 ms buffer, falling back to the
/// device default when the host refuses the fixed size.
fn with_preferred_buffer<F>(mut build: F, what: &str) -> Result<cpal::Stream>
where
    F: FnMut(cpal::BufferSize) -> Result<cpal::Stream, cpal::BuildStreamError>,
{
    match build(cpal::BufferSize::Fixed(PREFERRED_BUFFER_FRAMES)) {
        Ok(stream) => Ok(stream),
        Err(err) => {
            tracing::warn!(
                "Fixed {}-frame {} buffer rejected ({}); using device default",
                PREFERRED_BUFFER_FRAMES,
                what,
                err
            );
            build(cpal::BufferSize::Default).context("building audio stream")
        }
    }
}

/// Play `waveform` through the loudspeaker while recording the microphone.
///
/// Capture begins `CAPTURE_PREROLL` before playback and continues for
/// `CAPTURE_TAIL` after the last sample. The microphone is tapped at its
/// native format: requesting a channel count the hardware does not provide
/// can silently yield all-zero buffers on some hosts, so the native frame
/// layout is accepted and mixed down instead. The returned `sample_rate` is
/// the input device's effective rate, which the pipeline must use.
pub fn play_and_record(waveform: &[f32], sample_rate: u32, config: &Config) -> Result<Capture> {
    let host = cpal::default_host();
    let output_device = find_output_device(&host, config.output_device.as_deref())?;
    let input_device = find_input_device(&host, config.input_device.as_deref())?;
    tracing::info!(
        output = %output_device.name().unwrap_or_else(|_| "Unknown".into()),
        input = %input_device.name().unwrap_or_else(|_| "Unknown".into()),
        "audio session"
    );

    let output_default = output_device
        .default_output_config()
        .context("No default output config")?;
    let input_default = input_device
        .default_input_config()
        .context("No default input config")?;
    if output_default.sample_format() != cpal::SampleFormat::F32 {
        bail!("Output device sample format {:?} is not f32", output_default.sample_format());
    }
    if input_default.sample_format() != cpal::SampleFormat::F32 {
        bail!("Input device sample format {:?} is not f32", input_default.sample_format());
    }

    let input_rate = input_default.sample_rate().0;
    if input_rate != sample_rate {
        tracing::warn!(
            requested = sample_rate,
            effective = input_rate,
            "input device runs at a different rate; analysis will use the effective rate"
        );
    }

    let waveform = Arc::new(waveform.to_vec());
    let cursor = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let expected = Duration::from_secs_f64(waveform.len() as f64 / sample_rate as f64);

    let output_stream = with_preferred_buffer(
        |buffer_size| {
            build_output_stream(
                &output_device,
                &cpal::StreamConfig {
                    channels: output_default.channels(),
                    sample_rate: cpal::SampleRate(sample_rate),
                    buffer_size,
                },
                waveform.clone(),
                cursor.clone(),
                done.clone(),
            )
        },
        "output",
    )?;

    let (tx, rx): (Sender<Vec<f32>>, Receiver<Vec<f32>>) = bounded(4096);
    let input_stream = with_preferred_buffer(
        |buffer_size| {
            build_input_stream(
                &input_device,
                &cpal::StreamConfig {
                    channels: input_default.channels(),
                    sample_rate: input_default.sample_rate(),
                    buffer_size,
                },
                tx.clone(),
            )
        },
        "input",
    )?;

    let mut samples = Vec::with_capacity(
        (input_rate as f64 * (expected + CAPTURE_PREROLL + CAPTURE_TAIL).as_secs_f64()) as usize,
    );

    input_stream.play().context("starting capture")?;
    drain_for(&rx, &mut samples, CAPTURE_PREROLL);

    output_stream.play().context("starting playback")?;
    tracing::info!(seconds = expected.as_secs_f64(), "probe playback running");
    let playback_deadline = Instant::now() + expected + Duration::from_secs(2);
    while !done.load(Ordering::Relaxed) && Instant::now() < playback_deadline {
        drain_for(&rx, &mut samples, Duration::from_millis(50));
    }

    drain_for(&rx, &mut samples, CAPTURE_TAIL);
    drop(output_stream);
    drop(input_stream);
    while let Ok(chunk) = rx.try_recv() {
        samples.extend_from_slice(&chunk);
    }

    tracing::info!(samples = samples.len(), rate = input_rate, "capture complete");
    Ok(Capture {
        samples,
        sample_rate: input_rate as f32,
    })
}

fn drain_for(rx: &Receiver<Vec<f32>>, out: &mut Vec<f32>, window: Duration) {
    let deadline = Instant::now() + window;
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        if let Ok(chunk) = rx.recv_timeout((deadline - now).min(Duration::from_millis(50))) {
            out.extend_from_slice(&chunk);
        }
    }
}
