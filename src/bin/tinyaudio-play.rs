//! Command-line tone player.
//!
//! Plays a sine tone on the default output device, or renders it offline
//! into a WAV file with `--wav`. Doubles as a quick end-to-end check of the
//! engine on a new machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use tinyaudio::engine::backend::{default_backend, PushBackend, WavSink};
use tinyaudio::engine::{EngineEvent, PlaybackEngine, SessionState};
use tinyaudio::{AudioFormat, EngineConfig, SampleFormat, ToneConfig};

#[derive(Parser, Debug)]
#[command(name = "tinyaudio-play", about = "Play or render a sine tone")]
struct Args {
    /// Tone frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    frequency: f32,

    /// Peak amplitude in [0.0, 1.0]
    #[arg(long, default_value_t = 0.5)]
    amplitude: f32,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = 44_100)]
    sample_rate: u32,

    /// Channel count (1 or 2)
    #[arg(long, default_value_t = 1)]
    channels: u16,

    /// Playback duration in seconds
    #[arg(long, default_value_t = 2.0, value_parser = parse_seconds)]
    seconds: f32,

    /// JSON configuration file; overrides the tone and format flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render offline into this WAV file instead of the audio device
    #[arg(long)]
    wav: Option<PathBuf>,
}

/// Duration argument parser: `Duration::from_secs_f32` panics on negative
/// or non-finite input, so reject those at the CLI boundary.
fn parse_seconds(raw: &str) -> Result<f32, String> {
    let value: f32 = raw
        .parse()
        .map_err(|e| format!("invalid duration: {}", e))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err("duration must be a non-negative number of seconds".to_string())
    }
}

fn main() -> Result<()> {
    tinyaudio::init_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path),
        None => EngineConfig {
            format: AudioFormat {
                sample_rate_hz: args.sample_rate,
                channel_count: args.channels,
                sample_format: SampleFormat::Int16,
            },
            tone: ToneConfig {
                frequency_hz: args.frequency,
                amplitude: args.amplitude,
            },
            ..EngineConfig::default()
        },
    };

    match &args.wav {
        Some(path) => render_wav(path, &config, args.seconds),
        None => play_live(&config, args.seconds),
    }
}

fn play_live(config: &EngineConfig, seconds: f32) -> Result<()> {
    let engine = PlaybackEngine::new(config.clone(), default_backend());
    let mut events = engine.subscribe();

    engine.start()?;
    info!(
        "playing {} Hz at {} Hz / {} channel(s) for {:.1} s",
        config.tone.frequency_hz, config.format.sample_rate_hz, config.format.channel_count, seconds
    );
    thread::sleep(Duration::from_secs_f32(seconds));

    while let Ok(event) = events.try_recv() {
        if let EngineEvent::HardwareFault { details } = event {
            warn!("playback fault: {}", details);
        }
    }

    if engine.state() == SessionState::Running {
        engine.stop()?;
    }
    info!(
        "rendered {} frames ({} underrun)",
        engine.frames_rendered(),
        engine.underrun_frames()
    );
    engine.close()?;
    Ok(())
}

/// Poll until `target_frames` have been rendered.
///
/// Also exits when the session leaves Running (a sink write failure stops
/// the session and freezes the counter, so waiting on the counter alone
/// would never terminate).
fn wait_for_frames(engine: &PlaybackEngine, target_frames: u64) -> Result<()> {
    while engine.frames_rendered() < target_frames {
        if engine.state() != SessionState::Running {
            anyhow::bail!("playback session stopped before the render finished");
        }
        thread::sleep(Duration::from_millis(2));
    }
    Ok(())
}

fn render_wav(path: &Path, config: &EngineConfig, seconds: f32) -> Result<()> {
    let sink = WavSink::create(path, &config.format)?;
    let backend = Arc::new(PushBackend::new(sink, config.chunk_frames));
    let engine = PlaybackEngine::new(config.clone(), backend);
    let mut events = engine.subscribe();

    engine.start()?;
    let target_frames = (seconds * config.format.sample_rate_hz as f32) as u64;
    if wait_for_frames(&engine, target_frames).is_err() {
        let mut reason = "session stopped before the render finished".to_string();
        while let Ok(event) = events.try_recv() {
            if let EngineEvent::HardwareFault { details } = event {
                reason = details;
            }
        }
        let _ = engine.close();
        anyhow::bail!("WAV render failed: {}", reason);
    }
    engine.stop()?;
    engine.close()?;

    info!(
        "wrote {} frames of {} Hz tone to {}",
        engine.frames_rendered(),
        config.tone.frequency_hz,
        path.display()
    );
    Ok(())
}
