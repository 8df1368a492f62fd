//! Tranquil CLI: plays a soundscape and/or binaural beats on an output
//! device, or renders them offline and prints a level report.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tranquil_engine::{
    AmbientEngine, BinauralEngine, EngineConfig, EngineError, EngineResult, EngineStats, Frame, Mixer, SoundId,
};

/// Time spent on each sound while `--cycle` runs through the presets.
const CYCLE_STEP: Duration = Duration::from_millis(400);

#[derive(Parser, Debug)]
#[command(name = "tranquil", version)]
#[command(about = "Procedural ambient soundscapes and binaural beats", long_about = None)]
struct Args {
    /// Sound to play: none, light-rain, forest, ocean-waves, busy-cafe,
    /// ambient-piano, white-noise, gentle-wind
    #[arg(short, long, default_value = "forest")]
    sound: SoundId,

    /// Also play the binaural beat stream
    #[arg(short, long)]
    binaural: bool,

    /// Ambient master volume 0.0-1.0 (overrides the config file)
    #[arg(long)]
    volume: Option<f32>,

    /// Stop after this many seconds (default: until Ctrl+C)
    #[arg(short, long)]
    duration: Option<f32>,

    /// TOML config with [ambient] and [binaural] tables
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Switch rapidly through every preset before settling on --sound
    #[arg(long)]
    cycle: bool,

    /// Render this many seconds without a device and print peak/RMS per second
    #[arg(long, value_name = "SECONDS")]
    offline: Option<u32>,

    /// Output device name (see --list-devices)
    #[arg(long)]
    device: Option<String>,

    /// Requested output sample rate
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Requested output channel count
    #[arg(long)]
    channels: Option<u16>,

    /// List output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// List sound ids and exit
    #[arg(long)]
    list_sounds: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(args: &Args) -> anyhow::Result<EngineConfig> {
    let mut cfg = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            EngineConfig::from_toml(&text).with_context(|| format!("loading {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(v) = args.volume {
        cfg.ambient.volume = v;
    }
    if args.sample_rate.is_some() {
        cfg.sample_rate = args.sample_rate;
    }
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(feature = "realtime")]
fn list_output_devices() -> anyhow::Result<()> {
    println!("Available output devices:");
    for name in tranquil_engine::list_output_devices()? {
        println!("- {name}");
    }
    Ok(())
}

#[cfg(not(feature = "realtime"))]
fn list_output_devices() -> anyhow::Result<()> {
    anyhow::bail!("built without the `realtime` feature")
}

/// Peak and RMS over both channels.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn meter(block: &[Frame]) -> (f32, f32) {
    let mut peak = 0.0_f32;
    let mut sum = 0.0_f64;
    for s in block.iter().flatten() {
        peak = peak.max(s.abs());
        sum += f64::from(*s) * f64::from(*s);
    }
    let rms = if block.is_empty() { 0.0 } else { (sum / (2 * block.len()) as f64).sqrt() };
    (peak, rms as f32)
}

fn print_stats(stats: &EngineStats) {
    println!(
        "graphs built {} | peak live {} | transients fired {} | stale blocked {}",
        stats.graphs_built, stats.peak_live_graphs, stats.transients_fired, stats.stale_transients_blocked
    );
}

async fn start(ambient: &AmbientEngine, binaural: &mut BinauralEngine, args: &Args) {
    if args.cycle {
        for sound in SoundId::ALL.into_iter().chain(SoundId::ALL.into_iter().rev()) {
            info!(%sound, "cycle");
            ambient.change_sound(sound).await;
            tokio::time::sleep(CYCLE_STEP).await;
        }
        print_stats(&ambient.stats());
    }
    ambient.play(args.sound).await;
    if args.binaural {
        binaural.play();
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
async fn offline(args: &Args, cfg: &EngineConfig, seconds: u32) -> anyhow::Result<()> {
    // transients run on a virtual clock that advances with the render
    tokio::time::pause();
    let sr = cfg.sample_rate.unwrap_or(48_000);
    let mixer = Mixer::new(sr as f32);
    let ambient = AmbientEngine::new(&mixer, cfg.ambient.clone());
    let mut binaural = BinauralEngine::new(&mixer, cfg.binaural.clone());
    start(&ambient, &mut binaural, args).await;

    println!("offline render: {} at {sr} Hz{}", ambient.current_sound(), if args.binaural { " + binaural" } else { "" });
    let mut block = vec![[0.0_f32; 2]; sr as usize];
    for sec in 0..seconds {
        mixer.render(&mut block);
        let (peak, rms) = meter(&block);
        println!("{sec:>4}s  peak {peak:.3}  rms {rms:.4}");
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    print_stats(&ambient.stats());

    ambient.dispose().await;
    binaural.dispose();
    Ok(())
}

/// Keep the opened output, or fall back to a sink without audio capability
/// when the host has no usable output. The engines then run silently.
/// Other device errors are fatal.
#[cfg_attr(not(feature = "realtime"), allow(dead_code))]
fn output_or_silent<T>(opened: EngineResult<T>, mixer_of: impl FnOnce(&T) -> Mixer) -> anyhow::Result<(Option<T>, Mixer)> {
    match opened {
        Ok(out) => {
            let mixer = mixer_of(&out);
            Ok((Some(out), mixer))
        }
        Err(err) if err.is_environment() => {
            warn!(error = %err, "no audio output, continuing silently");
            Ok((None, Mixer::unavailable(err.to_string())))
        }
        Err(err) => Err(err).context("opening audio output"),
    }
}

#[cfg(feature = "realtime")]
async fn realtime(args: &Args, cfg: &EngineConfig) -> anyhow::Result<()> {
    use tranquil_engine::{DeviceOutput, DeviceRequest};

    let opened = DeviceOutput::open(&DeviceRequest {
        device_name: args.device.clone(),
        sample_rate: cfg.sample_rate,
        channels: args.channels,
    });
    let (out, mixer) = output_or_silent(opened, |out| out.mixer().clone())?;
    match &out {
        Some(out) => println!("Using device: {} ({} Hz, {} ch)", out.device_name(), out.sample_rate(), out.channels()),
        None => println!("No audio output; running silently"),
    }

    let ambient = AmbientEngine::new(&mixer, cfg.ambient.clone());
    let mut binaural = BinauralEngine::new(&mixer, cfg.binaural.clone());
    start(&ambient, &mut binaural, args).await;
    println!("Sound: {} | Volume: {:.2} | Binaural: {}", ambient.current_sound(), ambient.volume(), binaural.is_playing());

    let limit = args
        .duration
        .map(Duration::try_from_secs_f32)
        .transpose()
        .context("--duration must be a non-negative number of seconds")?;
    if limit.is_none() {
        println!("Press Ctrl+C to stop…");
    }
    tokio::select! {
        () = async {
            match limit {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        } => {}
        r = tokio::signal::ctrl_c() => r.context("waiting for Ctrl+C")?,
    }

    ambient.stop().await;
    if binaural.is_playing() {
        binaural.pause();
        while binaural.is_playing() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
    print_stats(&ambient.stats());
    Ok(())
}

#[cfg(not(feature = "realtime"))]
async fn realtime(_args: &Args, _cfg: &EngineConfig) -> anyhow::Result<()> {
    anyhow::bail!("built without the `realtime` feature; use --offline <SECONDS>")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if args.list_sounds {
        for id in SoundId::ALL {
            println!("{:<14} {}", id.as_str(), id.label());
        }
        return Ok(());
    }
    if args.list_devices {
        return list_output_devices();
    }

    let cfg = load_config(&args)?;
    match args.offline {
        Some(seconds) => offline(&args, &cfg, seconds).await,
        None => realtime(&args, &cfg).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_parse_sound_ids() {
        let args = Args::try_parse_from(["tranquil", "--sound", "ocean-waves", "--binaural", "--offline", "3"]).unwrap();
        assert_eq!(args.sound, SoundId::OceanWaves);
        assert!(args.binaural);
        assert_eq!(args.offline, Some(3));
        assert!(Args::try_parse_from(["tranquil", "--sound", "thunder"]).is_err());
    }

    #[test]
    fn volume_flag_overrides_config() {
        let args = Args::try_parse_from(["tranquil", "--volume", "0.8"]).unwrap();
        let cfg = load_config(&args).unwrap();
        assert_eq!(cfg.ambient.volume, 0.8);
        assert_eq!(cfg.binaural.base_frequency, 200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_output_degrades_to_silence() {
        let opened: EngineResult<Mixer> = Err(EngineError::unsupported("no default output device"));
        let (out, mixer) = output_or_silent(opened, Mixer::clone).unwrap();
        assert!(out.is_none());
        assert!(mixer.ensure_available().is_err());

        let ambient = AmbientEngine::new(&mixer, EngineConfig::default().ambient);
        ambient.play(SoundId::Forest).await;
        assert!(!ambient.is_playing());

        let device_err: EngineResult<Mixer> = Err(EngineError::invalid_config("device", "busy"));
        assert!(output_or_silent(device_err, Mixer::clone).is_err());

        let (out, _) = output_or_silent(Ok(Mixer::new(48_000.0)), Mixer::clone).unwrap();
        assert!(out.is_some());
    }

    #[test]
    fn meter_reports_peak_and_rms() {
        let (peak, rms) = meter(&[[0.5, -0.5], [0.5, -0.5]]);
        assert_eq!(peak, 0.5);
        assert!((rms - 0.5).abs() < 1e-6);
        assert_eq!(meter(&[]), (0.0, 0.0));
    }
}
