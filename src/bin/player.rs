//! Raw PCM player application
//!
//! Reads little-endian f32 mono samples from stdin and plays them on the
//! default output device. The default mode preloads the whole stream before
//! playback; `--stream-blocking` and `--stream-callback` start playing while
//! still reading.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pcm_player::config::PlayerConfig;
use pcm_player::session::{self, CancelToken, PlaybackMode};
use pcm_player::source::SampleSource;
use pcm_player::Error;

const USAGE: &str = "\
Usage: pcm-player [--stream-blocking | --stream-callback] [--config <path>]

Reads raw little-endian f32 mono samples from stdin and plays them on the
default output device. Without a mode flag the entire stream is preloaded
before playback starts.

Options:
  --stream-blocking   play while reading, paced by synchronous device writes
  --stream-callback   play while reading through a lock-free ring buffer
  --config <path>     load playback parameters from a TOML file
  -h, --help          print this help\
";

struct CliArgs {
    mode: PlaybackMode,
    config_path: Option<PathBuf>,
}

fn parse_args() -> Result<CliArgs, Error> {
    let mut mode = None;
    let mut config_path = None;
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--stream-blocking" => set_mode(&mut mode, PlaybackMode::BlockingStream)?,
            "--stream-callback" => set_mode(&mut mode, PlaybackMode::CallbackStream)?,
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| Error::Usage("--config requires a path".to_string()))?;
                config_path = Some(PathBuf::from(path));
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            unknown => return Err(Error::Usage(format!("unknown argument: {}", unknown))),
        }
    }

    Ok(CliArgs {
        mode: mode.unwrap_or(PlaybackMode::Preload),
        config_path,
    })
}

fn set_mode(slot: &mut Option<PlaybackMode>, mode: PlaybackMode) -> Result<(), Error> {
    match slot {
        Some(existing) => Err(Error::Usage(format!(
            "--stream-blocking and --stream-callback are mutually exclusive (already selected {})",
            existing.label()
        ))),
        None => {
            *slot = Some(mode);
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {}\n\n{}", err, USAGE);
            std::process::exit(1);
        }
    };

    let config = match &args.config_path {
        Some(path) => PlayerConfig::load(path)?,
        None => PlayerConfig::default(),
    };

    tracing::info!("starting pcm-player in {} mode", args.mode.label());

    let source = SampleSource::new(std::io::stdin().lock());
    let cancel = CancelToken::new();
    let report = session::run(args.mode, source, &config, &cancel)?;

    tracing::info!(
        "read {} bytes ({} samples, {} chunks)",
        report.bytes_read,
        report.samples_read,
        report.chunks_read
    );
    tracing::info!(
        "played {} samples ({:.4} s), {} underrun frames",
        report.samples_played,
        report.played_secs(config.sample_rate),
        report.underrun_frames
    );
    Ok(())
}
