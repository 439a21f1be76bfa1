use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mic_recorder::config::SourceKind;
use mic_recorder::{shell, AudioBackendFactory, AudioFile, Config, ControlState, TerminalPresenter};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tracing::{info, Level};

#[derive(Debug, Parser)]
#[command(name = "mic-recorder", version, about = "Record the default microphone to a WAV file")]
struct Args {
    /// Configuration file (defaults to config/mic-recorder.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the generated test tone instead of the microphone
    #[arg(long, global = true)]
    synthetic: bool,

    /// Print events and replies as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive recorder (default)
    Record,
    /// Print the input device as JSON
    Devices,
    /// Show the format and duration of a WAV file
    Inspect { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut cfg = Config::load(args.config.as_deref())?;
    if args.synthetic {
        cfg.audio.source = SourceKind::Synthetic;
    }

    let level: Level = cfg
        .logging
        .level
        .parse()
        .with_context(|| format!("Invalid log level: {}", cfg.logging.level))?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("mic-recorder v{}", env!("CARGO_PKG_VERSION"));

    match args.command.unwrap_or(Command::Record) {
        Command::Record => record(cfg, args.json).await,
        Command::Devices => devices(&cfg),
        Command::Inspect { file } => inspect(&file),
    }
}

async fn record(cfg: Config, json: bool) -> Result<()> {
    let output_dir = cfg.output_dir();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;
    info!("Recordings go to {}", output_dir.display());

    let factory = AudioBackendFactory::new(cfg.audio_source());
    let mut state = ControlState::new(factory, cfg.session_config(), output_dir);
    let mut presenter = TerminalPresenter::new(std::io::stdout(), json);

    if !json {
        println!("Commands: start [FILE], pause, resume, stop, save FILE, discard, status, device, quit");
    }

    shell::run(&mut state, BufReader::new(tokio::io::stdin()), &mut presenter).await
}

fn devices(cfg: &Config) -> Result<()> {
    let factory = AudioBackendFactory::new(cfg.audio_source());
    let Some(device) = factory.descriptor() else {
        bail!("No input device available");
    };
    println!("{}", serde_json::to_string_pretty(device)?);
    Ok(())
}

fn inspect(file: &Path) -> Result<()> {
    let audio = AudioFile::open(file)?;
    println!("File:        {}", audio.path);
    println!("Format:      {} Hz, {} channels, {}-bit", audio.sample_rate, audio.channels, audio.bits_per_sample);
    println!("Duration:    {:.2}s", audio.duration_seconds);
    println!("Data bytes:  {}", audio.data_bytes());
    Ok(())
}
