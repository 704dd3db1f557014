//! retro - terminal front end for retro_synth
//!
//! Run with: cargo run --bin retro -- --preset warm.toml

mod app;
mod audio;
mod ui;

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
};

use clap::Parser;
use color_eyre::eyre::{Result as EyreResult, WrapErr};
use tracing_subscriber::EnvFilter;

use retro_synth::{
    config::{load_preset, AppConfig},
    graph::AudioGraphManager,
    params::SynthParameters,
    session::Session,
};

#[derive(Debug, Parser)]
#[command(name = "retro", version, about = "Play a small polyphonic synth from the terminal")]
struct Args {
    /// Settings file; missing means defaults.
    #[arg(long, default_value = "retro.toml")]
    config: PathBuf,

    /// Preset to start from. Ctrl+S saves back to it.
    #[arg(long)]
    preset: Option<PathBuf>,

    /// Polyphony, overrides `audio.voices`.
    #[arg(long)]
    voices: Option<usize>,

    /// The terminal belongs to the UI, so logs go here.
    #[arg(long, default_value = "retro.log")]
    log_file: PathBuf,
}

fn init_logging(path: &Path) -> EyreResult<()> {
    let file = File::create(path).wrap_err_with(|| format!("cannot open {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging(&args.log_file)?;

    let mut config = AppConfig::load(&args.config)
        .wrap_err_with(|| format!("failed to load {}", args.config.display()))?;
    if let Some(voices) = args.voices {
        config.audio.voices = voices.max(1);
    }

    let params = match &args.preset {
        Some(path) if path.exists() => load_preset(path)
            .wrap_err_with(|| format!("failed to load preset {}", path.display()))?,
        _ => SynthParameters::default(),
    };
    let keys = config.keyboard.mapper()?;

    let engine = audio::open_output(&config.audio)?;
    let manager =
        AudioGraphManager::new(engine).with_analyser_size(config.audio.analyser_size);
    let (session, init_error) = Session::start(manager, params, keys);

    let preset_path = args
        .preset
        .unwrap_or_else(|| PathBuf::from("retro-preset.toml"));
    let mut app = app::App::new(session, &config, preset_path);
    if let Some(err) = init_error {
        app.report(&err);
    }

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal);
    ratatui::restore();
    result
}
