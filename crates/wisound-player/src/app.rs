//! Command-line handling and the playback loop.

use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use wisound_audio::audio::{
    shared, AudioContext, AudioManager, ContextConfig, DecoderStream, PlayerSettings, RodioBackend,
};
use wisound_common::{AudioConfig, CONFIG_FILE};

/// Tick interval of the update loop.
const TICK: Duration = Duration::from_millis(16);

/// Plays one audio file through the streaming player until it ends.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "wisound-player", version, about)]
pub struct Args {
    /// File to play
    pub file: PathBuf,

    /// Config file
    #[arg(long, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Extra passes after the first (negative = forever)
    #[arg(long = "loop", default_value_t = 0, allow_negative_numbers = true)]
    pub loop_count: i32,

    /// Volume override in 0..=1
    #[arg(long)]
    pub volume: Option<f32>,
}

impl Args {
    /// Volume override clamped to the valid range.
    #[must_use]
    pub fn volume(&self) -> Option<f32> {
        self.volume.map(|v| v.clamp(0.0, 1.0))
    }
}

/// Play the file until every player has stopped.
pub fn run(args: &Args) -> Result<()> {
    let config = AudioConfig::load_from(&args.config);

    let context = Rc::new(AudioContext::new(RodioBackend::with_max_voices(
        config.max_voices,
    )));
    context.init(&ContextConfig::from(&config));
    if !context.is_initialized() {
        bail!("No audio device available");
    }

    let stream = DecoderStream::open(&args.file, config.single_buffer_threshold)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;

    let mut manager = AudioManager::new(Rc::clone(&context), PlayerSettings::from(&config));
    let volume = args.volume().unwrap_or(config.default_volume);
    let Some(id) = manager.play(shared(stream), volume, args.loop_count) else {
        warn!("Playback of {} did not start", args.file.display());
        context.destroy();
        return Ok(());
    };
    info!("Playing {} as {}", args.file.display(), id);

    while manager.active_count() > 0 {
        manager.update();
        std::thread::sleep(TICK);
    }

    drop(manager);
    context.destroy();
    Ok(())
}
