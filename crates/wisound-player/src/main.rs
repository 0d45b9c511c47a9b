//! # WiSound Player
//!
//! Plays one audio file through the streaming player until it ends.
//!
//! ```text
//! wisound-player <file> [--config path] [--loop N] [--volume V]
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod app;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("wisound=info".parse()?))
        .init();

    info!("WiSound player {}", env!("CARGO_PKG_VERSION"));

    let args = app::Args::parse();
    app::run(&args)?;

    info!("WiSound player shutdown complete");
    Ok(())
}
