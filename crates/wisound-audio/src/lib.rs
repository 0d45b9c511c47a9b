//! # WiSound Audio
//!
//! Streaming audio playback over an OpenAL-style source/buffer API.
//!
//! This crate provides:
//! - The native source/buffer capability as a trait, with a rodio backend
//! - A device/context manager that leases voices to players
//! - A double-buffered streaming player with loop emulation
//! - A manager that tracks active players and reaps them when they stop
//!
//! ## Streaming
//!
//! Long streams play through a small pool of fixed-size buffers. While the
//! voice consumes one buffer, the next is already queued; every frame
//! [`StreamingPlayer::update`] unqueues the consumed ones, refills them from
//! the stream and queues them again. Short streams skip the pool and are
//! decoded into a single buffer up front.
//!
//! ## Threading
//!
//! Everything here runs on the thread that owns the context. Players share the
//! context and their stream through `Rc`, so they are `!Send`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod audio;
pub mod audio_backend;
pub mod audio_context;
pub mod audio_manager;
pub mod audio_native;
pub mod audio_player;
pub mod audio_stream;

#[cfg(test)]
mod audio_fake;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audio::*;
}

pub use prelude::*;
