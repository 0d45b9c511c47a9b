//! Audio System
//!
//! Re-exports the playback types from the submodules.
//!
//! # Modules
//!
//! - [`audio_native`](crate::audio_native): The source/buffer API players drive
//! - [`audio_backend`](crate::audio_backend): rodio implementation of that API
//! - [`audio_context`](crate::audio_context): Device/context lifecycle and voice leasing
//! - [`audio_stream`](crate::audio_stream): Decoded PCM streams
//! - [`audio_player`](crate::audio_player): Double-buffered streaming player
//! - [`audio_manager`](crate::audio_manager): Active player tracking
//!
//! # Quick Start
//!
//! ```ignore
//! use std::rc::Rc;
//! use wisound_audio::audio::*;
//! use wisound_common::AudioConfig;
//!
//! let config = AudioConfig::load();
//! let context = Rc::new(AudioContext::new(RodioBackend::with_max_voices(config.max_voices)));
//! context.init(&ContextConfig::from(&config));
//!
//! let mut manager = AudioManager::new(Rc::clone(&context), PlayerSettings::from(&config));
//! let stream = DecoderStream::open("assets/music/theme.ogg", config.single_buffer_threshold)?;
//! let id = manager.play(shared(stream), config.default_volume, LOOP_FOREVER);
//!
//! // Each frame
//! manager.update();
//! ```

pub use crate::audio_backend::RodioBackend;

pub use crate::audio_context::{AudioContext, ContextConfig};

pub use crate::audio_manager::{AudioManager, StopQueue};

pub use crate::audio_native::{
    BufferSlot, ContextAttributes, ContextId, DeviceId, Listener, NativeAudio, NativeError,
    PcmFormat, SourceState, VoiceHandle,
};

pub use crate::audio_player::{PlayerSettings, StopObserver, StreamingPlayer, LOOP_FOREVER};

pub use crate::audio_stream::{
    shared, AudioStream, DecoderStream, MemoryStream, SharedStream, StreamFormat,
};
