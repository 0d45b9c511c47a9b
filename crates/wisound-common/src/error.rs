//! Error types for WiSound.
//!
//! The playback core never returns these; it reports failures through sentinels and
//! log lines. They cover the fallible edges around it: configuration files and
//! opening decoded streams.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for WiSound operations.
#[derive(Debug, Error)]
pub enum WiSoundError {
    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("Failed to parse config '{path}': {message}")]
    ConfigParse {
        /// Path to the config file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Configuration could not be serialized
    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(String),

    /// Audio file could not be opened or decoded
    #[error("Failed to decode audio file '{path}': {message}")]
    Decode {
        /// Path to the audio file
        path: PathBuf,
        /// Decoder message
        message: String,
    },
}

/// Result type alias for WiSound operations.
pub type WiSoundResult<T> = Result<T, WiSoundError>;
