//! Audio configuration.
//!
//! Device/context parameters and streaming buffer sizes. Configuration can be
//! loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{WiSoundError, WiSoundResult};

/// Configuration file name.
pub const CONFIG_FILE: &str = "wisound.toml";

/// Context frequency value that requests the device default.
pub const DEFAULT_FREQUENCY: i32 = -1;

/// Byte size of one streaming buffer fill.
pub const DEFAULT_BUFFER_SIZE: usize = 40960;

/// Number of buffers a streaming player keeps in flight.
pub const DEFAULT_BUFFER_COUNT: usize = 3;

/// Maximum number of voices the backend hands out.
pub const DEFAULT_MAX_VOICES: usize = 32;

/// Files at or below this size are decoded into a single buffer.
pub const DEFAULT_SINGLE_BUFFER_THRESHOLD: u64 = 1024 * 1024;

/// Audio configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    // === Device / Context ===
    /// Platform device selector (None = default output device)
    pub device: Option<String>,
    /// Context mixing frequency in Hz (-1 = device default)
    pub frequency: i32,
    /// Context refresh rate in Hz (only used with an explicit frequency)
    pub refresh: i32,
    /// Synchronous context (only used with an explicit frequency)
    pub synchronized: bool,

    // === Streaming ===
    /// Bytes read from a stream per buffer fill
    pub buffer_size: usize,
    /// Buffers kept queued per streaming player
    pub buffer_count: usize,
    /// Maximum simultaneous voices
    pub max_voices: usize,

    // === Playback ===
    /// Default gain for new players (0.0 - 1.0)
    pub default_volume: f32,
    /// Decoded files up to this many bytes are fully preloaded
    pub single_buffer_threshold: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            frequency: DEFAULT_FREQUENCY,
            refresh: 0,
            synchronized: false,

            buffer_size: DEFAULT_BUFFER_SIZE,
            buffer_count: DEFAULT_BUFFER_COUNT,
            max_voices: DEFAULT_MAX_VOICES,

            default_volume: 1.0,
            single_buffer_threshold: DEFAULT_SINGLE_BUFFER_THRESHOLD,
        }
    }
}

impl AudioConfig {
    /// Load configuration from the default file location.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(CONFIG_FILE)
    }

    /// Load configuration from a specific path.
    /// Returns default config if the file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match Self::try_load_from(path) {
            Ok(mut config) => {
                config.validate();
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("{e}");
                Self::default()
            },
        }
    }

    /// Load configuration from a specific path, reporting failures.
    pub fn try_load_from<P: AsRef<Path>>(path: P) -> WiSoundResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| WiSoundError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> WiSoundResult<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| WiSoundError::ConfigSerialize(e.to_string()))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Clamp configuration values to usable ranges.
    pub fn validate(&mut self) {
        if self.frequency <= 0 {
            self.frequency = DEFAULT_FREQUENCY;
        }
        self.refresh = self.refresh.max(0);
        self.buffer_size = self.buffer_size.clamp(1024, 1024 * 1024);
        self.buffer_count = self.buffer_count.clamp(2, 16);
        self.max_voices = self.max_voices.clamp(1, 256);
        self.default_volume = self.default_volume.clamp(0.0, 1.0);
    }

    /// Whether the context is created with explicit attributes.
    #[must_use]
    pub const fn has_explicit_frequency(&self) -> bool {
        self.frequency != DEFAULT_FREQUENCY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    proptest! {
        #[test]
        fn prop_validate_clamps_and_is_idempotent(
            frequency in any::<i32>(),
            refresh in any::<i32>(),
            buffer_size in any::<usize>(),
            buffer_count in any::<usize>(),
            max_voices in any::<usize>(),
            default_volume in -10.0f32..10.0,
        ) {
            let mut config = AudioConfig {
                frequency,
                refresh,
                buffer_size,
                buffer_count,
                max_voices,
                default_volume,
                ..AudioConfig::default()
            };
            config.validate();

            prop_assert!(config.frequency == DEFAULT_FREQUENCY || config.frequency > 0);
            prop_assert!(config.refresh >= 0);
            prop_assert!((1024..=1024 * 1024).contains(&config.buffer_size));
            prop_assert!((2..=16).contains(&config.buffer_count));
            prop_assert!((1..=256).contains(&config.max_voices));
            prop_assert!((0.0..=1.0).contains(&config.default_volume));

            let once = config.clone();
            config.validate();
            prop_assert_eq!(config, once);
        }

        #[test]
        fn prop_validated_config_survives_save_load(
            frequency in 1i32..192_000,
            buffer_size in 1024usize..=1024 * 1024,
            buffer_count in 2usize..=16,
            threshold in 0u64..u64::from(u32::MAX),
            synchronized in any::<bool>(),
        ) {
            let temp_dir = TempDir::new().expect("Failed to create temp dir");
            let config_path = temp_dir.path().join("wisound.toml");
            let config = AudioConfig {
                frequency,
                buffer_size,
                buffer_count,
                synchronized,
                single_buffer_threshold: threshold,
                ..AudioConfig::default()
            };

            config.save_to(&config_path).expect("Failed to save config");
            let loaded = AudioConfig::try_load_from(&config_path).expect("Failed to load config");
            prop_assert_eq!(loaded, config);
        }
    }

    #[test]
    fn test_default_config() {
        let config = AudioConfig::default();
        assert!(config.device.is_none());
        assert_eq!(config.frequency, -1);
        assert_eq!(config.buffer_size, 40960);
        assert_eq!(config.buffer_count, 3);
        assert!(!config.has_explicit_frequency());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AudioConfig {
            frequency: 0,
            buffer_count: 0,
            default_volume: 2.0,
            ..AudioConfig::default()
        };

        config.validate();

        assert_eq!(config.frequency, DEFAULT_FREQUENCY);
        assert_eq!(config.buffer_count, 2);
        assert!((config.default_volume - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("audio").join("wisound.toml");

        let config = AudioConfig {
            device: Some("Speakers".to_string()),
            frequency: 44100,
            refresh: 60,
            synchronized: true,
            ..AudioConfig::default()
        };

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = AudioConfig::load_from(&config_path);
        assert_eq!(loaded, config);
        assert!(loaded.has_explicit_frequency());
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = AudioConfig::load_from("/nonexistent/path/wisound.toml");
        assert_eq!(config, AudioConfig::default());
    }

    #[test]
    fn test_config_load_invalid_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "buffer_size = \"lots\"").expect("Failed to write");

        assert!(matches!(
            AudioConfig::try_load_from(&config_path),
            Err(WiSoundError::ConfigParse { .. })
        ));
        assert_eq!(AudioConfig::load_from(&config_path), AudioConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AudioConfig = toml::from_str("frequency = 22050").expect("Failed to parse");
        assert_eq!(config.frequency, 22050);
        assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
    }
}
